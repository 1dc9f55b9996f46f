use clap::Parser;
use std::path::PathBuf;

/// Tool-calling agent in the terminal.
///
/// Each turn asks the model for a reply, runs any `Action:` tool calls it
/// contains and feeds the results back until the task settles.
#[derive(Parser, Debug)]
#[command(name = "orchestra", about = "Tool-calling agent in the terminal")]
pub struct CliArgs {
    /// LLM provider: anthropic (claude), openai, or ollama
    #[arg(long)]
    pub provider: Option<String>,

    /// Model name override (uses provider default if not set)
    #[arg(long)]
    pub model: Option<String>,

    /// API key (overrides env var and config file)
    #[arg(long)]
    pub api_key: Option<String>,

    /// Path to config file (default: ~/.config/orchestra/config.toml)
    #[arg(long)]
    pub config: Option<String>,

    /// Directory tools operate in (default: ORCHESTRA_WORKING_DIR or cwd)
    #[arg(long)]
    pub working_dir: Option<PathBuf>,

    /// Run dangerous tools (bash, write_file, memory_write) without asking
    #[arg(long)]
    pub dangerously_skip_permissions: bool,

    /// Maximum model turns per request
    #[arg(long)]
    pub max_turns: Option<usize>,

    /// Run a single request and exit
    #[arg(long, short = 'p')]
    pub prompt: Option<String>,

    /// Instance id handed to tools (default: random)
    #[arg(long)]
    pub instance_id: Option<String>,

    /// Debug logging
    #[arg(long, short = 'v')]
    pub verbose: bool,

    /// List all saved sessions
    #[arg(long)]
    pub list_sessions: bool,

    /// Resume a previous session by name or ID
    #[arg(long)]
    pub session: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_one_shot() {
        let args = CliArgs::parse_from([
            "orchestra",
            "--provider",
            "ollama",
            "--max-turns",
            "3",
            "-p",
            "list the files",
            "--dangerously-skip-permissions",
        ]);
        assert_eq!(args.provider.as_deref(), Some("ollama"));
        assert_eq!(args.max_turns, Some(3));
        assert_eq!(args.prompt.as_deref(), Some("list the files"));
        assert!(args.dangerously_skip_permissions);
        assert!(!args.list_sessions);
    }
}
