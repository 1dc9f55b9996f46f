mod approval;
mod cli;
mod config;
mod driver;
mod session;
mod terminal;

use anyhow::{Context, Result};
use clap::Parser;
use std::io::IsTerminal;
use std::path::Path;
use std::sync::Arc;
use tracing::{info, warn};

use orchestra_core::config::load_dotenv;
use orchestra_core::{Config, ProjectConfig};
use orchestra_tool_runtime::{
    register_builtin_tools, BuiltinToolsConfig, Conversation, ProjectContextProvider,
    QueryOrchestrator, RewardTracker, SystemPromptBuilder, ToolContext, ToolRegistry,
};

use crate::cli::CliArgs;
use crate::config::{CliConfig, Overrides};
use crate::driver::Driver;
use crate::session::Session;
use crate::terminal::Terminal;

#[tokio::main]
async fn main() -> Result<()> {
    let args = CliArgs::parse();

    let default_filter = if args.verbose { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(default_filter)),
        )
        .with_target(false)
        .init();

    let terminal = Terminal::new();
    let cli_config = CliConfig::load(args.config.as_deref()).context("failed to load configuration")?;
    let sessions_dir = CliConfig::sessions_dir()?;

    if args.list_sessions {
        let sessions = Session::list_in(&sessions_dir)?;
        terminal.print_sessions(&sessions)?;
        return Ok(());
    }

    load_dotenv();
    let mut config = Config::from_env();
    if let Some(dir) = &args.working_dir {
        config.agent.working_dir = dir.clone();
    }
    cli_config.apply(
        &mut config,
        &Overrides {
            provider: args.provider.as_deref(),
            model: args.model.as_deref(),
            api_key: args.api_key.as_deref(),
        },
    );
    config.log_summary();

    let working_dir = config.agent.working_dir.clone();
    if !working_dir.is_dir() {
        anyhow::bail!("working directory not found: {}", working_dir.display());
    }
    let mut project = ProjectConfig::load_or_default(&working_dir);
    let skip_permissions = project
        .should_skip_permissions(args.dangerously_skip_permissions || config.agent.dangerous_skip_permissions);

    let backend = orchestra_llm::create_backend(&config).context("failed to create LLM provider")?;

    let mut registry = ToolRegistry::new();
    let mut builtins = BuiltinToolsConfig::new(&config.agent.memory_dir);
    builtins.bash_timeout = config.agent.tool_timeout();
    let handles = register_builtin_tools(&mut registry, builtins).context("failed to register tools")?;

    let interactive = args.prompt.is_none() && std::io::stdin().is_terminal();
    let mut rules = approval::build_rules(&registry, &project, &cli_config.tool_permissions, skip_permissions);
    if interactive {
        rules = rules.with_confirmation(|name, arguments| {
            tokio::task::block_in_place(|| Terminal::new().prompt_permission(name, arguments))
                .unwrap_or(false)
        });
    }

    let turn_options = approval::turn_options(
        &registry,
        rules,
        skip_permissions,
        interactive,
        config.agent.tool_timeout(),
    );

    let rewards = Arc::new(RewardTracker::new());
    let orchestrator = QueryOrchestrator::new(
        backend,
        Arc::new(registry),
        SystemPromptBuilder::new(&config.agent.product_name, &working_dir).with_model(config.model_name()),
        Arc::new(ProjectContextProvider::for_project(&working_dir, &project)),
    )
    .with_observer(rewards.clone())
    .with_skip_permissions(skip_permissions)
    .with_default_timeout(config.agent.tool_timeout())
    .with_model_timeout(config.agent.model_timeout());

    let max_turns = args.max_turns.unwrap_or(cli_config.max_turns);
    let driver = Driver::new(orchestrator, handles.finish.clone(), max_turns)
        .with_turn_options(turn_options);

    let mut session = match &args.session {
        Some(id) => {
            info!(session = %id, "Resuming session");
            let loaded = Session::load_in(&sessions_dir, id)
                .with_context(|| format!("failed to load session '{}'", id))?;
            terminal.print_info(&format!(
                "Resumed session: {} ({} messages)",
                loaded.name,
                loaded.messages.len()
            ))?;
            loaded
        }
        None => Session::new(
            args.instance_id
                .clone()
                .unwrap_or_else(|| uuid::Uuid::new_v4().to_string()),
            config.llm.provider.clone(),
            config.model_name().to_string(),
            working_dir.clone(),
        ),
    };
    let instance_id = args.instance_id.clone().unwrap_or_else(|| session.instance_id.clone());
    let tool_context = ToolContext::new(instance_id, &working_dir);
    let mut conversation = Conversation::from_messages(std::mem::take(&mut session.messages));

    if let Some(prompt) = &args.prompt {
        let outcome = driver
            .run(&mut conversation, prompt, &tool_context, |turn| {
                if let Err(e) = terminal.display_turn(turn) {
                    warn!(error = %e, "Failed to render turn");
                }
            })
            .await;
        info!(turns = outcome.turns, stop = %outcome.stop, "One-shot run complete");
        record_history(&mut project, &working_dir, prompt);
        persist(&mut session, conversation, &rewards, &tool_context, &sessions_dir, &terminal)?;
        if outcome.stop == driver::StopReason::Error {
            std::process::exit(1);
        }
        return Ok(());
    }

    terminal.print_banner(
        &config.llm.provider,
        config.model_name(),
        &working_dir.display().to_string(),
        skip_permissions,
    )?;

    while let Some(input) = terminal.read_input()? {
        if input.is_empty() {
            continue;
        }

        let outcome = driver
            .run(&mut conversation, &input, &tool_context, |turn| {
                if let Err(e) = terminal.display_turn(turn) {
                    warn!(error = %e, "Failed to render turn");
                }
            })
            .await;
        if outcome.stop == driver::StopReason::MaxTurns {
            terminal.print_info(&format!("[stopped after {} turns]", outcome.turns))?;
        }
        record_history(&mut project, &working_dir, &input);

        session.messages = conversation.messages().to_vec();
        session.update_name_from_first_message();
        if let Err(e) = session.save_in(&sessions_dir) {
            warn!(error = %e, "Failed to auto-save session");
        }
    }

    terminal.print_info("Goodbye.")?;
    persist(&mut session, conversation, &rewards, &tool_context, &sessions_dir, &terminal)
}

fn record_history(project: &mut ProjectConfig, working_dir: &Path, command: &str) {
    project.add_to_history(command);
    if let Err(e) = project.save(working_dir) {
        warn!(error = %e, "Failed to save project history");
    }
}

fn persist(
    session: &mut Session,
    conversation: Conversation,
    rewards: &RewardTracker,
    tool_context: &ToolContext,
    sessions_dir: &Path,
    terminal: &Terminal,
) -> Result<()> {
    session.messages = conversation.messages().to_vec();
    session.update_name_from_first_message();
    if !rewards.scores(&tool_context.instance_id).is_empty() {
        session.tool_score = Some(rewards.mean(&tool_context.instance_id));
    }
    match session.save_in(sessions_dir) {
        Ok(path) => terminal.print_info(&format!("Session saved: {} ({})", session.id, path.display())),
        Err(e) => terminal.print_error(&format!("Failed to save session: {:#}", e)),
    }
}
