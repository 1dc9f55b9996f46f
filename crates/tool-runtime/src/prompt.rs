//! System prompt assembly.
//!
//! The prompt is a list of sections joined with blank lines: behaviour
//! guidance, an `<env>` block, a security reminder and the tool-call
//! convention. Context sections are appended as `<context name="..">`
//! blocks by [`SystemPromptBuilder::format_with_context`].

use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::context::ContextSections;

const GIT_PROBE_TIMEOUT: Duration = Duration::from_secs(5);

const SECURITY_REMINDER: &str = "IMPORTANT: Refuse to write or explain code that may be used maliciously, even if the user claims it is for educational purposes. If the files you are asked to work on look related to malware, refuse to work on them.";

const TOOL_CONVENTION: &str = r#"# Tool calls
To use a tool, write a line of the form:
Action: {"name": "<tool name>", "parameters": {<arguments as JSON>}}

- You may request several tools in one reply. They run one at a time, in the order you wrote them, so a later call can rely on the effects of an earlier one.
- Each result comes back as a tool message in the same order.
- When a reply contains no Action line, it is treated as your final answer for this turn."#;

#[derive(Debug, Clone)]
pub struct SystemPromptBuilder {
    product_name: String,
    working_dir: PathBuf,
    model: Option<String>,
}

impl SystemPromptBuilder {
    pub fn new(product_name: impl Into<String>, working_dir: impl Into<PathBuf>) -> Self {
        Self {
            product_name: product_name.into(),
            working_dir: working_dir.into(),
            model: None,
        }
    }

    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    pub fn working_dir(&self) -> &Path {
        &self.working_dir
    }

    /// Prompt sections without ambient context.
    pub async fn build(&self) -> Vec<String> {
        let is_git = is_git_repo(&self.working_dir).await;
        vec![
            self.guidance(),
            self.environment(is_git, &chrono::Local::now().format("%Y-%m-%d").to_string()),
            SECURITY_REMINDER.to_string(),
            TOOL_CONVENTION.to_string(),
        ]
    }

    fn guidance(&self) -> String {
        format!(
            "You are {}, an interactive assistant for software engineering tasks. \
Use the instructions below and the tools available to you to help the user.

# Tone
Be concise and direct. Explain non-trivial commands before running them. \
Skip preamble and summaries unless asked.

# Conventions
- Look at the existing code before changing it and follow its style.
- Prefer libraries and utilities the project already uses.
- Explore with the read-only tools before making changes.",
            self.product_name
        )
    }

    fn environment(&self, is_git: bool, date: &str) -> String {
        format!(
            "Here is useful information about the environment you are running in:
<env>
Working directory: {}
Is directory a git repo: {}
Platform: {}
Today's date: {}
Model: {}
</env>",
            self.working_dir.display(),
            if is_git { "Yes" } else { "No" },
            std::env::consts::OS,
            date,
            self.model.as_deref().unwrap_or("unknown"),
        )
    }

    /// Append context blocks; unchanged when there is no context.
    pub fn format_with_context(&self, mut sections: Vec<String>, context: &ContextSections) -> Vec<String> {
        if context.is_empty() {
            return sections;
        }
        sections.push("As you answer the user's questions, you can use the following context:".to_string());
        sections.extend(
            context
                .iter()
                .map(|(name, value)| format!("<context name=\"{name}\">{value}</context>")),
        );
        sections
    }

    /// Join prompt sections into the single text handed to the backend.
    pub fn join(sections: &[String]) -> String {
        sections.join("\n\n")
    }
}

async fn is_git_repo(dir: &Path) -> bool {
    let probe = tokio::process::Command::new("git")
        .args(["rev-parse", "--git-dir"])
        .current_dir(dir)
        .output();
    match tokio::time::timeout(GIT_PROBE_TIMEOUT, probe).await {
        Ok(Ok(output)) => output.status.success(),
        _ => false,
    }
}
