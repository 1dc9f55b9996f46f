//! Ambient context collected at the start of a turn.
//!
//! A provider returns named text sections (git status, directory snapshot,
//! README, well-known config files, project instructions) that the prompt
//! builder renders as `<context>` blocks. Individual probes that fail are
//! logged and left out; only an unusable working directory is an error.

use async_trait::async_trait;
use indexmap::IndexMap;
use orchestra_core::ProjectConfig;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;
use tokio::sync::OnceCell;
use tracing::{debug, info, warn};

/// Section name -> text, in insertion order.
pub type ContextSections = IndexMap<String, String>;

const GIT_TIMEOUT: Duration = Duration::from_secs(10);
const MAX_STATUS_LINES: usize = 200;
const MAX_README_CHARS: usize = 5000;
const MAX_CONFIG_CHARS: usize = 2000;

const README_FILES: &[&str] = &["README.md", "README.txt", "README.rst", "README"];
const CONFIG_FILES: &[&str] = &[
    "Cargo.toml",
    "pyproject.toml",
    "requirements.txt",
    "setup.py",
    "package.json",
    "Dockerfile",
    ".gitignore",
    "Makefile",
    "docker-compose.yml",
];
const INSTRUCTION_FILES: &[&str] = &["AGENTS.md", "CLAUDE.md"];

#[derive(Debug, thiserror::Error)]
pub enum ContextError {
    #[error("Working directory not found: {0}")]
    MissingDirectory(PathBuf),
    #[error("Context collection failed: {0}")]
    Collection(String),
}

#[async_trait]
pub trait ContextProvider: Send + Sync {
    async fn sections(&self) -> Result<ContextSections, ContextError>;
}

/// Fixed sections, for tests and callers that gather context themselves.
#[derive(Debug, Clone, Default)]
pub struct StaticContextProvider {
    sections: ContextSections,
}

impl StaticContextProvider {
    pub fn new(sections: ContextSections) -> Self {
        Self { sections }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn with_section(mut self, name: impl Into<String>, text: impl Into<String>) -> Self {
        self.sections.insert(name.into(), text.into());
        self
    }
}

#[async_trait]
impl ContextProvider for StaticContextProvider {
    async fn sections(&self) -> Result<ContextSections, ContextError> {
        Ok(self.sections.clone())
    }
}

/// Collects context from a project directory once, then serves the snapshot.
pub struct ProjectContextProvider {
    working_dir: PathBuf,
    extra: BTreeMap<String, String>,
    cache: OnceCell<ContextSections>,
}

impl ProjectContextProvider {
    pub fn new(working_dir: impl Into<PathBuf>) -> Self {
        Self {
            working_dir: working_dir.into(),
            extra: BTreeMap::new(),
            cache: OnceCell::new(),
        }
    }

    /// Provider for `working_dir` including the project file's `context` entries.
    pub fn for_project(working_dir: impl Into<PathBuf>, project: &ProjectConfig) -> Self {
        Self::new(working_dir).with_extra(project.context.clone())
    }

    /// Extra named sections, e.g. from the project config file.
    pub fn with_extra(mut self, extra: BTreeMap<String, String>) -> Self {
        self.extra = extra;
        self
    }

    async fn collect(&self) -> Result<ContextSections, ContextError> {
        let dir = self.working_dir.as_path();
        if !dir.is_dir() {
            return Err(ContextError::MissingDirectory(self.working_dir.clone()));
        }

        let mut sections = ContextSections::new();

        if let Some(git) = git_status(dir).await {
            sections.insert("gitStatus".to_string(), git);
        }
        match directory_structure(dir) {
            Ok(listing) => {
                sections.insert("directoryStructure".to_string(), listing);
            }
            Err(e) => warn!(dir = %dir.display(), error = %e, "Failed to list directory"),
        }
        if let Some(readme) = first_readable(dir, README_FILES) {
            sections.insert("readme".to_string(), truncate_chars(&readme, MAX_README_CHARS));
        }
        for name in CONFIG_FILES {
            if let Some(content) = read_if_file(&dir.join(name)) {
                sections.insert(
                    format!("configFile_{}", name.replace('.', "_")),
                    truncate_chars(&content, MAX_CONFIG_CHARS),
                );
            }
        }
        for name in INSTRUCTION_FILES {
            if let Some(content) = read_if_file(&dir.join(name)) {
                debug!(file = name, "Loaded project instructions");
                sections.insert(name.to_string(), content);
            }
        }
        for (name, text) in &self.extra {
            sections.insert(name.clone(), text.clone());
        }

        info!(dir = %dir.display(), count = sections.len(), "Collected project context");
        Ok(sections)
    }
}

#[async_trait]
impl ContextProvider for ProjectContextProvider {
    async fn sections(&self) -> Result<ContextSections, ContextError> {
        self.cache
            .get_or_try_init(|| self.collect())
            .await
            .cloned()
    }
}

async fn run_git(dir: &Path, args: &[&str]) -> Option<String> {
    let command = tokio::process::Command::new("git")
        .args(args)
        .current_dir(dir)
        .output();
    match tokio::time::timeout(GIT_TIMEOUT, command).await {
        Ok(Ok(output)) if output.status.success() => {
            Some(String::from_utf8_lossy(&output.stdout).trim().to_string())
        }
        Ok(Ok(_)) => None,
        Ok(Err(e)) => {
            debug!(args = ?args, error = %e, "git not runnable");
            None
        }
        Err(_) => {
            warn!(args = ?args, "git command timed out");
            None
        }
    }
}

async fn git_status(dir: &Path) -> Option<String> {
    run_git(dir, &["rev-parse", "--git-dir"]).await?;

    let branch = run_git(dir, &["branch", "--show-current"]).await.unwrap_or_default();
    let main_branch = run_git(dir, &["rev-parse", "--abbrev-ref", "origin/HEAD"])
        .await
        .map(|b| b.trim_start_matches("origin/").to_string())
        .unwrap_or_else(|| "main".to_string());
    let status = run_git(dir, &["status", "--short"]).await.unwrap_or_default();
    let recent = run_git(dir, &["log", "--oneline", "-n", "5"]).await.unwrap_or_default();
    let mine = match run_git(dir, &["config", "user.email"]).await {
        Some(email) if !email.is_empty() => {
            run_git(dir, &["log", "--oneline", "-n", "5", "--author", &email]).await
        }
        _ => None,
    }
    .filter(|s| !s.is_empty())
    .unwrap_or_else(|| "(no recent commits)".to_string());

    Some(format!(
        "This is the git status at the start of the conversation. It is a snapshot and will not update.
Current branch: {branch}

Main branch (you will usually use this for PRs): {main_branch}

Status:
{}

Recent commits:
{recent}

Your recent commits:
{mine}",
        truncate_status(&status)
    ))
}

fn truncate_status(status: &str) -> String {
    if status.trim().is_empty() {
        return "(clean)".to_string();
    }
    let lines: Vec<&str> = status.lines().collect();
    if lines.len() <= MAX_STATUS_LINES {
        return status.to_string();
    }
    format!(
        "{}\n... (truncated because there are more than {MAX_STATUS_LINES} lines. Run \"git status\" with the bash tool for the full output)",
        lines[..MAX_STATUS_LINES].join("\n")
    )
}

fn directory_structure(dir: &Path) -> std::io::Result<String> {
    let mut entries: Vec<String> = std::fs::read_dir(dir)?
        .flatten()
        .map(|e| {
            let name = e.file_name().to_string_lossy().to_string();
            if e.file_type().is_ok_and(|t| t.is_dir()) {
                format!("{name}/")
            } else {
                name
            }
        })
        .collect();
    entries.sort();
    Ok(format!(
        "Below is a snapshot of this project's top-level file structure at the start of the conversation. It will not update.\n\n{}",
        entries.join("\n")
    ))
}

fn read_if_file(path: &Path) -> Option<String> {
    if !path.is_file() {
        return None;
    }
    match std::fs::read(path) {
        Ok(bytes) => Some(String::from_utf8_lossy(&bytes).into_owned()),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Failed to read context file");
            None
        }
    }
}

fn first_readable(dir: &Path, names: &[&str]) -> Option<String> {
    names.iter().find_map(|name| read_if_file(&dir.join(name)))
}

fn truncate_chars(text: &str, max: usize) -> String {
    match text.char_indices().nth(max) {
        Some((cut, _)) => format!("{}\n... (truncated)", &text[..cut]),
        None => text.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_static_provider() {
        let provider = StaticContextProvider::empty().with_section("a", "1").with_section("b", "2");
        let sections = provider.sections().await.unwrap();
        assert_eq!(sections.keys().collect::<Vec<_>>(), vec!["a", "b"]);
    }

    #[tokio::test]
    async fn test_project_provider_collects_files() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("README.md"), "# Demo\nHello").unwrap();
        std::fs::write(dir.path().join("Cargo.toml"), "[package]\nname = \"demo\"").unwrap();
        std::fs::write(dir.path().join("AGENTS.md"), "Run the tests first.").unwrap();
        std::fs::create_dir(dir.path().join("src")).unwrap();

        let mut project = ProjectConfig::default();
        project.context.insert("team".to_string(), "platform".to_string());
        let provider = ProjectContextProvider::for_project(dir.path(), &project);
        let sections = provider.sections().await.unwrap();

        assert_eq!(sections["readme"], "# Demo\nHello");
        assert!(sections["configFile_Cargo_toml"].contains("demo"));
        assert_eq!(sections["AGENTS.md"], "Run the tests first.");
        assert_eq!(sections["team"], "platform");
        let listing = &sections["directoryStructure"];
        assert!(listing.contains("src/"));
        assert!(listing.contains("README.md"));
    }

    #[tokio::test]
    async fn test_project_provider_caches_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let provider = ProjectContextProvider::new(dir.path());
        let first = provider.sections().await.unwrap();
        std::fs::write(dir.path().join("README.md"), "late").unwrap();
        let second = provider.sections().await.unwrap();
        assert_eq!(first, second);
        assert!(!second.contains_key("readme"));
    }

    #[tokio::test]
    async fn test_missing_directory_is_error() {
        let provider = ProjectContextProvider::new("/definitely/not/here/orchestra");
        assert!(matches!(
            provider.sections().await,
            Err(ContextError::MissingDirectory(_))
        ));
    }

    #[test]
    fn test_truncate_chars() {
        assert_eq!(truncate_chars("short", 10), "short");
        assert_eq!(truncate_chars("abcdef", 3), "abc\n... (truncated)");
        assert_eq!(truncate_chars("ééé", 2), "éé\n... (truncated)");
    }

    #[test]
    fn test_truncate_status() {
        assert_eq!(truncate_status(""), "(clean)");
        let long: String = (0..250).map(|i| format!(" M file{i}.rs\n")).collect();
        let truncated = truncate_status(&long);
        assert_eq!(truncated.lines().count(), MAX_STATUS_LINES + 1);
        assert!(truncated.ends_with("full output)"));
    }
}
