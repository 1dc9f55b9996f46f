//! JSON transcripts of CLI conversations, one file per session.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use orchestra_tool_runtime::{Message, Role};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::debug;

/// Persisted session metadata and conversation history.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    /// Timestamp-derived identifier, also the file stem
    pub id: String,
    /// Human-readable name, taken from the first user message
    pub name: String,
    /// Instance id handed to tools, stable across resumes
    pub instance_id: String,
    pub provider: String,
    pub model: String,
    pub working_dir: PathBuf,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub messages: Vec<Message>,
    /// Mean per-call tool score, when any tool ran
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_score: Option<f32>,
}

impl Session {
    pub fn new(instance_id: String, provider: String, model: String, working_dir: PathBuf) -> Self {
        let now = Utc::now();
        let id = now.format("%Y%m%d-%H%M%S").to_string();
        Self {
            id: id.clone(),
            name: id,
            instance_id,
            provider,
            model,
            working_dir,
            created_at: now,
            updated_at: now,
            messages: Vec::new(),
            tool_score: None,
        }
    }

    /// Update the session name based on the first user message.
    pub fn update_name_from_first_message(&mut self) {
        let first_user = self.messages.iter().find(|m| m.role == Role::User);
        if let Some(message) = first_user {
            let sanitized = sanitize_session_name(&message.content);
            if !sanitized.is_empty() {
                self.name = sanitized;
            }
        }
    }

    /// Save the session into `dir`, creating it if needed.
    pub fn save_in(&mut self, dir: &Path) -> Result<PathBuf> {
        std::fs::create_dir_all(dir)
            .with_context(|| format!("failed to create sessions dir: {}", dir.display()))?;
        self.updated_at = Utc::now();
        let path = dir.join(format!("{}.json", self.id));
        let json = serde_json::to_string_pretty(self).context("failed to serialize session")?;
        std::fs::write(&path, json)
            .with_context(|| format!("failed to write session: {}", path.display()))?;
        debug!(id = %self.id, path = %path.display(), messages = self.messages.len(), "Session saved");
        Ok(path)
    }

    /// Load a session by exact ID, ID prefix, or name fragment.
    pub fn load_in(dir: &Path, id_or_name: &str) -> Result<Self> {
        let exact_path = dir.join(format!("{}.json", id_or_name));
        if exact_path.exists() {
            return Self::load_from_path(&exact_path);
        }

        let needle = id_or_name.to_lowercase();
        let mut matches: Vec<Self> = Self::read_all(dir)?
            .into_iter()
            .filter(|s| s.id.starts_with(id_or_name) || s.name.to_lowercase().contains(&needle))
            .collect();

        match matches.len() {
            0 => anyhow::bail!("no session found matching '{}'", id_or_name),
            1 => Ok(matches.remove(0)),
            n => anyhow::bail!(
                "ambiguous session '{}': {} matches found. Use a more specific identifier.",
                id_or_name,
                n
            ),
        }
    }

    fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read session: {}", path.display()))?;
        let session: Self = serde_json::from_str(&content)
            .with_context(|| format!("failed to parse session: {}", path.display()))?;
        Ok(session)
    }

    /// Every readable session file in `dir`; unreadable files are skipped.
    fn read_all(dir: &Path) -> Result<Vec<Self>> {
        if !dir.exists() {
            return Ok(Vec::new());
        }
        let entries = std::fs::read_dir(dir).context("failed to read sessions directory")?;
        Ok(entries
            .flatten()
            .map(|entry| entry.path())
            .filter(|path| path.extension().is_some_and(|ext| ext == "json"))
            .filter_map(|path| Self::load_from_path(&path).ok())
            .collect())
    }

    /// List all saved sessions, most recent first.
    pub fn list_in(dir: &Path) -> Result<Vec<SessionSummary>> {
        let mut summaries: Vec<SessionSummary> = Self::read_all(dir)?
            .into_iter()
            .map(|session| SessionSummary {
                message_count: session.messages.len(),
                id: session.id,
                name: session.name,
                provider: session.provider,
                updated_at: session.updated_at,
            })
            .collect();
        summaries.sort_by(|a, b| b.updated_at.cmp(&a.updated_at));
        Ok(summaries)
    }
}

/// Lightweight summary of a session for listing.
#[derive(Debug)]
pub struct SessionSummary {
    pub id: String,
    pub name: String,
    pub provider: String,
    pub updated_at: DateTime<Utc>,
    pub message_count: usize,
}

/// Sanitize a user message into a valid session name.
/// Takes the first ~50 chars, replaces non-alphanumeric with dashes, lowercases.
fn sanitize_session_name(text: &str) -> String {
    let truncated: String = text.chars().take(50).collect();
    let mut result = String::new();
    let mut prev_dash = false;
    for c in truncated.chars() {
        if c.is_alphanumeric() || c == '_' {
            result.push(c.to_ascii_lowercase());
            prev_dash = false;
        } else {
            if !prev_dash && !result.is_empty() {
                result.push('-');
            }
            prev_dash = true;
        }
    }
    result.trim_end_matches('-').to_string()
}
