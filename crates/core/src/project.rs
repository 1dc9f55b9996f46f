//! Per-project settings stored next to the code as `.orchestra.toml`.
//!
//! Holds the tool allow-list, per-tool permission rules, the persisted
//! dangerous-mode switch, extra prompt context and the command history.

use std::collections::{BTreeMap, HashMap};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::OrchestraError;

pub const PROJECT_CONFIG_FILE: &str = ".orchestra.toml";

const MAX_HISTORY: usize = 100;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ProjectConfig {
    /// Tools explicitly approved for this project.
    #[serde(default)]
    pub allowed_tools: Vec<String>,

    /// Tool permission overrides (tool name or `prefix*` -> "auto" | "confirm" | "deny")
    #[serde(default)]
    pub tool_permissions: HashMap<String, String>,

    #[serde(default)]
    pub dangerous_skip_permissions: bool,

    /// Extra named sections merged into the system prompt context.
    #[serde(default)]
    pub context: BTreeMap<String, String>,

    /// Most recent first.
    #[serde(default)]
    pub history: Vec<String>,
}

impl ProjectConfig {
    pub fn path_in(dir: &Path) -> PathBuf {
        dir.join(PROJECT_CONFIG_FILE)
    }

    /// Load the project config from `dir`, or defaults when the file is absent.
    pub fn load(dir: &Path) -> Result<Self, OrchestraError> {
        let path = Self::path_in(dir);
        if !path.exists() {
            debug!(path = %path.display(), "No project config, using defaults");
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(&path)?;
        let config: Self = toml::from_str(&content)?;
        debug!(path = %path.display(), "Loaded project config");
        Ok(config)
    }

    /// Like `load`, but a broken file degrades to defaults with a warning.
    pub fn load_or_default(dir: &Path) -> Self {
        match Self::load(dir) {
            Ok(config) => config,
            Err(e) => {
                warn!(dir = %dir.display(), error = %e, "Failed to load project config");
                Self::default()
            }
        }
    }

    pub fn save(&self, dir: &Path) -> Result<(), OrchestraError> {
        let path = Self::path_in(dir);
        let content = toml::to_string_pretty(self)?;
        std::fs::write(&path, content)?;
        debug!(path = %path.display(), "Project config saved");
        Ok(())
    }

    /// Move `command` to the front of the history, dropping duplicates and
    /// anything beyond the history cap.
    pub fn add_to_history(&mut self, command: &str) {
        self.history.retain(|c| c != command);
        self.history.insert(0, command.to_string());
        self.history.truncate(MAX_HISTORY);
    }

    pub fn set_tool_permission(&mut self, tool_name: &str, allowed: bool) {
        if allowed {
            if !self.allowed_tools.iter().any(|t| t == tool_name) {
                self.allowed_tools.push(tool_name.to_string());
            }
        } else {
            self.allowed_tools.retain(|t| t != tool_name);
        }
        info!(tool = tool_name, allowed, "Tool permission updated");
    }

    pub fn enable_dangerous_mode(&mut self, enabled: bool) {
        self.dangerous_skip_permissions = enabled;
        warn!("Dangerous mode {}", if enabled { "enabled" } else { "disabled" });
    }

    /// Skip-permission mode is on when either the project or the environment asks for it.
    pub fn should_skip_permissions(&self, env_flag: bool) -> bool {
        self.dangerous_skip_permissions || env_flag
    }
}
