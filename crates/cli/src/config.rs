use anyhow::{Context, Result};
use orchestra_core::Config;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::PathBuf;
use tracing::debug;

pub const DEFAULT_MAX_TURNS: usize = 20;

/// User-level CLI settings loaded from TOML. Environment config
/// (`orchestra_core::Config`) supplies anything left unset here.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CliConfig {
    /// Provider used when `--provider` is absent; falls back to `LLM_PROVIDER`
    #[serde(default)]
    pub default_provider: Option<String>,

    /// Default model per provider
    #[serde(default)]
    pub default_models: HashMap<String, String>,

    /// API keys keyed by provider name
    #[serde(default)]
    pub api_keys: HashMap<String, String>,

    /// Tool permission overrides (tool name or `prefix*` -> "auto" | "confirm" | "deny").
    /// Project files override these per key.
    #[serde(default)]
    pub tool_permissions: HashMap<String, String>,

    #[serde(default = "default_max_turns")]
    pub max_turns: usize,
}

fn default_max_turns() -> usize {
    DEFAULT_MAX_TURNS
}

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            default_provider: None,
            default_models: HashMap::new(),
            api_keys: HashMap::new(),
            tool_permissions: HashMap::new(),
            max_turns: default_max_turns(),
        }
    }
}

/// Flag values that override config, as given on the command line.
#[derive(Debug, Default, Clone)]
pub struct Overrides<'a> {
    pub provider: Option<&'a str>,
    pub model: Option<&'a str>,
    pub api_key: Option<&'a str>,
}

impl CliConfig {
    /// Return the default config directory path: ~/.config/orchestra/
    pub fn default_config_dir() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .context("could not determine user config directory")?
            .join("orchestra");
        Ok(config_dir)
    }

    pub fn default_config_path() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("config.toml"))
    }

    /// Load config from the given path, or the default path.
    /// A missing file yields defaults and is written out for the user to edit.
    pub fn load(path: Option<&str>) -> Result<Self> {
        let config_path = match path {
            Some(p) => PathBuf::from(p),
            None => Self::default_config_path()?,
        };

        if config_path.exists() {
            debug!(?config_path, "Loading config");
            let content = std::fs::read_to_string(&config_path)
                .with_context(|| format!("failed to read config: {}", config_path.display()))?;
            let config: Self = toml::from_str(&content)
                .with_context(|| format!("failed to parse config: {}", config_path.display()))?;
            Ok(config)
        } else {
            debug!(?config_path, "Config file not found, using defaults");
            let config = Self::default();
            if let Some(parent) = config_path.parent() {
                std::fs::create_dir_all(parent).ok();
            }
            let toml_str = toml::to_string_pretty(&config)
                .context("failed to serialize default config")?;
            std::fs::write(&config_path, toml_str).ok();
            Ok(config)
        }
    }

    /// Fold flags and this file into the environment config.
    /// Priority: flag > config file > environment for provider and model;
    /// flag > environment > config file for API keys.
    pub fn apply(&self, config: &mut Config, overrides: &Overrides<'_>) {
        if let Some(provider) = overrides.provider.or(self.default_provider.as_deref()) {
            config.llm.provider = provider.to_string();
        }
        let provider = config.llm.provider.clone();

        if let Some(model) = overrides
            .model
            .map(str::to_string)
            .or_else(|| self.default_models.get(&provider).cloned())
        {
            match provider.as_str() {
                "anthropic" | "claude" => config.llm.anthropic_model = model,
                "ollama" => config.ollama.model = model,
                _ => config.llm.openai_model = model,
            }
        }

        let file_key = self.api_keys.get(&provider).cloned();
        let slot = match provider.as_str() {
            "anthropic" | "claude" => Some(&mut config.llm.anthropic_api_key),
            "openai" => Some(&mut config.llm.openai_api_key),
            _ => None,
        };
        if let Some(slot) = slot {
            if let Some(key) = overrides.api_key {
                *slot = Some(key.to_string());
            } else if slot.is_none() {
                *slot = file_key;
            }
        }
    }

    pub fn sessions_dir() -> Result<PathBuf> {
        Ok(Self::default_config_dir()?.join("sessions"))
    }
}
