use std::env;
use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Load .env file (silently ignores if missing).
pub fn load_dotenv() {
    dotenvy::dotenv().ok();
}

fn env_or(key: &str, default: &str) -> String {
    env::var(key).unwrap_or_else(|_| default.to_string())
}

fn env_opt(key: &str) -> Option<String> {
    env::var(key).ok().filter(|s| !s.is_empty())
}

/// Read a profiled env var: tries {PROFILE}_{KEY} first, falls back to {KEY}.
fn profiled_env_opt(profile: &str, key: &str) -> Option<String> {
    if !profile.is_empty() {
        let prefixed = format!("{}_{}", profile, key);
        if let Some(v) = env_opt(&prefixed) {
            return Some(v);
        }
    }
    env_opt(key)
}

fn profiled_env_or(profile: &str, key: &str, default: &str) -> String {
    profiled_env_opt(profile, key).unwrap_or_else(|| default.to_string())
}

fn profiled_env_u32(profile: &str, key: &str, default: u32) -> u32 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_u64(profile: &str, key: &str, default: u64) -> u64 {
    profiled_env_opt(profile, key)
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn profiled_env_flag(profile: &str, key: &str) -> bool {
    profiled_env_opt(profile, key).is_some_and(|v| parse_flag(&v))
}

/// Interpret the usual truthy spellings (`true`, `1`, `yes`), case-insensitive.
pub fn parse_flag(value: &str) -> bool {
    matches!(value.trim().to_lowercase().as_str(), "true" | "1" | "yes")
}

// ── Top-level config ──────────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Active profile name (empty = default).
    pub profile: String,
    pub llm: LlmConfig,
    pub ollama: OllamaConfig,
    pub agent: AgentConfig,
}

impl Config {
    /// Build config from environment variables (call `load_dotenv()` first).
    /// Profile is read from `ORCHESTRA_PROFILE`. When set (e.g. `PROD`),
    /// every key is first looked up as `{PROFILE}_{KEY}`, falling back to `{KEY}`.
    pub fn from_env() -> Self {
        let profile = env_or("ORCHESTRA_PROFILE", "").to_uppercase();
        Self::for_profile(&profile)
    }

    /// Build config for a specific named profile (empty string = default).
    pub fn for_profile(profile: &str) -> Self {
        let p = profile.to_uppercase();
        let p = p.as_str();
        Self {
            profile: p.to_string(),
            llm: LlmConfig::from_env_profiled(p),
            ollama: OllamaConfig::from_env_profiled(p),
            agent: AgentConfig::from_env_profiled(p),
        }
    }

    pub fn profile_label(&self) -> &str {
        if self.profile.is_empty() { "default" } else { &self.profile }
    }

    /// Print a redacted summary for startup logs.
    pub fn log_summary(&self) {
        tracing::info!("Config loaded (profile: {}):", self.profile_label());
        tracing::info!("  llm:         provider={}, model={}", self.llm.provider, self.model_name());
        tracing::info!("  ollama:      url={}", self.ollama.url);
        tracing::info!("  agent:       working_dir={}", self.agent.working_dir.display());
        tracing::info!(
            "  permissions: skip_dangerous={}, tool_timeout={}s, model_timeout={}s",
            self.agent.dangerous_skip_permissions,
            self.agent.tool_timeout_secs,
            self.agent.model_timeout_secs
        );
    }

    /// Return a redacted view safe for logs and transcripts (no secrets).
    pub fn redacted_summary(&self) -> serde_json::Value {
        serde_json::json!({
            "profile": self.profile_label(),
            "llm": {
                "provider": self.llm.provider,
                "model": self.model_name(),
                "configured": self.llm.is_configured(),
            },
            "ollama": { "url": self.ollama.url, "model": self.ollama.model },
            "agent": {
                "working_dir": self.agent.working_dir,
                "dangerous_skip_permissions": self.agent.dangerous_skip_permissions,
                "tool_timeout_secs": self.agent.tool_timeout_secs,
                "model_timeout_secs": self.agent.model_timeout_secs,
            },
        })
    }

    /// Model name for the active provider.
    pub fn model_name(&self) -> &str {
        match self.llm.provider.as_str() {
            "anthropic" | "claude" => &self.llm.anthropic_model,
            "ollama" => &self.ollama.model,
            _ => &self.llm.openai_model,
        }
    }
}

// ── LLM (OpenAI / Anthropic) ─────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    /// "openai", "anthropic", "ollama"
    pub provider: String,
    pub openai_api_key: Option<String>,
    pub openai_model: String,
    pub openai_base_url: Option<String>,
    pub anthropic_api_key: Option<String>,
    pub anthropic_model: String,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl LlmConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            provider: profiled_env_or(p, "LLM_PROVIDER", "openai"),
            openai_api_key: profiled_env_opt(p, "OPENAI_API_KEY"),
            openai_model: profiled_env_or(p, "OPENAI_MODEL", "gpt-4o"),
            openai_base_url: profiled_env_opt(p, "OPENAI_BASE_URL"),
            anthropic_api_key: profiled_env_opt(p, "ANTHROPIC_API_KEY"),
            anthropic_model: profiled_env_or(p, "ANTHROPIC_MODEL", "claude-sonnet-4-5-20250929"),
            temperature: profiled_env_or(p, "LLM_TEMPERATURE", "0.0")
                .parse()
                .unwrap_or(0.0),
            max_tokens: profiled_env_u32(p, "LLM_MAX_TOKENS", 4096),
        }
    }

    pub fn is_configured(&self) -> bool {
        match self.provider.as_str() {
            "openai" => self.openai_api_key.is_some(),
            "anthropic" | "claude" => self.anthropic_api_key.is_some(),
            "ollama" => true,
            _ => false,
        }
    }
}

// ── Ollama (local models) ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OllamaConfig {
    pub url: String,
    pub model: String,
}

impl OllamaConfig {
    fn from_env_profiled(p: &str) -> Self {
        Self {
            url: profiled_env_or(p, "OLLAMA_URL", "http://localhost:11434"),
            model: profiled_env_or(p, "OLLAMA_MODEL", "llama3.2"),
        }
    }
}

// ── Agent / orchestration ─────────────────────────────────────

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    /// Directory tools operate in and context is collected from.
    pub working_dir: PathBuf,
    /// Bypass the dangerous-tool gate for the whole session.
    pub dangerous_skip_permissions: bool,
    pub tool_timeout_secs: u64,
    pub model_timeout_secs: u64,
    /// Root for the memory_read / memory_write tools.
    pub memory_dir: PathBuf,
    /// Product name used in the system prompt.
    pub product_name: String,
}

impl AgentConfig {
    fn from_env_profiled(p: &str) -> Self {
        let working_dir = profiled_env_opt(p, "ORCHESTRA_WORKING_DIR")
            .map(PathBuf::from)
            .or_else(|| env::current_dir().ok())
            .unwrap_or_else(|| PathBuf::from("."));
        let memory_dir = profiled_env_opt(p, "ORCHESTRA_MEMORY_DIR")
            .map(PathBuf::from)
            .unwrap_or_else(|| working_dir.join(".orchestra").join("memory"));
        Self {
            working_dir,
            dangerous_skip_permissions: profiled_env_flag(p, "ORCHESTRA_SKIP_PERMISSIONS"),
            tool_timeout_secs: profiled_env_u64(p, "ORCHESTRA_TOOL_TIMEOUT_SECS", 30),
            model_timeout_secs: profiled_env_u64(p, "ORCHESTRA_MODEL_TIMEOUT_SECS", 300),
            memory_dir,
            product_name: profiled_env_or(p, "ORCHESTRA_PRODUCT_NAME", "orchestra"),
        }
    }

    pub fn tool_timeout(&self) -> Duration {
        Duration::from_secs(self.tool_timeout_secs)
    }

    pub fn model_timeout(&self) -> Duration {
        Duration::from_secs(self.model_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_flag() {
        assert!(parse_flag("true"));
        assert!(parse_flag("1"));
        assert!(parse_flag(" YES "));
        assert!(!parse_flag("no"));
        assert!(!parse_flag(""));
        assert!(!parse_flag("false"));
    }

    #[test]
    fn test_profiled_lookup_prefers_prefix() {
        env::set_var("ORCHCFGTEST_OLLAMA_MODEL", "qwen2.5-coder");
        let config = Config::for_profile("orchcfgtest");
        assert_eq!(config.profile, "ORCHCFGTEST");
        assert_eq!(config.ollama.model, "qwen2.5-coder");
        env::remove_var("ORCHCFGTEST_OLLAMA_MODEL");
    }

    #[test]
    fn test_profiled_skip_permissions_flag() {
        env::set_var("ORCHSKIPTEST_ORCHESTRA_SKIP_PERMISSIONS", "yes");
        let config = Config::for_profile("ORCHSKIPTEST");
        assert!(config.agent.dangerous_skip_permissions);
        env::remove_var("ORCHSKIPTEST_ORCHESTRA_SKIP_PERMISSIONS");
    }

    #[test]
    fn test_redacted_summary_has_no_keys() {
        let mut config = Config::for_profile("");
        config.llm.openai_api_key = Some("sk-secret".to_string());
        let summary = config.redacted_summary().to_string();
        assert!(!summary.contains("sk-secret"));
    }

    #[test]
    fn test_model_name_follows_provider() {
        let mut config = Config::for_profile("");
        config.llm.provider = "ollama".to_string();
        config.ollama.model = "llama3.2".to_string();
        assert_eq!(config.model_name(), "llama3.2");
    }
}
