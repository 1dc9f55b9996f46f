pub mod claude;
pub mod ollama;
pub mod openai;

use std::sync::Arc;

use orchestra_core::Config;
use orchestra_tool_runtime::{LlmProviderBridge, ModelBackend};
use tracing::info;

use crate::adapter::LlmProviderAdapter;
use crate::provider::{LlmError, LlmProvider};

/// Create the appropriate LLM provider based on config.
pub fn create_provider(config: &Config) -> Result<Box<dyn LlmProvider>, LlmError> {
    let llm = &config.llm;
    match llm.provider.as_str() {
        "openai" => {
            let api_key = llm
                .openai_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("OPENAI_API_KEY not set".into()))?;
            let base_url = llm.openai_base_url.as_deref().unwrap_or(openai::DEFAULT_BASE_URL);
            Ok(Box::new(openai::OpenAiProvider::new(
                api_key.clone(),
                llm.openai_model.clone(),
                base_url.to_string(),
            )))
        }
        "anthropic" | "claude" => {
            let api_key = llm
                .anthropic_api_key
                .as_ref()
                .ok_or_else(|| LlmError::NotConfigured("ANTHROPIC_API_KEY not set".into()))?;
            Ok(Box::new(claude::ClaudeProvider::new(
                api_key.clone(),
                llm.anthropic_model.clone(),
            )))
        }
        "ollama" => Ok(Box::new(ollama::OllamaProvider::new(
            config.ollama.url.clone(),
            config.ollama.model.clone(),
        ))),
        other => Err(LlmError::NotConfigured(format!(
            "unknown LLM provider: '{}' (supported: openai, anthropic, ollama)",
            other
        ))),
    }
}

/// Provider from config, wrapped as the orchestration loop's model backend.
pub fn create_backend(config: &Config) -> Result<Arc<dyn ModelBackend>, LlmError> {
    let provider = create_provider(config)?;
    let name = provider.name().to_string();
    info!(provider = %name, model = %config.model_name(), "Model backend ready");
    Ok(Arc::new(
        LlmProviderBridge::new(Box::new(LlmProviderAdapter(provider)), name)
            .with_sampling(config.llm.temperature, config.llm.max_tokens),
    ))
}
