//! Bridge adapter: wraps a `SimpleLlmProvider` into a `ModelBackend`.
//!
//! The `SimpleLlmProvider` trait is a minimal chat-completion interface defined
//! here in tool-runtime to avoid cyclic dependencies with `crates/llm`.
//! `crates/llm` provides an adapter from its `LlmProvider` trait to
//! `SimpleLlmProvider`, so any existing provider works seamlessly.

use async_trait::async_trait;

use crate::descriptor::ToolDescriptor;
use crate::message::{Message, Role};
use crate::provider::{ModelBackend, ModelError};

/// A simple chat message for text-only LLM providers.
#[derive(Debug, Clone)]
pub struct SimpleMessage {
    pub role: SimpleRole,
    pub content: String,
}

/// Role in a chat conversation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimpleRole {
    System,
    User,
    Assistant,
}

/// Error type for `SimpleLlmProvider` operations.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct BridgeError(pub String);

/// Minimal non-streaming LLM provider trait.
///
/// This trait mirrors the shape of `orchestra_llm::LlmProvider` but lives in
/// tool-runtime to avoid a cyclic dependency.
#[async_trait]
pub trait SimpleLlmProvider: Send + Sync {
    /// Send a chat completion request and return the assistant's response text.
    async fn complete(
        &self,
        messages: Vec<SimpleMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, BridgeError>;
}

/// Wraps a `SimpleLlmProvider` into a `ModelBackend`.
///
/// Tool descriptors are rendered into the system prompt and tool results are
/// replayed as user messages, since the wrapped provider only speaks text.
pub struct LlmProviderBridge {
    inner: Box<dyn SimpleLlmProvider>,
    name: String,
    temperature: f32,
    max_tokens: u32,
}

impl LlmProviderBridge {
    /// Create a bridge from any `SimpleLlmProvider`.
    pub fn new(inner: Box<dyn SimpleLlmProvider>, name: String) -> Self {
        Self {
            inner,
            name,
            temperature: 0.0,
            max_tokens: 4096,
        }
    }

    pub fn with_sampling(mut self, temperature: f32, max_tokens: u32) -> Self {
        self.temperature = temperature;
        self.max_tokens = max_tokens;
        self
    }
}

/// Append the available tool list to the system prompt.
fn system_with_tools(system_prompt: &str, tool_schemas: &[ToolDescriptor]) -> String {
    if tool_schemas.is_empty() {
        return system_prompt.to_string();
    }
    let mut text = format!("{system_prompt}\n\n# Available tools\n");
    for descriptor in tool_schemas {
        let f = &descriptor.function;
        text.push_str(&format!(
            "\n## {}\n{}\nParameters: {}\n",
            f.name, f.description, f.parameters
        ));
    }
    text
}

/// Flatten the conversation into text-only chat messages.
pub fn to_simple_messages(
    system_prompt: &str,
    messages: &[Message],
    tool_schemas: &[ToolDescriptor],
) -> Vec<SimpleMessage> {
    let mut out = vec![SimpleMessage {
        role: SimpleRole::System,
        content: system_with_tools(system_prompt, tool_schemas),
    }];

    for msg in messages {
        let (role, content) = match msg.role {
            Role::System => (SimpleRole::System, msg.content.clone()),
            Role::User => (SimpleRole::User, msg.content.clone()),
            Role::Assistant => (SimpleRole::Assistant, msg.content.clone()),
            // Encode tool results as user messages for simple providers
            Role::Tool => (
                SimpleRole::User,
                format!(
                    "[Tool Result: {}] {}",
                    msg.name.as_deref().unwrap_or("unknown"),
                    msg.content
                ),
            ),
        };
        out.push(SimpleMessage { role, content });
    }
    out
}

#[async_trait]
impl ModelBackend for LlmProviderBridge {
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tool_schemas: &[ToolDescriptor],
    ) -> Result<String, ModelError> {
        let llm_messages = to_simple_messages(system_prompt, messages, tool_schemas);
        self.inner
            .complete(llm_messages, self.temperature, self.max_tokens)
            .await
            .map_err(|e| ModelError::Other(anyhow::anyhow!("{}", e.0)))
    }

    fn backend_name(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::ToolDescriptor;
    use crate::message::ToolCall;
    use crate::tool::EchoTool;
    use std::sync::{Arc, Mutex};

    struct Capture {
        seen: Arc<Mutex<Vec<SimpleMessage>>>,
        fail: bool,
    }

    #[async_trait]
    impl SimpleLlmProvider for Capture {
        async fn complete(
            &self,
            messages: Vec<SimpleMessage>,
            _temperature: f32,
            _max_tokens: u32,
        ) -> Result<String, BridgeError> {
            *self.seen.lock().unwrap() = messages;
            if self.fail {
                Err(BridgeError("401 unauthorized".to_string()))
            } else {
                Ok("done".to_string())
            }
        }
    }

    #[tokio::test]
    async fn test_bridge_renders_tools_and_results() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let bridge = LlmProviderBridge::new(
            Box::new(Capture { seen: seen.clone(), fail: false }),
            "capture".to_string(),
        );
        let call = ToolCall {
            id: "call_0".to_string(),
            name: "echo".to_string(),
            arguments: Default::default(),
        };
        let messages = vec![
            Message::user("say hi"),
            Message::assistant_with_calls("Action: ...", Some(vec![call.clone()])),
            Message::tool_result(&call, "hi"),
        ];
        let tools = vec![ToolDescriptor::for_tool(&EchoTool).unwrap()];

        let out = bridge.generate("base prompt", &messages, &tools).await.unwrap();
        assert_eq!(out, "done");
        assert_eq!(bridge.backend_name(), "capture");

        let seen = seen.lock().unwrap();
        assert_eq!(seen.len(), 4);
        assert_eq!(seen[0].role, SimpleRole::System);
        assert!(seen[0].content.starts_with("base prompt"));
        assert!(seen[0].content.contains("## echo"));
        assert_eq!(seen[3].role, SimpleRole::User);
        assert_eq!(seen[3].content, "[Tool Result: echo] hi");
    }

    #[tokio::test]
    async fn test_bridge_maps_errors() {
        let bridge = LlmProviderBridge::new(
            Box::new(Capture { seen: Arc::default(), fail: true }),
            "capture".to_string(),
        );
        let err = bridge.generate("p", &[], &[]).await.unwrap_err();
        assert!(err.to_string().contains("401"));
    }

    #[test]
    fn test_no_tools_leaves_prompt_untouched() {
        let msgs = to_simple_messages("plain", &[], &[]);
        assert_eq!(msgs.len(), 1);
        assert_eq!(msgs[0].content, "plain");
    }
}
