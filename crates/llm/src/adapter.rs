//! Adapts any `LlmProvider` to the tool runtime's `SimpleLlmProvider`, so
//! the orchestration loop can drive it through `LlmProviderBridge`.

use async_trait::async_trait;
use orchestra_tool_runtime::bridge::{BridgeError, SimpleLlmProvider, SimpleMessage, SimpleRole};

use crate::provider::{LlmProvider, Message, Role};

pub struct LlmProviderAdapter(pub Box<dyn LlmProvider>);

fn to_llm_message(message: SimpleMessage) -> Message {
    let role = match message.role {
        SimpleRole::System => Role::System,
        SimpleRole::User => Role::User,
        SimpleRole::Assistant => Role::Assistant,
    };
    Message::new(role, message.content)
}

#[async_trait]
impl SimpleLlmProvider for LlmProviderAdapter {
    async fn complete(
        &self,
        messages: Vec<SimpleMessage>,
        temperature: f32,
        max_tokens: u32,
    ) -> Result<String, BridgeError> {
        let messages = messages.into_iter().map(to_llm_message).collect();
        self.0
            .complete(messages, temperature, max_tokens)
            .await
            .map_err(|e| BridgeError(format!("{} provider: {e}", self.0.name())))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::LlmError;
    use std::sync::{Arc, Mutex};

    struct Recording {
        seen: Arc<Mutex<Vec<Message>>>,
        fail: bool,
    }

    #[async_trait]
    impl LlmProvider for Recording {
        async fn complete(
            &self,
            messages: Vec<Message>,
            _temperature: f32,
            max_tokens: u32,
        ) -> Result<String, LlmError> {
            *self.seen.lock().unwrap() = messages;
            if self.fail {
                return Err(LlmError::ApiError {
                    status: 429,
                    body: "rate limited".to_string(),
                });
            }
            Ok(format!("max={max_tokens}"))
        }

        fn name(&self) -> &str {
            "recording"
        }
    }

    #[tokio::test]
    async fn test_roles_and_sampling_pass_through() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let adapter = LlmProviderAdapter(Box::new(Recording { seen: seen.clone(), fail: false }));
        let out = adapter
            .complete(
                vec![
                    SimpleMessage { role: SimpleRole::System, content: "sys".into() },
                    SimpleMessage { role: SimpleRole::User, content: "hi".into() },
                    SimpleMessage { role: SimpleRole::Assistant, content: "yo".into() },
                ],
                0.3,
                77,
            )
            .await
            .unwrap();
        assert_eq!(out, "max=77");
        let roles: Vec<Role> = seen.lock().unwrap().iter().map(|m| m.role).collect();
        assert_eq!(roles, vec![Role::System, Role::User, Role::Assistant]);
    }

    #[tokio::test]
    async fn test_errors_carry_provider_name() {
        let adapter = LlmProviderAdapter(Box::new(Recording {
            seen: Arc::new(Mutex::new(Vec::new())),
            fail: true,
        }));
        let err = adapter.complete(Vec::new(), 0.0, 1).await.unwrap_err();
        assert_eq!(err.0, "recording provider: API error: 429 - rate limited");
    }
}
