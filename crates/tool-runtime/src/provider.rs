use crate::descriptor::ToolDescriptor;
use crate::message::Message;
use async_trait::async_trait;

/// Text generation backend used by the orchestration loop.
///
/// This trait lives in tool-runtime (not in crates/llm) because it's
/// defined by the consumer (the loop), not the provider. The return value
/// is opaque text; tool calls are recovered from it by the interpreter.
#[async_trait]
pub trait ModelBackend: Send + Sync {
    async fn generate(
        &self,
        system_prompt: &str,
        messages: &[Message],
        tool_schemas: &[ToolDescriptor],
    ) -> Result<String, ModelError>;

    /// Backend name for logging/debugging (e.g., "claude", "openai", "ollama")
    fn backend_name(&self) -> &str;
}

#[derive(Debug, thiserror::Error)]
pub enum ModelError {
    #[error("API error: {status} - {message}")]
    Api { status: u16, message: String },
    #[error("Network error: {0}")]
    Network(String),
    #[error("Invalid response: {0}")]
    InvalidResponse(String),
    #[error("Model call timed out after {0:?}")]
    Timeout(std::time::Duration),
    #[error("Model backend not configured: {0}")]
    NotConfigured(String),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Mock backend for testing the loop without real API calls.
#[cfg(any(test, feature = "test-utils"))]
pub mod mock {
    use super::*;
    use std::collections::VecDeque;
    use std::sync::Mutex;
    use std::time::Duration;

    /// What the backend saw on one call.
    #[derive(Debug, Clone)]
    pub struct RecordedCall {
        pub system_prompt: String,
        pub messages: Vec<Message>,
        pub tool_names: Vec<String>,
    }

    enum Scripted {
        Text(String),
        Error(String),
    }

    /// Returns queued responses in FIFO order, then an empty reply.
    pub struct MockBackend {
        responses: Mutex<VecDeque<Scripted>>,
        calls: Mutex<Vec<RecordedCall>>,
        delay: Option<Duration>,
    }

    impl MockBackend {
        pub fn new() -> Self {
            Self {
                responses: Mutex::new(VecDeque::new()),
                calls: Mutex::new(Vec::new()),
                delay: None,
            }
        }

        /// Sleep before answering (for timeout tests).
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        pub fn queue_text(&self, text: &str) -> &Self {
            self.push(Scripted::Text(text.to_string()));
            self
        }

        pub fn queue_error(&self, message: &str) -> &Self {
            self.push(Scripted::Error(message.to_string()));
            self
        }

        fn push(&self, item: Scripted) {
            if let Ok(mut queue) = self.responses.lock() {
                queue.push_back(item);
            }
        }

        pub fn calls(&self) -> Vec<RecordedCall> {
            self.calls.lock().map(|c| c.clone()).unwrap_or_default()
        }

        pub fn call_count(&self) -> usize {
            self.calls.lock().map(|c| c.len()).unwrap_or_default()
        }
    }

    impl Default for MockBackend {
        fn default() -> Self {
            Self::new()
        }
    }

    #[async_trait]
    impl ModelBackend for MockBackend {
        async fn generate(
            &self,
            system_prompt: &str,
            messages: &[Message],
            tool_schemas: &[ToolDescriptor],
        ) -> Result<String, ModelError> {
            if let Ok(mut calls) = self.calls.lock() {
                calls.push(RecordedCall {
                    system_prompt: system_prompt.to_string(),
                    messages: messages.to_vec(),
                    tool_names: tool_schemas.iter().map(|d| d.name().to_string()).collect(),
                });
            }
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            let next = self.responses.lock().ok().and_then(|mut q| q.pop_front());
            match next {
                Some(Scripted::Text(text)) => Ok(text),
                Some(Scripted::Error(message)) => Err(ModelError::Network(message)),
                None => Ok(String::new()),
            }
        }

        fn backend_name(&self) -> &str {
            "mock"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::mock::MockBackend;
    use super::*;

    #[tokio::test]
    async fn test_mock_backend_fifo_and_recording() {
        let backend = MockBackend::new();
        backend.queue_text("first").queue_error("boom").queue_text("third");

        let msgs = vec![Message::user("hi")];
        assert_eq!(backend.generate("sys", &msgs, &[]).await.unwrap(), "first");
        let err = backend.generate("sys", &msgs, &[]).await.unwrap_err();
        assert!(err.to_string().contains("boom"));
        assert_eq!(backend.generate("sys", &msgs, &[]).await.unwrap(), "third");
        assert_eq!(backend.generate("sys", &msgs, &[]).await.unwrap(), "");

        let calls = backend.calls();
        assert_eq!(calls.len(), 4);
        assert_eq!(calls[0].system_prompt, "sys");
        assert_eq!(calls[0].messages.len(), 1);
    }
}
