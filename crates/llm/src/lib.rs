pub mod adapter;
pub mod provider;
pub mod providers;

pub use adapter::LlmProviderAdapter;
pub use provider::{LlmError, LlmProvider, Message, Role};
pub use providers::{create_backend, create_provider};
