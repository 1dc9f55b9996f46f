use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;
use std::path::PathBuf;

/// Describes a tool's interface for LLM consumption.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Unique tool name (e.g., "bash", "file_read")
    pub name: String,
    /// Human-readable description for the LLM
    pub description: String,
    /// JSON Schema describing the expected arguments
    pub input_schema: Value,
}

/// Outcome of one tool execution, produced only by the tool itself.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    pub success: bool,
    /// Result payload (text or structured)
    pub content: Value,
    /// Tool-reported failure text
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolResult {
    pub fn ok(content: impl Into<Value>) -> Self {
        Self {
            success: true,
            content: content.into(),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            success: false,
            content: Value::Null,
            error: Some(error.into()),
        }
    }

    /// Text the orchestration loop emits for this result.
    ///
    /// Strings are passed through verbatim, other values as compact JSON.
    /// Failures are prefixed with `Error: `; a failure without error text
    /// falls back to its content.
    pub fn render(&self) -> String {
        if self.success {
            value_to_text(&self.content)
        } else {
            let detail = match &self.error {
                Some(e) => e.clone(),
                None => value_to_text(&self.content),
            };
            format!("Error: {detail}")
        }
    }
}

fn value_to_text(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        Value::Null => String::new(),
        other => other.to_string(),
    }
}

/// Context handed to every tool execution.
#[derive(Debug, Clone)]
pub struct ToolContext {
    /// Logical task / conversation id; tools key per-instance state on it.
    pub instance_id: String,
    /// Working directory for file/bash operations
    pub working_directory: PathBuf,
}

impl ToolContext {
    pub fn new(instance_id: impl Into<String>, working_directory: impl Into<PathBuf>) -> Self {
        Self {
            instance_id: instance_id.into(),
            working_directory: working_directory.into(),
        }
    }
}

/// The primary extension point: all tools implement this trait.
///
/// Tools are object-safe, Send + Sync, and async. A tool may keep its own
/// per-instance state; guarding it is the tool's responsibility.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Returns the tool's definition (name, description, JSON Schema).
    fn definition(&self) -> ToolDefinition;

    /// Detailed usage prompt, preferred over the definition's description.
    fn prompt(&self) -> Option<String> {
        None
    }

    fn is_read_only(&self) -> bool {
        false
    }

    fn is_enabled(&self) -> bool {
        true
    }

    /// Execute the tool with the given arguments.
    async fn execute(
        &self,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolResult, ToolError>;
}

#[derive(Debug, thiserror::Error)]
pub enum ToolError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),
    #[error("Execution failed: {0}")]
    ExecutionFailed(String),
    #[error("Permission denied: {0}")]
    PermissionDenied(String),
    #[error("Timeout after {0:?}")]
    Timeout(std::time::Duration),
    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

impl fmt::Display for ToolDefinition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.name, self.description)
    }
}

/// Fetch a required string argument.
pub(crate) fn required_str<'a>(
    arguments: &'a Map<String, Value>,
    key: &str,
) -> Result<&'a str, ToolError> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .ok_or_else(|| ToolError::InvalidInput(format!("missing '{key}' field")))
}

/// Simple echo tool for testing purposes.
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "echo".to_string(),
            description: "Echoes back the input message. For testing.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "The message to echo back"
                    }
                },
                "required": ["message"]
            }),
        }
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        _context: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let message = required_str(&arguments, "message")?;
        Ok(ToolResult::ok(message))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_render_string_content_verbatim() {
        let result = ToolResult::ok("src/main.rs\nsrc/lib.rs");
        assert_eq!(result.render(), "src/main.rs\nsrc/lib.rs");
    }

    #[test]
    fn test_render_structured_content() {
        let result = ToolResult::ok(json!({"status": "done", "count": 2}));
        let rendered = result.render();
        let parsed: Value = serde_json::from_str(&rendered).unwrap();
        assert_eq!(parsed["count"], 2);
    }

    #[test]
    fn test_render_failure_uses_error_text() {
        let result = ToolResult::failure("file not found");
        assert_eq!(result.render(), "Error: file not found");
    }

    #[test]
    fn test_render_failure_without_error_text() {
        let result = ToolResult {
            success: false,
            content: json!("exit code 2"),
            error: None,
        };
        assert_eq!(result.render(), "Error: exit code 2");
    }

    #[test]
    fn test_tool_result_serialization_skips_missing_error() {
        let json = serde_json::to_string(&ToolResult::ok("hi")).unwrap();
        assert!(!json.contains("error"));
        let roundtrip: ToolResult = serde_json::from_str(&json).unwrap();
        assert!(roundtrip.success);
    }

    #[tokio::test]
    async fn test_echo_tool() {
        let tool = EchoTool;
        let def = tool.definition();
        assert_eq!(def.name, "echo");
        assert!(tool.is_enabled());
        assert!(tool.prompt().is_none());

        let ctx = ToolContext::new("test", "/tmp");
        let result = tool
            .execute(args(json!({"message": "hello world"})), &ctx)
            .await
            .unwrap();
        assert_eq!(result.content, json!("hello world"));
        assert!(result.success);
    }

    #[tokio::test]
    async fn test_echo_tool_missing_message() {
        let ctx = ToolContext::new("test", "/tmp");
        let err = EchoTool.execute(Map::new(), &ctx).await.unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
