use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

const MAX_THOUGHT_CHARS: usize = 5000;

/// Logs the model's reasoning per instance. No side effects on the workspace.
pub struct ThinkTool {
    thoughts: Mutex<HashMap<String, Vec<String>>>,
    include_count: bool,
}

impl ThinkTool {
    pub fn new() -> Self {
        Self {
            thoughts: Mutex::new(HashMap::new()),
            include_count: false,
        }
    }

    /// Append `(Thought #n)` to the acknowledgement.
    pub fn with_thought_count(mut self) -> Self {
        self.include_count = true;
        self
    }

    pub fn thoughts(&self, instance_id: &str) -> Vec<String> {
        self.thoughts
            .lock()
            .ok()
            .and_then(|t| t.get(instance_id).cloned())
            .unwrap_or_default()
    }

    pub fn clear(&self, instance_id: &str) -> bool {
        self.thoughts
            .lock()
            .ok()
            .and_then(|mut t| t.remove(instance_id))
            .is_some()
    }
}

impl Default for ThinkTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for ThinkTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "think".to_string(),
            description: "Record a thought. Gathers no information and changes nothing.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "thought": {
                        "type": "string",
                        "description": "The thought to log."
                    }
                },
                "required": ["thought"]
            }),
        }
    }

    fn prompt(&self) -> Option<String> {
        Some(
            "Use this tool to think through something before acting: weighing ways to fix a bug, \
planning a refactor, or reacting to failing test output. It only records the thought."
                .to_string(),
        )
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let thought = arguments
            .get("thought")
            .and_then(|v| v.as_str())
            .unwrap_or_default();
        if thought.is_empty() {
            return Ok(ToolResult::failure("No thought provided to log"));
        }

        let thought = match thought.char_indices().nth(MAX_THOUGHT_CHARS) {
            Some((cut, _)) => format!("{}... (truncated)", &thought[..cut]),
            None => thought.to_string(),
        };

        info!(instance = %context.instance_id, "think: {thought}");

        let count = {
            let mut thoughts = self
                .thoughts
                .lock()
                .map_err(|_| ToolError::ExecutionFailed("thought log poisoned".to_string()))?;
            let entry = thoughts.entry(context.instance_id.clone()).or_default();
            entry.push(thought);
            entry.len()
        };

        let mut message = "Thought logged successfully.".to_string();
        if self.include_count {
            message.push_str(&format!(" (Thought #{count})"));
        }
        Ok(ToolResult::ok(message))
    }
}
