use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Mutex;
use tracing::info;

use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// Recorded outcome of a `finish` call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Completion {
    pub message: String,
    pub commit_message: String,
    /// `true`, `false` or `partial`
    pub task_completed: String,
    pub finished_at: DateTime<Utc>,
}

/// Signals that the model considers the task done (or stuck).
pub struct FinishTool {
    completions: Mutex<HashMap<String, Completion>>,
}

impl FinishTool {
    pub fn new() -> Self {
        Self {
            completions: Mutex::new(HashMap::new()),
        }
    }

    pub fn completion(&self, instance_id: &str) -> Option<Completion> {
        self.completions
            .lock()
            .ok()
            .and_then(|c| c.get(instance_id).cloned())
    }

    pub fn is_finished(&self, instance_id: &str) -> bool {
        self.completion(instance_id).is_some()
    }
}

impl Default for FinishTool {
    fn default() -> Self {
        Self::new()
    }
}

fn non_empty<'a>(arguments: &'a Map<String, Value>, key: &str) -> Option<&'a str> {
    arguments
        .get(key)
        .and_then(|v| v.as_str())
        .filter(|s| !s.trim().is_empty())
}

#[async_trait]
impl Tool for FinishTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "finish".to_string(),
            description: "Signal that the task is complete, or that it cannot proceed.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "message": {
                        "type": "string",
                        "description": "Plain-language summary for the user"
                    },
                    "commit_message": {
                        "type": "string",
                        "description": "Commit message describing the changes, in the language of the request"
                    },
                    "task_completed": {
                        "type": "string",
                        "enum": ["true", "false", "partial"],
                        "description": "Whether the task was completed"
                    }
                },
                "required": ["message", "commit_message", "task_completed"]
            }),
        }
    }

    fn prompt(&self) -> Option<String> {
        Some(
            "Call this only after verifying every requested change is in place, or when you \
cannot proceed. Set task_completed to 'true' when done, 'partial' when only some \
requirements were met, and 'false' when you are blocked. The message should summarise \
what was done and any next steps."
                .to_string(),
        )
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let Some(message) = non_empty(&arguments, "message") else {
            return Ok(ToolResult::failure("Missing required parameter 'message'"));
        };
        let Some(commit_message) = non_empty(&arguments, "commit_message") else {
            return Ok(ToolResult::failure("Missing required parameter 'commit_message'"));
        };
        let task_completed = arguments
            .get("task_completed")
            .and_then(|v| v.as_str())
            .unwrap_or("false");
        let status = match task_completed {
            "true" => "Task successfully completed",
            "partial" => "Task partially completed",
            "false" => "Task could not be completed",
            other => {
                return Ok(ToolResult::failure(format!(
                    "Invalid task_completed value: {other}. Must be 'true', 'false', or 'partial'"
                )));
            }
        };

        let completion = Completion {
            message: message.to_string(),
            commit_message: commit_message.to_string(),
            task_completed: task_completed.to_string(),
            finished_at: Utc::now(),
        };
        if let Ok(mut completions) = self.completions.lock() {
            completions.insert(context.instance_id.clone(), completion);
        }
        info!(instance = %context.instance_id, task_completed, "Task finished");

        Ok(ToolResult::ok(serde_json::json!({
            "status": status,
            "message": message,
            "commit_message": commit_message,
            "task_completed": task_completed,
            "completed": true,
        })))
    }
}
