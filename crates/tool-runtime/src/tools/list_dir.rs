use async_trait::async_trait;
use serde_json::{Map, Value};
use tracing::debug;

use super::resolve_path;
use crate::tool::{Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

/// List a directory's entries, sorted, with a `/` suffix on subdirectories.
pub struct ListDirTool;

#[async_trait]
impl Tool for ListDirTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "list_dir".to_string(),
            description: "List the entries of a directory.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "path": {
                        "type": "string",
                        "description": "Directory to list (default: working directory)"
                    }
                },
                "required": []
            }),
        }
    }

    fn is_read_only(&self) -> bool {
        true
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let dir = match arguments.get("path").and_then(|v| v.as_str()) {
            Some(p) => resolve_path(&context.working_directory, p)?,
            None => context.working_directory.clone(),
        };

        if !dir.is_dir() {
            return Ok(ToolResult::failure(format!("Directory not found: {}", dir.display())));
        }

        let mut reader = tokio::fs::read_dir(&dir).await.map_err(|e| {
            ToolError::ExecutionFailed(format!("failed to list '{}': {e}", dir.display()))
        })?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::ExecutionFailed(e.to_string()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            let is_dir = entry.file_type().await.is_ok_and(|t| t.is_dir());
            entries.push(if is_dir { format!("{name}/") } else { name });
        }
        entries.sort();

        debug!(path = %dir.display(), count = entries.len(), "listed directory");

        if entries.is_empty() {
            return Ok(ToolResult::ok("(empty directory)"));
        }
        Ok(ToolResult::ok(entries.join("\n")))
    }
}
