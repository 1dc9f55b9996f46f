//! Persistent memory files shared across conversations.
//!
//! Both tools work on paths relative to a fixed memory root; absolute paths
//! and `..` are rejected so the model cannot escape it.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::has_parent_component;
use crate::tool::{required_str, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

fn memory_path(root: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let path = Path::new(requested);
    if has_parent_component(path) || path.is_absolute() {
        return Err(ToolError::PermissionDenied(
            "memory paths must be relative to the memory directory".to_string(),
        ));
    }
    Ok(root.join(path))
}

pub struct MemoryReadTool {
    root: PathBuf,
}

impl MemoryReadTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    fn list(&self) -> Vec<String> {
        let mut files: Vec<String> = WalkDir::new(&self.root)
            .into_iter()
            .flatten()
            .filter(|e| e.file_type().is_file())
            .filter_map(|e| {
                e.path()
                    .strip_prefix(&self.root)
                    .ok()
                    .map(|p| p.to_string_lossy().to_string())
            })
            .collect();
        files.sort();
        files
    }
}

#[async_trait]
impl Tool for MemoryReadTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "memory_read".to_string(),
            description: "Read memory files to access persistent information across conversations."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "File relative to the memory directory; omit to list all memory files"
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
        _context: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let Some(requested) = arguments.get("file_path").and_then(|v| v.as_str()) else {
            let files = self.list();
            debug!(count = files.len(), "listing memory files");
            return Ok(ToolResult::ok(if files.is_empty() {
                "No memory files.".to_string()
            } else {
                files.join("\n")
            }));
        };

        let path = memory_path(&self.root, requested)?;
        if !path.is_file() {
            return Ok(ToolResult::failure(format!("Memory file not found: {requested}")));
        }
        let content = tokio::fs::read_to_string(&path).await.map_err(|e| {
            ToolError::ExecutionFailed(format!("failed to read memory '{requested}': {e}"))
        })?;
        Ok(ToolResult::ok(content))
    }
}

pub struct MemoryWriteTool {
    root: PathBuf,
}

impl MemoryWriteTool {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

#[async_trait]
impl Tool for MemoryWriteTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "memory_write".to_string(),
            description: "Write memory files to store persistent information across conversations."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "file_path": {
                        "type": "string",
                        "description": "File relative to the memory directory"
                    },
                    "content": {
                        "type": "string",
                        "description": "Content to store"
                    }
                },
                "required": ["file_path", "content"]
            }),
        }
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let requested = required_str(&arguments, "file_path")?;
        let content = required_str(&arguments, "content")?;
        let path = memory_path(&self.root, requested)?;

        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| ToolError::ExecutionFailed(format!("failed to create memory dir: {e}")))?;
        }
        tokio::fs::write(&path, content).await.map_err(|e| {
            ToolError::ExecutionFailed(format!("failed to write memory '{requested}': {e}"))
        })?;

        debug!(instance = %context.instance_id, file = requested, bytes = content.len(), "memory written");
        Ok(ToolResult::ok(format!("Saved memory file {requested}")))
    }
}
