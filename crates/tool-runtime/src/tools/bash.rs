//! Shell command execution tool.
//!
//! Runs commands via `sh -c` with configurable timeout and working directory.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, warn};

use super::resolve_path;
use crate::tool::{required_str, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

pub const DEFAULT_TIMEOUT_SECS: u64 = 30;
const MAX_TIMEOUT_SECS: u64 = 300;

/// Execute shell commands with timeout and working directory support.
pub struct BashTool {
    default_timeout: Duration,
}

impl BashTool {
    pub fn new() -> Self {
        Self {
            default_timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }

    pub fn with_default_timeout(mut self, timeout: Duration) -> Self {
        self.default_timeout = timeout.min(Duration::from_secs(MAX_TIMEOUT_SECS));
        self
    }
}

impl Default for BashTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for BashTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "bash".to_string(),
            description: "Execute a shell command and return stdout/stderr output.".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "description": "The shell command to execute"
                    },
                    "timeout_secs": {
                        "type": "number",
                        "description": "Timeout in seconds (default 30, max 300)"
                    },
                    "working_dir": {
                        "type": "string",
                        "description": "Override working directory for this command"
                    }
                },
                "required": ["command"]
            }),
        }
    }

    fn prompt(&self) -> Option<String> {
        Some(
            "Run a shell command in the working directory. Output is returned as stdout, \
followed by stderr when present. Long-running commands are killed after the timeout. \
Prefer the read_file, list_dir, search_files and grep tools for inspecting files."
                .to_string(),
        )
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let command = required_str(&arguments, "command")?;

        let timeout = arguments
            .get("timeout_secs")
            .and_then(|v| v.as_u64())
            .map(|s| Duration::from_secs(s.min(MAX_TIMEOUT_SECS)))
            .unwrap_or(self.default_timeout);

        let working_dir = match arguments.get("working_dir").and_then(|v| v.as_str()) {
            Some(dir) => resolve_path(&context.working_directory, dir)?,
            None => context.working_directory.clone(),
        };

        debug!(
            command = command,
            timeout_secs = timeout.as_secs(),
            working_dir = %working_dir.display(),
            instance = %context.instance_id,
            "executing bash command"
        );

        let child = Command::new("sh")
            .arg("-c")
            .arg(command)
            .current_dir(&working_dir)
            .stdout(std::process::Stdio::piped())
            .stderr(std::process::Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::ExecutionFailed(format!("failed to spawn shell: {e}")))?;

        let output = match tokio::time::timeout(timeout, child.wait_with_output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => {
                return Err(ToolError::ExecutionFailed(format!(
                    "command execution error: {e}"
                )));
            }
            Err(_) => {
                warn!(command = command, timeout_secs = timeout.as_secs(), "command timed out");
                return Err(ToolError::Timeout(timeout));
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout);
        let stderr = String::from_utf8_lossy(&output.stderr);
        let exit_code = output.status.code().unwrap_or(-1);

        let content = if stderr.is_empty() {
            stdout.to_string()
        } else if stdout.is_empty() {
            stderr.to_string()
        } else {
            format!("{stdout}\n--- stderr ---\n{stderr}")
        };

        if output.status.success() {
            Ok(ToolResult::ok(content))
        } else {
            debug!(exit_code = exit_code, "command returned non-zero exit code");
            let detail = if content.trim().is_empty() {
                format!("exit code {exit_code}")
            } else {
                format!("exit code {exit_code}: {}", content.trim_end())
            };
            Ok(ToolResult {
                success: false,
                content: Value::String(content),
                error: Some(detail),
            })
        }
    }
}
