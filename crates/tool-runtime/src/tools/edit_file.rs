//! In-place text editing: view, create, unique string replacement, line
//! insertion and per-file undo.
//!
//! Undo history is kept per instance id and per resolved path, newest last.

use async_trait::async_trait;
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tracing::{debug, warn};
use walkdir::WalkDir;

use super::resolve_path;
use crate::tool::{required_str, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

const MAX_OUTPUT_CHARS: usize = 10_000;
const MAX_FILE_BYTES: u64 = 1024 * 1024;
const CREATE_PREVIEW_LINES: usize = 20;

enum Snapshot {
    /// The edit created the file; undo deletes it.
    Created,
    /// Content before the edit.
    Previous(String),
}

type HistoryKey = (String, PathBuf);

pub struct EditFileTool {
    history: Mutex<HashMap<HistoryKey, Vec<Snapshot>>>,
}

impl EditFileTool {
    pub fn new() -> Self {
        Self {
            history: Mutex::new(HashMap::new()),
        }
    }

    fn push(&self, instance_id: &str, path: &Path, snapshot: Snapshot) {
        if let Ok(mut history) = self.history.lock() {
            history
                .entry((instance_id.to_string(), path.to_path_buf()))
                .or_default()
                .push(snapshot);
        }
    }

    fn pop(&self, instance_id: &str, path: &Path) -> Option<Snapshot> {
        self.history
            .lock()
            .ok()?
            .get_mut(&(instance_id.to_string(), path.to_path_buf()))?
            .pop()
    }

    /// Number of edits that can still be undone for `path`.
    pub fn undo_depth(&self, instance_id: &str, path: &Path) -> usize {
        self.history
            .lock()
            .ok()
            .and_then(|h| h.get(&(instance_id.to_string(), path.to_path_buf())).map(Vec::len))
            .unwrap_or(0)
    }

    async fn view(&self, path: &Path, range: Option<&Value>) -> Result<ToolResult, ToolError> {
        if !path.exists() {
            return Ok(ToolResult::failure(format!("Path does not exist: {}", path.display())));
        }
        if path.is_dir() {
            return Ok(ToolResult::ok(clip(view_directory(path))));
        }

        let size = tokio::fs::metadata(path).await.map_err(io_failure(path))?.len();
        if size > MAX_FILE_BYTES {
            return Ok(ToolResult::failure(format!(
                "File too large (>{MAX_FILE_BYTES} bytes): {}",
                path.display()
            )));
        }
        let content = read_text(path).await?;
        let lines: Vec<&str> = content.lines().collect();

        let (start, end) = match range.and_then(|v| v.as_array()) {
            Some(bounds) => {
                let first = bounds.first().and_then(|v| v.as_i64()).unwrap_or(1);
                let last = bounds.get(1).and_then(|v| v.as_i64()).unwrap_or(-1);
                let start = (first.max(1) as usize - 1).min(lines.len());
                let end = if last < 0 {
                    lines.len()
                } else {
                    (last as usize).clamp(start, lines.len())
                };
                (start, end)
            }
            None => (0, lines.len()),
        };

        Ok(ToolResult::ok(clip(numbered(&lines[start..end], start + 1))))
    }

    async fn create(&self, instance_id: &str, path: &Path, text: &str) -> Result<ToolResult, ToolError> {
        if path.exists() {
            return Ok(ToolResult::failure(format!("File already exists: {}", path.display())));
        }
        if let Some(parent) = path.parent().filter(|p| !p.exists()) {
            return Ok(ToolResult::failure(format!(
                "Parent directory does not exist: {}. Create it first with `mkdir -p`",
                parent.display()
            )));
        }

        tokio::fs::write(path, text).await.map_err(io_failure(path))?;
        self.push(instance_id, path, Snapshot::Created);

        let lines: Vec<&str> = text.lines().collect();
        let shown = lines.len().min(CREATE_PREVIEW_LINES);
        let mut out = format!("File created at {}\n{}", path.display(), numbered(&lines[..shown], 1));
        if lines.len() > shown {
            out.push_str(&format!("\n... ({} more lines)", lines.len() - shown));
        }
        Ok(ToolResult::ok(out))
    }

    async fn str_replace(
        &self,
        instance_id: &str,
        path: &Path,
        old: &str,
        new: &str,
    ) -> Result<ToolResult, ToolError> {
        if !path.is_file() {
            return Ok(ToolResult::failure(format!("File does not exist: {}", path.display())));
        }
        let content = read_text(path).await?;

        match content.matches(old).count() {
            0 => {
                let preview: String = old.chars().take(100).collect();
                return Ok(ToolResult::failure(format!("String not found in file: {preview}")));
            }
            1 => {}
            n => {
                return Ok(ToolResult::failure(format!(
                    "String appears {n} times in file. Provide more context to make it unique."
                )))
            }
        }

        let updated = content.replacen(old, new, 1);
        tokio::fs::write(path, &updated).await.map_err(io_failure(path))?;

        let changed_at = content[..content.find(old).unwrap_or(0)].matches('\n').count();
        self.push(instance_id, path, Snapshot::Previous(content));

        let lines: Vec<&str> = updated.lines().collect();
        let start = changed_at.saturating_sub(2).min(lines.len());
        let end = (changed_at + 3).min(lines.len());
        Ok(ToolResult::ok(format!(
            "String replaced in {}\n{}",
            path.display(),
            numbered(&lines[start..end], start + 1)
        )))
    }

    async fn insert(
        &self,
        instance_id: &str,
        path: &Path,
        after_line: i64,
        text: &str,
    ) -> Result<ToolResult, ToolError> {
        if !path.is_file() {
            return Ok(ToolResult::failure(format!("File does not exist: {}", path.display())));
        }
        let content = read_text(path).await?;
        let mut lines: Vec<String> = content.lines().map(String::from).collect();

        if after_line < 0 || after_line as usize > lines.len() {
            return Ok(ToolResult::failure(format!(
                "Invalid insert_line: {after_line}. File has {} lines.",
                lines.len()
            )));
        }
        let at = after_line as usize;
        let inserted: Vec<String> = text.lines().map(String::from).collect();
        let count = inserted.len();
        let tail = lines.split_off(at);
        lines.extend(inserted);
        lines.extend(tail);

        let mut updated = lines.join("\n");
        if content.ends_with('\n') || content.is_empty() {
            updated.push('\n');
        }
        tokio::fs::write(path, &updated).await.map_err(io_failure(path))?;
        self.push(instance_id, path, Snapshot::Previous(content));

        let refs: Vec<&str> = lines.iter().map(String::as_str).collect();
        let start = at.saturating_sub(2);
        let end = (at + count + 2).min(refs.len());
        Ok(ToolResult::ok(format!(
            "Text inserted in {} after line {at}\n{}",
            path.display(),
            numbered(&refs[start..end], start + 1)
        )))
    }

    async fn undo(&self, instance_id: &str, path: &Path) -> Result<ToolResult, ToolError> {
        match self.pop(instance_id, path) {
            None => Ok(ToolResult::failure(format!("No edits to undo for {}", path.display()))),
            Some(Snapshot::Created) => {
                if path.exists() {
                    tokio::fs::remove_file(path).await.map_err(io_failure(path))?;
                }
                Ok(ToolResult::ok(format!(
                    "File creation undone, file deleted: {}",
                    path.display()
                )))
            }
            Some(Snapshot::Previous(content)) => {
                tokio::fs::write(path, content).await.map_err(io_failure(path))?;
                Ok(ToolResult::ok(format!("Last edit undone for {}", path.display())))
            }
        }
    }
}

impl Default for EditFileTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for EditFileTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "str_replace_editor".to_string(),
            description: "View, create and edit plain-text files. Commands: view, create, str_replace, insert, undo_edit."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "command": {
                        "type": "string",
                        "enum": ["view", "create", "str_replace", "insert", "undo_edit"],
                        "description": "The command to run"
                    },
                    "path": {
                        "type": "string",
                        "description": "File path (relative to working directory or absolute). `view` also accepts a directory"
                    },
                    "file_text": {
                        "type": "string",
                        "description": "Content of the new file, for `create`"
                    },
                    "old_str": {
                        "type": "string",
                        "description": "Exact text to replace, for `str_replace`; must occur exactly once"
                    },
                    "new_str": {
                        "type": "string",
                        "description": "Replacement text for `str_replace` (default empty), or text to add for `insert`"
                    },
                    "insert_line": {
                        "type": "integer",
                        "description": "`insert` places `new_str` after this line (0 inserts at the top)"
                    },
                    "view_range": {
                        "type": "array",
                        "items": {"type": "integer"},
                        "description": "1-based inclusive line range for `view`, e.g. [11, 12]; [start, -1] reads to the end"
                    }
                },
                "required": ["command", "path"]
            }),
        }
    }

    fn prompt(&self) -> Option<String> {
        Some(
            "Edit plain-text files in place.
* `view` shows a file with line numbers, or a directory two levels deep.
* `create` writes a new file; it fails if the file exists or its parent directory is missing.
* `str_replace` replaces `old_str` with `new_str`. `old_str` must match exactly one place in the file, \
whitespace included. Add surrounding lines until it is unique.
* `insert` adds `new_str` after line `insert_line`.
* `undo_edit` reverts the last edit made to `path`."
                .to_string(),
        )
    }

    async fn execute(
        &self,
        arguments: Map<String, Value>,
        context: &ToolContext,
    ) -> Result<ToolResult, ToolError> {
        let command = required_str(&arguments, "command")?;
        let path = resolve_path(&context.working_directory, required_str(&arguments, "path")?)?;
        let instance = context.instance_id.as_str();

        debug!(command, path = %path.display(), instance, "editor command");

        match command {
            "view" => self.view(&path, arguments.get("view_range")).await,
            "create" => {
                let text = required_str(&arguments, "file_text")?;
                self.create(instance, &path, text).await
            }
            "str_replace" => {
                let old = required_str(&arguments, "old_str")?;
                if old.is_empty() {
                    return Err(ToolError::InvalidInput("'old_str' must not be empty".to_string()));
                }
                let new = arguments.get("new_str").and_then(|v| v.as_str()).unwrap_or("");
                self.str_replace(instance, &path, old, new).await
            }
            "insert" => {
                let line = arguments
                    .get("insert_line")
                    .and_then(|v| v.as_i64())
                    .ok_or_else(|| ToolError::InvalidInput("missing 'insert_line' field".to_string()))?;
                let text = required_str(&arguments, "new_str")?;
                self.insert(instance, &path, line, text).await
            }
            "undo_edit" => self.undo(instance, &path).await,
            other => {
                warn!(command = other, "unknown editor command");
                Err(ToolError::InvalidInput(format!("Unknown command: {other}")))
            }
        }
    }
}

fn numbered(lines: &[&str], first: usize) -> String {
    lines
        .iter()
        .enumerate()
        .map(|(i, line)| format!("{:6}\t{line}", first + i))
        .collect::<Vec<_>>()
        .join("\n")
}

fn clip(text: String) -> String {
    match text.char_indices().nth(MAX_OUTPUT_CHARS) {
        Some((cut, _)) => format!("{}\n<response clipped>", &text[..cut]),
        None => text,
    }
}

fn view_directory(root: &Path) -> String {
    let mut out = vec![format!("{}/", root.display())];
    let walker = WalkDir::new(root)
        .min_depth(1)
        .max_depth(2)
        .sort_by_file_name()
        .into_iter()
        .filter_entry(|e| e.depth() == 0 || !e.file_name().to_string_lossy().starts_with('.'));
    for entry in walker.flatten() {
        let indent = "  ".repeat(entry.depth());
        let name = entry.file_name().to_string_lossy();
        let suffix = if entry.file_type().is_dir() { "/" } else { "" };
        out.push(format!("{indent}{name}{suffix}"));
    }
    out.join("\n")
}

async fn read_text(path: &Path) -> Result<String, ToolError> {
    let bytes = tokio::fs::read(path).await.map_err(io_failure(path))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

fn io_failure(path: &Path) -> impl FnOnce(std::io::Error) -> ToolError + '_ {
    move |e| ToolError::ExecutionFailed(format!("'{}': {e}", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    async fn run(tool: &EditFileTool, ctx: &ToolContext, value: Value) -> ToolResult {
        tool.execute(args(value), ctx).await.unwrap()
    }

    #[tokio::test]
    async fn test_create_replace_and_undo() {
        let dir = tempfile::tempdir().unwrap();
        let ctx = ToolContext::new("edit", dir.path());
        let tool = EditFileTool::new();
        let file = dir.path().join("app.py");

        let created = run(&tool, &ctx, json!({"command": "create", "path": "app.py", "file_text": "a = 1\nb = 2\n"})).await;
        assert!(created.render().starts_with("File created at"));

        let replaced = run(&tool, &ctx, json!({"command": "str_replace", "path": "app.py", "old_str": "b = 2", "new_str": "b = 3"})).await;
        assert!(replaced.success);
        assert!(replaced.render().contains("     2\tb = 3"));
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "a = 1\nb = 3\n");
        assert_eq!(tool.undo_depth("edit", &file), 2);

        run(&tool, &ctx, json!({"command": "undo_edit", "path": "app.py"})).await;
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "a = 1\nb = 2\n");

        let undone = run(&tool, &ctx, json!({"command": "undo_edit", "path": "app.py"})).await;
        assert!(undone.render().contains("file deleted"));
        assert!(!file.exists());

        let empty = run(&tool, &ctx, json!({"command": "undo_edit", "path": "app.py"})).await;
        assert!(!empty.success);
    }

    #[tokio::test]
    async fn test_replace_requires_unique_match() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("dup.txt"), "x\nx\n").unwrap();
        let ctx = ToolContext::new("edit", dir.path());
        let tool = EditFileTool::new();

        let dup = run(&tool, &ctx, json!({"command": "str_replace", "path": "dup.txt", "old_str": "x", "new_str": "y"})).await;
        assert!(dup.render().contains("appears 2 times"));
        let missing = run(&tool, &ctx, json!({"command": "str_replace", "path": "dup.txt", "old_str": "z"})).await;
        assert!(missing.render().starts_with("Error: String not found"));
        assert_eq!(std::fs::read_to_string(dir.path().join("dup.txt")).unwrap(), "x\nx\n");
    }

    #[tokio::test]
    async fn test_insert_and_view_range() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("list.txt"), "one\ntwo\nthree\n").unwrap();
        let ctx = ToolContext::new("edit", dir.path());
        let tool = EditFileTool::new();

        run(&tool, &ctx, json!({"command": "insert", "path": "list.txt", "insert_line": 1, "new_str": "one-and-a-half"})).await;
        assert_eq!(
            std::fs::read_to_string(dir.path().join("list.txt")).unwrap(),
            "one\none-and-a-half\ntwo\nthree\n"
        );

        let view = run(&tool, &ctx, json!({"command": "view", "path": "list.txt", "view_range": [2, 3]})).await;
        assert_eq!(view.render(), "     2\tone-and-a-half\n     3\ttwo");

        let bad = run(&tool, &ctx, json!({"command": "insert", "path": "list.txt", "insert_line": 9, "new_str": "x"})).await;
        assert!(bad.render().contains("File has 4 lines"));
    }

    #[tokio::test]
    async fn test_create_guards() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("exists.txt"), "").unwrap();
        let ctx = ToolContext::new("edit", dir.path());
        let tool = EditFileTool::new();

        let exists = run(&tool, &ctx, json!({"command": "create", "path": "exists.txt", "file_text": "x"})).await;
        assert!(exists.render().starts_with("Error: File already exists"));
        let orphan = run(&tool, &ctx, json!({"command": "create", "path": "no/such/dir.txt", "file_text": "x"})).await;
        assert!(orphan.render().contains("Parent directory does not exist"));
    }

    #[tokio::test]
    async fn test_history_is_per_instance() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("f.txt"), "old").unwrap();
        let tool = EditFileTool::new();
        let first = ToolContext::new("first", dir.path());
        let second = ToolContext::new("second", dir.path());

        run(&tool, &first, json!({"command": "str_replace", "path": "f.txt", "old_str": "old", "new_str": "new"})).await;
        let other = run(&tool, &second, json!({"command": "undo_edit", "path": "f.txt"})).await;
        assert!(!other.success);
        assert_eq!(std::fs::read_to_string(dir.path().join("f.txt")).unwrap(), "new");
    }

    #[tokio::test]
    async fn test_view_directory_and_unknown_command() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::create_dir_all(dir.path().join("src/deep/deeper")).unwrap();
        std::fs::write(dir.path().join("src/lib.rs"), "").unwrap();
        std::fs::write(dir.path().join(".hidden"), "").unwrap();
        let ctx = ToolContext::new("edit", dir.path());
        let tool = EditFileTool::new();

        let listing = run(&tool, &ctx, json!({"command": "view", "path": "."})).await.render();
        assert!(listing.contains("  src/\n    deep/\n    lib.rs"));
        assert!(!listing.contains("deeper"));
        assert!(!listing.contains(".hidden"));

        let err = tool
            .execute(args(json!({"command": "delete", "path": "x"})), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
