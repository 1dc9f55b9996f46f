//! Glob-based file search over a directory tree.

use async_trait::async_trait;
use glob::{MatchOptions, Pattern};
use serde_json::{Map, Value};
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::resolve_path;
use crate::tool::{required_str, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

const DEFAULT_MAX_RESULTS: usize = 1000;
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Find files whose name (or relative path, for patterns with `/`) matches a glob.
pub struct SearchFilesTool {
    max_results: usize,
}

impl SearchFilesTool {
    pub fn new() -> Self {
        Self {
            max_results: DEFAULT_MAX_RESULTS,
        }
    }

    pub fn with_max_results(mut self, max_results: usize) -> Self {
        self.max_results = max_results.max(1);
        self
    }

    fn search(&self, root: &Path, pattern: &Pattern) -> (Vec<String>, bool) {
        let by_path = pattern.as_str().contains('/');
        let options = MatchOptions {
            case_sensitive: true,
            require_literal_separator: false,
            require_literal_leading_dot: false,
        };

        let walker = WalkDir::new(root)
            .follow_links(false)
            .into_iter()
            .filter_entry(|e| {
                let name = e.file_name().to_string_lossy();
                e.depth() == 0 || !(e.file_type().is_dir() && SKIPPED_DIRS.contains(&&*name))
            });

        let mut matches = Vec::new();
        for entry in walker.flatten() {
            if !entry.file_type().is_file() {
                continue;
            }
            let Ok(relative) = entry.path().strip_prefix(root) else {
                continue;
            };
            let hit = if by_path {
                pattern.matches_path_with(relative, options)
            } else {
                pattern.matches_with(&entry.file_name().to_string_lossy(), options)
            };
            if hit {
                matches.push(relative.to_string_lossy().to_string());
            }
        }

        matches.sort();
        let truncated = matches.len() > self.max_results;
        matches.truncate(self.max_results);
        (matches, truncated)
    }
}

impl Default for SearchFilesTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for SearchFilesTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "search_files".to_string(),
            description: "Find files matching a glob pattern (e.g. \"*.rs\", \"src/**/*.toml\").".to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Glob pattern; matched against file names, or against relative paths when it contains '/'"
                    },
                    "path": {
                        "type": "string",
                        "description": "Directory to search (default: working directory)"
                    }
                },
                "required": ["pattern"]
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
        let pattern_str = required_str(&arguments, "pattern")?.trim();
        if pattern_str.is_empty() {
            return Err(ToolError::InvalidInput("'pattern' must not be empty".to_string()));
        }
        let pattern = Pattern::new(pattern_str)
            .map_err(|e| ToolError::InvalidInput(format!("invalid glob pattern: {e}")))?;

        let root: PathBuf = match arguments.get("path").and_then(|v| v.as_str()) {
            Some(p) => resolve_path(&context.working_directory, p)?,
            None => context.working_directory.clone(),
        };
        if !root.is_dir() {
            return Ok(ToolResult::failure(format!("Directory not found: {}", root.display())));
        }

        debug!(pattern = pattern_str, root = %root.display(), "searching files");

        let walk_root = root.clone();
        let max_results = self.max_results;
        let (files, truncated) = tokio::task::spawn_blocking(move || {
            SearchFilesTool { max_results }.search(&walk_root, &pattern)
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("search task failed: {e}")))?;

        if files.is_empty() {
            return Ok(ToolResult::ok(format!(
                "No files found matching pattern '{pattern_str}' in {}",
                root.display()
            )));
        }

        let mut content = format!(
            "Found {} files matching pattern '{pattern_str}' in {}",
            files.len(),
            root.display()
        );
        if truncated {
            content.push_str(&format!(" (truncated to first {max_results})"));
        }
        content.push_str(":\n\n");
        content.push_str(&files.join("\n"));
        Ok(ToolResult::ok(content))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn args(value: Value) -> Map<String, Value> {
        value.as_object().cloned().unwrap_or_default()
    }

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        std::fs::create_dir_all(root.join("pkg/sub")).unwrap();
        std::fs::create_dir_all(root.join(".git")).unwrap();
        std::fs::write(root.join("main.py"), "").unwrap();
        std::fs::write(root.join("pkg/util.py"), "").unwrap();
        std::fs::write(root.join("pkg/sub/deep.py"), "").unwrap();
        std::fs::write(root.join("pkg/readme.md"), "").unwrap();
        std::fs::write(root.join(".git/hook.py"), "").unwrap();
        dir
    }

    #[tokio::test]
    async fn test_name_pattern_recurses() {
        let dir = fixture();
        let ctx = ToolContext::new("search-test", dir.path());
        let result = SearchFilesTool::new()
            .execute(args(json!({"pattern": "*.py"})), &ctx)
            .await
            .unwrap();
        let text = result.render();
        assert!(text.starts_with("Found 3 files matching pattern '*.py'"));
        assert!(text.ends_with("main.py\npkg/sub/deep.py\npkg/util.py"));
        assert!(!text.contains("hook.py"));
    }

    #[tokio::test]
    async fn test_path_pattern() {
        let dir = fixture();
        let ctx = ToolContext::new("search-test", dir.path());
        let result = SearchFilesTool::new()
            .execute(args(json!({"pattern": "pkg/*/*.py"})), &ctx)
            .await
            .unwrap();
        assert!(result.render().ends_with("pkg/sub/deep.py"));
    }

    #[tokio::test]
    async fn test_no_matches() {
        let dir = fixture();
        let ctx = ToolContext::new("search-test", dir.path());
        let result = SearchFilesTool::new()
            .execute(args(json!({"pattern": "*.rs"})), &ctx)
            .await
            .unwrap();
        assert!(result.success);
        assert!(result.render().starts_with("No files found matching pattern '*.rs'"));
    }

    #[tokio::test]
    async fn test_truncation() {
        let dir = fixture();
        let ctx = ToolContext::new("search-test", dir.path());
        let result = SearchFilesTool::new()
            .with_max_results(2)
            .execute(args(json!({"pattern": "*.py"})), &ctx)
            .await
            .unwrap();
        assert!(result.render().contains("(truncated to first 2)"));
    }

    #[tokio::test]
    async fn test_invalid_pattern() {
        let ctx = ToolContext::new("search-test", "/tmp");
        let err = SearchFilesTool::new()
            .execute(args(json!({"pattern": "[unclosed"})), &ctx)
            .await
            .unwrap_err();
        assert!(matches!(err, ToolError::InvalidInput(_)));
    }
}
