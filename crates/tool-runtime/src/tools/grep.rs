//! Regex content search over a directory tree.

use async_trait::async_trait;
use glob::Pattern;
use regex::RegexBuilder;
use serde_json::{Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use tracing::debug;
use walkdir::WalkDir;

use super::resolve_path;
use crate::tool::{required_str, Tool, ToolContext, ToolDefinition, ToolError, ToolResult};

const DEFAULT_MAX_MATCHES: usize = 100;
const MAX_LINE_CHARS: usize = 500;
const SKIPPED_DIRS: &[&str] = &[".git", "target", "node_modules"];

/// Search file contents with a regular expression, optionally restricted to
/// file names matching an `include` glob.
pub struct GrepTool {
    max_matches: usize,
}

struct Hits {
    lines: Vec<String>,
    files: BTreeSet<String>,
    truncated: bool,
}

impl GrepTool {
    pub fn new() -> Self {
        Self {
            max_matches: DEFAULT_MAX_MATCHES,
        }
    }

    pub fn with_max_matches(mut self, max_matches: usize) -> Self {
        self.max_matches = max_matches.max(1);
        self
    }

    fn search(root: &Path, regex: &regex::Regex, include: Option<&Pattern>, max: usize) -> Hits {
        let mut hits = Hits {
            lines: Vec::new(),
            files: BTreeSet::new(),
            truncated: false,
        };

        let mut files: Vec<PathBuf> = if root.is_file() {
            vec![root.to_path_buf()]
        } else {
            WalkDir::new(root)
                .follow_links(false)
                .into_iter()
                .filter_entry(|e| {
                    let name = e.file_name().to_string_lossy();
                    e.depth() == 0 || !(e.file_type().is_dir() && SKIPPED_DIRS.contains(&&*name))
                })
                .flatten()
                .filter(|e| e.file_type().is_file())
                .filter(|e| include.map_or(true, |p| p.matches(&e.file_name().to_string_lossy())))
                .map(|e| e.into_path())
                .collect()
        };
        files.sort();

        let display_base = if root.is_file() { root.parent().unwrap_or(root) } else { root };
        for file in files {
            let Ok(bytes) = std::fs::read(&file) else {
                debug!(file = %file.display(), "skipping unreadable file");
                continue;
            };
            if bytes.contains(&0) {
                continue;
            }
            let text = String::from_utf8_lossy(&bytes);
            let shown = file.strip_prefix(display_base).unwrap_or(&file).to_string_lossy().to_string();

            for (index, line) in text.lines().enumerate() {
                if !regex.is_match(line) {
                    continue;
                }
                if hits.lines.len() >= max {
                    hits.truncated = true;
                    return hits;
                }
                let line: String = line.chars().take(MAX_LINE_CHARS).collect();
                hits.lines.push(format!("{shown}:{}:{}", index + 1, line.trim_end()));
                hits.files.insert(shown.clone());
            }
        }
        hits
    }
}

impl Default for GrepTool {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Tool for GrepTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "grep".to_string(),
            description: "Search file contents with a regular expression. Returns file:line:text matches."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "pattern": {
                        "type": "string",
                        "description": "Regular expression to search for"
                    },
                    "path": {
                        "type": "string",
                        "description": "File or directory to search (default: working directory)"
                    },
                    "include": {
                        "type": "string",
                        "description": "Only search files whose name matches this glob (e.g. \"*.rs\")"
                    },
                    "case_insensitive": {
                        "type": "boolean",
                        "description": "Ignore case (default: false)"
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
        let pattern = required_str(&arguments, "pattern")?;
        let case_insensitive = arguments
            .get("case_insensitive")
            .and_then(|v| v.as_bool())
            .unwrap_or(false);
        let regex = RegexBuilder::new(pattern)
            .case_insensitive(case_insensitive)
            .build()
            .map_err(|e| ToolError::InvalidInput(format!("invalid regex pattern: {e}")))?;

        let include = match arguments.get("include").and_then(|v| v.as_str()) {
            Some(glob) => Some(
                Pattern::new(glob)
                    .map_err(|e| ToolError::InvalidInput(format!("invalid include pattern: {e}")))?,
            ),
            None => None,
        };

        let root = match arguments.get("path").and_then(|v| v.as_str()) {
            Some(p) => resolve_path(&context.working_directory, p)?,
            None => context.working_directory.clone(),
        };
        if !root.exists() {
            return Ok(ToolResult::failure(format!("Path not found: {}", root.display())));
        }

        debug!(pattern, root = %root.display(), include = ?include.as_ref().map(Pattern::as_str), "grep");

        let walk_root = root.clone();
        let walk_include = include.clone();
        let max = self.max_matches;
        let hits = tokio::task::spawn_blocking(move || {
            GrepTool::search(&walk_root, &regex, walk_include.as_ref(), max)
        })
        .await
        .map_err(|e| ToolError::ExecutionFailed(format!("grep task failed: {e}")))?;

        let filter = include
            .as_ref()
            .map(|p| format!(" (filtered to {})", p.as_str()))
            .unwrap_or_default();

        if hits.lines.is_empty() {
            return Ok(ToolResult::ok(format!(
                "No matches found for pattern '{pattern}' in {}{filter}",
                root.display()
            )));
        }

        let mut content = format!(
            "Found {} matches for pattern '{pattern}' in {} files{filter}",
            hits.lines.len(),
            hits.files.len()
        );
        if hits.truncated {
            content.push_str(&format!(" (truncated to first {max})"));
        }
        content.push_str(&format!(" in {}:\n\n", root.display()));
        content.push_str(&hits.lines.join("\n"));
        Ok(ToolResult::ok(content))
    }
}
