//! Built-in tool implementations.
//!
//! Tools are divided into three categories:
//! - **System tools** (`bash`, `read_file`, `write_file`, `str_replace_editor`,
//!   `list_dir`, `search_files`, `grep`): direct OS interaction relative to
//!   the context's working directory
//! - **Reasoning tools** (`think`, `finish`): per-instance bookkeeping
//! - **Memory tools** (`memory_read`, `memory_write`): files under a memory root

pub mod bash;
pub mod edit_file;
pub mod file_read;
pub mod file_write;
pub mod finish;
pub mod grep;
pub mod list_dir;
pub mod memory;
pub mod search_files;
pub mod think;

pub use bash::BashTool;
pub use edit_file::EditFileTool;
pub use file_read::FileReadTool;
pub use file_write::FileWriteTool;
pub use finish::{Completion, FinishTool};
pub use grep::GrepTool;
pub use list_dir::ListDirTool;
pub use memory::{MemoryReadTool, MemoryWriteTool};
pub use search_files::SearchFilesTool;
pub use think::ThinkTool;

use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use crate::registry::{RegistryError, ToolRegistry};
use crate::tool::ToolError;

/// True when `path` has a `..` component (`a..b` file names are fine).
pub(crate) fn has_parent_component(path: &Path) -> bool {
    path.components().any(|c| matches!(c, Component::ParentDir))
}

/// Resolve `requested` against `base`, rejecting `..` components.
pub(crate) fn resolve_path(base: &Path, requested: &str) -> Result<PathBuf, ToolError> {
    let path = Path::new(requested);
    if has_parent_component(path) {
        return Err(ToolError::PermissionDenied(
            "path traversal ('..') not allowed".to_string(),
        ));
    }
    Ok(if path.is_absolute() {
        path.to_path_buf()
    } else {
        base.join(path)
    })
}

/// Settings for [`register_builtin_tools`].
#[derive(Debug, Clone)]
pub struct BuiltinToolsConfig {
    pub memory_dir: PathBuf,
    pub bash_timeout: Duration,
}

impl BuiltinToolsConfig {
    pub fn new(memory_dir: impl Into<PathBuf>) -> Self {
        Self {
            memory_dir: memory_dir.into(),
            bash_timeout: Duration::from_secs(bash::DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Shared handles to the stateful built-ins, for callers that inspect them.
#[derive(Clone)]
pub struct BuiltinHandles {
    pub think: Arc<ThinkTool>,
    pub finish: Arc<FinishTool>,
}

/// Register every built-in tool with its read-only / dangerous classification.
pub fn register_builtin_tools(
    registry: &mut ToolRegistry,
    config: BuiltinToolsConfig,
) -> Result<BuiltinHandles, RegistryError> {
    let think = Arc::new(ThinkTool::new());
    let finish = Arc::new(FinishTool::new());

    registry.register(BashTool::new().with_default_timeout(config.bash_timeout), false, true)?;
    registry.register(FileReadTool, true, false)?;
    registry.register(FileWriteTool, false, true)?;
    registry.register(EditFileTool::new(), false, true)?;
    registry.register(ListDirTool, true, false)?;
    registry.register(SearchFilesTool::new(), true, false)?;
    registry.register(GrepTool::new(), true, false)?;
    registry.register_arc(think.clone(), true, false)?;
    registry.register_arc(finish.clone(), false, false)?;
    registry.register(MemoryReadTool::new(&config.memory_dir), true, false)?;
    registry.register(MemoryWriteTool::new(&config.memory_dir), false, true)?;

    Ok(BuiltinHandles { think, finish })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_resolve_path() {
        let base = Path::new("/srv/app");
        assert_eq!(resolve_path(base, "src/main.rs").unwrap(), PathBuf::from("/srv/app/src/main.rs"));
        assert_eq!(resolve_path(base, "/etc/hosts").unwrap(), PathBuf::from("/etc/hosts"));
        assert!(matches!(
            resolve_path(base, "../secret"),
            Err(ToolError::PermissionDenied(_))
        ));
        assert!(resolve_path(base, "src/../../etc").is_err());
        assert_eq!(
            resolve_path(base, "releases/v1..2.txt").unwrap(),
            PathBuf::from("/srv/app/releases/v1..2.txt")
        );
    }

    #[test]
    fn test_register_builtin_classification() {
        let mut registry = ToolRegistry::new();
        register_builtin_tools(&mut registry, BuiltinToolsConfig::new("/tmp/orchestra-memory")).unwrap();

        assert_eq!(registry.len(), 11);
        for name in ["bash", "write_file", "str_replace_editor", "memory_write"] {
            assert!(registry.is_dangerous(name), "{name} should be dangerous");
        }
        for name in ["read_file", "list_dir", "search_files", "grep", "think", "memory_read"] {
            assert!(registry.is_read_only(name), "{name} should be read-only");
            assert!(!registry.is_dangerous(name));
        }
        assert!(!registry.is_dangerous("finish"));
        assert_eq!(registry.available_tools(false).len(), 7);
        assert_eq!(registry.available_tools(true).len(), 11);
    }
}
