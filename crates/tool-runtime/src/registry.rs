use crate::tool::{Tool, ToolDefinition};
use indexmap::IndexMap;
use std::sync::Arc;
use tracing::debug;

/// One registered tool plus its static classification.
#[derive(Clone)]
pub struct ToolRecord {
    pub tool: Arc<dyn Tool>,
    pub read_only: bool,
    pub dangerous: bool,
}

impl ToolRecord {
    pub fn is_enabled(&self) -> bool {
        self.tool.is_enabled()
    }
}

/// Manages available tools, their classification, and lookup.
///
/// Populated once at startup, then shared read-only (`Arc<ToolRegistry>`)
/// by every conversation loop. Iteration follows registration order.
pub struct ToolRegistry {
    tools: IndexMap<String, ToolRecord>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self {
            tools: IndexMap::new(),
        }
    }

    /// Register a tool under its definition name.
    ///
    /// Re-registering a name replaces the previous instance and flags while
    /// keeping its position.
    pub fn register(
        &mut self,
        tool: impl Tool + 'static,
        read_only: bool,
        dangerous: bool,
    ) -> Result<(), RegistryError> {
        self.register_arc(Arc::new(tool), read_only, dangerous)
    }

    /// Register an already shared tool instance.
    pub fn register_arc(
        &mut self,
        tool: Arc<dyn Tool>,
        read_only: bool,
        dangerous: bool,
    ) -> Result<(), RegistryError> {
        let name = tool.definition().name;
        if name.trim().is_empty() {
            return Err(RegistryError::EmptyName);
        }
        let replaced = self
            .tools
            .insert(
                name.clone(),
                ToolRecord {
                    tool,
                    read_only,
                    dangerous,
                },
            )
            .is_some();
        debug!(tool = %name, read_only, dangerous, replaced, "Tool registered");
        Ok(())
    }

    /// Look up a tool by name.
    pub fn get(&self, name: &str) -> Option<Arc<dyn Tool>> {
        self.tools.get(name).map(|r| Arc::clone(&r.tool))
    }

    pub fn record(&self, name: &str) -> Option<&ToolRecord> {
        self.tools.get(name)
    }

    /// Enabled tools, minus dangerous ones unless `dangerous_skip_permissions`.
    pub fn available_tools(&self, dangerous_skip_permissions: bool) -> Vec<Arc<dyn Tool>> {
        self.tools
            .values()
            .filter(|r| r.is_enabled())
            .filter(|r| dangerous_skip_permissions || !r.dangerous)
            .map(|r| Arc::clone(&r.tool))
            .collect()
    }

    /// Enabled tools that are tagged read-only or report themselves as such.
    pub fn read_only_tools(&self) -> Vec<Arc<dyn Tool>> {
        self.tools
            .values()
            .filter(|r| r.is_enabled())
            .filter(|r| r.read_only || r.tool.is_read_only())
            .map(|r| Arc::clone(&r.tool))
            .collect()
    }

    /// Unknown names are not dangerous.
    pub fn is_dangerous(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|r| r.dangerous)
    }

    /// Unknown names are not read-only.
    pub fn is_read_only(&self, name: &str) -> bool {
        self.tools.get(name).is_some_and(|r| r.read_only)
    }

    /// Definitions of every registered tool, enabled or not.
    pub fn list(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|r| r.tool.definition()).collect()
    }

    pub fn names(&self) -> Vec<String> {
        self.tools.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
    #[error("Tool name must not be empty")]
    EmptyName,
}
