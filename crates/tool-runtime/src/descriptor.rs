use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::Arc;
use tracing::warn;

use crate::tool::{Tool, ToolDefinition};

/// Function-style tool description handed to the model backend.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    #[serde(rename = "type")]
    pub kind: String,
    pub function: FunctionDescriptor,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FunctionDescriptor {
    pub name: String,
    pub description: String,
    pub parameters: Value,
}

impl ToolDescriptor {
    /// Build the descriptor for one tool.
    ///
    /// Description: the tool's detailed prompt, else its definition
    /// description, else `Tool: <name>`. A tier that panics falls through to
    /// the next one. Returns `None` only when `definition()` itself panics.
    pub fn for_tool(tool: &dyn Tool) -> Option<Self> {
        let definition = guarded_definition(tool)?;

        let prompt = match catch_unwind(AssertUnwindSafe(|| tool.prompt())) {
            Ok(prompt) => prompt,
            Err(_) => {
                warn!(tool = %definition.name, "Tool prompt panicked, using definition description");
                None
            }
        };
        let description = prompt
            .filter(|p| !p.trim().is_empty())
            .or_else(|| Some(definition.description.clone()).filter(|d| !d.trim().is_empty()))
            .unwrap_or_else(|| format!("Tool: {}", definition.name));

        let parameters = if definition.input_schema.is_object() {
            definition.input_schema
        } else {
            empty_parameters()
        };

        Some(Self {
            kind: "function".to_string(),
            function: FunctionDescriptor {
                name: definition.name,
                description,
                parameters,
            },
        })
    }

    pub fn name(&self) -> &str {
        &self.function.name
    }
}

fn empty_parameters() -> Value {
    json!({"type": "object", "properties": {}, "required": []})
}

/// `tool.definition()`, or `None` (logged) when it panics.
pub(crate) fn guarded_definition(tool: &dyn Tool) -> Option<ToolDefinition> {
    match catch_unwind(AssertUnwindSafe(|| tool.definition())) {
        Ok(definition) => Some(definition),
        Err(_) => {
            warn!("Tool definition panicked, leaving the tool out of the prompt");
            None
        }
    }
}

/// Descriptors for a tool set, in order. Tools that cannot describe
/// themselves are skipped.
pub fn describe_tools(tools: &[Arc<dyn Tool>]) -> Vec<ToolDescriptor> {
    tools.iter().filter_map(|t| ToolDescriptor::for_tool(t.as_ref())).collect()
}
