//! Builds the per-session approval callback from CLI and project settings.

use orchestra_core::ProjectConfig;
use orchestra_tool_runtime::{
    PermissionLevel, RuleApproval, Tool, ToolRegistry, ToolUseContext, TurnOptions,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::debug;

/// Rules, lowest precedence first: everything auto-approves, dangerous
/// tools need confirmation unless skip mode is on, then the user config,
/// then the project file.
pub fn build_rules(
    registry: &ToolRegistry,
    project: &ProjectConfig,
    user_permissions: &HashMap<String, String>,
    skip_permissions: bool,
) -> RuleApproval {
    let mut merged = project.clone();
    for (pattern, level) in user_permissions {
        merged
            .tool_permissions
            .entry(pattern.clone())
            .or_insert_with(|| level.clone());
    }

    let mut rules = RuleApproval::from_project_config(&merged, PermissionLevel::AutoApprove);
    if !skip_permissions {
        for name in registry.names() {
            if registry.is_dangerous(&name) && !has_rule(&rules, &name) {
                rules.rules.insert(name, PermissionLevel::RequireConfirmation);
            }
        }
    }
    debug!(rules = rules.rules.len(), skip_permissions, "Approval rules built");
    rules
}

/// Enabled tools the rules could let through. Denied tools are hidden, and
/// confirmation-gated ones are only offered when someone can confirm.
pub fn offered_tools(registry: &ToolRegistry, rules: &RuleApproval, interactive: bool) -> Vec<Arc<dyn Tool>> {
    registry
        .names()
        .into_iter()
        .filter(|name| match rules.level_for(name) {
            PermissionLevel::AutoApprove => true,
            PermissionLevel::RequireConfirmation => interactive,
            PermissionLevel::Deny => false,
        })
        .filter_map(|name| {
            registry
                .record(&name)
                .filter(|r| r.is_enabled())
                .map(|r| Arc::clone(&r.tool))
        })
        .collect()
}

/// Per-turn options for the session: the offered tool set plus the rules as
/// the approval callback. Dangerous calls still pass through the callback.
pub fn turn_options(
    registry: &ToolRegistry,
    rules: RuleApproval,
    skip_permissions: bool,
    interactive: bool,
    timeout: Duration,
) -> TurnOptions {
    let tools = offered_tools(registry, &rules, interactive);
    debug!(offered = tools.len(), interactive, "Tool set for session");
    TurnOptions::default()
        .with_tool_use_context(ToolUseContext::new(tools, skip_permissions, timeout))
        .with_approval(Arc::new(rules))
}

/// Whether an exact or `prefix*` rule covers `name`.
fn has_rule(rules: &RuleApproval, name: &str) -> bool {
    rules.rules.keys().any(|pattern| {
        pattern == name || pattern.strip_suffix('*').is_some_and(|prefix| name.starts_with(prefix))
    })
}
