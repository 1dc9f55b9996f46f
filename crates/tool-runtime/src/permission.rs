use orchestra_core::ProjectConfig;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::fmt;
use tracing::warn;

use crate::registry::ToolRegistry;

/// Caller-supplied approval predicate, consulted once per tool call.
///
/// Must be a pure decision: the loop does not order anything around its
/// side effects.
pub trait ApprovalCallback: Send + Sync {
    fn approve(&self, tool_name: &str, arguments: &Map<String, Value>) -> bool;
}

impl<F> ApprovalCallback for F
where
    F: Fn(&str, &Map<String, Value>) -> bool + Send + Sync,
{
    fn approve(&self, tool_name: &str, arguments: &Map<String, Value>) -> bool {
        self(tool_name, arguments)
    }
}

/// Outcome of the permission check for one call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PermissionDecision {
    Allowed,
    /// The approval callback refused the call.
    Denied,
    /// Dangerous tool, skip mode off, and no explicit approval.
    DangerousRequiresPermission,
}

impl PermissionDecision {
    pub fn is_allowed(self) -> bool {
        self == PermissionDecision::Allowed
    }
}

/// Combines static danger tags, the skip-permissions flag and an optional
/// approval callback into a decision.
pub struct PermissionPolicy;

impl PermissionPolicy {
    /// The callback is consulted first; a refusal denies the call outright.
    /// A dangerous tool then runs only when skip mode is on or the callback
    /// explicitly approved it.
    pub fn decide(
        registry: &ToolRegistry,
        tool_name: &str,
        arguments: &Map<String, Value>,
        dangerous_skip_permissions: bool,
        approval: Option<&dyn ApprovalCallback>,
    ) -> PermissionDecision {
        let approved = match approval {
            Some(callback) => {
                if !callback.approve(tool_name, arguments) {
                    return PermissionDecision::Denied;
                }
                true
            }
            None => false,
        };

        if registry.is_dangerous(tool_name) && !dangerous_skip_permissions && !approved {
            return PermissionDecision::DangerousRequiresPermission;
        }
        PermissionDecision::Allowed
    }
}

/// Permission level for a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum PermissionLevel {
    /// Tool executes without asking the user
    AutoApprove,
    /// User must confirm before execution
    RequireConfirmation,
    /// Tool is blocked from executing
    Deny,
}

impl PermissionLevel {
    /// Parse the config spellings `auto`, `confirm` and `deny`.
    pub fn parse(value: &str) -> Option<Self> {
        match value.trim().to_lowercase().as_str() {
            "auto" | "allow" | "autoapprove" => Some(Self::AutoApprove),
            "confirm" | "ask" | "requireconfirmation" => Some(Self::RequireConfirmation),
            "deny" | "block" => Some(Self::Deny),
            _ => None,
        }
    }
}

type ConfirmFn = Box<dyn Fn(&str, &Map<String, Value>) -> bool + Send + Sync>;

/// Rule-driven approval callback: exact name, then `prefix*` patterns, then
/// the default level.
///
/// `RequireConfirmation` defers to the confirmation hook when one is set and
/// counts as "not approved" otherwise.
pub struct RuleApproval {
    /// Explicit per-tool permissions
    pub rules: HashMap<String, PermissionLevel>,
    /// Default permission for tools not in the rules map
    pub default: PermissionLevel,
    confirm: Option<ConfirmFn>,
}

impl RuleApproval {
    pub fn new(default: PermissionLevel) -> Self {
        Self {
            rules: HashMap::new(),
            default,
            confirm: None,
        }
    }

    /// Rules from a project file: `allowed_tools` auto-approve, then
    /// `tool_permissions` entries override them. Unknown levels are skipped.
    pub fn from_project_config(config: &ProjectConfig, default: PermissionLevel) -> Self {
        let mut approval = Self::new(default);
        for name in &config.allowed_tools {
            approval.rules.insert(name.clone(), PermissionLevel::AutoApprove);
        }
        for (pattern, level) in &config.tool_permissions {
            match PermissionLevel::parse(level) {
                Some(level) => {
                    approval.rules.insert(pattern.clone(), level);
                }
                None => warn!(pattern = %pattern, level = %level, "Unknown tool permission level"),
            }
        }
        approval
    }

    pub fn with_rule(mut self, pattern: impl Into<String>, level: PermissionLevel) -> Self {
        self.rules.insert(pattern.into(), level);
        self
    }

    /// Hook asked for tools at `RequireConfirmation` (e.g. an interactive prompt).
    pub fn with_confirmation<F>(mut self, confirm: F) -> Self
    where
        F: Fn(&str, &Map<String, Value>) -> bool + Send + Sync + 'static,
    {
        self.confirm = Some(Box::new(confirm));
        self
    }

    /// Get the permission level for a given tool name.
    pub fn level_for(&self, tool_name: &str) -> PermissionLevel {
        if let Some(&level) = self.rules.get(tool_name) {
            return level;
        }
        // Longest matching prefix wins so overlapping patterns are deterministic.
        self.rules
            .iter()
            .filter_map(|(pattern, &level)| {
                let prefix = pattern.strip_suffix('*')?;
                tool_name.starts_with(prefix).then_some((prefix.len(), level))
            })
            .max_by_key(|(len, _)| *len)
            .map(|(_, level)| level)
            .unwrap_or(self.default)
    }
}

impl Default for RuleApproval {
    fn default() -> Self {
        Self::new(PermissionLevel::RequireConfirmation)
    }
}

impl fmt::Debug for RuleApproval {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleApproval")
            .field("rules", &self.rules)
            .field("default", &self.default)
            .field("confirm", &self.confirm.is_some())
            .finish()
    }
}

impl ApprovalCallback for RuleApproval {
    fn approve(&self, tool_name: &str, arguments: &Map<String, Value>) -> bool {
        match self.level_for(tool_name) {
            PermissionLevel::AutoApprove => true,
            PermissionLevel::Deny => false,
            PermissionLevel::RequireConfirmation => self
                .confirm
                .as_ref()
                .is_some_and(|confirm| confirm(tool_name, arguments)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::tool::EchoTool;
    use crate::tools::BashTool;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        registry.register(EchoTool, true, false).unwrap();
        registry.register(BashTool::new(), false, true).unwrap();
        registry
    }

    fn no_args() -> Map<String, Value> {
        Map::new()
    }

    #[test]
    fn test_ordinary_tool_allowed_without_callback() {
        let decision = PermissionPolicy::decide(&registry(), "echo", &no_args(), false, None);
        assert_eq!(decision, PermissionDecision::Allowed);
    }

    #[test]
    fn test_dangerous_tool_gated_without_skip() {
        let registry = registry();
        assert_eq!(
            PermissionPolicy::decide(&registry, "bash", &no_args(), false, None),
            PermissionDecision::DangerousRequiresPermission
        );
        assert_eq!(
            PermissionPolicy::decide(&registry, "bash", &no_args(), true, None),
            PermissionDecision::Allowed
        );
    }

    #[test]
    fn test_callback_refusal_denies_even_in_skip_mode() {
        let refuse = |_: &str, _: &Map<String, Value>| false;
        assert_eq!(
            PermissionPolicy::decide(&registry(), "echo", &no_args(), true, Some(&refuse)),
            PermissionDecision::Denied
        );
    }

    #[test]
    fn test_callback_approval_opens_dangerous_gate() {
        let allow_bash = |name: &str, _: &Map<String, Value>| name == "bash";
        let decision =
            PermissionPolicy::decide(&registry(), "bash", &no_args(), false, Some(&allow_bash));
        assert_eq!(decision, PermissionDecision::Allowed);
    }

    #[test]
    fn test_callback_sees_arguments() {
        let only_safe = |_: &str, args: &Map<String, Value>| {
            args.get("command").and_then(|v| v.as_str()) == Some("ls")
        };
        let mut args = Map::new();
        args.insert("command".into(), Value::from("rm -rf /"));
        assert_eq!(
            PermissionPolicy::decide(&registry(), "bash", &args, true, Some(&only_safe)),
            PermissionDecision::Denied
        );
    }

    #[test]
    fn test_default_rule_level() {
        let rules = RuleApproval::default();
        assert_eq!(rules.level_for("anything"), PermissionLevel::RequireConfirmation);
        assert!(!rules.approve("anything", &no_args()));
    }

    #[test]
    fn test_explicit_rule() {
        let rules = RuleApproval::default().with_rule("echo", PermissionLevel::AutoApprove);
        assert_eq!(rules.level_for("echo"), PermissionLevel::AutoApprove);
        assert_eq!(rules.level_for("other"), PermissionLevel::RequireConfirmation);
    }

    #[test]
    fn test_glob_pattern() {
        let rules = RuleApproval::new(PermissionLevel::Deny)
            .with_rule("file_*", PermissionLevel::AutoApprove)
            .with_rule("file_w*", PermissionLevel::RequireConfirmation);
        assert_eq!(rules.level_for("file_read"), PermissionLevel::AutoApprove);
        assert_eq!(rules.level_for("file_write"), PermissionLevel::RequireConfirmation);
        assert_eq!(rules.level_for("bash"), PermissionLevel::Deny);
    }

    #[test]
    fn test_confirmation_hook() {
        let rules = RuleApproval::default()
            .with_rule("bash", PermissionLevel::Deny)
            .with_confirmation(|name, _| name == "file_write");
        assert!(rules.approve("file_write", &no_args()));
        assert!(!rules.approve("memory_write", &no_args()));
        assert!(!rules.approve("bash", &no_args()));
    }

    #[test]
    fn test_from_project_config() {
        let mut config = ProjectConfig::default();
        config.set_tool_permission("bash", true);
        config.tool_permissions.insert("memory_*".to_string(), "deny".to_string());
        config.tool_permissions.insert("bash".to_string(), "confirm".to_string());
        config.tool_permissions.insert("think".to_string(), "sometimes".to_string());

        let rules = RuleApproval::from_project_config(&config, PermissionLevel::AutoApprove);
        assert_eq!(rules.level_for("bash"), PermissionLevel::RequireConfirmation);
        assert_eq!(rules.level_for("memory_write"), PermissionLevel::Deny);
        assert_eq!(rules.level_for("think"), PermissionLevel::AutoApprove);
    }

    #[test]
    fn test_parse_level() {
        assert_eq!(PermissionLevel::parse("auto"), Some(PermissionLevel::AutoApprove));
        assert_eq!(PermissionLevel::parse(" Confirm "), Some(PermissionLevel::RequireConfirmation));
        assert_eq!(PermissionLevel::parse("deny"), Some(PermissionLevel::Deny));
        assert_eq!(PermissionLevel::parse("maybe"), None);
    }
}
