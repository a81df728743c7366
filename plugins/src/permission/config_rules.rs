use async_trait::async_trait;
use planflow_core::api::{PermissionAction, PermissionGate, PermissionRule, PermissionsConfig};
use tracing::debug;

/// Outcome of evaluating the rule lists for one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PermissionVerdict {
    Allow,
    Confirm { reason: String },
    Deny { reason: String },
}

/// Permission gate driven by `[permissions]` rule lists.
pub struct ConfigPermissionGate {
    config: PermissionsConfig,
}

impl ConfigPermissionGate {
    pub fn new(config: PermissionsConfig) -> Self {
        Self { config }
    }

    pub fn decide(&self, tool: &str) -> PermissionVerdict {
        let verdict = self.evaluate(tool);
        debug!(tool, verdict = ?verdict, "permission evaluated");
        verdict
    }

    fn evaluate(&self, tool: &str) -> PermissionVerdict {
        // 1. Check denylist
        if let Some(rule) = find_rule(&self.config.denylist, tool) {
            return PermissionVerdict::Deny {
                reason: rule
                    .reason
                    .clone()
                    .unwrap_or_else(|| "Denied by rule".into()),
            };
        }

        // 2. Enabled tools may still need a human
        let confirm = find_rule(&self.config.confirm, tool).map(|rule| PermissionVerdict::Confirm {
            reason: rule
                .reason
                .clone()
                .unwrap_or_else(|| format!("Allow tool {tool}?")),
        });

        // 3. Check allowlist
        if find_rule(&self.config.allowlist, tool).is_some() {
            return confirm.unwrap_or(PermissionVerdict::Allow);
        }

        // 4. Default action
        match self.config.default_action {
            PermissionAction::Allow => confirm.unwrap_or(PermissionVerdict::Allow),
            PermissionAction::Ask => confirm.unwrap_or_else(|| PermissionVerdict::Confirm {
                reason: format!("Allow tool {tool}?"),
            }),
            PermissionAction::Deny => PermissionVerdict::Deny {
                reason: "Default deny".into(),
            },
        }
    }
}

#[async_trait]
impl PermissionGate for ConfigPermissionGate {
    async fn is_enabled(&self, tool: &str) -> bool {
        !matches!(self.decide(tool), PermissionVerdict::Deny { .. })
    }

    async fn requires_confirmation(&self, tool: &str) -> bool {
        matches!(self.decide(tool), PermissionVerdict::Confirm { .. })
    }
}

fn find_rule<'a>(rules: &'a [PermissionRule], tool: &str) -> Option<&'a PermissionRule> {
    rules.iter().find(|rule| rule_matches(rule, tool))
}

fn rule_matches(rule: &PermissionRule, tool: &str) -> bool {
    if rule.tool == "*" || rule.tool == tool {
        return true;
    }

    // Handle "git.*" style
    if let Some(prefix) = rule.tool.strip_suffix(".*") {
        return tool
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with('.'));
    }

    false
}
