use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub logging: LoggingConfig,

    #[serde(default)]
    pub engine: EngineConfig,

    #[serde(default)]
    pub permissions: PermissionsConfig,

    #[serde(default)]
    pub events_out: EventsOutConfig,

    #[serde(default)]
    pub records: RecordsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    #[serde(default = "default_logging_enabled")]
    pub enabled: bool,

    /// If true, log to stderr.
    #[serde(default = "default_logging_console")]
    pub console: bool,

    /// If true, log to a file under `directory` (or OS temp dir if unset).
    #[serde(default = "default_logging_file")]
    pub file: bool,

    /// EnvFilter string, e.g. "info" or "planflow_core=debug".
    #[serde(default = "default_logging_level")]
    pub level: String,

    /// Optional directory for log files. If empty or unset, uses OS temp dir.
    #[serde(default)]
    pub directory: Option<String>,
}

fn default_logging_enabled() -> bool {
    true
}

fn default_logging_console() -> bool {
    true
}

fn default_logging_file() -> bool {
    false
}

fn default_logging_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            enabled: default_logging_enabled(),
            console: default_logging_console(),
            file: default_logging_file(),
            level: default_logging_level(),
            directory: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Steps allowed `in_progress` at once; values below 1 are raised to 1.
    #[serde(default = "default_max_concurrency")]
    pub max_concurrency: usize,

    #[serde(default = "default_tool_timeout_ms")]
    pub tool_timeout_ms: u64,

    /// 0 waits for a human indefinitely.
    #[serde(default)]
    pub confirmation_timeout_ms: u64,

    /// Wait for in-progress steps after plan cancellation before reporting
    /// them abandoned.
    #[serde(default = "default_cancel_grace_ms")]
    pub cancel_grace_ms: u64,
}

fn default_max_concurrency() -> usize {
    4
}

fn default_tool_timeout_ms() -> u64 {
    60_000
}

fn default_cancel_grace_ms() -> u64 {
    2_000
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_concurrency: default_max_concurrency(),
            tool_timeout_ms: default_tool_timeout_ms(),
            confirmation_timeout_ms: 0,
            cancel_grace_ms: default_cancel_grace_ms(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PermissionAction {
    Allow,
    Deny,
    Ask,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PermissionsConfig {
    /// Applied to tools no rule matches.
    #[serde(default = "default_permission_action")]
    pub default_action: PermissionAction,

    #[serde(default)]
    pub allowlist: Vec<PermissionRule>,

    /// Checked before the allowlist.
    #[serde(default)]
    pub denylist: Vec<PermissionRule>,

    /// Enabled tools that still need a human yes.
    #[serde(default)]
    pub confirm: Vec<PermissionRule>,
}

fn default_permission_action() -> PermissionAction {
    PermissionAction::Allow
}

impl Default for PermissionsConfig {
    fn default() -> Self {
        Self {
            default_action: default_permission_action(),
            allowlist: Vec::new(),
            denylist: Vec::new(),
            confirm: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionRule {
    /// Exact tool name, `*`, or a `prefix.*` wildcard.
    pub tool: String,
    #[serde(default)]
    pub reason: Option<String>,
}

pub(crate) const DEFAULT_EVENTS_OUT_PATH: &str = "./plan.events.jsonl";

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventsOutConfig {
    #[serde(default)]
    pub enabled: bool,
    /// `stdout:` or a file path.
    #[serde(default = "default_events_out_path")]
    pub path: String,
    #[serde(default = "default_events_out_capacity")]
    pub channel_capacity: usize,
    #[serde(default = "default_drop_when_full")]
    pub drop_when_full: bool,
}

fn default_events_out_path() -> String {
    DEFAULT_EVENTS_OUT_PATH.to_string()
}

fn default_events_out_capacity() -> usize {
    2048
}

fn default_drop_when_full() -> bool {
    true
}

impl Default for EventsOutConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            path: default_events_out_path(),
            channel_capacity: default_events_out_capacity(),
            drop_when_full: default_drop_when_full(),
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct RecordsConfig {
    /// Where `<plan_id>.json` records live. Unset means `~/.planflow/records`.
    #[serde(default)]
    pub directory: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_yields_defaults() {
        let cfg: AppConfig = toml::from_str("").unwrap();
        assert_eq!(cfg.engine, EngineConfig::default());
        assert_eq!(cfg.permissions.default_action, PermissionAction::Allow);
        assert!(!cfg.events_out.enabled);
        assert_eq!(cfg.logging.level, "info");
    }

    #[test]
    fn partial_sections_keep_other_defaults() {
        let cfg: AppConfig = toml::from_str(
            r#"
            [engine]
            max_concurrency = 8

            [permissions]
            default_action = "ask"
            denylist = [{ tool = "shell.*", reason = "no shells" }]
            "#,
        )
        .unwrap();
        assert_eq!(cfg.engine.max_concurrency, 8);
        assert_eq!(cfg.engine.tool_timeout_ms, 60_000);
        assert_eq!(cfg.permissions.default_action, PermissionAction::Ask);
        assert_eq!(cfg.permissions.denylist[0].tool, "shell.*");
        assert!(cfg.permissions.confirm.is_empty());
    }
}
