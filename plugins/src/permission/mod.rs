pub mod config_rules;

pub use config_rules::{ConfigPermissionGate, PermissionVerdict};
