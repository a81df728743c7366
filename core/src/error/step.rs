use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Stable error codes shared by engine and step errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    ParseError,
    ValidationError,
    DependencyError,
    CircularDependency,
    ToolNotFound,
    PermissionDenied,
    ToolExecution,
    Timeout,
    Cancelled,
    Internal,
}

impl ErrorKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::ParseError => "parse_error",
            Self::ValidationError => "validation_error",
            Self::DependencyError => "dependency_error",
            Self::CircularDependency => "circular_dependency",
            Self::ToolNotFound => "tool_not_found",
            Self::PermissionDenied => "permission_denied",
            Self::ToolExecution => "tool_execution",
            Self::Timeout => "timeout",
            Self::Cancelled => "cancelled",
            Self::Internal => "internal",
        }
    }
}

/// Why a single step ended `failed`. None of these are retried.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("tool not found: {0}")]
    ToolNotFound(String),

    #[error("tool disabled: {0}")]
    ToolDisabled(String),

    #[error("confirmation denied for tool {tool}: {reason}")]
    ConfirmationDenied { tool: String, reason: String },

    #[error("confirmation timed out for tool {tool} after {}ms", .after.as_millis())]
    ConfirmationTimeout { tool: String, after: Duration },

    #[error("tool {tool} failed: {message}")]
    ToolExecution { tool: String, message: String },

    #[error("tool {tool} timed out after {}ms", .after.as_millis())]
    Timeout { tool: String, after: Duration },

    #[error("cancelled: {0}")]
    Cancelled(String),

    #[error("abandoned after plan cancellation (no result within {}ms)", .grace.as_millis())]
    Abandoned { grace: Duration },
}

impl StepError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::ToolNotFound(_) => ErrorKind::ToolNotFound,
            Self::ToolDisabled(_)
            | Self::ConfirmationDenied { .. }
            | Self::ConfirmationTimeout { .. } => ErrorKind::PermissionDenied,
            Self::ToolExecution { .. } => ErrorKind::ToolExecution,
            Self::Timeout { .. } => ErrorKind::Timeout,
            Self::Cancelled(_) | Self::Abandoned { .. } => ErrorKind::Cancelled,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_failures_share_a_kind() {
        assert_eq!(
            StepError::ToolDisabled("shell".into()).kind(),
            ErrorKind::PermissionDenied
        );
        assert_eq!(
            StepError::ConfirmationDenied {
                tool: "shell".into(),
                reason: "no".into()
            }
            .kind(),
            ErrorKind::PermissionDenied
        );
    }

    #[test]
    fn timeout_message_reports_millis() {
        let err = StepError::Timeout {
            tool: "web.fetch".into(),
            after: Duration::from_millis(1500),
        };
        assert_eq!(err.to_string(), "tool web.fetch timed out after 1500ms");
        assert_eq!(err.kind().as_str(), "timeout");
    }
}
