//! Step lifecycle rules.
//!
//! ```text
//! pending ──► in_progress ──► completed | failed | cancelled
//!    └──────────────────────► cancelled
//! ```

use thiserror::Error;

use crate::plan::StepStatus;

/// Refused step transition. Raising one is a scheduler bug, never a tool
/// failure, so execution aborts.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransitionError {
    #[error("Invalid transition from {from} to {to}")]
    InvalidTransition { from: StepStatus, to: StepStatus },
    #[error("Cannot transition from terminal state {state}")]
    FromTerminalState { state: StepStatus },
}

pub struct StepTransition;

impl StepTransition {
    pub fn validate(from: StepStatus, to: StepStatus) -> Result<(), TransitionError> {
        if Self::is_terminal(from) {
            return Err(TransitionError::FromTerminalState { state: from });
        }

        let is_valid = matches!(
            (from, to),
            (StepStatus::Pending, StepStatus::InProgress)
                | (StepStatus::Pending, StepStatus::Cancelled)
                | (StepStatus::InProgress, StepStatus::Completed)
                | (StepStatus::InProgress, StepStatus::Failed)
                | (StepStatus::InProgress, StepStatus::Cancelled)
        );

        if is_valid {
            Ok(())
        } else {
            Err(TransitionError::InvalidTransition { from, to })
        }
    }

    pub fn is_terminal(status: StepStatus) -> bool {
        matches!(
            status,
            StepStatus::Completed | StepStatus::Failed | StepStatus::Cancelled
        )
    }
}
