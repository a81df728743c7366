use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

use super::transitions::{StepTransition, TransitionError};
use crate::plan::{Step, StepStatus};

/// What a transition carries besides the new status.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum TransitionPayload {
    #[default]
    None,
    Output(Value),
    Error(String),
}

/// A transition that was applied to a step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TransitionRecord {
    pub step_id: String,
    pub from: StepStatus,
    pub to: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

pub struct StepState;

impl StepState {
    /// Moves `step` to `to`. `error` is stamped only on `failed` and `output`
    /// only on `completed`; any other payload is discarded.
    pub fn transition(
        step: &mut Step,
        to: StepStatus,
        payload: TransitionPayload,
    ) -> Result<TransitionRecord, TransitionError> {
        let from = step.status;
        StepTransition::validate(from, to)?;

        step.status = to;
        match (to, payload) {
            (StepStatus::Failed, TransitionPayload::Error(message)) => {
                step.error = Some(message);
            }
            (StepStatus::Completed, TransitionPayload::Output(value)) => {
                step.output = Some(value);
            }
            _ => {}
        }

        debug!(step_id = %step.id, %from, %to, "step transition");

        Ok(TransitionRecord {
            step_id: step.id.clone(),
            from,
            to,
            error: step.error.clone(),
            output: step.output.clone(),
        })
    }
}
