use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::plan::StepStatus;

/// How a plan ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanOutcome {
    /// Every step completed.
    Succeeded,
    /// At least one step failed or was cascade-cancelled.
    PartiallyFailed,
    /// Plan-level cancellation fired.
    Cancelled,
}

impl PlanOutcome {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Succeeded => "succeeded",
            Self::PartiallyFailed => "partially_failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for PlanOutcome {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of executing a plan
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionResult {
    pub plan_id: String,

    pub outcome: PlanOutcome,

    /// Per-step outcomes in plan order
    pub steps: Vec<StepReport>,

    /// Execution layers (for debugging)
    pub layers: Vec<Vec<String>>,

    /// Total execution duration in milliseconds
    pub duration_ms: u64,
}

impl ExecutionResult {
    pub fn step(&self, id: &str) -> Option<&StepReport> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn completed(&self) -> usize {
        self.count(StepStatus::Completed)
    }

    pub fn failed(&self) -> usize {
        self.count(StepStatus::Failed)
    }

    pub fn cancelled(&self) -> usize {
        self.count(StepStatus::Cancelled)
    }

    fn count(&self, status: StepStatus) -> usize {
        self.steps.iter().filter(|s| s.status == status).count()
    }
}

/// Result of a single step
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepReport {
    pub id: String,
    pub tool: String,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
    /// Time spent in progress; 0 for steps that never started
    pub duration_ms: u64,
}
