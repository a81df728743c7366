use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// Call arguments handed to a tool verbatim.
pub type ToolInput = Map<String, Value>;

/// Step lifecycle status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    Pending,
    InProgress,
    Completed,
    Failed,
    Cancelled,
}

impl StepStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for StepStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One step as it comes out of the parser, before ids and dependencies are
/// normalized.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepDescriptor {
    #[serde(default)]
    pub id: Option<String>,

    pub tool: String,

    #[serde(default, deserialize_with = "input_or_empty")]
    pub input: ToolInput,

    #[serde(default)]
    pub reason: String,

    #[serde(default, alias = "depends_on")]
    pub dependencies: Vec<String>,
}

impl StepDescriptor {
    pub fn new(id: impl Into<String>, tool: impl Into<String>) -> Self {
        Self {
            id: Some(id.into()),
            tool: tool.into(),
            input: ToolInput::new(),
            reason: String::new(),
            dependencies: Vec::new(),
        }
    }

    pub fn depends_on<I, S>(mut self, deps: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.dependencies = deps.into_iter().map(Into::into).collect();
        self
    }

    pub fn with_input(mut self, input: Value) -> Self {
        if let Value::Object(map) = input {
            self.input = map;
        }
        self
    }

    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }
}

fn input_or_empty<'de, D>(deserializer: D) -> Result<ToolInput, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(Option::<ToolInput>::deserialize(deserializer)?.unwrap_or_default())
}

/// One tool invocation inside a built plan.
///
/// `status`, `error` and `output` are written only by the scheduler.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Step {
    pub id: String,
    pub tool: String,
    pub input: ToolInput,
    pub reason: String,
    pub dependencies: Vec<String>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub output: Option<Value>,
}

impl Step {
    pub fn is_terminal(&self) -> bool {
        crate::state::StepTransition::is_terminal(self.status)
    }
}

/// The unit of work produced by one planning turn. Step order is the order
/// the model emitted them in.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Plan {
    pub id: String,
    pub steps: Vec<Step>,
}

impl Plan {
    pub fn step(&self, id: &str) -> Option<&Step> {
        self.steps.iter().find(|s| s.id == id)
    }

    pub fn step_mut(&mut self, id: &str) -> Option<&mut Step> {
        self.steps.iter_mut().find(|s| s.id == id)
    }
}

/// Accepted top-level shapes of plan text.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub(crate) enum PlanDocument {
    Wrapped { steps: Vec<StepDescriptor> },
    Bare(Vec<StepDescriptor>),
}

impl PlanDocument {
    pub(crate) fn into_steps(self) -> Vec<StepDescriptor> {
        match self {
            Self::Wrapped { steps } | Self::Bare(steps) => steps,
        }
    }
}
