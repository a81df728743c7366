use thiserror::Error;

use super::parse::PlanParseError;
use super::step::ErrorKind;
use crate::state::TransitionError;

/// Errors raised while turning step descriptors into a dependency graph.
///
/// All of them reject the plan before any step runs.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    #[error("Duplicate step ID: {0}")]
    DuplicateStepId(String),

    #[error("Step ID cannot be empty (position {0})")]
    EmptyStepId(usize),

    #[error("Dependency not found: step '{step_id}' depends on '{missing_dep}'")]
    DependencyNotFound {
        step_id: String,
        missing_dep: String,
    },

    #[error("Circular dependency detected: {0}")]
    CircularDependency(String),
}

/// Top-level engine errors. Step-level failures never surface here; they are
/// contained in the step's `failed` status.
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("plan parse failed: {0}")]
    Parse(#[from] PlanParseError),

    #[error("plan graph invalid: {0}")]
    Graph(#[from] GraphError),

    #[error("step state machine violated: {0}")]
    Transition(#[from] TransitionError),
}

impl EngineError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Parse(_) => ErrorKind::ParseError,
            Self::Graph(GraphError::CircularDependency(_)) => ErrorKind::CircularDependency,
            Self::Graph(GraphError::DependencyNotFound { .. }) => ErrorKind::DependencyError,
            Self::Graph(_) => ErrorKind::ValidationError,
            Self::Transition(_) => ErrorKind::Internal,
        }
    }
}
