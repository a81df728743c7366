//! Plan execution: DAG construction, layered scheduling, and tool invocation.
//!
//! # Architecture
//!
//! ```text
//! Vec<StepDescriptor>
//!   ↓
//! build_plan() → normalize_sequential(), PlanGraph::validate()
//!   ↓
//! PlanDag { plan, layers }
//!   ↓
//! PlanEngine::execute() → layer by layer, bounded by max_concurrency
//!   ↓                      ToolInvoker: resolve → permit → confirm → call
//! ExecutionResult { outcome, steps }
//! ```

mod engine;
mod graph;
mod invoke;
mod scheduler;
pub mod types;

pub use engine::{PlanEngine, PlanEngineBuilder};
pub use graph::{build_plan, normalize_sequential, PlanDag, PlanGraph, StepLike};
pub use invoke::{InvocationRequest, ToolInvoker};
pub use types::{EngineOptions, ExecutionResult, PlanOutcome, StepReport};
