//! Plan data model and the text parser that recovers it from model output.

pub mod id_gen;
mod parser;
pub mod sanitize;
pub mod types;

pub use id_gen::{generate_plan_id, positional_step_id};
pub use parser::parse_plan;
pub use types::{Plan, Step, StepDescriptor, StepStatus, ToolInput};
