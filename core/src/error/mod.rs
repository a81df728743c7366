#[allow(clippy::module_inception)]
pub mod error;
pub mod executor;
pub mod parse;
pub mod step;

pub use error::{CliError, RecordError};
pub use executor::{EngineError, GraphError};
pub use parse::PlanParseError;
pub use step::{ErrorKind, StepError};
