//! Step state machine.
//!
//! Only the scheduler drives these transitions; everything else observes
//! them through progress events.

mod step;
pub mod transitions;

pub use step::{StepState, TransitionPayload, TransitionRecord};
pub use transitions::{StepTransition, TransitionError};
