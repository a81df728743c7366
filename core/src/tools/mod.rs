//! Seams to the outside world consumed by the invocation adapter: tool
//! lookup, permission policy, and human confirmation.

pub mod confirmation;
pub mod permission;
pub mod registry;

pub use confirmation::{
    ConfirmationBroker, ConfirmationDecision, ConfirmationError, PendingConfirmation,
};
pub use permission::{AllowAllGate, PermissionGate};
pub use registry::{InMemoryToolRegistry, ToolCallContext, ToolHandle, ToolRegistry};
