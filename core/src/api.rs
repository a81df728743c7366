//! Stable re-exports for consumers (`cli`, `plugins`, and external crates).
//!
//! Prefer importing from `planflow_core::api` instead of reaching into internal modules.

pub use crate::config::{
    load_default, load_from_path, AppConfig, EngineConfig, EventsOutConfig, LoggingConfig,
    PermissionAction, PermissionRule, PermissionsConfig, RecordsConfig,
};
pub use crate::error::{
    CliError, EngineError, ErrorKind, GraphError, PlanParseError, RecordError, StepError,
};
pub use crate::events::{
    read_event_log, read_record_file, rebuild_for_display, record_from_json, record_to_json,
    render_all, write_record_file, DisplayView, EventEnvelope, EventRenderer, MemoryRecordSink,
    PlanEvent, PlanRecord, ProgressEmitter, RecordSink, StepSnapshot,
};
pub use crate::events_out::{start_events_out, EventsOutTx};
pub use crate::executor::{
    build_plan, EngineOptions, ExecutionResult, PlanDag, PlanEngine, PlanEngineBuilder,
    PlanOutcome, StepReport,
};
pub use crate::plan::{generate_plan_id, parse_plan, Plan, Step, StepDescriptor, StepStatus, ToolInput};
pub use crate::state::{StepTransition, TransitionError};
pub use crate::tools::{
    AllowAllGate, ConfirmationBroker, ConfirmationDecision, ConfirmationError,
    InMemoryToolRegistry, PendingConfirmation, PermissionGate, ToolCallContext, ToolHandle,
    ToolRegistry,
};
