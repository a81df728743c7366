//! Progress events, plan records, and display reconstruction.
//!
//! Execution publishes; nothing here can change a step.

mod display;
mod log;
mod progress;
mod record;
mod render;

pub use display::{rebuild_for_display, DisplayView};
pub use log::{parse_event_lines, read_event_log};
pub use progress::{EventEnvelope, PlanEvent, ProgressEmitter};
pub use record::{
    read_record_file, record_from_json, record_to_json, write_record_file, MemoryRecordSink,
    PlanRecord, RecordSink, StepSnapshot,
};
pub use render::{render_all, EventRenderer};
