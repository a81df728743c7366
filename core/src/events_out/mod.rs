pub mod helpers;
pub mod writer;

pub use crate::config::EventsOutConfig;
pub use helpers::event_line;
pub use writer::{start_events_out, EventsOutTx};
