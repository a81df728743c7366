use std::io::Write;

use planflow_core::api::{read_event_log, render_all, CliError};
use planflow_plugins::factory::build_renderer;

use super::cli::ReplayArgs;

pub fn replay_cmd<W: Write>(args: ReplayArgs, out: &mut W) -> Result<i32, CliError> {
    let envelopes = read_event_log(&args.events, args.plan_id.as_deref())?;
    if envelopes.is_empty() {
        tracing::warn!(events = %args.events, plan_id = ?args.plan_id, "no events to replay");
        return Ok(0);
    }

    let renderer = build_renderer(&args.format, args.ascii);
    let written = render_all(renderer.as_ref(), &envelopes, out)?;
    tracing::debug!(renderer = renderer.name(), lines = written, "replay finished");
    Ok(0)
}
