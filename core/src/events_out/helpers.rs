use crate::events::EventEnvelope;

/// One JSONL line for `envelope`, without the trailing newline.
pub fn event_line(envelope: &EventEnvelope) -> Option<String> {
    match serde_json::to_string(envelope) {
        Ok(line) => Some(line),
        Err(e) => {
            tracing::warn!(seq = envelope.seq, error = %e, "event not mirrored");
            None
        }
    }
}
