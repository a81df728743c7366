use std::path::Path;

use crate::error::RecordError;

use super::progress::EventEnvelope;

/// Reads a JSONL progress log written by the events-out mirror.
///
/// Blank lines and lines that are not event envelopes are skipped. With
/// `plan_id` set, only that plan's events are returned. Order is file order.
pub fn read_event_log(
    path: impl AsRef<Path>,
    plan_id: Option<&str>,
) -> Result<Vec<EventEnvelope>, RecordError> {
    let path = path.as_ref();
    let raw = std::fs::read_to_string(path).map_err(|source| RecordError::Io {
        path: path.display().to_string(),
        source,
    })?;
    Ok(parse_event_lines(&raw, plan_id))
}

pub fn parse_event_lines(raw: &str, plan_id: Option<&str>) -> Vec<EventEnvelope> {
    raw.lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .filter_map(|line| serde_json::from_str::<EventEnvelope>(line).ok())
        .filter(|env| plan_id.map(|id| env.plan_id == id).unwrap_or(true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::PlanEvent;
    use chrono::Utc;

    fn line(seq: u64, plan_id: &str) -> String {
        serde_json::to_string(&EventEnvelope {
            seq,
            plan_id: plan_id.into(),
            ts: Utc::now(),
            event: PlanEvent::LayerFinished { index: 0 },
        })
        .unwrap()
    }

    #[test]
    fn skips_noise_and_filters_plan() {
        let raw = format!(
            "{}\nnot json\n\n{{\"other\":true}}\n{}\n{}\n",
            line(1, "a"),
            line(2, "b"),
            line(3, "a")
        );

        let all = parse_event_lines(&raw, None);
        assert_eq!(all.len(), 3);

        let only_a: Vec<u64> = parse_event_lines(&raw, Some("a")).iter().map(|e| e.seq).collect();
        assert_eq!(only_a, vec![1, 3]);
    }
}
