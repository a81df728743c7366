use planflow_core::api::{EventEnvelope, EventRenderer, PlanEvent};
use serde_json::{json, Value};

/// Flattens envelopes into the `event_type`/`metadata` line shape consumed by
/// log shippers.
pub struct JsonlRenderer {
    pretty_print: bool,
}

impl JsonlRenderer {
    pub fn new(pretty_print: bool) -> Self {
        Self { pretty_print }
    }

    fn event_to_json(&self, envelope: &EventEnvelope) -> Value {
        let ts = envelope.ts.to_rfc3339();
        let base = |event_type: &str, metadata: Value| {
            json!({
                "v": 1,
                "seq": envelope.seq,
                "event_type": event_type,
                "ts": ts,
                "plan_id": envelope.plan_id,
                "metadata": metadata,
            })
        };

        match &envelope.event {
            PlanEvent::PlanStarted { layers, .. } => {
                let total_steps: usize = layers.iter().map(Vec::len).sum();
                base(
                    "plan.start",
                    json!({ "layers": layers, "total_steps": total_steps }),
                )
            }
            PlanEvent::LayerStarted { index, step_ids } => base(
                "layer.start",
                json!({ "layer": index, "steps": step_ids }),
            ),
            PlanEvent::StepTransition {
                step_id,
                old_status,
                new_status,
                error,
                output,
            } => {
                let mut value = base(
                    "step.transition",
                    json!({ "from": old_status, "to": new_status }),
                );
                value["step_id"] = json!(step_id);
                if let Some(err) = error {
                    value["metadata"]["error"] = json!(err);
                }
                if let Some(out) = output {
                    value["metadata"]["output"] = out.clone();
                }
                value
            }
            PlanEvent::ConfirmationRequested { step_id, tool } => {
                let mut value = base("confirmation.request", json!({ "tool": tool }));
                value["step_id"] = json!(step_id);
                value
            }
            PlanEvent::ConfirmationResolved { step_id, approved } => {
                let mut value =
                    base("confirmation.resolve", json!({ "approved": approved }));
                value["step_id"] = json!(step_id);
                value
            }
            PlanEvent::LayerFinished { index } => base("layer.end", json!({ "layer": index })),
            PlanEvent::PlanFinished { outcome } => {
                base("plan.end", json!({ "outcome": outcome }))
            }
        }
    }
}

impl EventRenderer for JsonlRenderer {
    fn name(&self) -> &str {
        "jsonl-renderer"
    }

    fn format(&self) -> &str {
        "jsonl"
    }

    fn render(&self, envelope: &EventEnvelope) -> Option<String> {
        let value = self.event_to_json(envelope);
        let line = if self.pretty_print {
            serde_json::to_string_pretty(&value)
        } else {
            serde_json::to_string(&value)
        };
        line.ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use planflow_core::api::{PlanOutcome, StepStatus};

    fn envelope(seq: u64, event: PlanEvent) -> EventEnvelope {
        EventEnvelope {
            seq,
            plan_id: "plan-1".into(),
            ts: Utc::now(),
            event,
        }
    }

    #[test]
    fn transition_line_shape() {
        let renderer = JsonlRenderer::new(false);
        let value = renderer.event_to_json(&envelope(
            3,
            PlanEvent::StepTransition {
                step_id: "s1".into(),
                old_status: StepStatus::InProgress,
                new_status: StepStatus::Completed,
                error: None,
                output: Some(json!({"echo": "hi"})),
            },
        ));
        assert_eq!(value["event_type"], "step.transition");
        assert_eq!(value["seq"], 3);
        assert_eq!(value["step_id"], "s1");
        assert_eq!(value["metadata"]["to"], "completed");
        assert_eq!(value["metadata"]["output"]["echo"], "hi");
    }

    #[test]
    fn plan_end_reports_outcome() {
        let renderer = JsonlRenderer::new(false);
        let line = renderer
            .render(&envelope(
                9,
                PlanEvent::PlanFinished {
                    outcome: PlanOutcome::Cancelled,
                },
            ))
            .unwrap();
        assert!(!line.contains('\n'));
        let value: Value = serde_json::from_str(&line).unwrap();
        assert_eq!(value["event_type"], "plan.end");
        assert_eq!(value["metadata"]["outcome"], "cancelled");
    }
}
