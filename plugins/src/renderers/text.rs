use planflow_core::api::{EventEnvelope, EventRenderer, PlanEvent, PlanOutcome, StepStatus};

pub struct TextRenderer {
    ascii_only: bool,
}

impl TextRenderer {
    pub fn new(ascii_only: bool) -> Self {
        Self { ascii_only }
    }

    fn arrow(&self) -> &'static str {
        if self.ascii_only {
            "->"
        } else {
            "→"
        }
    }

    fn outcome_label(&self, outcome: PlanOutcome) -> &'static str {
        match (outcome, self.ascii_only) {
            (PlanOutcome::Succeeded, true) => "OK",
            (PlanOutcome::Succeeded, false) => "SUCCESS",
            (PlanOutcome::PartiallyFailed, true) => "FAIL",
            (PlanOutcome::PartiallyFailed, false) => "PARTIALLY FAILED",
            (PlanOutcome::Cancelled, _) => "CANCELLED",
        }
    }

    fn format_event(&self, envelope: &EventEnvelope) -> String {
        let plan_id = &envelope.plan_id;
        match &envelope.event {
            PlanEvent::PlanStarted { layers, .. } => {
                let total: usize = layers.iter().map(Vec::len).sum();
                let mut out = format!(
                    "PLAN START {} (steps: {}, layers: {})",
                    plan_id,
                    total,
                    layers.len()
                );
                for (idx, layer) in layers.iter().enumerate() {
                    out.push_str(&format!("\n  layer {}: {}", idx, layer.join(", ")));
                }
                out
            }
            PlanEvent::LayerStarted { index, step_ids } => format!(
                "LAYER START {} (layer {}, steps: {})",
                plan_id,
                index,
                step_ids.len()
            ),
            PlanEvent::StepTransition {
                step_id,
                old_status,
                new_status,
                error,
                ..
            } => {
                let mut line = format!(
                    "STEP {} {} {} {}",
                    step_id,
                    old_status,
                    self.arrow(),
                    new_status
                );
                if *new_status == StepStatus::Failed {
                    if let Some(err) = error {
                        line.push_str(&format!(": {err}"));
                    }
                }
                line
            }
            PlanEvent::ConfirmationRequested { step_id, tool } => {
                format!("CONFIRM? step {step_id} wants to run {tool}")
            }
            PlanEvent::ConfirmationResolved { step_id, approved } => format!(
                "CONFIRM step {} {}",
                step_id,
                if *approved { "approved" } else { "denied" }
            ),
            PlanEvent::LayerFinished { index } => {
                format!("LAYER END {plan_id} (layer {index})")
            }
            PlanEvent::PlanFinished { outcome } => {
                format!("PLAN END {} ({})", plan_id, self.outcome_label(*outcome))
            }
        }
    }
}

impl EventRenderer for TextRenderer {
    fn name(&self) -> &str {
        "text-renderer"
    }

    fn format(&self) -> &str {
        "text"
    }

    fn render(&self, envelope: &EventEnvelope) -> Option<String> {
        Some(self.format_event(envelope))
    }
}
