use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::sync::{mpsc, Mutex};

use crate::events_out::{event_line, EventsOutTx};
use crate::executor::types::PlanOutcome;
use crate::plan::StepStatus;

/// Everything observable about an execution, in the order it happened.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum PlanEvent {
    PlanStarted {
        plan_id: String,
        layers: Vec<Vec<String>>,
    },
    LayerStarted {
        index: usize,
        step_ids: Vec<String>,
    },
    StepTransition {
        step_id: String,
        old_status: StepStatus,
        new_status: StepStatus,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        error: Option<String>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        output: Option<Value>,
    },
    ConfirmationRequested {
        step_id: String,
        tool: String,
    },
    ConfirmationResolved {
        step_id: String,
        approved: bool,
    },
    LayerFinished {
        index: usize,
    },
    PlanFinished {
        outcome: PlanOutcome,
    },
}

impl PlanEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            Self::PlanStarted { .. } => "plan_started",
            Self::LayerStarted { .. } => "layer_started",
            Self::StepTransition { .. } => "step_transition",
            Self::ConfirmationRequested { .. } => "confirmation_requested",
            Self::ConfirmationResolved { .. } => "confirmation_resolved",
            Self::LayerFinished { .. } => "layer_finished",
            Self::PlanFinished { .. } => "plan_finished",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventEnvelope {
    /// Strictly increasing per emitter.
    pub seq: u64,
    pub plan_id: String,
    pub ts: DateTime<Utc>,
    pub event: PlanEvent,
}

/// Append-only event stream with a single consumer.
///
/// Clones share the sequence counter, so envelopes from concurrent producers
/// reach the receiver (and the events-out mirror) in `seq` order.
#[derive(Clone)]
pub struct ProgressEmitter {
    seq: Arc<Mutex<u64>>,
    tx: Option<mpsc::UnboundedSender<EventEnvelope>>,
    events_out: Option<EventsOutTx>,
}

impl ProgressEmitter {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<EventEnvelope>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let emitter = Self {
            seq: Arc::new(Mutex::new(0)),
            tx: Some(tx),
            events_out: None,
        };
        (emitter, rx)
    }

    /// Emitter with no subscriber; events are only numbered and mirrored.
    pub fn detached() -> Self {
        Self {
            seq: Arc::new(Mutex::new(0)),
            tx: None,
            events_out: None,
        }
    }

    /// Mirror every envelope as a JSON line.
    pub fn with_events_out(mut self, out: Option<EventsOutTx>) -> Self {
        self.events_out = out;
        self
    }

    /// Numbers `event` and hands it to the subscriber and the mirror.
    ///
    /// The mirror slot is claimed before the sequence lock, so a slow
    /// events-out writer back-pressures only the producers waiting on it.
    /// Lines still reach the writer in `seq` order.
    pub async fn emit(&self, plan_id: &str, event: PlanEvent) -> u64 {
        let slot = match &self.events_out {
            Some(out) => out.reserve_slot().await,
            None => None,
        };

        let mut seq = self.seq.lock().await;
        *seq += 1;
        let envelope = EventEnvelope {
            seq: *seq,
            plan_id: plan_id.to_string(),
            ts: Utc::now(),
            event,
        };

        if let Some(slot) = slot {
            if let Some(line) = event_line(&envelope) {
                slot.send(line);
            }
        }
        if let Some(tx) = &self.tx {
            // receiver gone: nobody is listening, keep executing
            let _ = tx.send(envelope);
        }
        *seq
    }
}

impl Default for ProgressEmitter {
    fn default() -> Self {
        Self::detached()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn concurrent_producers_keep_seq_order() {
        let (emitter, mut rx) = ProgressEmitter::channel();

        let mut handles = Vec::new();
        for worker in 0..8 {
            let emitter = emitter.clone();
            handles.push(tokio::spawn(async move {
                for i in 0..25 {
                    emitter
                        .emit(
                            "p",
                            PlanEvent::LayerFinished {
                                index: worker * 100 + i,
                            },
                        )
                        .await;
                }
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        drop(emitter);

        let mut last = 0;
        let mut count = 0;
        while let Some(env) = rx.recv().await {
            assert_eq!(env.seq, last + 1);
            last = env.seq;
            count += 1;
        }
        assert_eq!(count, 200);
    }

    #[tokio::test]
    async fn dropped_receiver_does_not_fail_emit() {
        let (emitter, rx) = ProgressEmitter::channel();
        drop(rx);
        assert_eq!(
            emitter
                .emit("p", PlanEvent::PlanFinished { outcome: PlanOutcome::Succeeded })
                .await,
            1
        );
    }

    #[tokio::test]
    async fn full_mirror_does_not_hold_the_sequence_lock() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("events.jsonl");
        let out = crate::events_out::start_events_out(&crate::config::EventsOutConfig {
            enabled: true,
            path: path.to_string_lossy().to_string(),
            channel_capacity: 1,
            drop_when_full: false,
        })
        .await
        .unwrap()
        .unwrap();

        // occupy the only queue slot
        let held = out.reserve_slot().await.unwrap();

        let (emitter, mut rx) = ProgressEmitter::channel();
        let emitter = emitter.with_events_out(Some(out.clone()));
        let blocked = {
            let emitter = emitter.clone();
            tokio::spawn(async move { emitter.emit("p", PlanEvent::LayerFinished { index: 0 }).await })
        };

        tokio::time::sleep(std::time::Duration::from_millis(30)).await;
        assert!(!blocked.is_finished());
        assert!(emitter.seq.try_lock().is_ok());
        assert!(rx.try_recv().is_err());

        held.send("{}".to_string());
        assert_eq!(blocked.await.unwrap(), 1);
        assert_eq!(rx.recv().await.unwrap().seq, 1);
    }

    #[test]
    fn envelope_json_shape() {
        let env = EventEnvelope {
            seq: 3,
            plan_id: "p".into(),
            ts: Utc::now(),
            event: PlanEvent::StepTransition {
                step_id: "s1".into(),
                old_status: StepStatus::Pending,
                new_status: StepStatus::Cancelled,
                error: None,
                output: None,
            },
        };
        let v = serde_json::to_value(&env).unwrap();
        assert_eq!(v["event"]["type"], "step_transition");
        assert_eq!(v["event"]["new_status"], "cancelled");
        assert!(v["event"].get("error").is_none());

        let back: EventEnvelope = serde_json::from_value(v).unwrap();
        assert_eq!(back, env);
    }
}
