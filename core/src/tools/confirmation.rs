use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::oneshot;

/// Outcome of a human confirmation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "decision", rename_all = "snake_case")]
pub enum ConfirmationDecision {
    Approved,
    Denied { reason: String },
}

impl ConfirmationDecision {
    pub fn is_approved(&self) -> bool {
        matches!(self, Self::Approved)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PendingConfirmation {
    pub plan_id: String,
    pub step_id: String,
    pub tool: String,
    pub requested_at: DateTime<Utc>,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConfirmationError {
    #[error("no confirmation pending for step {step_id} of plan {plan_id}")]
    NotPending { plan_id: String, step_id: String },
}

impl ConfirmationError {
    fn not_pending(plan_id: &str, step_id: &str) -> Self {
        Self::NotPending {
            plan_id: plan_id.to_string(),
            step_id: step_id.to_string(),
        }
    }
}

struct Waiter {
    info: PendingConfirmation,
    tx: oneshot::Sender<ConfirmationDecision>,
}

/// Step ids repeat across plans, so waiters are keyed by both ids.
type WaiterKey = (String, String);

fn key(plan_id: &str, step_id: &str) -> WaiterKey {
    (plan_id.to_string(), step_id.to_string())
}

/// Keyed rendezvous between suspended steps and whoever answers them.
///
/// The step side calls [`request`](Self::request) and awaits the receiver;
/// the external actor calls [`resolve`](Self::resolve). A receiver whose
/// sender is dropped without an answer must be read as a denial. One broker
/// may serve several plans running at once.
#[derive(Clone, Default)]
pub struct ConfirmationBroker {
    waiters: Arc<Mutex<HashMap<WaiterKey, Waiter>>>,
}

impl ConfirmationBroker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a pending confirmation for one step of one plan. A previous
    /// request for the same step of the same plan is dropped, which denies it.
    pub fn request(
        &self,
        plan_id: &str,
        step_id: &str,
        tool: &str,
    ) -> oneshot::Receiver<ConfirmationDecision> {
        let (tx, rx) = oneshot::channel();
        let info = PendingConfirmation {
            plan_id: plan_id.to_string(),
            step_id: step_id.to_string(),
            tool: tool.to_string(),
            requested_at: Utc::now(),
        };
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        waiters.insert(key(plan_id, step_id), Waiter { info, tx });
        rx
    }

    pub fn resolve(
        &self,
        plan_id: &str,
        step_id: &str,
        decision: ConfirmationDecision,
    ) -> Result<(), ConfirmationError> {
        let waiter = {
            let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
            waiters.remove(&key(plan_id, step_id))
        };
        let Some(waiter) = waiter else {
            return Err(ConfirmationError::not_pending(plan_id, step_id));
        };
        waiter
            .tx
            .send(decision)
            .map_err(|_| ConfirmationError::not_pending(plan_id, step_id))
    }

    pub fn approve(&self, plan_id: &str, step_id: &str) -> Result<(), ConfirmationError> {
        self.resolve(plan_id, step_id, ConfirmationDecision::Approved)
    }

    pub fn deny(
        &self,
        plan_id: &str,
        step_id: &str,
        reason: impl Into<String>,
    ) -> Result<(), ConfirmationError> {
        self.resolve(
            plan_id,
            step_id,
            ConfirmationDecision::Denied {
                reason: reason.into(),
            },
        )
    }

    /// Drop a pending request without answering it.
    pub fn withdraw(&self, plan_id: &str, step_id: &str) -> bool {
        let mut waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        waiters.remove(&key(plan_id, step_id)).is_some()
    }

    /// Outstanding requests, oldest first.
    pub fn pending(&self) -> Vec<PendingConfirmation> {
        let waiters = self.waiters.lock().unwrap_or_else(|e| e.into_inner());
        let mut out: Vec<_> = waiters.values().map(|w| w.info.clone()).collect();
        out.sort_by(|a, b| {
            a.requested_at
                .cmp(&b.requested_at)
                .then_with(|| a.plan_id.cmp(&b.plan_id))
                .then_with(|| a.step_id.cmp(&b.step_id))
        });
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn resolve_delivers_decision() {
        let broker = ConfirmationBroker::new();
        let rx = broker.request("p1", "s1", "shell");
        assert_eq!(broker.pending().len(), 1);

        broker.deny("p1", "s1", "not today").unwrap();
        assert_eq!(
            rx.await.unwrap(),
            ConfirmationDecision::Denied {
                reason: "not today".into()
            }
        );
        assert!(broker.pending().is_empty());
    }

    #[test]
    fn resolve_unknown_step_fails() {
        let broker = ConfirmationBroker::new();
        assert_eq!(
            broker.approve("p1", "ghost"),
            Err(ConfirmationError::NotPending {
                plan_id: "p1".into(),
                step_id: "ghost".into()
            })
        );
    }

    #[tokio::test]
    async fn withdrawn_request_reads_as_closed() {
        let broker = ConfirmationBroker::new();
        let rx = broker.request("p1", "s1", "shell");
        assert!(broker.withdraw("p1", "s1"));
        assert!(rx.await.is_err());
        assert!(broker.approve("p1", "s1").is_err());
    }

    #[tokio::test]
    async fn same_step_id_in_two_plans_stays_separate() {
        let broker = ConfirmationBroker::new();
        let rx_a = broker.request("plan-a", "step-1", "echo");
        let rx_b = broker.request("plan-b", "step-1", "echo");
        assert_eq!(broker.pending().len(), 2);

        assert!(broker.withdraw("plan-b", "step-1"));
        assert!(rx_b.await.is_err());

        broker.approve("plan-a", "step-1").unwrap();
        assert_eq!(rx_a.await.unwrap(), ConfirmationDecision::Approved);
        assert!(broker.pending().is_empty());
    }

    #[test]
    fn decision_serializes_tagged() {
        let json = serde_json::to_string(&ConfirmationDecision::Approved).unwrap();
        assert_eq!(json, r#"{"decision":"approved"}"#);
    }
}
