//! Tool invocation adapter: resolve, permit, confirm, call.

use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use crate::error::StepError;
use crate::events::{PlanEvent, ProgressEmitter};
use crate::plan::ToolInput;
use crate::tools::{
    ConfirmationBroker, ConfirmationDecision, PermissionGate, ToolCallContext, ToolHandle,
    ToolRegistry,
};

/// One step's call, detached from the plan so it can run on its own task.
#[derive(Debug, Clone)]
pub struct InvocationRequest {
    pub plan_id: String,
    pub step_id: String,
    pub tool: String,
    pub input: ToolInput,
    /// Step-scoped token: fired by plan cancellation or by this call's timeout.
    pub cancel: CancellationToken,
}

#[derive(Clone)]
pub struct ToolInvoker {
    registry: Arc<dyn ToolRegistry>,
    gate: Arc<dyn PermissionGate>,
    broker: ConfirmationBroker,
    emitter: ProgressEmitter,
    tool_timeout: Duration,
    confirmation_timeout: Option<Duration>,
}

impl ToolInvoker {
    pub fn new(
        registry: Arc<dyn ToolRegistry>,
        gate: Arc<dyn PermissionGate>,
        broker: ConfirmationBroker,
        emitter: ProgressEmitter,
    ) -> Self {
        Self {
            registry,
            gate,
            broker,
            emitter,
            tool_timeout: Duration::from_secs(60),
            confirmation_timeout: None,
        }
    }

    pub fn with_timeouts(
        mut self,
        tool_timeout: Duration,
        confirmation_timeout: Option<Duration>,
    ) -> Self {
        self.tool_timeout = tool_timeout;
        self.confirmation_timeout = confirmation_timeout;
        self
    }

    /// Runs one step's tool. Every failure is reported as a [`StepError`];
    /// nothing is retried.
    pub async fn invoke(&self, req: InvocationRequest) -> Result<Value, StepError> {
        let Some(handle) = self.registry.resolve(&req.tool) else {
            return Err(StepError::ToolNotFound(req.tool));
        };

        if !self.gate.is_enabled(&req.tool).await {
            return Err(StepError::ToolDisabled(req.tool));
        }

        if self.gate.requires_confirmation(&req.tool).await {
            self.await_confirmation(&req).await?;
        }

        if req.cancel.is_cancelled() {
            return Err(StepError::Cancelled(format!(
                "step {} cancelled before call",
                req.step_id
            )));
        }

        self.call(handle, &req).await
    }

    /// Suspends this step until a human answers. Sibling steps keep running.
    async fn await_confirmation(&self, req: &InvocationRequest) -> Result<(), StepError> {
        let rx = self.broker.request(&req.plan_id, &req.step_id, &req.tool);
        self.emitter
            .emit(
                &req.plan_id,
                PlanEvent::ConfirmationRequested {
                    step_id: req.step_id.clone(),
                    tool: req.tool.clone(),
                },
            )
            .await;
        debug!(step_id = %req.step_id, tool = %req.tool, "awaiting confirmation");

        let deadline = async {
            match self.confirmation_timeout {
                Some(after) => tokio::time::sleep(after).await,
                None => std::future::pending::<()>().await,
            }
        };

        let decision = tokio::select! {
            biased;
            _ = req.cancel.cancelled() => {
                self.broker.withdraw(&req.plan_id, &req.step_id);
                return Err(StepError::Cancelled(format!(
                    "step {} cancelled while awaiting confirmation",
                    req.step_id
                )));
            }
            answer = rx => answer.unwrap_or_else(|_| ConfirmationDecision::Denied {
                reason: "confirmation withdrawn".to_string(),
            }),
            _ = deadline => {
                self.broker.withdraw(&req.plan_id, &req.step_id);
                self.emit_resolved(req, false).await;
                return Err(StepError::ConfirmationTimeout {
                    tool: req.tool.clone(),
                    after: self.confirmation_timeout.unwrap_or_default(),
                });
            }
        };

        self.emit_resolved(req, decision.is_approved()).await;
        match decision {
            ConfirmationDecision::Approved => Ok(()),
            ConfirmationDecision::Denied { reason } => Err(StepError::ConfirmationDenied {
                tool: req.tool.clone(),
                reason,
            }),
        }
    }

    async fn emit_resolved(&self, req: &InvocationRequest, approved: bool) {
        self.emitter
            .emit(
                &req.plan_id,
                PlanEvent::ConfirmationResolved {
                    step_id: req.step_id.clone(),
                    approved,
                },
            )
            .await;
    }

    async fn call(
        &self,
        handle: Arc<dyn ToolHandle>,
        req: &InvocationRequest,
    ) -> Result<Value, StepError> {
        let ctx = ToolCallContext {
            step_id: req.step_id.clone(),
            cancel: req.cancel.clone(),
            timeout: self.tool_timeout,
        };

        tokio::select! {
            res = handle.call(&req.input, ctx) => match res {
                Ok(output) => Ok(output),
                Err(_) if req.cancel.is_cancelled() => Err(StepError::Cancelled(format!(
                    "step {} cancelled during call",
                    req.step_id
                ))),
                Err(e) => Err(StepError::ToolExecution {
                    tool: req.tool.clone(),
                    message: format!("{e:#}"),
                }),
            },
            _ = tokio::time::sleep(self.tool_timeout) => {
                // same channel as plan cancellation
                req.cancel.cancel();
                warn!(step_id = %req.step_id, tool = %req.tool, "tool call timed out");
                Err(StepError::Timeout {
                    tool: req.tool.clone(),
                    after: self.tool_timeout,
                })
            }
        }
    }
}
