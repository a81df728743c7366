use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::Arc;
use std::time::Instant;

use futures::stream::FuturesUnordered;
use futures::StreamExt;
use serde_json::Value;
use tokio::sync::Semaphore;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::{EngineError, StepError};
use crate::events::{PlanEvent, PlanRecord, ProgressEmitter, RecordSink};
use crate::plan::{Plan, StepStatus};
use crate::state::{StepState, TransitionPayload};

use super::invoke::{InvocationRequest, ToolInvoker};
use super::types::{EngineOptions, PlanOutcome, StepReport};

/// Collaborators shared by every layer of one execution.
pub(crate) struct RunContext<'a> {
    pub invoker: &'a ToolInvoker,
    pub emitter: &'a ProgressEmitter,
    pub sink: Option<&'a dyn RecordSink>,
    pub options: &'a EngineOptions,
    pub cancel: CancellationToken,
}

/// Single writer of step state for one plan execution.
///
/// Step futures only compute outcomes; every transition is applied here.
pub(crate) struct PlanRun<'a> {
    ctx: RunContext<'a>,
    plan: Plan,
    index: HashMap<String, usize>,
    record: PlanRecord,
    started: HashMap<String, Instant>,
    durations: HashMap<String, u64>,
}

type StepOutcome = (String, Result<Value, StepError>);

impl<'a> PlanRun<'a> {
    pub fn new(ctx: RunContext<'a>, plan: Plan) -> Self {
        let index = plan
            .steps
            .iter()
            .enumerate()
            .map(|(i, s)| (s.id.clone(), i))
            .collect();
        let record = PlanRecord::from_plan(&plan);
        Self {
            ctx,
            plan,
            index,
            record,
            started: HashMap::new(),
            durations: HashMap::new(),
        }
    }

    /// Drives `layers` in order behind a strict barrier.
    pub async fn run(&mut self, layers: &[Vec<String>]) -> Result<PlanOutcome, EngineError> {
        let plan_id = self.plan.id.clone();
        self.emit(PlanEvent::PlanStarted {
            plan_id: plan_id.clone(),
            layers: layers.to_vec(),
        })
        .await;
        self.persist().await;

        for (index, layer) in layers.iter().enumerate() {
            if self.ctx.cancel.is_cancelled() {
                break;
            }

            info!(plan_id = %plan_id, layer = index, steps = layer.len(), "layer started");
            self.emit(PlanEvent::LayerStarted {
                index,
                step_ids: layer.clone(),
            })
            .await;

            self.run_layer(layer).await?;

            self.emit(PlanEvent::LayerFinished { index }).await;
        }

        if self.ctx.cancel.is_cancelled() {
            self.cancel_pending().await?;
        }

        let outcome = self.outcome();
        self.emit(PlanEvent::PlanFinished { outcome }).await;
        Ok(outcome)
    }

    pub fn into_reports(self) -> Vec<StepReport> {
        self.plan
            .steps
            .into_iter()
            .map(|step| StepReport {
                duration_ms: self.durations.get(&step.id).copied().unwrap_or(0),
                id: step.id,
                tool: step.tool,
                status: step.status,
                error: step.error,
                output: step.output,
            })
            .collect()
    }

    fn outcome(&self) -> PlanOutcome {
        if self
            .plan
            .steps
            .iter()
            .all(|s| s.status == StepStatus::Completed)
        {
            PlanOutcome::Succeeded
        } else if self.ctx.cancel.is_cancelled() {
            PlanOutcome::Cancelled
        } else {
            PlanOutcome::PartiallyFailed
        }
    }

    async fn run_layer(&mut self, layer: &[String]) -> Result<(), EngineError> {
        let mut queue = VecDeque::with_capacity(layer.len());

        for step_id in layer {
            let step = &self.plan.steps[self.index[step_id]];
            if step.status != StepStatus::Pending {
                continue;
            }

            let blocked_by = step
                .dependencies
                .iter()
                .find(|dep| self.plan.steps[self.index[dep.as_str()]].status != StepStatus::Completed)
                .cloned();

            match blocked_by {
                Some(dep) => {
                    warn!(step_id = %step_id, dependency = %dep, "dependency did not complete, cascading cancel");
                    self.transition(step_id, StepStatus::Cancelled, TransitionPayload::None)
                        .await?;
                }
                None => queue.push_back(step_id.clone()),
            }
        }

        let sem = Arc::new(Semaphore::new(self.ctx.options.permits()));
        let mut futs: FuturesUnordered<_> = FuturesUnordered::new();
        let mut in_flight: HashSet<String> = HashSet::new();
        let cancel = self.ctx.cancel.clone();

        loop {
            while !cancel.is_cancelled() && !queue.is_empty() {
                let Ok(permit) = sem.clone().try_acquire_owned() else {
                    break;
                };
                let Some(step_id) = queue.pop_front() else {
                    break;
                };

                self.transition(&step_id, StepStatus::InProgress, TransitionPayload::None)
                    .await?;
                self.started.insert(step_id.clone(), Instant::now());
                in_flight.insert(step_id.clone());

                let step = &self.plan.steps[self.index[&step_id]];
                let req = InvocationRequest {
                    plan_id: self.plan.id.clone(),
                    step_id: step_id.clone(),
                    tool: step.tool.clone(),
                    input: step.input.clone(),
                    cancel: cancel.child_token(),
                };
                let invoker = self.ctx.invoker.clone();

                futs.push(async move {
                    let _permit = permit;
                    let res = invoker.invoke(req).await;
                    (step_id, res)
                });
            }

            if cancel.is_cancelled() {
                warn!(plan_id = %self.plan.id, in_flight = in_flight.len(), "plan cancelled");
                self.cancel_pending().await?;
                break;
            }

            if futs.is_empty() {
                return Ok(());
            }

            let next: Option<StepOutcome> = tokio::select! {
                biased;
                next = futs.next() => next,
                _ = cancel.cancelled() => None,
            };
            if let Some((step_id, res)) = next {
                in_flight.remove(&step_id);
                self.finish(&step_id, res).await?;
            }
        }

        self.drain_after_cancel(futs, in_flight).await
    }

    /// Gives cooperative tools `cancel_grace` to report back, then abandons
    /// whatever is still running.
    async fn drain_after_cancel<F>(
        &mut self,
        mut futs: FuturesUnordered<F>,
        mut in_flight: HashSet<String>,
    ) -> Result<(), EngineError>
    where
        F: std::future::Future<Output = StepOutcome>,
    {
        let grace = self.ctx.options.cancel_grace;
        let deadline = tokio::time::sleep(grace);
        tokio::pin!(deadline);

        while !in_flight.is_empty() {
            let next = tokio::select! {
                next = futs.next() => next,
                _ = &mut deadline => break,
            };
            let Some((step_id, res)) = next else {
                break;
            };
            in_flight.remove(&step_id);
            self.finish(&step_id, res).await?;
        }
        drop(futs);

        let mut abandoned: Vec<String> = in_flight.into_iter().collect();
        abandoned.sort_by_key(|id| self.index[id]);
        for step_id in abandoned {
            warn!(step_id = %step_id, grace_ms = grace.as_millis() as u64, "step abandoned");
            self.record_duration(&step_id);
            self.transition(
                &step_id,
                StepStatus::Failed,
                TransitionPayload::Error(StepError::Abandoned { grace }.to_string()),
            )
            .await?;
        }
        Ok(())
    }

    async fn finish(
        &mut self,
        step_id: &str,
        res: Result<Value, StepError>,
    ) -> Result<(), EngineError> {
        self.record_duration(step_id);
        match res {
            Ok(output) => {
                self.transition(step_id, StepStatus::Completed, TransitionPayload::Output(output))
                    .await
            }
            Err(StepError::Cancelled(reason)) => {
                warn!(step_id = %step_id, %reason, "step cancelled");
                self.transition(step_id, StepStatus::Cancelled, TransitionPayload::None)
                    .await
            }
            Err(e) => {
                warn!(step_id = %step_id, kind = e.kind().as_str(), error = %e, "step failed");
                self.transition(step_id, StepStatus::Failed, TransitionPayload::Error(e.to_string()))
                    .await
            }
        }
    }

    /// Stamps every still-pending step `cancelled`, in plan order.
    async fn cancel_pending(&mut self) -> Result<(), EngineError> {
        let pending: Vec<String> = self
            .plan
            .steps
            .iter()
            .filter(|s| s.status == StepStatus::Pending)
            .map(|s| s.id.clone())
            .collect();
        for step_id in pending {
            self.transition(&step_id, StepStatus::Cancelled, TransitionPayload::None)
                .await?;
        }
        Ok(())
    }

    fn record_duration(&mut self, step_id: &str) {
        if let Some(started) = self.started.get(step_id) {
            self.durations
                .insert(step_id.to_string(), started.elapsed().as_millis() as u64);
        }
    }

    async fn transition(
        &mut self,
        step_id: &str,
        to: StepStatus,
        payload: TransitionPayload,
    ) -> Result<(), EngineError> {
        let step = &mut self.plan.steps[self.index[step_id]];
        let applied = StepState::transition(step, to, payload)?;
        let terminal = step.is_terminal();
        if terminal {
            self.record.update_step(step);
        }

        self.emit(PlanEvent::StepTransition {
            step_id: applied.step_id,
            old_status: applied.from,
            new_status: applied.to,
            error: applied.error,
            output: applied.output,
        })
        .await;

        if terminal {
            self.persist().await;
        }
        Ok(())
    }

    async fn emit(&self, event: PlanEvent) {
        self.ctx.emitter.emit(&self.plan.id, event).await;
    }

    /// Sink failures never fail the plan.
    async fn persist(&self) {
        let Some(sink) = self.ctx.sink else {
            return;
        };
        if let Err(e) = sink.save(&self.record).await {
            warn!(plan_id = %self.plan.id, error = %e, "plan record not saved");
        }
    }
}
