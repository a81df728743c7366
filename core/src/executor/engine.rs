use std::sync::Arc;
use std::time::Instant;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::error::EngineError;
use crate::events::{ProgressEmitter, RecordSink};
use crate::plan::{generate_plan_id, parse_plan};
use crate::tools::{AllowAllGate, ConfirmationBroker, PermissionGate, ToolRegistry};

use super::graph::{build_plan, PlanDag, PlanGraph};
use super::invoke::ToolInvoker;
use super::scheduler::{PlanRun, RunContext};
use super::types::{EngineOptions, ExecutionResult, PlanOutcome};

/// Plan-execute engine: parses plan text, builds the DAG, and runs it layer
/// by layer against a tool registry.
pub struct PlanEngine {
    registry: Arc<dyn ToolRegistry>,
    gate: Arc<dyn PermissionGate>,
    broker: ConfirmationBroker,
    options: EngineOptions,
    record_sink: Option<Arc<dyn RecordSink>>,
    emitter: ProgressEmitter,
}

pub struct PlanEngineBuilder {
    registry: Arc<dyn ToolRegistry>,
    gate: Arc<dyn PermissionGate>,
    broker: ConfirmationBroker,
    options: EngineOptions,
    record_sink: Option<Arc<dyn RecordSink>>,
    emitter: ProgressEmitter,
}

impl PlanEngine {
    pub fn builder(registry: Arc<dyn ToolRegistry>) -> PlanEngineBuilder {
        PlanEngineBuilder::new(registry)
    }

    /// Where pending confirmations are answered.
    pub fn broker(&self) -> &ConfirmationBroker {
        &self.broker
    }

    pub fn options(&self) -> &EngineOptions {
        &self.options
    }

    /// Parse and build under a fresh plan id. Nothing runs.
    pub fn prepare(&self, raw: &str) -> Result<PlanDag, EngineError> {
        self.prepare_with_id(generate_plan_id(), raw)
    }

    pub fn prepare_with_id(
        &self,
        plan_id: impl Into<String>,
        raw: &str,
    ) -> Result<PlanDag, EngineError> {
        let descriptors = parse_plan(raw)?;
        Ok(build_plan(plan_id, descriptors)?)
    }

    /// Executes a prepared plan.
    ///
    /// Step failures are reported in the result; only a broken graph or a
    /// state-machine violation returns `Err`. Layers are recomputed from the
    /// plan's own dependencies, so a hand-edited `PlanDag` cannot desync them.
    pub async fn execute(
        &self,
        dag: PlanDag,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        let started = Instant::now();
        let PlanDag { plan, layers } = dag;

        let computed = PlanGraph::from_steps(&plan.steps)?.layers()?;
        if computed != layers {
            warn!(plan_id = %plan.id, "supplied layers disagree with dependencies, using recomputed layers");
        }

        let plan_id = plan.id.clone();
        info!(
            plan_id = %plan_id,
            steps = plan.steps.len(),
            layers = computed.len(),
            max_concurrency = self.options.max_concurrency,
            "plan started"
        );

        let invoker = ToolInvoker::new(
            self.registry.clone(),
            self.gate.clone(),
            self.broker.clone(),
            self.emitter.clone(),
        )
        .with_timeouts(self.options.tool_timeout, self.options.confirmation_timeout);

        let ctx = RunContext {
            invoker: &invoker,
            emitter: &self.emitter,
            sink: self.record_sink.as_deref(),
            options: &self.options,
            cancel,
        };

        let mut run = PlanRun::new(ctx, plan);
        let outcome = run.run(&computed).await?;
        let steps = run.into_reports();

        let result = ExecutionResult {
            plan_id,
            outcome,
            steps,
            layers: computed,
            duration_ms: started.elapsed().as_millis() as u64,
        };

        match outcome {
            PlanOutcome::Succeeded => info!(
                plan_id = %result.plan_id,
                completed = result.completed(),
                duration_ms = result.duration_ms,
                "plan finished"
            ),
            _ => warn!(
                plan_id = %result.plan_id,
                outcome = %outcome,
                completed = result.completed(),
                failed = result.failed(),
                cancelled = result.cancelled(),
                duration_ms = result.duration_ms,
                "plan finished"
            ),
        }

        Ok(result)
    }

    /// `prepare` then `execute`.
    pub async fn run(
        &self,
        raw: &str,
        cancel: CancellationToken,
    ) -> Result<ExecutionResult, EngineError> {
        let dag = self.prepare(raw)?;
        self.execute(dag, cancel).await
    }
}

impl PlanEngineBuilder {
    pub fn new(registry: Arc<dyn ToolRegistry>) -> Self {
        Self {
            registry,
            gate: Arc::new(AllowAllGate),
            broker: ConfirmationBroker::new(),
            options: EngineOptions::default(),
            record_sink: None,
            emitter: ProgressEmitter::detached(),
        }
    }

    pub fn gate(mut self, gate: Arc<dyn PermissionGate>) -> Self {
        self.gate = gate;
        self
    }

    pub fn broker(mut self, broker: ConfirmationBroker) -> Self {
        self.broker = broker;
        self
    }

    pub fn options(mut self, options: EngineOptions) -> Self {
        self.options = options;
        self
    }

    pub fn record_sink(mut self, sink: Arc<dyn RecordSink>) -> Self {
        self.record_sink = Some(sink);
        self
    }

    pub fn emitter(mut self, emitter: ProgressEmitter) -> Self {
        self.emitter = emitter;
        self
    }

    pub fn build(self) -> PlanEngine {
        PlanEngine {
            registry: self.registry,
            gate: self.gate,
            broker: self.broker,
            options: self.options,
            record_sink: self.record_sink,
            emitter: self.emitter,
        }
    }
}
