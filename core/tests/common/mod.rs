#![allow(dead_code)]

use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use planflow_core::api::{
    EngineOptions, EventEnvelope, InMemoryToolRegistry, PermissionGate, ProgressEmitter,
    ToolCallContext, ToolHandle, ToolInput,
};
use serde_json::{json, Value};
use tokio::sync::mpsc;

/// Every tool call made during a test, in call order, as `(step_id, tool)`.
#[derive(Clone, Default)]
pub struct CallLog(Arc<Mutex<Vec<(String, String)>>>);

impl CallLog {
    pub fn record(&self, step_id: &str, tool: &str) {
        self.0
            .lock()
            .unwrap()
            .push((step_id.to_string(), tool.to_string()));
    }

    pub fn steps(&self) -> Vec<String> {
        self.0.lock().unwrap().iter().map(|(s, _)| s.clone()).collect()
    }

    pub fn count(&self) -> usize {
        self.0.lock().unwrap().len()
    }

    pub fn called(&self, step_id: &str) -> bool {
        self.0.lock().unwrap().iter().any(|(s, _)| s == step_id)
    }
}

/// Returns its input.
pub struct EchoTool {
    pub name: String,
    pub log: CallLog,
}

#[async_trait]
impl ToolHandle for EchoTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, input: &ToolInput, ctx: ToolCallContext) -> anyhow::Result<Value> {
        self.log.record(&ctx.step_id, &self.name);
        Ok(Value::Object(input.clone()))
    }
}

/// Always errors.
pub struct FailingTool {
    pub name: String,
    pub message: String,
    pub log: CallLog,
}

#[async_trait]
impl ToolHandle for FailingTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _input: &ToolInput, ctx: ToolCallContext) -> anyhow::Result<Value> {
        self.log.record(&ctx.step_id, &self.name);
        anyhow::bail!("{}", self.message)
    }
}

/// Tracks how many calls are running at once.
#[derive(Default)]
pub struct Gauge {
    current: AtomicUsize,
    peak: AtomicUsize,
}

impl Gauge {
    fn enter(&self) {
        let now = self.current.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
    }

    fn leave(&self) {
        self.current.fetch_sub(1, Ordering::SeqCst);
    }

    pub fn peak(&self) -> usize {
        self.peak.load(Ordering::SeqCst)
    }
}

/// Sleeps for `delay`, returning early with an error if its token fires.
pub struct SlowTool {
    pub name: String,
    pub delay: Duration,
    pub gauge: Arc<Gauge>,
    pub saw_cancel: Arc<AtomicUsize>,
    pub log: CallLog,
}

#[async_trait]
impl ToolHandle for SlowTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _input: &ToolInput, ctx: ToolCallContext) -> anyhow::Result<Value> {
        self.log.record(&ctx.step_id, &self.name);
        self.gauge.enter();
        let res = tokio::select! {
            _ = tokio::time::sleep(self.delay) => Ok(json!({ "slept_ms": self.delay.as_millis() as u64 })),
            _ = ctx.cancel.cancelled() => {
                self.saw_cancel.fetch_add(1, Ordering::SeqCst);
                Err(anyhow::anyhow!("interrupted"))
            }
        };
        self.gauge.leave();
        res
    }
}

/// Ignores cancellation entirely.
pub struct StubbornTool {
    pub name: String,
    pub delay: Duration,
    pub log: CallLog,
}

#[async_trait]
impl ToolHandle for StubbornTool {
    fn name(&self) -> &str {
        &self.name
    }

    async fn call(&self, _input: &ToolInput, ctx: ToolCallContext) -> anyhow::Result<Value> {
        self.log.record(&ctx.step_id, &self.name);
        tokio::time::sleep(self.delay).await;
        Ok(json!("finally"))
    }
}

/// Registry with `echo`, `fail`, and `slow` (50ms) tools sharing one log.
pub struct Fixture {
    pub registry: Arc<InMemoryToolRegistry>,
    pub log: CallLog,
    pub gauge: Arc<Gauge>,
    pub saw_cancel: Arc<AtomicUsize>,
}

impl Fixture {
    pub fn new() -> Self {
        let log = CallLog::default();
        let gauge = Arc::new(Gauge::default());
        let saw_cancel = Arc::new(AtomicUsize::new(0));
        let registry = Arc::new(InMemoryToolRegistry::new());

        registry.register(Arc::new(EchoTool {
            name: "echo".into(),
            log: log.clone(),
        }));
        registry.register(Arc::new(FailingTool {
            name: "fail".into(),
            message: "upstream exploded".into(),
            log: log.clone(),
        }));
        registry.register(Arc::new(SlowTool {
            name: "slow".into(),
            delay: Duration::from_millis(50),
            gauge: gauge.clone(),
            saw_cancel: saw_cancel.clone(),
            log: log.clone(),
        }));

        Self {
            registry,
            log,
            gauge,
            saw_cancel,
        }
    }

    pub fn add_slow(&self, name: &str, delay: Duration) {
        self.registry.register(Arc::new(SlowTool {
            name: name.into(),
            delay,
            gauge: self.gauge.clone(),
            saw_cancel: self.saw_cancel.clone(),
            log: self.log.clone(),
        }));
    }

    pub fn add_stubborn(&self, name: &str, delay: Duration) {
        self.registry.register(Arc::new(StubbornTool {
            name: name.into(),
            delay,
            log: self.log.clone(),
        }));
    }
}

/// Permission gate driven by two name sets.
#[derive(Default)]
pub struct ScriptedGate {
    pub disabled: HashSet<String>,
    pub confirm: HashSet<String>,
}

impl ScriptedGate {
    pub fn disable(mut self, tool: &str) -> Self {
        self.disabled.insert(tool.to_string());
        self
    }

    pub fn confirm(mut self, tool: &str) -> Self {
        self.confirm.insert(tool.to_string());
        self
    }
}

#[async_trait]
impl PermissionGate for ScriptedGate {
    async fn is_enabled(&self, tool: &str) -> bool {
        !self.disabled.contains(tool)
    }

    async fn requires_confirmation(&self, tool: &str) -> bool {
        self.confirm.contains(tool)
    }
}

pub fn fast_options() -> EngineOptions {
    EngineOptions::default()
        .with_tool_timeout(Duration::from_secs(5))
        .with_cancel_grace(Duration::from_millis(200))
}

pub fn event_channel() -> (ProgressEmitter, mpsc::UnboundedReceiver<EventEnvelope>) {
    ProgressEmitter::channel()
}

/// Everything already sent on `rx`.
pub fn drain(rx: &mut mpsc::UnboundedReceiver<EventEnvelope>) -> Vec<EventEnvelope> {
    let mut out = Vec::new();
    while let Ok(env) = rx.try_recv() {
        out.push(env);
    }
    out
}

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("planflow_core=debug")
        .with_test_writer()
        .try_init();
}
