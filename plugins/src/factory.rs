use std::sync::Arc;

use anyhow::{Context, Result};

use planflow_core::api::{
    start_events_out, AppConfig, EngineOptions, EventRenderer, PermissionGate, PlanEngine,
    ProgressEmitter, ToolRegistry,
};

use crate::permission::ConfigPermissionGate;
use crate::records::JsonFileRecordStore;
use crate::renderers::{JsonlRenderer, TextRenderer};

pub fn build_gate(cfg: &AppConfig) -> Arc<dyn PermissionGate> {
    Arc::new(ConfigPermissionGate::new(cfg.permissions.clone()))
}

/// `None` when `[records].directory` is unset.
pub fn build_record_store(cfg: &AppConfig) -> Result<Option<Arc<JsonFileRecordStore>>> {
    let Some(dir) = cfg.records.directory.as_deref() else {
        return Ok(None);
    };
    let store = JsonFileRecordStore::open(dir)
        .with_context(|| format!("failed to open record directory {dir}"))?;
    Ok(Some(Arc::new(store)))
}

/// Engine wired from `cfg`: options, permission gate, record store and the
/// events-out mirror on top of `emitter`.
///
/// The events-out writer flushes once the engine and every clone of its
/// emitter are dropped.
pub async fn build_engine(
    cfg: &AppConfig,
    registry: Arc<dyn ToolRegistry>,
    emitter: ProgressEmitter,
) -> Result<PlanEngine> {
    let events_out = start_events_out(&cfg.events_out)
        .await
        .map_err(anyhow::Error::msg)?;

    let mut builder = PlanEngine::builder(registry)
        .options(EngineOptions::from_config(&cfg.engine))
        .gate(build_gate(cfg))
        .emitter(emitter.with_events_out(events_out));

    if let Some(store) = build_record_store(cfg)? {
        builder = builder.record_sink(store);
    }

    Ok(builder.build())
}

pub fn build_renderer(format: &str, ascii_only: bool) -> Box<dyn EventRenderer> {
    match format {
        "jsonl" => Box::new(JsonlRenderer::new(false)),
        // Anything else renders as text.
        _ => Box::new(TextRenderer::new(ascii_only)),
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use async_trait::async_trait;
    use planflow_core::api::{
        EventEnvelope, InMemoryToolRegistry, PermissionRule, PlanOutcome, StepStatus,
        ToolCallContext, ToolHandle, ToolInput,
    };
    use pretty_assertions::assert_eq;
    use serde_json::Value;
    use tokio_util::sync::CancellationToken;

    use super::*;

    struct Echo(&'static str);

    #[async_trait]
    impl ToolHandle for Echo {
        fn name(&self) -> &str {
            self.0
        }

        async fn call(&self, input: &ToolInput, _ctx: ToolCallContext) -> anyhow::Result<Value> {
            Ok(Value::Object(input.clone()))
        }
    }

    fn registry() -> Arc<dyn ToolRegistry> {
        let registry = InMemoryToolRegistry::new();
        registry.register(Arc::new(Echo("echo")));
        registry.register(Arc::new(Echo("shell")));
        Arc::new(registry)
    }

    async fn read_lines_until(path: &std::path::Path, want: usize) -> Vec<String> {
        let deadline = tokio::time::Instant::now() + Duration::from_secs(5);
        loop {
            let text = tokio::fs::read_to_string(path).await.unwrap_or_default();
            let lines: Vec<String> = text.lines().map(str::to_string).collect();
            if lines.len() >= want || tokio::time::Instant::now() > deadline {
                return lines;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    #[tokio::test]
    async fn engine_from_config_mirrors_events_and_saves_records() {
        let dir = tempfile::tempdir().unwrap();
        let events_path = dir.path().join("events.jsonl");

        let mut cfg = AppConfig::default();
        cfg.engine.max_concurrency = 3;
        cfg.events_out.enabled = true;
        cfg.events_out.path = events_path.display().to_string();
        cfg.events_out.drop_when_full = false;
        cfg.records.directory = Some(dir.path().join("records").display().to_string());
        cfg.permissions.denylist.push(PermissionRule {
            tool: "shell".into(),
            reason: None,
        });

        let (emitter, mut rx) = ProgressEmitter::channel();
        let engine = build_engine(&cfg, registry(), emitter).await.unwrap();
        assert_eq!(engine.options().max_concurrency, 3);

        let raw = r#"[
            {"id": "a", "tool": "echo", "input": {"n": 1}},
            {"id": "b", "tool": "echo", "dependencies": ["a"]},
            {"id": "c", "tool": "shell"}
        ]"#;
        let dag = engine.prepare_with_id("plan-cfg", raw).unwrap();
        let result = engine.execute(dag, CancellationToken::new()).await.unwrap();
        drop(engine);

        assert_eq!(result.outcome, PlanOutcome::PartiallyFailed);
        assert_eq!(result.step("b").unwrap().status, StepStatus::Completed);
        let denied = result.step("c").unwrap();
        assert_eq!(denied.status, StepStatus::Failed);
        assert!(denied.error.as_deref().unwrap().contains("tool disabled"));

        let mut delivered = Vec::new();
        while let Ok(env) = rx.try_recv() {
            delivered.push(env);
        }

        let lines = read_lines_until(&events_path, delivered.len()).await;
        let mirrored: Vec<EventEnvelope> = lines
            .iter()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect();
        assert_eq!(mirrored, delivered);

        let seqs: Vec<u64> = mirrored.iter().map(|env| env.seq).collect();
        let expected: Vec<u64> = (1..=mirrored.len() as u64).collect();
        assert_eq!(seqs, expected);
        assert_eq!(mirrored.first().unwrap().event.kind(), "plan_started");
        assert_eq!(mirrored.last().unwrap().event.kind(), "plan_finished");

        let store = build_record_store(&cfg).unwrap().unwrap();
        assert_eq!(store.list().unwrap(), vec!["plan-cfg".to_string()]);
    }

    #[tokio::test]
    async fn engine_without_events_out_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let events_path = dir.path().join("events.jsonl");

        let mut cfg = AppConfig::default();
        cfg.events_out.enabled = false;
        cfg.events_out.path = events_path.display().to_string();

        let engine = build_engine(&cfg, registry(), ProgressEmitter::detached())
            .await
            .unwrap();
        let result = engine
            .run(r#"[{"tool": "echo"}]"#, CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result.outcome, PlanOutcome::Succeeded);
        assert!(!events_path.exists());
    }

    #[test]
    fn renderer_falls_back_to_text() {
        assert_eq!(build_renderer("jsonl", false).format(), "jsonl");
        assert_eq!(build_renderer("yaml", true).format(), "text");
    }

    #[test]
    fn record_store_only_when_configured() {
        let mut cfg = AppConfig::default();
        assert!(build_record_store(&cfg).unwrap().is_none());

        let dir = tempfile::tempdir().unwrap();
        cfg.records.directory = Some(dir.path().join("records").display().to_string());
        let store = build_record_store(&cfg).unwrap().unwrap();
        assert!(store.dir().is_dir());
    }
}
