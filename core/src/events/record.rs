use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::RecordError;
use crate::executor::StepLike;
use crate::plan::{Plan, Step, StepStatus, ToolInput};

/// Execution-free projection of one step.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepSnapshot {
    pub id: String,
    pub tool: String,
    #[serde(default)]
    pub input: ToolInput,
    #[serde(default)]
    pub reason: String,
    #[serde(default)]
    pub dependencies: Vec<String>,
    pub status: StepStatus,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl From<&Step> for StepSnapshot {
    fn from(step: &Step) -> Self {
        Self {
            id: step.id.clone(),
            tool: step.tool.clone(),
            input: step.input.clone(),
            reason: step.reason.clone(),
            dependencies: step.dependencies.clone(),
            status: step.status,
            error: step.error.clone(),
        }
    }
}

impl StepLike for StepSnapshot {
    fn id(&self) -> &str {
        &self.id
    }

    fn dependencies(&self) -> &[String] {
        &self.dependencies
    }
}

/// Persisted plan: enough to rebuild layers and show outcomes, nothing to
/// execute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PlanRecord {
    pub plan_id: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub steps: Vec<StepSnapshot>,
}

impl PlanRecord {
    pub fn from_plan(plan: &Plan) -> Self {
        let now = Utc::now();
        Self {
            plan_id: plan.id.clone(),
            created_at: now,
            updated_at: now,
            steps: plan.steps.iter().map(StepSnapshot::from).collect(),
        }
    }

    /// Refresh the snapshot of `step`. Returns false for unknown ids.
    pub fn update_step(&mut self, step: &Step) -> bool {
        let Some(slot) = self.steps.iter_mut().find(|s| s.id == step.id) else {
            return false;
        };
        slot.status = step.status;
        slot.error = step.error.clone();
        self.updated_at = Utc::now();
        true
    }

    pub fn step(&self, id: &str) -> Option<&StepSnapshot> {
        self.steps.iter().find(|s| s.id == id)
    }
}

/// Destination for plan records. Called after every terminal transition
/// with the whole record.
#[async_trait]
pub trait RecordSink: Send + Sync {
    async fn save(&self, record: &PlanRecord) -> Result<(), RecordError>;
}

/// Keeps the latest record per plan in memory.
#[derive(Default)]
pub struct MemoryRecordSink {
    records: Mutex<HashMap<String, PlanRecord>>,
    saves: Mutex<usize>,
}

impl MemoryRecordSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, plan_id: &str) -> Option<PlanRecord> {
        let records = self.records.lock().unwrap_or_else(|e| e.into_inner());
        records.get(plan_id).cloned()
    }

    /// Number of `save` calls so far.
    pub fn save_count(&self) -> usize {
        *self.saves.lock().unwrap_or_else(|e| e.into_inner())
    }
}

#[async_trait]
impl RecordSink for MemoryRecordSink {
    async fn save(&self, record: &PlanRecord) -> Result<(), RecordError> {
        {
            let mut records = self.records.lock().unwrap_or_else(|e| e.into_inner());
            records.insert(record.plan_id.clone(), record.clone());
        }
        *self.saves.lock().unwrap_or_else(|e| e.into_inner()) += 1;
        Ok(())
    }
}

fn io_error(path: &Path, source: std::io::Error) -> RecordError {
    RecordError::Io {
        path: path.display().to_string(),
        source,
    }
}

fn serde_error(context: &'static str, source: serde_json::Error) -> RecordError {
    RecordError::Serde { context, source }
}

pub fn record_to_json(record: &PlanRecord) -> Result<String, RecordError> {
    serde_json::to_string_pretty(record).map_err(|e| serde_error("serialize PlanRecord", e))
}

pub fn record_from_json(json: &str) -> Result<PlanRecord, RecordError> {
    serde_json::from_str::<PlanRecord>(json).map_err(|e| serde_error("deserialize PlanRecord", e))
}

pub fn read_record_file(path: impl AsRef<Path>) -> Result<PlanRecord, RecordError> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path).map_err(|e| io_error(path, e))?;
    record_from_json(&json)
}

/// Writes through a sibling temp file so readers never see a half record.
pub fn write_record_file(path: impl AsRef<Path>, record: &PlanRecord) -> Result<(), RecordError> {
    let path = path.as_ref();
    let json = record_to_json(record)?;
    let tmp = path.with_extension("json.tmp");
    std::fs::write(&tmp, json).map_err(|e| io_error(&tmp, e))?;
    std::fs::rename(&tmp, path).map_err(|e| io_error(path, e))
}
