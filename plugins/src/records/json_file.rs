use std::path::{Path, PathBuf};

use async_trait::async_trait;
use planflow_core::api::{read_record_file, write_record_file, PlanRecord, RecordError, RecordSink};
use tracing::debug;

/// Stores each plan record as `<dir>/<plan_id>.json`, rewritten whole on
/// every save.
#[derive(Debug, Clone)]
pub struct JsonFileRecordStore {
    dir: PathBuf,
}

impl JsonFileRecordStore {
    /// Creates `dir` if missing.
    pub fn open(dir: impl Into<PathBuf>) -> Result<Self, RecordError> {
        let dir = dir.into();
        std::fs::create_dir_all(&dir).map_err(|source| RecordError::Io {
            path: dir.display().to_string(),
            source,
        })?;
        Ok(Self { dir })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, plan_id: &str) -> Result<PathBuf, RecordError> {
        let valid = !plan_id.is_empty()
            && plan_id
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
            && !plan_id.starts_with('.');
        if !valid {
            return Err(RecordError::Sink(format!(
                "plan id not usable as a file name: {plan_id:?}"
            )));
        }
        Ok(self.dir.join(format!("{plan_id}.json")))
    }

    pub fn load(&self, plan_id: &str) -> Result<PlanRecord, RecordError> {
        read_record_file(self.path_for(plan_id)?)
    }

    /// Stored plan ids, sorted.
    pub fn list(&self) -> Result<Vec<String>, RecordError> {
        let entries = std::fs::read_dir(&self.dir).map_err(|source| RecordError::Io {
            path: self.dir.display().to_string(),
            source,
        })?;

        let mut ids: Vec<String> = entries
            .filter_map(|entry| entry.ok())
            .filter_map(|entry| {
                let name = entry.file_name().to_string_lossy().to_string();
                name.strip_suffix(".json").map(str::to_string)
            })
            .collect();
        ids.sort();
        Ok(ids)
    }
}

#[async_trait]
impl RecordSink for JsonFileRecordStore {
    async fn save(&self, record: &PlanRecord) -> Result<(), RecordError> {
        let path = self.path_for(&record.plan_id)?;
        let record = record.clone();
        debug!(path = %path.display(), steps = record.steps.len(), "saving plan record");

        tokio::task::spawn_blocking(move || write_record_file(&path, &record))
            .await
            .map_err(|e| RecordError::Sink(format!("record writer task failed: {e}")))?
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;
    use planflow_core::api::{StepSnapshot, StepStatus};
    use pretty_assertions::assert_eq;

    fn record(plan_id: &str) -> PlanRecord {
        PlanRecord {
            plan_id: plan_id.into(),
            created_at: Utc::now(),
            updated_at: Utc::now(),
            steps: vec![StepSnapshot {
                id: "s1".into(),
                tool: "echo".into(),
                input: Default::default(),
                reason: "say hi".into(),
                dependencies: Vec::new(),
                status: StepStatus::Completed,
                error: None,
            }],
        }
    }

    #[tokio::test]
    async fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileRecordStore::open(dir.path().join("records")).unwrap();

        store.save(&record("plan-b")).await.unwrap();
        store.save(&record("plan-a")).await.unwrap();

        assert_eq!(store.list().unwrap(), vec!["plan-a", "plan-b"]);
        assert_eq!(store.load("plan-a").unwrap().steps[0].reason, "say hi");
    }

    #[tokio::test]
    async fn save_overwrites_previous_version() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileRecordStore::open(dir.path()).unwrap();

        let mut r = record("plan-x");
        store.save(&r).await.unwrap();
        r.steps[0].status = StepStatus::Failed;
        r.steps[0].error = Some("boom".into());
        store.save(&r).await.unwrap();

        let loaded = store.load("plan-x").unwrap();
        assert_eq!(loaded.steps[0].status, StepStatus::Failed);
        assert_eq!(store.list().unwrap().len(), 1);
    }

    #[test]
    fn rejects_path_like_ids() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileRecordStore::open(dir.path()).unwrap();
        assert!(store.path_for("../escape").is_err());
        assert!(store.path_for("").is_err());
        assert!(store.path_for("plan-20240101000000-abcd1234").is_ok());
    }
}
