use std::path::{Path, PathBuf};

use super::types::{AppConfig, DEFAULT_EVENTS_OUT_PATH};

/// Get the default planflow data directory: ~/.planflow
pub fn get_planflow_data_dir() -> anyhow::Result<PathBuf> {
    let home = std::env::var("HOME")
        .or_else(|_| std::env::var("USERPROFILE"))
        .map_err(|_| anyhow::anyhow!("Cannot determine home directory"))?;
    Ok(PathBuf::from(home).join(".planflow"))
}

pub fn load_from_path(path: impl AsRef<Path>) -> anyhow::Result<AppConfig> {
    let s = std::fs::read_to_string(path.as_ref())?;
    Ok(toml::from_str::<AppConfig>(&s)?)
}

pub fn load_default() -> anyhow::Result<AppConfig> {
    // Priority 1: ~/.planflow/config.toml (highest)
    let data_dir = get_planflow_data_dir()?;
    let home_config = data_dir.join("config.toml");

    // Priority 2: ./config.toml (current directory)
    let local_config = Path::new("config.toml");

    let mut cfg = if home_config.exists() {
        load_from_path(&home_config)?
    } else if local_config.exists() {
        load_from_path(local_config)?
    } else {
        AppConfig::default()
    };

    if cfg.events_out.path == DEFAULT_EVENTS_OUT_PATH {
        let events_dir = data_dir.join("events_out");
        std::fs::create_dir_all(&events_dir)?;
        cfg.events_out.path = events_dir
            .join("plan.events.jsonl")
            .to_string_lossy()
            .to_string();
    }

    if is_unset(cfg.logging.directory.as_deref()) {
        let logs_dir = data_dir.join("logs");
        std::fs::create_dir_all(&logs_dir)?;
        cfg.logging.directory = Some(logs_dir.to_string_lossy().to_string());
    }

    if is_unset(cfg.records.directory.as_deref()) {
        let records_dir = data_dir.join("records");
        std::fs::create_dir_all(&records_dir)?;
        cfg.records.directory = Some(records_dir.to_string_lossy().to_string());
    }

    // Environment variable overrides (Priority 0: highest)
    apply_env_overrides(&mut cfg, |key| std::env::var(key).ok())?;

    Ok(cfg)
}

/// Applies `PLANFLOW_*` overrides. Blank values are ignored.
pub fn apply_env_overrides(
    cfg: &mut AppConfig,
    lookup: impl Fn(&str) -> Option<String>,
) -> anyhow::Result<()> {
    let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

    if let Some(v) = get("PLANFLOW_MAX_CONCURRENCY") {
        cfg.engine.max_concurrency = v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("PLANFLOW_MAX_CONCURRENCY={v}: {e}"))?;
    }
    if let Some(v) = get("PLANFLOW_TOOL_TIMEOUT_MS") {
        cfg.engine.tool_timeout_ms = v
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("PLANFLOW_TOOL_TIMEOUT_MS={v}: {e}"))?;
    }
    if let Some(v) = get("PLANFLOW_LOG_LEVEL") {
        cfg.logging.level = v;
    }

    Ok(())
}

fn is_unset(dir: Option<&str>) -> bool {
    dir.map(|s| s.trim().is_empty()).unwrap_or(true)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    #[test]
    fn env_overrides_apply_and_validate() {
        let env: HashMap<&str, &str> = [
            ("PLANFLOW_MAX_CONCURRENCY", "2"),
            ("PLANFLOW_TOOL_TIMEOUT_MS", " "),
            ("PLANFLOW_LOG_LEVEL", "planflow_core=debug"),
        ]
        .into_iter()
        .collect();

        let mut cfg = AppConfig::default();
        apply_env_overrides(&mut cfg, |k| env.get(k).map(|v| v.to_string())).unwrap();
        assert_eq!(cfg.engine.max_concurrency, 2);
        assert_eq!(cfg.engine.tool_timeout_ms, 60_000);
        assert_eq!(cfg.logging.level, "planflow_core=debug");

        let err = apply_env_overrides(&mut cfg, |k| {
            (k == "PLANFLOW_MAX_CONCURRENCY").then(|| "lots".to_string())
        })
        .unwrap_err();
        assert!(err.to_string().contains("PLANFLOW_MAX_CONCURRENCY"));
    }

    #[test]
    fn load_from_path_reads_toml() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[engine]\ncancel_grace_ms = 10\n").unwrap();

        let cfg = load_from_path(&path).unwrap();
        assert_eq!(cfg.engine.cancel_grace_ms, 10);
        assert_eq!(cfg.engine.max_concurrency, 4);
    }
}
