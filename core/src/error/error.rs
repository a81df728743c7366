use thiserror::Error;

use super::executor::EngineError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("plan rejected: {0}")]
    Engine(#[from] EngineError),
    #[error("record error: {0}")]
    Record(#[from] RecordError),
    #[error("command failed: {0}")]
    Command(String),
    #[error("config error: {0}")]
    Config(String),
    #[error("io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("anyhow error: {0}")]
    Anyhow(#[from] anyhow::Error),
}

/// Failures while persisting or reading plan records.
#[derive(Error, Debug)]
pub enum RecordError {
    #[error("record io error on {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("record serde error ({context}): {source}")]
    Serde {
        context: &'static str,
        source: serde_json::Error,
    },
    #[error("record sink error: {0}")]
    Sink(String),
}
