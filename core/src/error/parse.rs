use thiserror::Error;

/// Plan text that survived none of the recovery stages.
///
/// `cleaned` is the best-effort text produced by the last stage attempted,
/// `source` the parse error raised against it.
#[derive(Error, Debug)]
#[error("plan text could not be recovered: {source}")]
pub struct PlanParseError {
    pub original: String,
    pub cleaned: String,
    #[source]
    pub source: serde_json::Error,
}

impl PlanParseError {
    pub fn new(original: &str, cleaned: String, source: serde_json::Error) -> Self {
        Self {
            original: original.to_string(),
            cleaned,
            source,
        }
    }
}
