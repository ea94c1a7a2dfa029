use thiserror::Error;

/// Errors raised while evaluating sources.
///
/// Only `MissingRunInput` aborts a run. Everything else is scoped to one
/// source and handled by the coordinator.
#[derive(Debug, Error)]
pub enum MonitorError {
    #[error("no profile found for source {source_id}")]
    ProfileNotFound { source_id: String },

    #[error("malformed upload record #{index} for source {source_id}: {reason}")]
    MalformedRecord {
        source_id: String,
        index: usize,
        reason: String,
    },

    #[error("{service} failed after {attempts} attempt(s): {message}")]
    ExternalServiceFailure {
        service: String,
        attempts: u32,
        message: String,
    },

    #[error("could not interpret response for source {source_id}: {message}")]
    ParseFailure { source_id: String, message: String },

    #[error("missing run input: {0}")]
    MissingRunInput(String),

    #[error("invalid configuration: {0}")]
    Config(String),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("database error: {0}")]
    Database(String),
}

impl MonitorError {
    /// Whether the coordinator should answer this error with a synthetic
    /// `AttentionRequired` report. A source without a profile is skipped
    /// instead.
    pub fn wants_synthetic_report(&self) -> bool {
        !matches!(
            self,
            MonitorError::ProfileNotFound { .. } | MonitorError::MissingRunInput(_)
        )
    }
}

impl From<rusqlite::Error> for MonitorError {
    fn from(value: rusqlite::Error) -> Self {
        MonitorError::Database(value.to_string())
    }
}

impl From<r2d2::Error> for MonitorError {
    fn from(value: r2d2::Error) -> Self {
        MonitorError::Database(value.to_string())
    }
}
