use thiserror::Error;

#[derive(Debug, Error)]
pub enum StatsError {
    #[error("not initialized: run 'mstats init'")]
    NotInitialized,

    #[error("run history unavailable: {0}")]
    CollaboratorUnavailable(String),

    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("invalid timestamp '{0}': expected RFC 3339 (e.g. 2008-08-12T13:30:01Z)")]
    InvalidTimestamp(String),

    #[error("unknown alignment '{0}': expected 'oi' or 'hour'")]
    UnknownAlignment(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Yaml(#[from] serde_yaml::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type Result<T> = std::result::Result<T, StatsError>;
