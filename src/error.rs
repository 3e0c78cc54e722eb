use thiserror::Error;

/// Invalid pipeline configuration. Always fatal, raised before any fetch.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Failed to read config file '{path}': {message}")]
    Read { path: String, message: String },

    #[error("Invalid TOML in config file: {0}")]
    Toml(String),

    #[error("Invalid predicate '{expression}': {message}")]
    Predicate { expression: String, message: String },

    #[error("Unknown rank key: {0}")]
    RankKey(String),

    #[error("Unknown schema version: {0}")]
    SchemaVersion(String),

    #[error("Invalid value for {field}: {message}")]
    Invalid { field: String, message: String },
}

impl ConfigError {
    pub fn invalid(field: &str, message: impl Into<String>) -> Self {
        ConfigError::Invalid {
            field: field.to_string(),
            message: message.into(),
        }
    }
}

/// Failure of a single registry or literature call.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FetchError {
    #[error("transient: {reason}")]
    Transient { reason: String },

    #[error("transient: call timed out")]
    Timeout,

    #[error("permanent: {reason}")]
    Permanent { reason: String },
}

impl FetchError {
    pub fn transient(reason: impl Into<String>) -> Self {
        FetchError::Transient {
            reason: reason.into(),
        }
    }

    pub fn permanent(reason: impl Into<String>) -> Self {
        FetchError::Permanent {
            reason: reason.into(),
        }
    }

    /// Transient failures are retried; permanent ones fail immediately.
    pub fn is_transient(&self) -> bool {
        matches!(self, FetchError::Transient { .. } | FetchError::Timeout)
    }
}

#[derive(Error, Debug)]
pub enum PipelineError {
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("JSON serialization failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sink error: {message}")]
    Sink { message: String },
}

pub type Result<T> = std::result::Result<T, PipelineError>;
