use std::path::PathBuf;

/// A key or file prefix contains characters outside `[A-Za-z0-9]`.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ValidationError {
    #[error("invalid character in key [{0}]")]
    InvalidKey(String),
    #[error("invalid character in prefix [{0}]")]
    InvalidPrefix(String),
}

/// Hard failures. Conflicts and missing keys are outcomes, not errors.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("could not remove {path}: {source}")]
    Remove {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("backend panicked during {operation}: {message}")]
    BackendPanic {
        operation: &'static str,
        message: String,
    },
    #[error("serializing worker has stopped")]
    WorkerStopped,
}

impl StoreError {
    /// True for bad input, false for storage faults.
    pub fn is_validation(&self) -> bool {
        matches!(self, Self::Validation(_))
    }
}

/// Errors loading a `StoreConfig`.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
