//! Error handling

use thiserror::Error;

pub type GuardResult<T> = Result<T, GuardError>;

/// Failures surfaced by a `Storage` backend
#[derive(Debug, Error)]
pub enum StorageError {
    /// Blob does not fit the backend's quota
    #[error("storage capacity exceeded for '{key}': {size} bytes > {limit} bytes")]
    CapacityExceeded {
        key: String,
        size: usize,
        limit: usize,
    },

    #[error("storage IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("storage serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl StorageError {
    pub fn is_capacity(&self) -> bool {
        matches!(self, StorageError::CapacityExceeded { .. })
    }
}

/// Errors returned by the ledger, threshold store and experiment engine
#[derive(Debug, Error)]
pub enum GuardError {
    /// Bad threshold pair or malformed experiment parameters
    #[error("validation error: {0}")]
    Validation(String),

    #[error("unknown experiment: {0}")]
    UnknownExperiment(String),

    /// Ledger write dropped after the shrink-and-retry attempt also failed
    #[error("capacity error: {0}")]
    Capacity(String),

    #[error(transparent)]
    Storage(#[from] StorageError),
}

impl From<serde_json::Error> for GuardError {
    fn from(err: serde_json::Error) -> Self {
        GuardError::Storage(StorageError::Serialization(err))
    }
}
