//! Core error types for vouch

use crate::store::StoreError;
use thiserror::Error;

/// Main error type for vouch operations
#[derive(Error, Debug)]
pub enum VouchError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(String),

    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Invalid hash: {0}")]
    InvalidHash(String),

    #[error("Invalid store path: {0}")]
    InvalidStorePath(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Other error: {0}")]
    Other(String),
}

/// Result type alias for vouch operations
pub type VouchResult<T> = Result<T, VouchError>;

impl From<serde_json::Error> for VouchError {
    fn from(err: serde_json::Error) -> Self {
        VouchError::Serialization(err.to_string())
    }
}

impl From<rayon::ThreadPoolBuildError> for VouchError {
    fn from(err: rayon::ThreadPoolBuildError) -> Self {
        VouchError::ThreadPool(err.to_string())
    }
}

impl VouchError {
    /// Process exit code for this error.
    ///
    /// Codes 0-7 are reserved for verification outcomes, so every error maps
    /// outside that range.
    pub fn exit_code(&self) -> i32 {
        match self {
            VouchError::Configuration(_)
            | VouchError::InvalidKey(_)
            | VouchError::InvalidStorePath(_)
            | VouchError::InvalidHash(_) => 9,
            VouchError::Io(_) => 10,
            VouchError::Store(_) => 11,
            VouchError::Cancelled => 130,
            _ => 8,
        }
    }
}
