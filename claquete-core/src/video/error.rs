use std::path::PathBuf;

use thiserror::Error;

use super::models::ProcessingStatus;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to open videos database {path}: {source}")]
    Open {
        source: rusqlite::Error,
        path: PathBuf,
    },
    #[error("failed to execute statement on videos database: {0}")]
    Execute(#[from] rusqlite::Error),
    #[error("videos database path not configured")]
    MissingStore,
    #[error("invalid processing status: {0}")]
    InvalidStatus(String),
    #[error("video not found: {0}")]
    NotFound(String),
    #[error("status cannot move from {from} to {to}")]
    InvalidTransition {
        from: ProcessingStatus,
        to: ProcessingStatus,
    },
}

pub type StoreResult<T> = Result<T, StoreError>;
