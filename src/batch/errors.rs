//! # Storage Errors
//!
//! Errors surfaced by storage backends and the batching cache. They are
//! `Clone` because one failure is delivered to every caller in a batch.

use thiserror::Error;

use crate::filter::FilterError;

/// Result type for storage operations
pub type StorageResult<T> = Result<T, StorageError>;

/// Storage errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StorageError {
    /// The wrapped backend failed
    #[error("Storage backend error: {0}")]
    Backend(String),

    /// A filter handed to the backend could not be read
    #[error("{0}")]
    Filter(#[from] FilterError),

    /// A batched lookup was dropped before its flush delivered a result
    #[error("Batched lookup aborted: {0}")]
    FlushAborted(String),
}

impl StorageError {
    pub fn backend(message: impl Into<String>) -> Self {
        Self::Backend(message.into())
    }

    /// Stable error code
    pub fn code(&self) -> &'static str {
        match self {
            StorageError::Backend(_) => "AERO_STORAGE_BACKEND",
            StorageError::Filter(err) => err.code(),
            StorageError::FlushAborted(_) => "AERO_BATCH_ABORTED",
        }
    }
}
