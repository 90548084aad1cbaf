//! Error taxonomy for the produced interface

use crate::normalize::DecodeError;
use crate::query::CompileError;
use crate::storage::StorageError;
use thiserror::Error;

/// Classified failure of an inventory operation.
#[derive(Debug, Error)]
pub enum AssetError {
    /// Input did not have the expected shape (client fault)
    #[error("decode error: {0}")]
    Decode(#[from] DecodeError),

    /// Filter is malformed or references unknown schema (client fault)
    #[error("compile error: {0}")]
    Compile(#[from] CompileError),

    /// Referenced entity or predicate does not exist
    #[error("{0} not found")]
    NotFound(String),

    /// Backend unavailable or returned unexpected data (transient)
    #[error("store error: {0}")]
    Store(#[from] StorageError),

    /// Failure inside a background sync task; only ever logged and counted
    #[error("async processing error: {0}")]
    AsyncProcessing(String),
}

/// Result type for inventory operations
pub type AssetResult<T> = Result<T, AssetError>;

impl AssetError {
    pub fn invalid(message: impl Into<String>) -> Self {
        AssetError::Decode(DecodeError::Invalid(message.into()))
    }

    /// HTTP-like status a transport should report for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            AssetError::Decode(_) | AssetError::Compile(_) => 400,
            AssetError::NotFound(_) => 404,
            AssetError::Store(_) | AssetError::AsyncProcessing(_) => 500,
        }
    }

    /// Whether a caller may reasonably retry the same request.
    pub fn is_retryable(&self) -> bool {
        matches!(self, AssetError::Store(_))
    }

    /// Short machine-readable category
    pub fn category(&self) -> &'static str {
        match self {
            AssetError::Decode(_) => "decode",
            AssetError::Compile(_) => "compile",
            AssetError::NotFound(_) => "not_found",
            AssetError::Store(_) => "store",
            AssetError::AsyncProcessing(_) => "async_processing",
        }
    }
}
