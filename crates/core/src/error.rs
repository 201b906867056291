//! Store error model.

use thiserror::Error;

use crate::id::JobId;

/// Result type used across the store layer.
pub type StoreResult<T> = Result<T, StoreError>;

/// Error returned by store operations.
///
/// A backend's own "no rows" signal is translated to [`StoreError::NotFound`]
/// uniformly across all operations. Every other backend failure is carried in
/// [`StoreError::Storage`] untranslated, so callers can reach the original
/// cause through `std::error::Error::source` or by downcasting.
///
/// The store never retries internally; retry policy belongs to the caller.
#[derive(Debug, Error)]
pub enum StoreError {
    /// No record matched: lookup/update/delete on an unknown id, or a
    /// selection query over an empty Waiting set.
    #[error("job not found")]
    NotFound,

    /// A record with the same id already exists.
    #[error("job already exists: {0}")]
    Conflict(JobId),

    /// Job arguments could not be serialized or deserialized.
    #[error("argument encoding failed: {0}")]
    Encoding(#[from] serde_json::Error),

    /// Any other backend failure, passed through without translation.
    #[error("storage error: {0}")]
    Storage(#[source] Box<dyn std::error::Error + Send + Sync>),
}

impl StoreError {
    /// Wrap a backend error without translating it.
    pub fn storage(err: impl std::error::Error + Send + Sync + 'static) -> Self {
        Self::Storage(Box::new(err))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound)
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
