//! Storage error model.

use thiserror::Error;

/// Result type returned by every [`crate::UserStore`] operation.
pub type StoreResult<T> = Result<T, UserStoreError>;

/// Error returned by user storage backends.
///
/// Every backend must report the two "missing" conditions with the dedicated
/// variants so callers can rely on them regardless of the storage in use.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum UserStoreError {
    /// `get` found no record for the username.
    #[error("user not found: {0}")]
    NotFound(String),

    /// `delete` was asked to remove a record that does not exist.
    #[error("delete of nonexistent user: {0}")]
    DeleteOfMissing(String),

    /// The backing file/database the store points at does not exist.
    #[error("missing backend: {0}")]
    MissingBackend(String),

    /// Any other backend failure (I/O, driver, serialization).
    #[error("storage error: {0}")]
    Storage(String),
}

impl UserStoreError {
    pub fn storage(msg: impl Into<String>) -> Self {
        Self::Storage(msg.into())
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
