//! Authorizer error model.

use thiserror::Error;

use turnstile_core::UserStoreError;

use crate::password::HashingError;

/// Result type returned by authorizer operations.
pub type AuthResult<T> = Result<T, AuthError>;

/// Failure of an authorizer operation.
///
/// Some of these are also explained to the end user through the flash
/// message queue; the variant itself is for the caller and for logs. In
/// particular `UserNotFound` and `PasswordMismatch` are reported to the user
/// with the same generic message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("already authenticated")]
    AlreadyAuthenticated,

    #[error("user not found")]
    UserNotFound,

    #[error("password doesn't match")]
    PasswordMismatch,

    #[error("user already exists")]
    UserAlreadyExists,

    #[error("unknown role: {0}")]
    UnknownRole(String),

    #[error("user not logged in")]
    NotLoggedIn,

    #[error("insufficient role: '{required}' required")]
    InsufficientRole { required: String },

    /// The `auth` cookie was present but could not be verified or decoded,
    /// usually because the signing key changed (server restart/rotation).
    #[error("authorization session unavailable (possible server restart)")]
    SessionUnavailable,

    #[error("delete of nonexistent user")]
    DeleteOfMissingUser,

    #[error("invalid registration: {0}")]
    InvalidRegistration(&'static str),

    #[error("store error: {0}")]
    Store(String),

    #[error(transparent)]
    Hashing(#[from] HashingError),
}

impl From<UserStoreError> for AuthError {
    fn from(err: UserStoreError) -> Self {
        match err {
            UserStoreError::NotFound(_) => Self::UserNotFound,
            UserStoreError::DeleteOfMissing(_) => Self::DeleteOfMissingUser,
            other => Self::Store(other.to_string()),
        }
    }
}

/// Construction-time configuration error.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("default role '{0}' is not defined in the role table")]
    UnknownDefaultRole(String),

    #[error("signing key must not be empty")]
    EmptySigningKey,

    #[error("role '{0}' must have a rank greater than zero")]
    InvalidRank(String),
}
