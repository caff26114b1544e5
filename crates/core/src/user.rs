//! User record model.

use serde::{Deserialize, Serialize};

/// A single stored user.
///
/// # Invariants
/// - `username` is the unique storage key and never changes once saved.
/// - `password_hash` is only ever produced by a password hasher inside the
///   authorizer; callers registering a user leave it empty.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct UserRecord {
    pub username: String,
    pub email: String,
    #[serde(default)]
    pub password_hash: Vec<u8>,
    #[serde(default)]
    pub role: String,
}

impl UserRecord {
    /// Create a record with no hash and no explicit role.
    pub fn new(username: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            ..Default::default()
        }
    }

    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.role = role.into();
        self
    }

    pub fn has_password(&self) -> bool {
        !self.password_hash.is_empty()
    }
}

// Hashes stay out of logs.
impl core::fmt::Debug for UserRecord {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserRecord")
            .field("username", &self.username)
            .field("email", &self.email)
            .field("password_hash", &"<redacted>")
            .field("role", &self.role)
            .finish()
    }
}
