//! Password hashing.
//!
//! Hashes bind the username: the material fed to the KDF is the username's
//! byte length (u32, big-endian), the username, then the password. A stored
//! hash cannot be replayed for another account even when two users share a
//! password, and no two distinct pairs produce the same material.

use argon2::password_hash::SaltString;
use argon2::{
    Algorithm, Argon2, Params, PasswordHash, PasswordHasher as _, PasswordVerifier as _, Version,
};
use rand::Rng;
use thiserror::Error;

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("password hashing failed: {0}")]
pub struct HashingError(String);

impl HashingError {
    pub fn new(msg: impl Into<String>) -> Self {
        Self(msg.into())
    }
}

/// One-way, salted, deliberately slow credential hashing.
pub trait PasswordHasher: Send + Sync {
    /// Hash the credential pair into an opaque, self-describing byte string.
    fn hash(&self, username: &str, password: &str) -> Result<Vec<u8>, HashingError>;

    /// Whether `stored` was produced from exactly this pair. Malformed input
    /// yields `false`.
    fn verify(&self, stored: &[u8], username: &str, password: &str) -> bool;
}

/// Argon2id hasher producing PHC strings.
#[derive(Debug, Clone, Default)]
pub struct Argon2Hasher {
    params: Params,
}

impl Argon2Hasher {
    pub fn new(params: Params) -> Self {
        Self { params }
    }

    /// Explicit cost parameters (memory KiB, iterations, lanes).
    pub fn with_cost(m_cost: u32, t_cost: u32, p_cost: u32) -> Result<Self, HashingError> {
        let params = Params::new(m_cost, t_cost, p_cost, None)
            .map_err(|e| HashingError::new(e.to_string()))?;
        Ok(Self::new(params))
    }

    fn engine(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }
}

impl PasswordHasher for Argon2Hasher {
    fn hash(&self, username: &str, password: &str) -> Result<Vec<u8>, HashingError> {
        let salt = salt()?;
        let phc = self
            .engine()
            .hash_password(&material(username, password), &salt)
            .map_err(|e| HashingError::new(e.to_string()))?;
        Ok(phc.to_string().into_bytes())
    }

    fn verify(&self, stored: &[u8], username: &str, password: &str) -> bool {
        let Ok(encoded) = std::str::from_utf8(stored) else {
            return false;
        };
        let Ok(parsed) = PasswordHash::new(encoded) else {
            return false;
        };
        // Cost parameters come from the PHC string, not from `self`.
        self.engine()
            .verify_password(&material(username, password), &parsed)
            .is_ok()
    }
}

/// Well-formed PHC string at the default cost that matches no password. Login
/// verifies against it for unknown usernames.
pub(crate) const DECOY_HASH: &[u8] =
    b"$argon2id$v=19$m=19456,t=2,p=1$dHVybnN0aWxlLWRlY295IQ$AAECAwQFBgcICQoLDA0ODxAREhMUFRYXGBkaGxwdHh8";

fn material(username: &str, password: &str) -> Vec<u8> {
    let mut bytes = Vec::with_capacity(4 + username.len() + password.len());
    bytes.extend_from_slice(&(username.len() as u32).to_be_bytes());
    bytes.extend_from_slice(username.as_bytes());
    bytes.extend_from_slice(password.as_bytes());
    bytes
}

fn salt() -> Result<SaltString, HashingError> {
    let mut bytes = [0u8; 16];
    rand::rng().fill(&mut bytes);
    SaltString::encode_b64(&bytes).map_err(|e| HashingError::new(e.to_string()))
}
