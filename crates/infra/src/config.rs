//! Backend selection from a single connection string.
//!
//! | Value | Backend |
//! |------|---------|
//! | `memory` | [`InMemoryUserStore`] |
//! | `file:<path>` | [`FileUserStore`] (file must exist) |
//! | `postgres:<url>` / `postgres://...` | [`PostgresUserStore`] |
//! | `redis:<url>` / `redis://...` | `RedisUserStore` (feature `redis`) |

use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;
use std::sync::Arc;

use thiserror::Error;

use turnstile_core::{StoreResult, UserStore};

use crate::users::{FileUserStore, InMemoryUserStore, PostgresUserStore};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendSpec {
    Memory,
    File(PathBuf),
    Postgres(String),
    Redis(String),
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("unrecognised backend '{0}' (expected memory, file:<path>, postgres:<url> or redis:<url>)")]
pub struct BackendSpecError(String);

impl FromStr for BackendSpec {
    type Err = BackendSpecError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        if s.eq_ignore_ascii_case("memory") {
            return Ok(Self::Memory);
        }
        if s.starts_with("postgres://") || s.starts_with("postgresql://") {
            return Ok(Self::Postgres(s.to_string()));
        }
        if s.starts_with("redis://") || s.starts_with("rediss://") {
            return Ok(Self::Redis(s.to_string()));
        }
        match s.split_once(':') {
            Some(("file", path)) if !path.is_empty() => Ok(Self::File(PathBuf::from(path))),
            Some(("postgres", url)) if !url.is_empty() => Ok(Self::Postgres(url.to_string())),
            Some(("redis", url)) if !url.is_empty() => Ok(Self::Redis(url.to_string())),
            _ => Err(BackendSpecError(s.to_string())),
        }
    }
}

impl fmt::Display for BackendSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        // URLs may carry credentials; only the kind and path are shown.
        match self {
            Self::Memory => f.write_str("memory"),
            Self::File(path) => write!(f, "file:{}", path.display()),
            Self::Postgres(_) => f.write_str("postgres"),
            Self::Redis(_) => f.write_str("redis"),
        }
    }
}

impl BackendSpec {
    /// Open the selected backend.
    pub async fn open(&self) -> StoreResult<Arc<dyn UserStore>> {
        tracing::info!(backend = %self, "opening user store");
        match self {
            Self::Memory => Ok(Arc::new(InMemoryUserStore::new())),
            Self::File(path) => Ok(Arc::new(FileUserStore::open(path).await?)),
            Self::Postgres(url) => Ok(Arc::new(PostgresUserStore::connect(url).await?)),
            #[cfg(feature = "redis")]
            Self::Redis(url) => Ok(Arc::new(crate::users::RedisUserStore::connect(url).await?)),
            #[cfg(not(feature = "redis"))]
            Self::Redis(_) => Err(turnstile_core::UserStoreError::MissingBackend(
                "redis support not compiled in (enable the `redis` feature)".to_string(),
            )),
        }
    }
}
