//! Infrastructure layer: concrete `UserStore` backends and backend selection.

pub mod config;
pub mod users;

pub use config::{BackendSpec, BackendSpecError};
pub use users::{FileUserStore, InMemoryUserStore, PostgresUserStore};
#[cfg(feature = "redis")]
pub use users::RedisUserStore;
