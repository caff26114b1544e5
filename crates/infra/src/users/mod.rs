//! `UserStore` backends.

pub mod file;
pub mod in_memory;
pub mod postgres;
#[cfg(feature = "redis")]
pub mod redis;

#[cfg(test)]
pub(crate) mod contract;

pub use file::FileUserStore;
pub use in_memory::InMemoryUserStore;
pub use postgres::PostgresUserStore;
#[cfg(feature = "redis")]
pub use self::redis::RedisUserStore;
