//! `turnstile-core`: user records and the storage boundary.
//!
//! This crate contains no HTTP, cookie or crypto concerns. Backends implement
//! [`UserStore`]; the authorizer consumes it.

pub mod error;
pub mod store;
pub mod user;

pub use error::{StoreResult, UserStoreError};
pub use store::UserStore;
pub use user::UserRecord;
