use std::sync::Arc;

use crate::error::StoreResult;
use crate::user::UserRecord;

/// Durable storage for user records, keyed by username.
///
/// The `UserStore` is the only place user records live; the authorizer only
/// holds transient copies returned from these calls.
///
/// ## Error Semantics
///
/// Every implementation must report:
/// - `get` of a missing user as [`crate::UserStoreError::NotFound`]
/// - `delete` of a missing user as [`crate::UserStoreError::DeleteOfMissing`]
///
/// Anything else is [`crate::UserStoreError::Storage`].
///
/// ## Concurrency
///
/// All operations may be called from concurrent requests. Implementations own
/// their locking/transaction discipline. `save` is an upsert: concurrent saves
/// of the same username resolve as last-writer-wins.
#[async_trait::async_trait]
pub trait UserStore: Send + Sync {
    /// Fetch a user by username.
    async fn get(&self, username: &str) -> StoreResult<UserRecord>;

    /// Create the record if absent, fully replace it if present.
    async fn save(&self, user: UserRecord) -> StoreResult<()>;

    /// All stored users, in no particular order.
    async fn list(&self) -> StoreResult<Vec<UserRecord>>;

    /// Remove a user by username.
    async fn delete(&self, username: &str) -> StoreResult<()>;

    /// Release backend resources. Idempotent.
    async fn close(&self);
}

#[async_trait::async_trait]
impl<S> UserStore for Arc<S>
where
    S: UserStore + ?Sized,
{
    async fn get(&self, username: &str) -> StoreResult<UserRecord> {
        (**self).get(username).await
    }

    async fn save(&self, user: UserRecord) -> StoreResult<()> {
        (**self).save(user).await
    }

    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        (**self).list().await
    }

    async fn delete(&self, username: &str) -> StoreResult<()> {
        (**self).delete(username).await
    }

    async fn close(&self) {
        (**self).close().await
    }
}
