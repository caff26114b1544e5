use std::collections::HashMap;
use std::sync::RwLock;

use turnstile_core::{StoreResult, UserRecord, UserStore, UserStoreError};

/// In-memory user store.
///
/// Intended for tests/dev. Nothing survives the process.
#[derive(Debug, Default)]
pub struct InMemoryUserStore {
    users: RwLock<HashMap<String, UserRecord>>,
}

impl InMemoryUserStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_users(users: impl IntoIterator<Item = UserRecord>) -> Self {
        let users = users
            .into_iter()
            .map(|user| (user.username.clone(), user))
            .collect();
        Self {
            users: RwLock::new(users),
        }
    }
}

fn poisoned() -> UserStoreError {
    UserStoreError::storage("lock poisoned")
}

#[async_trait::async_trait]
impl UserStore for InMemoryUserStore {
    async fn get(&self, username: &str) -> StoreResult<UserRecord> {
        let users = self.users.read().map_err(|_| poisoned())?;
        users
            .get(username)
            .cloned()
            .ok_or_else(|| UserStoreError::NotFound(username.to_string()))
    }

    async fn save(&self, user: UserRecord) -> StoreResult<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        users.insert(user.username.clone(), user);
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        let users = self.users.read().map_err(|_| poisoned())?;
        Ok(users.values().cloned().collect())
    }

    async fn delete(&self, username: &str) -> StoreResult<()> {
        let mut users = self.users.write().map_err(|_| poisoned())?;
        users
            .remove(username)
            .map(|_| ())
            .ok_or_else(|| UserStoreError::DeleteOfMissing(username.to_string()))
    }

    async fn close(&self) {}
}
