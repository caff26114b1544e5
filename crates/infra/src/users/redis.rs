//! Redis-backed user store (feature `redis`).
//!
//! All users are mirrored in memory and written back as a single JSON blob
//! under one key on every change, the way a simple key-value backend would.

use std::collections::BTreeMap;

use redis::aio::MultiplexedConnection;
use tokio::sync::Mutex;
use tracing::{debug, instrument};

use turnstile_core::{StoreResult, UserRecord, UserStore, UserStoreError};

/// Default key holding the user table.
pub const USERDATA_KEY: &str = "turnstile::userdata";

pub struct RedisUserStore {
    conn: MultiplexedConnection,
    key: String,
    users: Mutex<BTreeMap<String, UserRecord>>,
}

impl std::fmt::Debug for RedisUserStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisUserStore")
            .field("key", &self.key)
            .finish_non_exhaustive()
    }
}

fn map_redis_error(operation: &str, err: redis::RedisError) -> UserStoreError {
    UserStoreError::storage(format!("redis error in {operation}: {err}"))
}

impl RedisUserStore {
    /// Connect and load the user table stored under [`USERDATA_KEY`].
    pub async fn connect(redis_url: impl AsRef<str>) -> StoreResult<Self> {
        Self::connect_with_key(redis_url, USERDATA_KEY).await
    }

    #[instrument(skip_all, fields(key = %key.as_ref()), err)]
    pub async fn connect_with_key(
        redis_url: impl AsRef<str>,
        key: impl AsRef<str>,
    ) -> StoreResult<Self> {
        let client = redis::Client::open(redis_url.as_ref())
            .map_err(|e| map_redis_error("open", e))?;
        let mut conn = client
            .get_multiplexed_async_connection()
            .await
            .map_err(|e| map_redis_error("connect", e))?;

        let key = key.as_ref().to_string();
        let raw: Option<Vec<u8>> = redis::cmd("GET")
            .arg(&key)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("load", e))?;

        let users = match raw {
            None => BTreeMap::new(),
            Some(bytes) => serde_json::from_slice(&bytes).map_err(|e| {
                UserStoreError::storage(format!("decode user table under {key}: {e}"))
            })?,
        };
        debug!(count = users.len(), "loaded user table");

        Ok(Self {
            conn,
            key,
            users: Mutex::new(users),
        })
    }

    async fn flush(&self, users: &BTreeMap<String, UserRecord>) -> StoreResult<()> {
        let json = serde_json::to_vec(users)
            .map_err(|e| UserStoreError::storage(format!("encode user table: {e}")))?;
        let mut conn = self.conn.clone();
        let _: () = redis::cmd("SET")
            .arg(&self.key)
            .arg(json)
            .query_async(&mut conn)
            .await
            .map_err(|e| map_redis_error("store", e))?;
        Ok(())
    }
}

#[async_trait::async_trait]
impl UserStore for RedisUserStore {
    async fn get(&self, username: &str) -> StoreResult<UserRecord> {
        self.users
            .lock()
            .await
            .get(username)
            .cloned()
            .ok_or_else(|| UserStoreError::NotFound(username.to_string()))
    }

    async fn save(&self, user: UserRecord) -> StoreResult<()> {
        let mut users = self.users.lock().await;
        let username = user.username.clone();
        let previous = users.insert(username.clone(), user);
        if let Err(err) = self.flush(&users).await {
            match previous {
                Some(previous) => users.insert(username, previous),
                None => users.remove(&username),
            };
            return Err(err);
        }
        Ok(())
    }

    async fn list(&self) -> StoreResult<Vec<UserRecord>> {
        Ok(self.users.lock().await.values().cloned().collect())
    }

    async fn delete(&self, username: &str) -> StoreResult<()> {
        let mut users = self.users.lock().await;
        let Some(previous) = users.remove(username) else {
            return Err(UserStoreError::DeleteOfMissing(username.to_string()));
        };
        if let Err(err) = self.flush(&users).await {
            users.insert(username.to_string(), previous);
            return Err(err);
        }
        Ok(())
    }

    async fn close(&self) {}
}
