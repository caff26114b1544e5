//! Flat-file user store.
//!
//! The whole table lives in memory and is rewritten to disk as one JSON
//! snapshot on every change. Suitable for small deployments and demos.

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tokio::sync::Mutex;
use tracing::{debug, instrument};

use turnstile_core::{StoreResult, UserRecord, UserStore, UserStoreError};

#[derive(Debug)]
pub struct FileUserStore {
    path: PathBuf,
    users: Mutex<BTreeMap<String, UserRecord>>,
}

impl FileUserStore {
    /// Open an existing snapshot. The file must already exist; an empty file
    /// is an empty store.
    #[instrument(skip_all, fields(path = %path.as_ref().display()), err)]
    pub async fn open(path: impl AsRef<Path>) -> StoreResult<Self> {
        let path = path.as_ref().to_path_buf();
        let bytes = match tokio::fs::read(&path).await {
            Ok(bytes) => bytes,
            Err(err) if err.kind() == ErrorKind::NotFound => {
                return Err(UserStoreError::MissingBackend(path.display().to_string()));
            }
            Err(err) => {
                return Err(UserStoreError::storage(format!(
                    "read {}: {err}",
                    path.display()
                )));
            }
        };

        let users = if bytes.iter().all(u8::is_ascii_whitespace) {
            BTreeMap::new()
        } else {
            let records: Vec<UserRecord> = serde_json::from_slice(&bytes).map_err(|e| {
                UserStoreError::storage(format!("parse {}: {e}", path.display()))
            })?;
            records
                .into_iter()
                .map(|user| (user.username.clone(), user))
                .collect()
        };
        debug!(count = users.len(), "loaded user snapshot");

        Ok(Self {
            path,
            users: Mutex::new(users),
        })
    }

    /// Write the snapshot beside the target, then rename over it, so readers
    /// never observe a half-written file.
    async fn flush(&self, users: &BTreeMap<String, UserRecord>) -> StoreResult<()> {
        let records: Vec<&UserRecord> = users.values().collect();
        let json = serde_json::to_vec_pretty(&records)
            .map_err(|e| UserStoreError::storage(format!("encode snapshot: {e}")))?;

        let file_name = self
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| "users".to_string());
        let tmp = self.path.with_file_name(format!(".{file_name}.tmp"));

        tokio::fs::write(&tmp, &json)
            .await
            .map_err(|e| UserStoreError::storage(format!("write {}: {e}", tmp.display())))?;
        tokio::fs::rename(&tmp, &self.path).await.map_err(|e| {
            UserStoreError::storage(format!("replace {}: {e}", self.path.display()))
        })
    }
}

#[async_trait::async_trait]
impl UserStore for FileUserStore {
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
