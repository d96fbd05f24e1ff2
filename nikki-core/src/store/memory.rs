use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::Mutex;

use super::{DocumentStore, StoreError, StoredFile, VersionToken};

/// In-process store with the same conditional-write rules as the GitHub
/// backend. Versions are a per-store counter.
#[derive(Debug, Default)]
pub struct MemoryStore {
    files: Mutex<HashMap<String, (Vec<u8>, VersionToken)>>,
    next_version: Mutex<u64>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed a file without going through the version check.
    pub async fn insert(&self, key: &str, content: impl Into<Vec<u8>>) -> VersionToken {
        let version = self.bump().await;
        self.files
            .lock()
            .await
            .insert(key.to_string(), (content.into(), version.clone()));
        version
    }

    /// Number of files currently held.
    pub async fn len(&self) -> usize {
        self.files.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn bump(&self) -> VersionToken {
        let mut next = self.next_version.lock().await;
        *next += 1;
        VersionToken::new(format!("v{}", *next))
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn fetch(&self, key: &str) -> Result<Option<StoredFile>, StoreError> {
        let files = self.files.lock().await;
        Ok(files.get(key).map(|(content, version)| StoredFile {
            content: content.clone(),
            version: version.clone(),
        }))
    }

    async fn put(
        &self,
        key: &str,
        content: &[u8],
        version: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError> {
        let mut files = self.files.lock().await;
        let current = files.get(key).map(|(_, v)| v);
        if current != version {
            return Err(StoreError::Conflict {
                key: key.to_string(),
            });
        }

        let new_version = self.bump().await;
        files.insert(key.to_string(), (content.to_vec(), new_version.clone()));
        tracing::debug!(key = %key, version = %new_version, message = %message, "memory store commit");
        Ok(new_version)
    }

    fn name(&self) -> &str {
        "memory"
    }
}
