//! Remote content host used as the diary's database.
//!
//! A store addresses files by path and offers read-with-version plus
//! conditional replace. It knows nothing about diaries: the typed view lives
//! in [`crate::document`].

use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub mod github;
pub mod memory;

pub use github::{GitHubConfig, GitHubContentStore};
pub use memory::MemoryStore;

/// Opaque revision marker returned with every read (a blob SHA on GitHub).
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct VersionToken(String);

impl VersionToken {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for VersionToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Raw file content together with the version it was read at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredFile {
    pub content: Vec<u8>,
    pub version: VersionToken,
}

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("HTTP request failed: {0}")]
    Http(#[from] reqwest::Error),

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Version token for {key} is stale")]
    Conflict { key: String },

    #[error("{key} not found")]
    NotFound { key: String },

    #[error("Content of {key} is unavailable")]
    ContentUnavailable { key: String },

    /// The file exists at `version` but its transport encoding is broken.
    #[error("Failed to decode content of {key}: {reason}")]
    Undecodable {
        key: String,
        version: VersionToken,
        reason: String,
    },
}

/// Abstraction over the content host.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Read a file. `Ok(None)` means the file does not exist yet.
    async fn fetch(&self, key: &str) -> Result<Option<StoredFile>, StoreError>;

    /// Replace the whole file. `version` must be the token from the latest
    /// read of `key`; `None` creates the file. A stale or missing token when
    /// the file exists fails with [`StoreError::Conflict`].
    async fn put(
        &self,
        key: &str,
        content: &[u8],
        version: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, StoreError>;

    /// Backend name for logging.
    fn name(&self) -> &str;
}
