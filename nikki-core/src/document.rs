//! Typed view of the diary file on top of a [`DocumentStore`].

use std::sync::Arc;

use crate::error::DiaryError;
use crate::models::DiaryDocument;
use crate::store::{DocumentStore, StoreError, VersionToken};

#[derive(Clone)]
pub struct DocumentAdapter {
    store: Arc<dyn DocumentStore>,
}

impl DocumentAdapter {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn DocumentStore> {
        &self.store
    }

    /// Current document and the token to write it back with.
    ///
    /// A missing file is an empty document with no token. A file that does
    /// not parse, or whose transport encoding is broken, is also an empty
    /// document, but keeps its token so the next write replaces the broken
    /// content in place. Individual bad records are dropped by
    /// [`DiaryDocument::from_slice`] without touching the rest.
    pub async fn read(&self, key: &str) -> Result<(DiaryDocument, Option<VersionToken>), DiaryError> {
        let file = match self.store.fetch(key).await {
            Ok(Some(file)) => file,
            Ok(None) => {
                tracing::debug!(key = %key, store = self.store.name(), "Document does not exist yet");
                return Ok((DiaryDocument::default(), None));
            }
            Err(StoreError::Undecodable { version, reason, .. }) => {
                tracing::warn!(
                    key = %key,
                    version = %version,
                    error = %reason,
                    "Document content is undecodable, treating it as empty"
                );
                return Ok((DiaryDocument::default(), Some(version)));
            }
            Err(e) => return Err(e.into()),
        };

        let document = match DiaryDocument::from_slice(&file.content) {
            Ok(doc) => doc,
            Err(e) => {
                tracing::warn!(
                    key = %key,
                    version = %file.version,
                    error = %e,
                    "Document is corrupt, treating it as empty"
                );
                DiaryDocument::default()
            }
        };

        Ok((document, Some(file.version)))
    }

    /// Replace the whole document, conditioned on `version`.
    pub async fn write(
        &self,
        key: &str,
        document: &DiaryDocument,
        version: Option<&VersionToken>,
        message: &str,
    ) -> Result<VersionToken, DiaryError> {
        let bytes = document.to_vec()?;
        let new_version = self.store.put(key, &bytes, version, message).await?;
        Ok(new_version)
    }
}
