//! Read-modify-write against the document store.
//!
//! The token from the read is handed to the write unchanged, so a commit by
//! any other writer in between turns this write into
//! [`DiaryError::Conflict`] instead of silently replacing their change. No
//! retry happens here; the caller decides whether to run the whole cycle again.

use crate::document::DocumentAdapter;
use crate::error::DiaryError;
use crate::models::DiaryDocument;
use crate::store::VersionToken;

/// Result of a successful commit.
#[derive(Debug, Clone, PartialEq)]
pub struct Committed {
    pub document: DiaryDocument,
    pub version: VersionToken,
}

#[derive(Clone)]
pub struct ReadModifyWrite {
    adapter: DocumentAdapter,
}

impl ReadModifyWrite {
    pub fn new(adapter: DocumentAdapter) -> Self {
        Self { adapter }
    }

    pub fn adapter(&self) -> &DocumentAdapter {
        &self.adapter
    }

    /// Apply `mutation` to the current document and commit the result.
    ///
    /// If `mutation` fails (for example the entry to delete does not exist)
    /// nothing is written and its error is returned as-is.
    pub async fn mutate<F>(&self, key: &str, message: &str, mutation: F) -> Result<Committed, DiaryError>
    where
        F: FnOnce(DiaryDocument) -> Result<DiaryDocument, DiaryError>,
    {
        let (current, version) = self.adapter.read(key).await?;
        let updated = mutation(current)?;

        match self
            .adapter
            .write(key, &updated, version.as_ref(), message)
            .await
        {
            Ok(new_version) => {
                tracing::info!(
                    key = %key,
                    version = %new_version,
                    entries = updated.entries.len(),
                    checkins = updated.checkins.len(),
                    "{}",
                    message
                );
                Ok(Committed {
                    document: updated,
                    version: new_version,
                })
            }
            Err(e) => {
                if e.is_retryable() {
                    tracing::warn!(key = %key, "Concurrent write detected, caller should retry");
                } else {
                    tracing::error!(key = %key, error = %e, "Failed to commit document");
                }
                Err(e)
            }
        }
    }
}
