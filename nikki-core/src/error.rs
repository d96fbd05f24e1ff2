use chrono::NaiveDate;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Error, Debug)]
pub enum DiaryError {
    #[error("Unauthorized: invalid password")]
    Unauthorized,

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Entry not found: {0}")]
    EntryNotFound(String),

    #[error("Already checked in on {0}")]
    AlreadyCheckedIn(NaiveDate),

    #[error("Document {key} was modified by another writer, retry the request")]
    Conflict { key: String },

    #[error("Store error: {0}")]
    Store(StoreError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Config error: {0}")]
    Config(#[from] config::ConfigError),

    #[error("Other error: {0}")]
    Other(String),
}

impl From<StoreError> for DiaryError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Conflict { key } => DiaryError::Conflict { key },
            other => DiaryError::Store(other),
        }
    }
}

impl DiaryError {
    /// Only a stale version token is worth repeating the whole request for.
    pub fn is_retryable(&self) -> bool {
        matches!(self, DiaryError::Conflict { .. })
    }

    /// Stable machine-readable name, carried in error responses.
    pub fn kind(&self) -> &'static str {
        match self {
            DiaryError::Unauthorized => "unauthorized",
            DiaryError::InvalidRequest(_) => "invalid_request",
            DiaryError::EntryNotFound(_) => "entry_not_found",
            DiaryError::AlreadyCheckedIn(_) => "already_checked_in",
            DiaryError::Conflict { .. } => "conflict",
            DiaryError::Store(StoreError::NotFound { .. }) => "not_found",
            DiaryError::Store(StoreError::ContentUnavailable { .. }) => "content_unavailable",
            DiaryError::Store(_) => "store",
            DiaryError::Serialization(_) => "serialization",
            DiaryError::Config(_) => "config",
            DiaryError::Other(_) => "other",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn store_conflict_becomes_retryable_conflict() {
        let err: DiaryError = StoreError::Conflict {
            key: "data/summaries.json".to_string(),
        }
        .into();
        assert!(err.is_retryable());
        assert_eq!(err.kind(), "conflict");
    }

    #[test]
    fn other_store_errors_are_not_retryable() {
        let err: DiaryError = StoreError::Api {
            status: 502,
            message: "bad gateway".to_string(),
        }
        .into();
        assert!(!err.is_retryable());
        assert_eq!(err.kind(), "store");
    }
}
