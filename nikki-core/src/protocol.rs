use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::DiaryError;

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "action", rename_all = "snake_case")]
pub enum DiaryRequest {
    Health,
    /// Whole document, for display.
    Load,
    CheckPassword {
        password: Option<String>,
    },
    Submit {
        password: Option<String>,
        text: String,
        image_url: Option<String>,
    },
    Delete {
        password: Option<String>,
        id: String,
    },
    CheckIn {
        password: Option<String>,
        at: Option<DateTime<Utc>>,
        #[serde(default)]
        utc_offset_minutes: i32,
    },
    Avatar,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub struct DiaryResponse {
    pub status: String,
    pub data: Option<serde_json::Value>,
    pub error: Option<String>,
    /// Error kind from [`DiaryError::kind`].
    pub kind: Option<String>,
    #[serde(default)]
    pub retryable: bool,
    pub version: String,
}

impl DiaryResponse {
    pub fn ok(data: serde_json::Value) -> Self {
        Self {
            status: "ok".to_string(),
            data: Some(data),
            error: None,
            kind: None,
            retryable: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn err(msg: impl Into<String>) -> Self {
        Self {
            status: "error".to_string(),
            data: None,
            error: Some(msg.into()),
            kind: Some("other".to_string()),
            retryable: false,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    pub fn from_error(err: &DiaryError) -> Self {
        Self {
            kind: Some(err.kind().to_string()),
            retryable: err.is_retryable(),
            ..Self::err(err.to_string())
        }
    }

    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}
