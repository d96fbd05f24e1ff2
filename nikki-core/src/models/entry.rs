use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::instant::{self, FlexibleInstant};

/// One diary entry. Entries are created once and only ever removed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawEntry")]
pub struct DiaryEntry {
    /// Unique key used for deletion.
    pub id: String,
    #[serde(with = "instant")]
    pub timestamp: DateTime<Utc>,
    pub text: String,
    #[serde(rename = "imageUrl", skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gemini_response: Option<String>,
}

impl DiaryEntry {
    /// A fresh entry with a server-assigned id.
    pub fn new(text: impl Into<String>, image_url: Option<String>, timestamp: DateTime<Utc>) -> Self {
        Self {
            id: Uuid::new_v4().to_string(),
            timestamp,
            text: text.into(),
            image_url,
            gemini_response: None,
        }
    }

    pub fn with_commentary(mut self, commentary: Option<String>) -> Self {
        self.gemini_response = commentary;
        self
    }
}

/// Every field any generation of the document has used for an entry.
///
/// Old entries look like `{date: ISO, summary, gemini_response}` and are keyed
/// by `date`. Browser-written entries look like
/// `{id, text, imageUrl, date: "3/9", timestamp: <ms>}`.
#[derive(Deserialize)]
struct RawEntry {
    id: Option<String>,
    timestamp: Option<FlexibleInstant>,
    date: Option<String>,
    text: Option<String>,
    summary: Option<String>,
    #[serde(rename = "imageUrl")]
    image_url: Option<String>,
    #[serde(alias = "annotation")]
    gemini_response: Option<String>,
}

impl TryFrom<RawEntry> for DiaryEntry {
    type Error = String;

    fn try_from(raw: RawEntry) -> Result<Self, Self::Error> {
        let timestamp = raw
            .timestamp
            .and_then(FlexibleInstant::into_datetime)
            .or_else(|| raw.date.as_deref().and_then(instant::parse_iso))
            .ok_or("entry has neither a timestamp nor an ISO date")?;

        let id = raw
            .id
            .filter(|id| !id.is_empty())
            .or(raw.date)
            .unwrap_or_else(|| instant::to_iso(&timestamp));

        Ok(Self {
            id,
            timestamp,
            text: raw.text.or(raw.summary).unwrap_or_default(),
            image_url: raw.image_url.filter(|u| !u.is_empty()),
            gemini_response: raw.gemini_response,
        })
    }
}
