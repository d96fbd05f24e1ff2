use chrono::{DateTime, Duration, FixedOffset, NaiveDate, Utc};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use super::entry::DiaryEntry;
use super::instant;
use crate::error::DiaryError;

/// A daily check-in instant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CheckIn(#[serde(with = "instant")] pub DateTime<Utc>);

impl CheckIn {
    /// Calendar day of this check-in for a client `offset_minutes` east of UTC.
    pub fn local_date(&self, offset_minutes: i32) -> NaiveDate {
        (self.0 + Duration::minutes(i64::from(offset_minutes))).date_naive()
    }
}

/// The persisted root object: entries newest-first plus check-ins in the
/// order they were recorded.
///
/// Reading also accepts the older bare-array layout and promotes it to
/// `{entries: [...], checkins: []}`; writing always produces the object form.
/// Only the outer shape has to be right: a single entry or check-in that
/// cannot be read is dropped with a warning and the rest are kept.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "DocumentShape")]
pub struct DiaryDocument {
    pub entries: Vec<DiaryEntry>,
    pub checkins: Vec<CheckIn>,
}

#[derive(Deserialize)]
#[serde(untagged)]
enum DocumentShape {
    Legacy(Vec<Value>),
    Composite {
        #[serde(default)]
        entries: Vec<Value>,
        #[serde(default)]
        checkins: Vec<Value>,
    },
}

impl From<DocumentShape> for DiaryDocument {
    fn from(shape: DocumentShape) -> Self {
        let (entries, checkins) = match shape {
            DocumentShape::Legacy(entries) => (entries, Vec::new()),
            DocumentShape::Composite { entries, checkins } => (entries, checkins),
        };
        Self {
            entries: keep_readable(entries, "entry"),
            checkins: keep_readable(checkins, "check-in"),
        }
    }
}

fn keep_readable<T: DeserializeOwned>(values: Vec<Value>, what: &str) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(item) => Some(item),
            Err(e) => {
                tracing::warn!(index, error = %e, "Skipping unreadable {}", what);
                None
            }
        })
        .collect()
}

impl DiaryDocument {
    pub fn from_slice(bytes: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(bytes)
    }

    /// Pretty-printed with two-space indentation so commits diff cleanly.
    pub fn to_vec(&self) -> Result<Vec<u8>, serde_json::Error> {
        serde_json::to_vec_pretty(self)
    }

    /// Prepend `entry`.
    pub fn with_entry(mut self, entry: DiaryEntry) -> Self {
        self.entries.insert(0, entry);
        self
    }

    /// Drop the entry keyed `id`, keeping the order of the rest.
    pub fn without_entry(mut self, id: &str) -> Result<Self, DiaryError> {
        let before = self.entries.len();
        self.entries.retain(|e| e.id != id);
        if self.entries.len() == before {
            return Err(DiaryError::EntryNotFound(id.to_string()));
        }
        Ok(self)
    }

    pub fn has_checked_in_on(&self, day: NaiveDate, offset_minutes: i32) -> bool {
        self.checkins
            .iter()
            .any(|c| c.local_date(offset_minutes) == day)
    }

    /// Record a check-in unless the client already has one for that local day.
    pub fn with_checkin(mut self, at: DateTime<Utc>, offset_minutes: i32) -> Result<Self, DiaryError> {
        let checkin = CheckIn(at);
        let day = checkin.local_date(offset_minutes);
        if self.has_checked_in_on(day, offset_minutes) {
            return Err(DiaryError::AlreadyCheckedIn(day));
        }
        self.checkins.push(checkin);
        Ok(self)
    }
}

/// Validate a client-supplied UTC offset (minutes east of UTC).
pub fn offset_in_range(offset_minutes: i32) -> bool {
    FixedOffset::east_opt(offset_minutes.saturating_mul(60)).is_some()
}
