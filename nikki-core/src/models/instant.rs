//! Instants are written as ISO-8601 with millisecond precision (the format
//! browsers produce with `toISOString`) and read from either that string or
//! epoch milliseconds.

use chrono::{DateTime, SecondsFormat, TimeZone, Utc};
use serde::{Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
pub(crate) enum FlexibleInstant {
    Millis(i64),
    Text(String),
}

impl FlexibleInstant {
    pub(crate) fn into_datetime(self) -> Option<DateTime<Utc>> {
        match self {
            FlexibleInstant::Millis(ms) => Utc.timestamp_millis_opt(ms).single(),
            FlexibleInstant::Text(s) => parse_iso(&s),
        }
    }
}

pub(crate) fn parse_iso(s: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .ok()
        .map(|dt| dt.with_timezone(&Utc))
}

pub fn to_iso(instant: &DateTime<Utc>) -> String {
    instant.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn serialize<S: Serializer>(instant: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&to_iso(instant))
}

pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<DateTime<Utc>, D::Error> {
    FlexibleInstant::deserialize(deserializer)?
        .into_datetime()
        .ok_or_else(|| serde::de::Error::custom("expected ISO-8601 string or epoch milliseconds"))
}

/// Same as [`deserialize`] for optional fields; `null` reads as `None`.
pub fn deserialize_option<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<DateTime<Utc>>, D::Error> {
    match Option::<FlexibleInstant>::deserialize(deserializer)? {
        None => Ok(None),
        Some(raw) => raw.into_datetime().map(Some).ok_or_else(|| {
            serde::de::Error::custom("expected ISO-8601 string or epoch milliseconds")
        }),
    }
}
