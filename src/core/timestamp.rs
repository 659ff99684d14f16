//! Timestamp formatting and parsing
//!
//! Persisted records always carry an RFC 3339 timestamp with an explicit
//! offset. Console output can use a shorter display format.

use chrono::{DateTime, FixedOffset, NaiveDateTime, SecondsFormat, Utc};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

/// Display format for human-facing timestamps
///
/// # Examples
///
/// ```
/// use tiered_log_pipeline::core::TimestampFormat;
/// use chrono::Utc;
///
/// let format = TimestampFormat::Iso8601;
/// let timestamp = format.format(&Utc::now().fixed_offset());
/// assert!(timestamp.ends_with('Z'));
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TimestampFormat {
    /// ISO 8601 in UTC with milliseconds: `2025-01-08T10:30:45.123Z`
    #[default]
    Iso8601,

    /// RFC 3339 keeping the record's offset: `2025-01-08T10:30:45.123456+00:00`
    Rfc3339,

    /// Time of day only: `10:30:45.123`, handy for interactive consoles
    TimeOnly,

    /// Custom strftime format
    Custom(String),
}

impl TimestampFormat {
    #[must_use]
    pub fn format(&self, datetime: &DateTime<FixedOffset>) -> String {
        match self {
            TimestampFormat::Iso8601 => datetime
                .with_timezone(&Utc)
                .format("%Y-%m-%dT%H:%M:%S%.3fZ")
                .to_string(),
            TimestampFormat::Rfc3339 => datetime.to_rfc3339_opts(SecondsFormat::AutoSi, false),
            TimestampFormat::TimeOnly => datetime.format("%H:%M:%S%.3f").to_string(),
            TimestampFormat::Custom(format_str) => datetime.format(format_str).to_string(),
        }
    }
}

/// Legacy layout written by formatters without an explicit date format
const LEGACY_LAYOUT: &str = "%Y-%m-%d %H:%M:%S,%3f";

/// Parse a persisted timestamp
///
/// Accepts RFC 3339 with offset, and the legacy `YYYY-MM-DD HH:MM:SS,mmm`
/// layout which is read as UTC.
pub fn parse_record_timestamp(raw: &str) -> Option<DateTime<FixedOffset>> {
    let raw = raw.trim();
    if let Ok(parsed) = DateTime::parse_from_rfc3339(raw) {
        return Some(parsed);
    }
    NaiveDateTime::parse_from_str(raw, LEGACY_LAYOUT)
        .ok()
        .map(|naive| naive.and_utc().fixed_offset())
}

/// Serde adapter used by `PersistedRecord::timestamp`
pub(crate) mod record_timestamp {
    use super::*;

    pub fn serialize<S: Serializer>(
        value: &DateTime<FixedOffset>,
        serializer: S,
    ) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&value.to_rfc3339_opts(SecondsFormat::AutoSi, false))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<DateTime<FixedOffset>, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_record_timestamp(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid timestamp '{}'", raw)))
    }
}
