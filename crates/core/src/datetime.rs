//! Date handling for management inputs.
//!
//! Dates arrive as `YYYY-MM-DD HH:MM:SS` and are always interpreted as UTC.

use crate::error::{EngineError, EngineResult};
use chrono::{DateTime, NaiveDateTime, Utc};

pub const DATE_TIME_LAYOUT: &str = "%Y-%m-%d %H:%M:%S";

/// Parse a management date string as a UTC instant.
pub fn parse_utc(field: &str, value: &str) -> EngineResult<DateTime<Utc>> {
    NaiveDateTime::parse_from_str(value.trim(), DATE_TIME_LAYOUT)
        .map(|naive| naive.and_utc())
        .map_err(|e| EngineError::validation(format!("invalid lineitem {field} '{value}': {e}")))
}

/// Format a UTC instant in the management layout.
pub fn format_utc(value: &DateTime<Utc>) -> String {
    value.format(DATE_TIME_LAYOUT).to_string()
}

/// Serde adapter so records serialize dates in the same layout they were added with.
pub mod layout {
    use super::*;
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S>(value: &DateTime<Utc>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&format_utc(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<DateTime<Utc>, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        parse_utc("date", &raw).map_err(serde::de::Error::custom)
    }
}
