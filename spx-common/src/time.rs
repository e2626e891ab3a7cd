//! Timestamp utilities

use crate::{Error, Result};
use chrono::{DateTime, NaiveDate, Utc};

/// Get current UTC timestamp
pub fn now() -> DateTime<Utc> {
    Utc::now()
}

/// Today's date in UTC
pub fn today() -> NaiveDate {
    Utc::now().date_naive()
}

/// Parse an RFC 3339 timestamp read from a TEXT column
pub fn parse_timestamp(column: &str, raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Failed to parse {}: {}", column, e)))
}

/// Parse an optional RFC 3339 timestamp
pub fn parse_optional_timestamp(column: &str, raw: Option<String>) -> Result<Option<DateTime<Utc>>> {
    raw.map(|s| parse_timestamp(column, &s)).transpose()
}
