//! Epoch label parsing.
//!
//! Flux tables label each epoch column with an observation timestamp string, and
//! the database `epochs` table carries a free-form `date`. Both are turned into
//! [`NaiveDateTime`] values through the [`TimeParser`] trait so callers can choose
//! between the strict survey format and a more forgiving parser.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use thiserror::Error;

/// Timestamp format written by the survey pipeline into flux table epoch columns
pub const DEFAULT_EPOCH_FORMAT: &str = "%Y-%m-%dT%H:%M:%S";

/// A label that could not be turned into a timestamp
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("'{label}' does not match {expected}")]
pub struct TimeParseError {
    pub label: String,
    pub expected: String,
}

/// Capability: parse an epoch label into a timestamp
pub trait TimeParser: Send + Sync {
    fn parse(&self, label: &str) -> Result<NaiveDateTime, TimeParseError>;
}

/// Strict parser for a single strftime-style format
#[derive(Debug, Clone)]
pub struct FixedFormatParser {
    format: String,
}

impl FixedFormatParser {
    pub fn new(format: impl Into<String>) -> Self {
        Self {
            format: format.into(),
        }
    }

    pub fn format(&self) -> &str {
        &self.format
    }
}

impl Default for FixedFormatParser {
    fn default() -> Self {
        Self::new(DEFAULT_EPOCH_FORMAT)
    }
}

impl TimeParser for FixedFormatParser {
    fn parse(&self, label: &str) -> Result<NaiveDateTime, TimeParseError> {
        NaiveDateTime::parse_from_str(label.trim(), &self.format).map_err(|_| TimeParseError {
            label: label.to_string(),
            expected: format!("format {}", self.format),
        })
    }
}

/// Accepts the ISO-8601 variants that show up in hand-built epoch tables.
///
/// Tried in order: RFC 3339 with offset (converted to UTC), date-time with `T`
/// or space separator and optional fractional seconds, then a bare date at midnight.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlexibleParser;

const FLEXIBLE_FORMATS: [&str; 4] = [
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M",
    "%Y-%m-%d %H:%M",
];

impl TimeParser for FlexibleParser {
    fn parse(&self, label: &str) -> Result<NaiveDateTime, TimeParseError> {
        let trimmed = label.trim();

        if let Ok(dt) = DateTime::parse_from_rfc3339(trimmed) {
            return Ok(dt.naive_utc());
        }

        for format in FLEXIBLE_FORMATS {
            if let Ok(dt) = NaiveDateTime::parse_from_str(trimmed, format) {
                return Ok(dt);
            }
        }

        if let Ok(date) = NaiveDate::parse_from_str(trimmed, "%Y-%m-%d") {
            return Ok(date.and_hms_opt(0, 0, 0).unwrap_or_default());
        }

        Err(TimeParseError {
            label: label.to_string(),
            expected: "an ISO-8601 date or date-time".to_string(),
        })
    }
}

/// Seconds since the Unix epoch, used as the numeric x coordinate of date axes
pub fn to_plot_seconds(dt: &NaiveDateTime) -> f64 {
    let utc = dt.and_utc();
    utc.timestamp() as f64 + f64::from(utc.timestamp_subsec_millis()) / 1000.0
}

/// Inverse of [`to_plot_seconds`], formatted for axis labels
pub fn format_plot_seconds(seconds: f64, format: &str) -> String {
    let whole = seconds.floor();
    let nanos = ((seconds - whole) * 1e9) as u32;
    match DateTime::from_timestamp(whole as i64, nanos) {
        Some(dt) => dt.format(format).to_string(),
        None => format!("{seconds:.0}"),
    }
}
