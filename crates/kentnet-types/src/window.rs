//! Interpretation of a request's temporal intent.
//!
//! A readings request carries up to three optional signals: `latest`,
//! `startDate` and `endDate`. [`TimeWindow::resolve`] turns them into exactly
//! one [`TimeWindow`] variant, checking the signals in the fixed order
//! latest → range → unbounded.
//!
//! # Example
//!
//! ```
//! use kentnet_types::{ReadingsParams, TimeWindow};
//! use time::OffsetDateTime;
//!
//! let params = ReadingsParams {
//!     start_date: Some("2020-01-01T00:00:00Z".to_string()),
//!     ..Default::default()
//! };
//! let now = OffsetDateTime::now_utc();
//! let window = TimeWindow::resolve(&params, now).unwrap();
//! assert!(matches!(window, TimeWindow::Range { end, .. } if end == now));
//! ```

use serde::Deserialize;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::error::{ParamError, ParamResult};

/// Raw temporal parameters as they arrive in a query string.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct ReadingsParams {
    /// Request only the most recent readings.
    #[serde(default)]
    pub latest: Option<String>,
    /// Inclusive lower bound of a time range.
    #[serde(default, rename = "startDate")]
    pub start_date: Option<String>,
    /// Inclusive upper bound of a time range; defaults to now.
    #[serde(default, rename = "endDate")]
    pub end_date: Option<String>,
}

/// The single query mode selected for a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TimeWindow {
    /// Most recent readings, up to the result limit.
    Latest,
    /// Readings with `start <= time <= end`, up to the result limit.
    Range {
        start: OffsetDateTime,
        end: OffsetDateTime,
    },
    /// Most recent readings with no time filter, up to the result limit.
    ///
    /// Query-equivalent to [`TimeWindow::Latest`] but kept distinct so the
    /// caller can tell the two requests apart.
    Unbounded,
}

impl TimeWindow {
    /// Resolve request parameters into a window.
    ///
    /// `now` is the instant used as the range end when `endDate` is omitted.
    /// Empty parameter values count as absent. An `endDate` without a
    /// `startDate` is ignored.
    ///
    /// # Errors
    ///
    /// Returns a [`ParamError`] when a consulted parameter is malformed or the
    /// range ends before it starts.
    pub fn resolve(params: &ReadingsParams, now: OffsetDateTime) -> ParamResult<Self> {
        if let Some(latest) = present(&params.latest) {
            let latest =
                parse_bool(latest).ok_or_else(|| ParamError::InvalidLatest(latest.to_string()))?;
            if latest {
                return Ok(TimeWindow::Latest);
            }
        }

        let Some(start_raw) = present(&params.start_date) else {
            return Ok(TimeWindow::Unbounded);
        };

        let start = parse_timestamp(start_raw)
            .ok_or_else(|| ParamError::InvalidStartDate(start_raw.to_string()))?;
        let end = match present(&params.end_date) {
            Some(end_raw) => parse_timestamp(end_raw)
                .ok_or_else(|| ParamError::InvalidEndDate(end_raw.to_string()))?,
            None => now,
        };

        if start > end {
            return Err(ParamError::InvertedRange {
                start: start_raw.to_string(),
                end: present(&params.end_date).map_or_else(
                    || end.format(&Rfc3339).unwrap_or_default(),
                    str::to_string,
                ),
            });
        }

        Ok(TimeWindow::Range { start, end })
    }

    /// Whether this window applies a time predicate.
    #[must_use]
    pub fn is_bounded(&self) -> bool {
        matches!(self, TimeWindow::Range { .. })
    }
}

fn present(value: &Option<String>) -> Option<&str> {
    value.as_deref().filter(|v| !v.is_empty())
}

/// Parse a boolean using the spellings accepted by the public API.
fn parse_bool(value: &str) -> Option<bool> {
    match value {
        "1" | "t" | "T" | "TRUE" | "true" | "True" => Some(true),
        "0" | "f" | "F" | "FALSE" | "false" | "False" => Some(false),
        _ => None,
    }
}

/// Parse an RFC 3339 timestamp; fractional seconds are optional.
pub fn parse_timestamp(value: &str) -> Option<OffsetDateTime> {
    OffsetDateTime::parse(value, &Rfc3339).ok()
}
