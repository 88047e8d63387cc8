//! Decoding of raw time-series rows into readings.
//!
//! Decoding is lossy by policy: a row whose timestamp or value cannot be
//! parsed is dropped and reported as a [`RowFailure`], never as an error.

use kentnet_types::{Reading, SensorId, parse_timestamp};
use serde_json::Value;

use crate::models::RawRow;

/// Why a row was rejected.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RowError {
    /// The row has fewer than two columns.
    #[error("row has {0} column(s), expected time and value")]
    TooShort(usize),
    /// The time column is not an RFC 3339 string.
    #[error("unparseable timestamp {0}")]
    Timestamp(String),
    /// The value column is not a number.
    #[error("non-numeric value {0}")]
    Value(String),
}

/// A row dropped while decoding the readings of one sensor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RowFailure {
    pub sensor: SensorId,
    pub error: RowError,
}

/// Decode a single `[time, value, ...]` row.
pub fn decode_row(sensor: &SensorId, row: &RawRow) -> Result<Reading, RowError> {
    let [time, value, ..] = row.as_slice() else {
        return Err(RowError::TooShort(row.len()));
    };

    let timestamp = time
        .as_str()
        .and_then(parse_timestamp)
        .ok_or_else(|| RowError::Timestamp(time.to_string()))?;

    let value = match value {
        Value::Number(n) => n.as_f64(),
        _ => None,
    }
    .ok_or_else(|| RowError::Value(value.to_string()))?;

    Ok(Reading::new(sensor.clone(), timestamp, value))
}

/// Decode every row for a sensor, separating readings from rejected rows.
pub fn decode_rows(sensor: &SensorId, rows: &[RawRow]) -> (Vec<Reading>, Vec<RowFailure>) {
    let mut readings = Vec::with_capacity(rows.len());
    let mut failures = Vec::new();

    for row in rows {
        match decode_row(sensor, row) {
            Ok(reading) => readings.push(reading),
            Err(error) => failures.push(RowFailure {
                sensor: sensor.clone(),
                error,
            }),
        }
    }

    (readings, failures)
}
