//! Query builder for per-sensor reading queries.
//!
//! [`ReadingQuery`] is a store-agnostic value: target measurement, sensor
//! predicate, optional time bounds, ordering and limit. The InfluxDB adapter
//! renders it with [`ReadingQuery::to_influxql`] and sends the values from
//! [`ReadingQuery::params`] as bound parameters, so sensor identifiers and
//! timestamps never become part of the command text.
//!
//! # Example
//!
//! ```
//! use kentnet_store::ReadingQuery;
//! use kentnet_types::{SensorId, TimeWindow};
//!
//! let query = ReadingQuery::build(&SensorId::from("R_T_0042"), &TimeWindow::Latest, 100);
//! assert_eq!(
//!     query.to_influxql(),
//!     "SELECT \"value\" FROM \"readings\" WHERE \"sensor_id\" = $sensor ORDER BY time DESC LIMIT 100"
//! );
//! ```

use kentnet_types::{SensorId, TimeWindow};
use serde_json::{Map, Value, json};
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

/// Measurement queried when none is configured.
pub const DEFAULT_MEASUREMENT: &str = "readings";
/// Tag key holding the sensor identifier.
pub const SENSOR_TAG: &str = "sensor_id";
/// Field holding the reading value.
pub const VALUE_FIELD: &str = "value";

/// Query for the readings of one sensor.
///
/// Results are ordered by time descending (newest first) unless
/// [`oldest_first`](ReadingQuery::oldest_first) is called.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadingQuery {
    /// Measurement (table) holding the readings.
    pub measurement: String,
    /// Sensor whose readings are selected.
    pub sensor: SensorId,
    /// Include only readings at or after this time.
    pub since: Option<OffsetDateTime>,
    /// Include only readings at or before this time.
    pub until: Option<OffsetDateTime>,
    /// Maximum number of rows returned.
    pub limit: u32,
    /// Order by time descending.
    pub newest_first: bool,
}

impl ReadingQuery {
    /// Create an unfiltered query for a sensor.
    pub fn new(sensor: SensorId, limit: u32) -> Self {
        Self {
            measurement: DEFAULT_MEASUREMENT.to_string(),
            sensor,
            since: None,
            until: None,
            limit,
            newest_first: true,
        }
    }

    /// Build the query selected by a resolved time window.
    ///
    /// [`TimeWindow::Latest`] and [`TimeWindow::Unbounded`] produce the same
    /// query. A [`TimeWindow::Range`] bounds both ends inclusively; the bounds
    /// are used as given.
    pub fn build(sensor: &SensorId, window: &TimeWindow, limit: u32) -> Self {
        let query = Self::new(sensor.clone(), limit);
        match *window {
            TimeWindow::Latest | TimeWindow::Unbounded => query,
            TimeWindow::Range { start, end } => query.since(start).until(end),
        }
    }

    /// Set the measurement to query.
    pub fn measurement(mut self, measurement: &str) -> Self {
        self.measurement = measurement.to_string();
        self
    }

    /// Filter to readings at or after this time.
    pub fn since(mut self, time: OffsetDateTime) -> Self {
        self.since = Some(time);
        self
    }

    /// Filter to readings at or before this time.
    pub fn until(mut self, time: OffsetDateTime) -> Self {
        self.until = Some(time);
        self
    }

    /// Order results by oldest first.
    pub fn oldest_first(mut self) -> Self {
        self.newest_first = false;
        self
    }

    /// Render the InfluxQL command text.
    ///
    /// Values are referenced as `$sensor`, `$start` and `$end`; see
    /// [`params`](ReadingQuery::params).
    pub fn to_influxql(&self) -> String {
        let mut conditions = vec![format!("{} = $sensor", quote_ident(SENSOR_TAG))];

        if self.since.is_some() {
            conditions.push("time >= $start".to_string());
        }

        if self.until.is_some() {
            conditions.push("time <= $end".to_string());
        }

        let order = if self.newest_first { "DESC" } else { "ASC" };

        format!(
            "SELECT {} FROM {} WHERE {} ORDER BY time {} LIMIT {}",
            quote_ident(VALUE_FIELD),
            quote_ident(&self.measurement),
            conditions.join(" AND "),
            order,
            self.limit
        )
    }

    /// Bound parameter values for [`to_influxql`](ReadingQuery::to_influxql).
    pub fn params(&self) -> Value {
        let mut params = Map::new();
        params.insert("sensor".to_string(), json!(self.sensor.as_str()));

        if let Some(since) = self.since {
            params.insert("start".to_string(), json!(format_time(since)));
        }

        if let Some(until) = self.until {
            params.insert("end".to_string(), json!(format_time(until)));
        }

        Value::Object(params)
    }
}

/// Quote an InfluxQL identifier.
pub fn quote_ident(ident: &str) -> String {
    format!("\"{}\"", ident.replace('\\', "\\\\").replace('"', "\\\""))
}

fn format_time(time: OffsetDateTime) -> String {
    time.to_offset(time::UtcOffset::UTC)
        .format(&Rfc3339)
        .unwrap_or_default()
}
