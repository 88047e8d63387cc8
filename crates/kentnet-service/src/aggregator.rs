//! Reading aggregation across a scope of sensors.
//!
//! A request scope (one sensor, the sensors of a device, every sensor) is
//! resolved to a [`SensorSet`], each sensor is queried for the requested
//! [`TimeWindow`], and the decoded readings are merged into one result.
//!
//! # Outcome
//!
//! - An empty scope is [`AggregateError::NotFound`] and issues no query.
//! - Any store error aborts the whole aggregate; partial readings are never
//!   returned. Outstanding sibling queries are dropped.
//! - Rows that fail to decode are dropped and reported in
//!   [`AggregateResult::failures`].
//! - A scope that yields zero readings is [`AggregateError::NotFound`].

use std::sync::Arc;

use futures::{StreamExt, TryStreamExt, stream};
use tracing::{debug, info, warn};

use kentnet_store::{MetadataStore, ReadingQuery, RowFailure, TimeSeriesStore, decode_rows};
use kentnet_types::{Reading, SensorId, SensorSet, TimeWindow};

/// Readings merged across a scope.
///
/// Reading order is not significant.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AggregateResult {
    pub readings: Vec<Reading>,
    /// Rows dropped while decoding.
    pub failures: Vec<RowFailure>,
}

/// Why an aggregate produced no readings.
#[derive(Debug, thiserror::Error)]
pub enum AggregateError {
    /// The scope was empty or its sensors have no readings.
    #[error("no readings found")]
    NotFound,
    /// A metadata or time-series store call failed.
    #[error(transparent)]
    Store(#[from] kentnet_store::Error),
}

/// Resolves scopes and merges per-sensor readings.
#[derive(Clone)]
pub struct Aggregator {
    metadata: Arc<dyn MetadataStore>,
    timeseries: Arc<dyn TimeSeriesStore>,
    database: String,
    measurement: String,
    limit: u32,
    max_concurrency: usize,
}

impl std::fmt::Debug for Aggregator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Aggregator")
            .field("database", &self.database)
            .field("measurement", &self.measurement)
            .field("limit", &self.limit)
            .field("max_concurrency", &self.max_concurrency)
            .finish()
    }
}

impl Aggregator {
    /// Create an aggregator with default query settings.
    pub fn new(metadata: Arc<dyn MetadataStore>, timeseries: Arc<dyn TimeSeriesStore>) -> Self {
        Self {
            metadata,
            timeseries,
            database: kentnet_store::DEFAULT_DATABASE.to_string(),
            measurement: kentnet_store::DEFAULT_MEASUREMENT.to_string(),
            limit: kentnet_types::DEFAULT_RESULT_LIMIT,
            max_concurrency: 8,
        }
    }

    /// Set the time-series database used by the scope helpers.
    #[must_use]
    pub fn database(mut self, database: &str) -> Self {
        self.database = database.to_string();
        self
    }

    /// Set the measurement holding readings.
    #[must_use]
    pub fn measurement(mut self, measurement: &str) -> Self {
        self.measurement = measurement.to_string();
        self
    }

    /// Set the per-sensor result limit.
    #[must_use]
    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit;
        self
    }

    /// Set how many per-sensor queries may run at once (at least 1).
    #[must_use]
    pub fn max_concurrency(mut self, max: usize) -> Self {
        self.max_concurrency = max.max(1);
        self
    }

    /// Readings of a single sensor. The sensor is not looked up first.
    pub async fn readings_for_sensor(
        &self,
        sensor: &SensorId,
        window: &TimeWindow,
    ) -> Result<AggregateResult, AggregateError> {
        self.aggregate(std::slice::from_ref(sensor), window, &self.database)
            .await
    }

    /// Readings of every sensor attached to a device.
    pub async fn readings_for_device(
        &self,
        device_id: &str,
        window: &TimeWindow,
    ) -> Result<AggregateResult, AggregateError> {
        let scope = self.metadata.sensors_of_device(device_id).await?;
        self.aggregate(&scope, window, &self.database).await
    }

    /// Readings of every sensor in the system.
    pub async fn readings_for_fleet(
        &self,
        window: &TimeWindow,
    ) -> Result<AggregateResult, AggregateError> {
        let scope: SensorSet = self.metadata.all_sensors().await?;
        self.aggregate(&scope, window, &self.database).await
    }

    /// Query every sensor in `scope` and merge the results.
    pub async fn aggregate(
        &self,
        scope: &[SensorId],
        window: &TimeWindow,
        database: &str,
    ) -> Result<AggregateResult, AggregateError> {
        if scope.is_empty() {
            debug!("Empty scope, nothing to query");
            return Err(AggregateError::NotFound);
        }

        let sensors = scope.iter().cloned();
        let per_sensor: Vec<(Vec<Reading>, Vec<RowFailure>)> = stream::iter(sensors)
            .map(|sensor| {
                Ok::<_, kentnet_store::Error>(self.sensor_readings(sensor, window, database))
            })
            .try_buffer_unordered(self.max_concurrency)
            .try_collect()
            .await
            .inspect_err(|e| warn!("Aggregate over {} sensor(s) failed: {}", scope.len(), e))?;

        let mut result = AggregateResult::default();
        for (readings, failures) in per_sensor {
            result.readings.extend(readings);
            result.failures.extend(failures);
        }

        if result.readings.is_empty() {
            debug!(
                "No readings for {} sensor(s) ({} row(s) dropped)",
                scope.len(),
                result.failures.len()
            );
            return Err(AggregateError::NotFound);
        }

        info!(
            "Aggregated {} reading(s) from {} sensor(s)",
            result.readings.len(),
            scope.len()
        );
        Ok(result)
    }

    async fn sensor_readings(
        &self,
        sensor: SensorId,
        window: &TimeWindow,
        database: &str,
    ) -> kentnet_store::Result<(Vec<Reading>, Vec<RowFailure>)> {
        let query = ReadingQuery::build(&sensor, window, self.limit).measurement(&self.measurement);
        let rows = self.timeseries.execute(&query, database).await?;
        let (readings, failures) = decode_rows(&sensor, &rows);

        for failure in &failures {
            warn!("Dropped row for sensor {}: {}", failure.sensor, failure.error);
        }
        debug!(
            "Sensor {}: {} row(s), {} reading(s)",
            sensor,
            rows.len(),
            readings.len()
        );

        Ok((readings, failures))
    }
}
