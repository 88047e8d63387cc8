//! In-memory store implementations for testing.
//!
//! [`MockMetadataStore`] and [`MockTimeSeriesStore`] implement the store
//! traits without a network, so aggregation and HTTP handlers can be tested
//! in isolation.
//!
//! # Features
//!
//! - **Failure injection**: fail every call, or only the queries of chosen sensors
//! - **Latency simulation**: delay each time-series query
//! - **Call accounting**: count calls and track peak query concurrency

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::RwLock;

use kentnet_types::{Device, Sensor, SensorId, SensorSet, parse_timestamp};

use crate::couch::MetadataStore;
use crate::error::{Error, Result};
use crate::influx::TimeSeriesStore;
use crate::models::RawRow;
use crate::query::ReadingQuery;

/// A metadata store holding devices and sensors in memory.
///
/// Sensors belong to the device named by their `parent_device`.
///
/// # Example
///
/// ```
/// use kentnet_store::{MetadataStore, MockMetadataStore};
/// use kentnet_types::{Device, Sensor, SensorId};
///
/// #[tokio::main]
/// async fn main() {
///     let store = MockMetadataStore::new();
///     store.add_device(Device::new("dev-1")).await;
///     store.add_sensor(Sensor::new(SensorId::from("s-1")).parent("dev-1")).await;
///
///     let sensors = store.sensors_of_device("dev-1").await.unwrap();
///     assert_eq!(sensors, vec![SensorId::from("s-1")]);
/// }
/// ```
#[derive(Debug, Default)]
pub struct MockMetadataStore {
    devices: RwLock<Vec<Device>>,
    sensors: RwLock<Vec<Sensor>>,
    should_fail: AtomicBool,
    call_count: AtomicUsize,
}

impl MockMetadataStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a device document.
    pub async fn add_device(&self, device: Device) {
        self.devices.write().await.push(device);
    }

    /// Add a sensor document.
    pub async fn add_sensor(&self, sensor: Sensor) {
        self.sensors.write().await.push(sensor);
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Number of trait calls made so far.
    pub fn call_count(&self) -> usize {
        self.call_count.load(Ordering::Relaxed)
    }

    fn enter(&self) -> Result<()> {
        self.call_count.fetch_add(1, Ordering::Relaxed);
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::Status {
                url: "mock://metadata".to_string(),
                status: 500,
            });
        }
        Ok(())
    }

    async fn docs_of(&self, device_id: &str) -> Vec<Sensor> {
        self.sensors
            .read()
            .await
            .iter()
            .filter(|s| s.parent_device.as_deref() == Some(device_id))
            .cloned()
            .collect()
    }
}

#[async_trait]
impl MetadataStore for MockMetadataStore {
    async fn device(&self, id: &str) -> Result<Device> {
        self.enter()?;
        self.devices
            .read()
            .await
            .iter()
            .find(|d| d.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn sensor(&self, id: &SensorId) -> Result<Sensor> {
        self.enter()?;
        self.sensors
            .read()
            .await
            .iter()
            .find(|s| &s.id == id)
            .cloned()
            .ok_or_else(|| Error::NotFound(id.to_string()))
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        self.enter()?;
        Ok(self.devices.read().await.clone())
    }

    async fn sensors(&self) -> Result<Vec<Sensor>> {
        self.enter()?;
        Ok(self.sensors.read().await.clone())
    }

    async fn sensor_docs_of_device(&self, device_id: &str) -> Result<Vec<Sensor>> {
        self.enter()?;
        Ok(self.docs_of(device_id).await)
    }

    async fn sensors_of_device(&self, device_id: &str) -> Result<SensorSet> {
        self.enter()?;
        Ok(self
            .docs_of(device_id)
            .await
            .into_iter()
            .map(|s| s.id)
            .collect())
    }

    async fn all_sensors(&self) -> Result<SensorSet> {
        self.enter()?;
        Ok(self.sensors.read().await.iter().map(|s| s.id.clone()).collect())
    }

    async fn ping(&self) -> Result<()> {
        self.enter()
    }
}

/// A time-series store serving canned rows per sensor.
///
/// Queries honor the time bounds and limit of the [`ReadingQuery`]. Rows
/// whose timestamp does not parse are always returned, so decode failures
/// can be exercised.
#[derive(Debug, Default)]
pub struct MockTimeSeriesStore {
    rows: RwLock<HashMap<SensorId, Vec<RawRow>>>,
    failing: RwLock<HashSet<SensorId>>,
    queries: RwLock<Vec<ReadingQuery>>,
    should_fail: AtomicBool,
    query_count: AtomicUsize,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    /// Simulated query latency in milliseconds (0 = no delay).
    latency_ms: AtomicU64,
}

impl MockTimeSeriesStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append rows for a sensor.
    pub async fn add_rows(&self, sensor: &SensorId, rows: Vec<RawRow>) {
        self.rows
            .write()
            .await
            .entry(sensor.clone())
            .or_default()
            .extend(rows);
    }

    /// Make queries for one sensor fail.
    pub async fn fail_sensor(&self, sensor: &SensorId) {
        self.failing.write().await.insert(sensor.clone());
    }

    /// Make every subsequent call fail (or succeed again).
    pub fn set_should_fail(&self, fail: bool) {
        self.should_fail.store(fail, Ordering::Relaxed);
    }

    /// Set simulated latency for each query.
    pub fn set_latency(&self, latency: Duration) {
        self.latency_ms
            .store(latency.as_millis() as u64, Ordering::Relaxed);
    }

    /// Number of queries executed so far, failed ones included.
    pub fn query_count(&self) -> usize {
        self.query_count.load(Ordering::Relaxed)
    }

    /// Highest number of queries observed running at the same time.
    pub fn max_in_flight(&self) -> usize {
        self.max_in_flight.load(Ordering::Relaxed)
    }

    /// Every query received, in arrival order.
    pub async fn queries(&self) -> Vec<ReadingQuery> {
        self.queries.read().await.clone()
    }

    async fn run(&self, query: &ReadingQuery) -> Result<Vec<RawRow>> {
        let latency = self.latency_ms.load(Ordering::Relaxed);
        if latency > 0 {
            tokio::time::sleep(Duration::from_millis(latency)).await;
        }

        if self.should_fail.load(Ordering::Relaxed)
            || self.failing.read().await.contains(&query.sensor)
        {
            return Err(Error::Query(format!(
                "mock failure for sensor {}",
                query.sensor
            )));
        }

        let rows = self.rows.read().await;
        let Some(rows) = rows.get(&query.sensor) else {
            return Ok(Vec::new());
        };

        let mut selected: Vec<RawRow> = rows
            .iter()
            .filter(|row| in_bounds(row, query))
            .cloned()
            .collect();

        // Rows are stored oldest first.
        if query.newest_first {
            selected.reverse();
        }
        selected.truncate(query.limit as usize);
        Ok(selected)
    }
}

fn in_bounds(row: &RawRow, query: &ReadingQuery) -> bool {
    let Some(time) = row.first().and_then(|v| v.as_str()).and_then(parse_timestamp) else {
        return true;
    };
    query.since.is_none_or(|since| time >= since) && query.until.is_none_or(|until| time <= until)
}

#[async_trait]
impl TimeSeriesStore for MockTimeSeriesStore {
    async fn execute(&self, query: &ReadingQuery, _database: &str) -> Result<Vec<RawRow>> {
        self.query_count.fetch_add(1, Ordering::Relaxed);
        self.queries.write().await.push(query.clone());

        let running = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(running, Ordering::SeqCst);
        let result = self.run(query).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        result
    }

    async fn ping(&self) -> Result<()> {
        if self.should_fail.load(Ordering::Relaxed) {
            return Err(Error::Status {
                url: "mock://timeseries/ping".to_string(),
                status: 503,
            });
        }
        Ok(())
    }
}
