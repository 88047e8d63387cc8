//! Store adapters for the Kent Network telemetry API.
//!
//! This crate talks to the two backing stores of the API:
//!
//! - **Metadata** ([`MetadataStore`], [`CouchClient`]): device and sensor
//!   documents in CouchDB, plus the device → sensor views
//! - **Readings** ([`TimeSeriesStore`], [`InfluxClient`]): per-sensor
//!   reading queries against InfluxDB 1.x
//!
//! Queries are described by [`ReadingQuery`], whose values travel as bound
//! parameters rather than as command text. Raw result rows are turned into
//! [`Reading`](kentnet_types::Reading)s by [`decode_rows`], which drops
//! malformed rows instead of failing.
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use kentnet_store::{CouchClient, InfluxClient, MetadataStore, ReadingQuery, TimeSeriesStore, decode_rows};
//! use kentnet_types::TimeWindow;
//!
//! # async fn example() -> kentnet_store::Result<()> {
//! let couch = CouchClient::new("http://localhost:5984", "kentnetwork", Duration::from_secs(10))?;
//! let influx = InfluxClient::new("http://localhost:8086", Duration::from_secs(10))?;
//!
//! for sensor in couch.sensors_of_device("dev-1").await? {
//!     let query = ReadingQuery::build(&sensor, &TimeWindow::Latest, 100);
//!     let rows = influx.execute(&query, "kentnetwork").await?;
//!     let (readings, _dropped) = decode_rows(&sensor, &rows);
//!     println!("{}: {} readings", sensor, readings.len());
//! }
//! # Ok(())
//! # }
//! ```

pub mod couch;
mod error;
pub mod influx;
pub mod mock;
mod models;
mod query;
mod rows;

pub use couch::{CouchClient, DEFAULT_DATABASE, MetadataStore};
pub use error::{Error, Result};
pub use influx::{InfluxClient, TimeSeriesStore};
pub use mock::{MockMetadataStore, MockTimeSeriesStore};
pub use models::{QueryResponse, RawRow, Series, StatementResult, ViewResponse, ViewRow};
pub use query::{DEFAULT_MEASUREMENT, ReadingQuery, SENSOR_TAG, VALUE_FIELD, quote_ident};
pub use rows::{RowError, RowFailure, decode_row, decode_rows};
