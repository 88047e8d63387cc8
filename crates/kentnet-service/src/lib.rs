//! HTTP REST API for the Kent Network sensor telemetry stores.
//!
//! This crate provides a service that:
//! - Resolves devices and sensors from a CouchDB metadata store
//! - Aggregates per-sensor readings from an InfluxDB time-series store
//! - Reports the reachability of both stores
//!
//! # REST API Endpoints
//!
//! - `GET /health` - Service health check
//! - `GET /status` - Backing store status
//! - `GET /devices` - List all devices
//! - `GET /devices/{deviceId}` - Get one device
//! - `GET /devices/{deviceId}/sensors` - Sensors attached to a device
//! - `GET /devices/{deviceId}/readings` - Readings of every sensor on a device
//! - `GET /sensors` - List all sensors
//! - `GET /sensors/{sensorId}` - Get one sensor
//! - `GET /sensors/{sensorId}/readings` - Readings of one sensor
//! - `GET /data/readings` - Readings of every sensor
//!
//! Reading endpoints accept `latest=<bool>`, or `startDate=<RFC 3339>` with an
//! optional `endDate=<RFC 3339>`. Without either, readings are returned
//! newest first up to the configured result limit.
//!
//! # Configuration
//!
//! The service reads configuration from `~/.config/kentnet/server.toml`:
//!
//! ```toml
//! [server]
//! bind = "127.0.0.1:8080"
//! result_limit = 100
//!
//! [couch]
//! host = "http://localhost:5984"
//! db = "kentnetwork"
//!
//! [influx]
//! host = "http://localhost:8086"
//! user = "reader"
//! password = "secret"
//! db = "kentnetwork"
//! ```
//!
//! Environment variables (`SERVERBIND`, `COUCHHOST`, `COUCHDB`, `INFLUXHOST`,
//! `INFLUXUSER`, `INFLUXPWD`, `INFLUXDB`, `INFLUXMEASUREMENT`) override the
//! file.

pub mod aggregator;
pub mod api;
pub mod config;
pub mod state;
pub mod status;

pub use aggregator::{AggregateError, AggregateResult, Aggregator};
pub use config::{
    Config, ConfigError, CouchConfig, InfluxConfig, ServerConfig, ValidationError,
    default_config_path,
};
pub use state::AppState;
