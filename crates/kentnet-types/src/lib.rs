//! Domain types for the Kent Network telemetry API.
//!
//! This crate holds the entities shared by the store adapters
//! (kentnet-store) and the HTTP service (kentnet-service).
//!
//! # Features
//!
//! - Device and sensor metadata documents
//! - Time-stamped sensor readings
//! - Interpretation of `latest` / `startDate` / `endDate` request parameters
//!
//! # Example
//!
//! ```
//! use kentnet_types::{ReadingsParams, TimeWindow};
//! use time::OffsetDateTime;
//!
//! let params = ReadingsParams {
//!     latest: Some("true".to_string()),
//!     ..Default::default()
//! };
//! let window = TimeWindow::resolve(&params, OffsetDateTime::now_utc())?;
//! assert_eq!(window, TimeWindow::Latest);
//! # Ok::<(), kentnet_types::ParamError>(())
//! ```

pub mod error;
pub mod types;
pub mod window;

pub use error::{ParamError, ParamResult};
pub use types::{
    DEFAULT_RESULT_LIMIT, Device, Location, Meta, Reading, Sensor, SensorId, SensorSet, Ttn,
};
pub use window::{ReadingsParams, TimeWindow, parse_timestamp};
