//! Core types for sensor network metadata and readings.

use core::fmt;

use serde::{Deserialize, Serialize};
use time::OffsetDateTime;

/// Default number of rows returned by any single time-series query.
///
/// The limit applies per sensor, not to an aggregated response.
pub const DEFAULT_RESULT_LIMIT: u32 = 100;

/// Opaque identifier of a single sensor.
///
/// Identifiers may encode a device/sensor composite key, but nothing in this
/// workspace looks inside them.
#[derive(
    Debug, Clone, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize,
)]
#[serde(transparent)]
pub struct SensorId(String);

impl SensorId {
    /// Wrap a raw identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identifier.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume and return the raw identifier.
    #[must_use]
    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for SensorId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for SensorId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for SensorId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl AsRef<str> for SensorId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Ordered set of sensors resolved from a request scope.
///
/// Order follows the metadata store's row order and carries no meaning.
pub type SensorSet = Vec<SensorId>;

/// A single time-stamped value taken by a sensor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reading {
    /// When the value was recorded.
    #[serde(rename = "dateTime", with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
    /// Sensor that produced the value.
    pub sensor: SensorId,
    /// Recorded value.
    pub value: f64,
}

impl Reading {
    /// Create a reading.
    pub fn new(sensor: SensorId, timestamp: OffsetDateTime, value: f64) -> Self {
        Self {
            timestamp,
            sensor,
            value,
        }
    }
}

/// Geographic placement of a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Location {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nearest_town: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub catchment_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub associated_with: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lat: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lon: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub altitude: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub easting: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub northing: Option<String>,
}

/// LoRaWAN network registration of a device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Ttn {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dev_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hardware_serial: Option<String>,
}

/// A physical device carrying one or more sensors.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Device {
    /// URI of the device. Empty when the document has none.
    #[serde(rename = "@id", default)]
    pub id: String,
    #[serde(default)]
    pub location: Location,
    #[serde(default)]
    pub ttn: Ttn,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hardware_ref: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub battery_type: Option<String>,
}

impl Device {
    /// Create a device with no location or network details.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            location: Location::default(),
            ttn: Ttn::default(),
            hardware_ref: None,
            battery_type: None,
        }
    }
}

/// A sensor attached to a device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Sensor {
    /// URI of the sensor. Empty when the document has none.
    #[serde(rename = "@id", default)]
    pub id: SensorId,
    /// Seconds between readings.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub update_interval: Option<u32>,
    /// URI of the device the sensor belongs to.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub parent_device: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sensor_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub unit: Option<String>,
}

impl Sensor {
    /// Create a sensor with no descriptive fields set.
    pub fn new(id: SensorId) -> Self {
        Self {
            id,
            update_interval: None,
            parent_device: None,
            sensor_type: None,
            unit: None,
        }
    }

    /// Attach the sensor to a device.
    #[must_use]
    pub fn parent(mut self, device_id: impl Into<String>) -> Self {
        self.parent_device = Some(device_id.into());
        self
    }
}

/// Metadata block attached to every successful response.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Meta {
    pub publisher: String,
    pub license: String,
    pub version: String,
    pub result_limit: u32,
}

impl Meta {
    /// Build the metadata block for the given per-sensor result limit.
    pub fn new(version: &str, result_limit: u32) -> Self {
        Self {
            publisher: "Kent Network".to_string(),
            license: "Creative Commons".to_string(),
            version: version.to_string(),
            result_limit,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::datetime;

    #[test]
    fn test_sensor_id_transparent_serde() {
        let id = SensorId::new("R_T_0042");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"R_T_0042\"");
        let back: SensorId = serde_json::from_str("\"R_T_0042\"").unwrap();
        assert_eq!(back, id);
        assert_eq!(id.to_string(), "R_T_0042");
    }

    #[test]
    fn test_reading_serialization_field_names() {
        let reading = Reading::new(
            SensorId::from("s1"),
            datetime!(2020-01-01 12:30:00 UTC),
            4.25,
        );
        let json = serde_json::to_value(&reading).unwrap();
        assert_eq!(json["dateTime"], "2020-01-01T12:30:00Z");
        assert_eq!(json["sensor"], "s1");
        assert_eq!(json["value"], 4.25);
    }

    #[test]
    fn test_device_decodes_sparse_document() {
        let doc = r#"{
            "_id": "dev-1",
            "_rev": "3-abc",
            "@id": "https://kent.network/devices/dev-1",
            "location": {"nearestTown": "Canterbury", "lat": 51.28, "lon": 1.08},
            "ttn": {"appId": "kentnet", "devId": "dev-1"},
            "batteryType": "AA"
        }"#;
        let device: Device = serde_json::from_str(doc).unwrap();
        assert_eq!(device.id, "https://kent.network/devices/dev-1");
        assert_eq!(device.location.nearest_town.as_deref(), Some("Canterbury"));
        assert_eq!(device.location.catchment_name, None);
        assert_eq!(device.ttn.app_id.as_deref(), Some("kentnet"));
        assert_eq!(device.hardware_ref, None);
        assert_eq!(device.battery_type.as_deref(), Some("AA"));
    }

    #[test]
    fn test_device_without_location_uses_defaults() {
        let device: Device = serde_json::from_str(r#"{"@id": "dev-2"}"#).unwrap();
        assert_eq!(device.location, Location::default());
        assert_eq!(device.ttn, Ttn::default());

        let json = serde_json::to_value(&device).unwrap();
        assert_eq!(json["@id"], "dev-2");
        assert!(json.get("hardwareRef").is_none());
    }

    #[test]
    fn test_documents_without_uri_decode_with_empty_id() {
        let device: Device = serde_json::from_str(r#"{"_id": "dev-3"}"#).unwrap();
        assert_eq!(device.id, "");

        let sensor: Sensor =
            serde_json::from_str(r#"{"_id": "s-9", "parentDevice": "dev-3"}"#).unwrap();
        assert_eq!(sensor.id.as_str(), "");
        assert_eq!(sensor.parent_device.as_deref(), Some("dev-3"));
    }

    #[test]
    fn test_sensor_roundtrip_names() {
        let doc = r#"{
            "@id": "R_T_0042",
            "updateInterval": 900,
            "parentDevice": "dev-1",
            "sensorType": "temperature",
            "unit": "C"
        }"#;
        let sensor: Sensor = serde_json::from_str(doc).unwrap();
        assert_eq!(sensor.id.as_str(), "R_T_0042");
        assert_eq!(sensor.update_interval, Some(900));
        assert_eq!(sensor.parent_device.as_deref(), Some("dev-1"));

        let json = serde_json::to_value(&sensor).unwrap();
        assert_eq!(json["sensorType"], "temperature");
    }

    #[test]
    fn test_meta_fields() {
        let meta = Meta::new("0.1.0", DEFAULT_RESULT_LIMIT);
        let json = serde_json::to_value(&meta).unwrap();
        assert_eq!(json["publisher"], "Kent Network");
        assert_eq!(json["license"], "Creative Commons");
        assert_eq!(json["version"], "0.1.0");
        assert_eq!(json["resultLimit"], 100);
    }
}
