//! Metadata resolver backed by a CouchDB document store.
//!
//! Devices and sensors are plain documents addressed by id. Set lookups go
//! through the design-document views `devices/getDevices`,
//! `sensors/getSensors` and `sensors/getByDeviceID`.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client, StatusCode, Url};
use serde::de::DeserializeOwned;
use tracing::debug;

use kentnet_types::{Device, Sensor, SensorId, SensorSet};

use crate::error::{Error, Result};
use crate::influx::normalize_base_url;
use crate::models::ViewResponse;

/// Database queried when none is configured.
pub const DEFAULT_DATABASE: &str = "kentnetwork";

/// Upper sentinel for a prefix range over string view keys.
const KEY_RANGE_END: char = '\u{fff0}';

/// Resolves device and sensor metadata.
///
/// An unknown device and a device without sensors both resolve to an empty
/// [`SensorSet`]; only single-document lookups report [`Error::NotFound`].
#[async_trait]
pub trait MetadataStore: Send + Sync {
    /// Fetch one device document.
    async fn device(&self, id: &str) -> Result<Device>;

    /// Fetch one sensor document.
    async fn sensor(&self, id: &SensorId) -> Result<Sensor>;

    /// List every device document.
    async fn devices(&self) -> Result<Vec<Device>>;

    /// List every sensor document.
    async fn sensors(&self) -> Result<Vec<Sensor>>;

    /// List the sensor documents attached to a device.
    async fn sensor_docs_of_device(&self, device_id: &str) -> Result<Vec<Sensor>>;

    /// Identifiers of the sensors attached to a device.
    async fn sensors_of_device(&self, device_id: &str) -> Result<SensorSet>;

    /// Identifiers of every sensor known to the system.
    async fn all_sensors(&self) -> Result<SensorSet>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()>;
}

/// HTTP client for a CouchDB database.
#[derive(Debug, Clone)]
pub struct CouchClient {
    client: Client,
    base_url: Url,
    database: String,
}

impl CouchClient {
    /// Create a client for `database` on the server at `base_url`.
    pub fn new(base_url: &str, database: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Client)?;
        Self::with_client(base_url, database, client)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, database: &str, client: Client) -> Result<Self> {
        let normalized = normalize_base_url(base_url)?;
        let base_url =
            Url::parse(&normalized).map_err(|e| Error::InvalidUrl(format!("{normalized}: {e}")))?;

        if database.is_empty() {
            return Err(Error::InvalidUrl("database name is empty".to_string()));
        }

        Ok(Self {
            client,
            base_url,
            database: database.to_string(),
        })
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        self.base_url.as_str().trim_end_matches('/')
    }

    /// Get the database name.
    pub fn database(&self) -> &str {
        &self.database
    }

    /// URL of `/{db}/{segments...}` with each segment percent-encoded.
    fn url(&self, segments: &[&str]) -> Result<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| Error::InvalidUrl(self.base_url.to_string()))?
            .pop_if_empty()
            .push(&self.database)
            .extend(segments);
        Ok(url)
    }

    async fn get_json<T: DeserializeOwned>(&self, url: Url) -> Result<T> {
        let url_text = url.to_string();
        debug!("GET {}", url_text);

        let response = self
            .client
            .get(url)
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&url_text, e))?;

        let status = response.status();
        if status == StatusCode::NOT_FOUND {
            return Err(Error::NotFound(url_text));
        }
        if !status.is_success() {
            return Err(Error::Status {
                url: url_text,
                status: status.as_u16(),
            });
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| Error::from_reqwest(&url_text, e))?;

        serde_json::from_slice(&body).map_err(|source| Error::Decode {
            url: url_text,
            source,
        })
    }

    async fn document<T: DeserializeOwned>(&self, id: &str) -> Result<T> {
        let url = self.url(&[id])?;
        self.get_json(url).await.map_err(|e| match e {
            Error::NotFound(_) => Error::NotFound(id.to_string()),
            other => other,
        })
    }

    async fn view<T: DeserializeOwned>(
        &self,
        design: &str,
        view: &str,
        key_prefix: Option<&str>,
        include_docs: bool,
    ) -> Result<ViewResponse<T>> {
        let mut url = self.url(&["_design", design, "_view", view])?;

        let mut pairs = Vec::new();
        if include_docs {
            pairs.push(("include_docs", "true".to_string()));
        }
        if let Some(prefix) = key_prefix {
            pairs.push(("startkey", json_key(prefix)));
            pairs.push(("endkey", json_key(&format!("{prefix}{KEY_RANGE_END}"))));
        }
        if !pairs.is_empty() {
            url.query_pairs_mut().extend_pairs(pairs);
        }

        match self.get_json(url).await {
            Ok(view) => Ok(view),
            // A missing view is a deployment fault, not a missing document.
            Err(Error::NotFound(url)) => Err(Error::Status { url, status: 404 }),
            Err(e) => Err(e),
        }
    }

    async fn docs<T: DeserializeOwned>(
        &self,
        design: &str,
        view: &str,
        key_prefix: Option<&str>,
    ) -> Result<Vec<T>> {
        let view: ViewResponse<T> = self.view(design, view, key_prefix, true).await?;
        Ok(view.rows.into_iter().filter_map(|row| row.doc).collect())
    }

    async fn ids(&self, design: &str, view: &str, key_prefix: Option<&str>) -> Result<SensorSet> {
        let view: ViewResponse<serde_json::Value> =
            self.view(design, view, key_prefix, false).await?;
        Ok(view
            .rows
            .into_iter()
            .filter(|row| !row.id.is_empty())
            .map(|row| SensorId::new(row.id))
            .collect())
    }
}

#[async_trait]
impl MetadataStore for CouchClient {
    async fn device(&self, id: &str) -> Result<Device> {
        self.document(id).await
    }

    async fn sensor(&self, id: &SensorId) -> Result<Sensor> {
        self.document(id.as_str()).await
    }

    async fn devices(&self) -> Result<Vec<Device>> {
        self.docs("devices", "getDevices", None).await
    }

    async fn sensors(&self) -> Result<Vec<Sensor>> {
        self.docs("sensors", "getSensors", None).await
    }

    async fn sensor_docs_of_device(&self, device_id: &str) -> Result<Vec<Sensor>> {
        self.docs("sensors", "getByDeviceID", Some(device_id)).await
    }

    async fn sensors_of_device(&self, device_id: &str) -> Result<SensorSet> {
        let sensors = self.ids("sensors", "getByDeviceID", Some(device_id)).await?;
        debug!("Device {} has {} sensor(s)", device_id, sensors.len());
        Ok(sensors)
    }

    async fn all_sensors(&self) -> Result<SensorSet> {
        self.ids("sensors", "getSensors", None).await
    }

    async fn ping(&self) -> Result<()> {
        let url = self.base_url.to_string();
        let response = self
            .client
            .get(self.base_url.clone())
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&url, e))?;

        let status = response.status();
        if status.is_success() {
            Ok(())
        } else {
            Err(Error::Status {
                url,
                status: status.as_u16(),
            })
        }
    }
}

/// JSON-encode a string view key.
fn json_key(key: &str) -> String {
    serde_json::Value::from(key).to_string()
}
