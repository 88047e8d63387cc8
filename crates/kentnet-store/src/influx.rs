//! Time-series store client (InfluxDB 1.x HTTP API).
//!
//! # Example
//!
//! ```no_run
//! use std::time::Duration;
//! use kentnet_store::{InfluxClient, ReadingQuery, TimeSeriesStore};
//! use kentnet_types::{SensorId, TimeWindow};
//!
//! # async fn example() -> kentnet_store::Result<()> {
//! let client = InfluxClient::new("http://localhost:8086", Duration::from_secs(10))?
//!     .credentials("reader", "secret");
//!
//! let query = ReadingQuery::build(&SensorId::from("R_T_0042"), &TimeWindow::Latest, 100);
//! let rows = client.execute(&query, "kentnetwork").await?;
//! println!("{} rows", rows.len());
//! # Ok(())
//! # }
//! ```

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use tracing::debug;

use crate::error::{Error, Result};
use crate::models::{QueryResponse, RawRow};
use crate::query::ReadingQuery;

/// Executes reading queries against a time-series store.
///
/// Implemented by [`InfluxClient`] and by the in-memory
/// [`MockTimeSeriesStore`](crate::mock::MockTimeSeriesStore).
#[async_trait]
pub trait TimeSeriesStore: Send + Sync {
    /// Run a query and return its undecoded rows.
    ///
    /// A query that matches nothing returns an empty vector, not an error.
    async fn execute(&self, query: &ReadingQuery, database: &str) -> Result<Vec<RawRow>>;

    /// Check that the store is reachable.
    async fn ping(&self) -> Result<()>;
}

/// HTTP client for an InfluxDB 1.x server.
#[derive(Debug, Clone)]
pub struct InfluxClient {
    client: Client,
    base_url: String,
    user: Option<String>,
    password: Option<String>,
}

impl InfluxClient {
    /// Create a client whose requests give up after `timeout`.
    ///
    /// # Arguments
    ///
    /// * `base_url` - Server URL (e.g., "http://localhost:8086")
    /// * `timeout` - Per-request timeout; expiry is reported as [`Error::Timeout`]
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(Error::Client)?;
        Self::with_client(base_url, client)
    }

    /// Create a client with a custom reqwest Client.
    pub fn with_client(base_url: &str, client: Client) -> Result<Self> {
        Ok(Self {
            client,
            base_url: normalize_base_url(base_url)?,
            user: None,
            password: None,
        })
    }

    /// Authenticate requests with basic credentials. An empty user disables
    /// authentication.
    pub fn credentials(mut self, user: &str, password: &str) -> Self {
        if user.is_empty() {
            self.user = None;
            self.password = None;
        } else {
            self.user = Some(user.to_string());
            self.password = Some(password.to_string());
        }
        self
    }

    /// Get the base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.user {
            Some(user) => request.basic_auth(user, self.password.as_deref()),
            None => request,
        }
    }
}

#[async_trait]
impl TimeSeriesStore for InfluxClient {
    async fn execute(&self, query: &ReadingQuery, database: &str) -> Result<Vec<RawRow>> {
        let url = format!("{}/query", self.base_url);
        let command = query.to_influxql();
        let params = query.params().to_string();

        debug!(
            "Querying {} for sensor {}: {}",
            database, query.sensor, command
        );

        let response = self
            .authorize(self.client.get(&url))
            .query(&[
                ("db", database),
                ("q", command.as_str()),
                ("params", params.as_str()),
            ])
            .send()
            .await
            .map_err(|e| Error::from_reqwest(&url, e))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| Error::from_reqwest(&url, e))?;

        if !status.is_success() {
            // Influx reports statement failures as 4xx with an error body.
            if let Ok(QueryResponse {
                error: Some(message),
                ..
            }) = serde_json::from_str::<QueryResponse>(&body)
            {
                return Err(Error::Query(message));
            }
            return Err(Error::Status {
                url,
                status: status.as_u16(),
            });
        }

        let parsed: QueryResponse =
            serde_json::from_str(&body).map_err(|source| Error::Decode {
                url: url.clone(),
                source,
            })?;

        rows_from_response(parsed)
    }

    async fn ping(&self) -> Result<()> {
        let url = format!("{}/ping", self.base_url);
        let response = self
            .authorize(self.client.get(&url))
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

/// Flatten every series of every statement into one row list.
pub(crate) fn rows_from_response(response: QueryResponse) -> Result<Vec<RawRow>> {
    if let Some(message) = response.error {
        return Err(Error::Query(message));
    }

    let mut rows = Vec::new();
    for result in response.results {
        if let Some(message) = result.error {
            return Err(Error::Query(message));
        }
        for series in result.series {
            rows.extend(series.values);
        }
    }

    Ok(rows)
}

pub(crate) fn normalize_base_url(base_url: &str) -> Result<String> {
    let base_url = base_url.trim_end_matches('/').to_string();

    if !base_url.starts_with("http://") && !base_url.starts_with("https://") {
        return Err(Error::InvalidUrl(format!(
            "URL must start with http:// or https://, got: {}",
            base_url
        )));
    }

    Ok(base_url)
}
