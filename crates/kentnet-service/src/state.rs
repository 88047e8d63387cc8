//! Application state shared across handlers.
//!
//! The store clients are built once at startup and shared as trait objects,
//! so handlers and tests see the same interface whether the backing stores
//! are real servers or in-memory mocks.

use std::sync::Arc;

use kentnet_store::{CouchClient, InfluxClient, MetadataStore, TimeSeriesStore};
use kentnet_types::Meta;

use crate::aggregator::Aggregator;
use crate::config::Config;

/// Shared application state.
pub struct AppState {
    /// Configuration, fixed for the process lifetime.
    pub config: Config,
    /// Metadata block attached to every successful response.
    pub meta: Meta,
    /// Device and sensor metadata.
    pub metadata: Arc<dyn MetadataStore>,
    /// Reading storage.
    pub timeseries: Arc<dyn TimeSeriesStore>,
    /// Reading aggregation over the two stores.
    pub aggregator: Aggregator,
}

impl AppState {
    /// Create application state over the given stores.
    pub fn new(
        config: Config,
        metadata: Arc<dyn MetadataStore>,
        timeseries: Arc<dyn TimeSeriesStore>,
    ) -> Arc<Self> {
        let meta = Meta::new(env!("CARGO_PKG_VERSION"), config.server.result_limit);
        let aggregator = Aggregator::new(metadata.clone(), timeseries.clone())
            .database(&config.influx.db)
            .measurement(&config.influx.measurement)
            .limit(config.server.result_limit)
            .max_concurrency(config.server.max_concurrent_queries);

        Arc::new(Self {
            config,
            meta,
            metadata,
            timeseries,
            aggregator,
        })
    }

    /// Create application state with HTTP clients for the configured stores.
    pub fn connect(config: Config) -> kentnet_store::Result<Arc<Self>> {
        let couch = CouchClient::new(&config.couch.host, &config.couch.db, config.couch.timeout())?;
        let influx = InfluxClient::new(&config.influx.host, config.influx.timeout())?
            .credentials(&config.influx.user, &config.influx.password);

        Ok(Self::new(config, Arc::new(couch), Arc::new(influx)))
    }
}
