//! Backing store status probing.

use serde::Serialize;
use time::OffsetDateTime;
use tracing::warn;

use crate::state::AppState;

/// Overall status report for `/status`.
#[derive(Debug, Serialize)]
pub struct StatusResponse {
    /// `ok` when every service is reachable, `degraded` otherwise.
    pub status: &'static str,
    pub services: Vec<ServiceStatus>,
    pub messages: Vec<ServiceMessage>,
}

/// Status of one backing service.
#[derive(Debug, Serialize)]
pub struct ServiceStatus {
    pub service: &'static str,
    /// `ok` or `error`.
    pub status: &'static str,
    pub messages: Vec<ServiceMessage>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ServiceMessage {
    pub title: String,
    #[serde(with = "time::serde::rfc3339")]
    pub created: OffsetDateTime,
    #[serde(with = "time::serde::rfc3339")]
    pub last_updated: OffsetDateTime,
    pub message: String,
}

impl ServiceMessage {
    fn new(title: &str, message: String) -> Self {
        let now = OffsetDateTime::now_utc();
        Self {
            title: title.to_string(),
            created: now,
            last_updated: now,
            message,
        }
    }
}

impl ServiceStatus {
    fn from_probe(service: &'static str, probe: kentnet_store::Result<()>) -> Self {
        match probe {
            Ok(()) => Self {
                service,
                status: "ok",
                messages: Vec::new(),
            },
            Err(e) => {
                warn!("{} status probe failed: {}", service, e);
                Self {
                    service,
                    status: "error",
                    messages: vec![ServiceMessage::new("unreachable", e.to_string())],
                }
            }
        }
    }

    /// Whether the service answered its probe.
    pub fn is_ok(&self) -> bool {
        self.status == "ok"
    }
}

/// Probe both stores concurrently.
pub async fn probe(state: &AppState) -> StatusResponse {
    let (influx, couch) = tokio::join!(state.timeseries.ping(), state.metadata.ping());

    let services = vec![
        ServiceStatus::from_probe("influx", influx),
        ServiceStatus::from_probe("couchDB", couch),
    ];

    let failing: Vec<&str> = services
        .iter()
        .filter(|s| !s.is_ok())
        .map(|s| s.service)
        .collect();

    if failing.is_empty() {
        StatusResponse {
            status: "ok",
            services,
            messages: Vec::new(),
        }
    } else {
        StatusResponse {
            status: "degraded",
            services,
            messages: vec![ServiceMessage::new(
                "degraded",
                format!("unreachable: {}", failing.join(", ")),
            )],
        }
    }
}
