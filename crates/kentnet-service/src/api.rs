//! REST API endpoints for the kentnet service.
//!
//! Successful responses carry the shared [`Meta`] block next to the payload:
//!
//! ```json
//! {"meta": {"publisher": "Kent Network", "license": "Creative Commons", "version": "0.1.0", "resultLimit": 100},
//!  "items": [...]}
//! ```
//!
//! ## Error Handling
//!
//! All endpoints return structured JSON errors via [`AppError`]. Parameter
//! errors return HTTP 400 before any store is contacted, empty scopes and
//! missing documents return 404, and store failures return HTTP 500 without
//! exposing details (those are logged).
//!
//! # Example
//!
//! ```ignore
//! use kentnet_service::api;
//!
//! let app = api::router().with_state(state);
//! ```

use std::sync::Arc;

use axum::{
    Json, Router,
    extract::{Path, Query, State, rejection::QueryRejection},
    http::StatusCode,
    response::IntoResponse,
    routing::get,
};
use serde::Serialize;
use time::OffsetDateTime;
use tracing::{debug, error};

use kentnet_types::{
    Device, Meta, ParamError, Reading, ReadingsParams, Sensor, SensorId, TimeWindow,
};

use crate::aggregator::AggregateError;
use crate::state::AppState;
use crate::status::{self, StatusResponse};

const DEVICE_NOT_FOUND: &str = "Device not found";
const DEVICE_HAS_NO_SENSORS: &str = "Device not found or device currently has no sensors";
const DEVICE_HAS_NO_READINGS: &str = "Device not found or device has sensors with no readings";
const SENSOR_NOT_FOUND: &str = "Sensor not found";
const SENSOR_HAS_NO_READINGS: &str = "Sensor not found or sensor has no readings";
const FLEET_HAS_NO_READINGS: &str = "No sensors found or system has sensors with no readings";

/// Create the API router.
pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        // Health and status
        .route("/health", get(health))
        .route("/status", get(get_status))
        // Devices
        .route("/devices", get(list_devices))
        .route("/devices/{device_id}", get(get_device))
        .route("/devices/{device_id}/sensors", get(get_device_sensors))
        .route("/devices/{device_id}/readings", get(get_device_readings))
        // Sensors
        .route("/sensors", get(list_sensors))
        .route("/sensors/{sensor_id}", get(get_sensor))
        .route("/sensors/{sensor_id}/readings", get(get_sensor_readings))
        // Fleet
        .route("/data/readings", get(get_all_readings))
}

/// Successful response envelope.
#[derive(Debug, Serialize)]
pub struct ItemsResponse<T> {
    pub meta: Meta,
    pub items: T,
}

impl<T> ItemsResponse<T> {
    fn new(state: &AppState, items: T) -> Json<Self> {
        Json(Self {
            meta: state.meta.clone(),
            items,
        })
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
    pub version: &'static str,
    #[serde(with = "time::serde::rfc3339")]
    pub timestamp: OffsetDateTime,
}

/// Health check endpoint.
async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok",
        version: env!("CARGO_PKG_VERSION"),
        timestamp: OffsetDateTime::now_utc(),
    })
}

/// Probe the backing stores.
async fn get_status(State(state): State<Arc<AppState>>) -> Json<StatusResponse> {
    Json(status::probe(&state).await)
}

async fn list_devices(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ItemsResponse<Vec<Device>>>, AppError> {
    let devices = state.metadata.devices().await?;
    Ok(ItemsResponse::new(&state, devices))
}

async fn get_device(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<ItemsResponse<Device>>, AppError> {
    let device = state
        .metadata
        .device(&device_id)
        .await
        .map_err(|e| AppError::not_found_or_store(e, DEVICE_NOT_FOUND))?;
    Ok(ItemsResponse::new(&state, device))
}

async fn get_device_sensors(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
) -> Result<Json<ItemsResponse<Vec<Sensor>>>, AppError> {
    let sensors = state.metadata.sensor_docs_of_device(&device_id).await?;
    if sensors.is_empty() {
        return Err(AppError::NotFound(DEVICE_HAS_NO_SENSORS.to_string()));
    }
    Ok(ItemsResponse::new(&state, sensors))
}

async fn get_device_readings(
    State(state): State<Arc<AppState>>,
    Path(device_id): Path<String>,
    params: Result<Query<ReadingsParams>, QueryRejection>,
) -> Result<Json<ItemsResponse<Vec<Reading>>>, AppError> {
    let Query(params) = params?;
    let window = resolve_window(&params)?;
    let result = state
        .aggregator
        .readings_for_device(&device_id, &window)
        .await
        .map_err(|e| AppError::from_aggregate(e, DEVICE_HAS_NO_READINGS))?;
    Ok(ItemsResponse::new(&state, result.readings))
}

async fn list_sensors(
    State(state): State<Arc<AppState>>,
) -> Result<Json<ItemsResponse<Vec<Sensor>>>, AppError> {
    let sensors = state.metadata.sensors().await?;
    Ok(ItemsResponse::new(&state, sensors))
}

async fn get_sensor(
    State(state): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
) -> Result<Json<ItemsResponse<Sensor>>, AppError> {
    let sensor = state
        .metadata
        .sensor(&SensorId::new(sensor_id))
        .await
        .map_err(|e| AppError::not_found_or_store(e, SENSOR_NOT_FOUND))?;
    Ok(ItemsResponse::new(&state, sensor))
}

async fn get_sensor_readings(
    State(state): State<Arc<AppState>>,
    Path(sensor_id): Path<String>,
    params: Result<Query<ReadingsParams>, QueryRejection>,
) -> Result<Json<ItemsResponse<Vec<Reading>>>, AppError> {
    let Query(params) = params?;
    let window = resolve_window(&params)?;
    let result = state
        .aggregator
        .readings_for_sensor(&SensorId::new(sensor_id), &window)
        .await
        .map_err(|e| AppError::from_aggregate(e, SENSOR_HAS_NO_READINGS))?;
    Ok(ItemsResponse::new(&state, result.readings))
}

async fn get_all_readings(
    State(state): State<Arc<AppState>>,
    params: Result<Query<ReadingsParams>, QueryRejection>,
) -> Result<Json<ItemsResponse<Vec<Reading>>>, AppError> {
    let Query(params) = params?;
    let window = resolve_window(&params)?;
    let result = state
        .aggregator
        .readings_for_fleet(&window)
        .await
        .map_err(|e| AppError::from_aggregate(e, FLEET_HAS_NO_READINGS))?;
    Ok(ItemsResponse::new(&state, result.readings))
}

fn resolve_window(params: &ReadingsParams) -> Result<TimeWindow, AppError> {
    let window = TimeWindow::resolve(params, OffsetDateTime::now_utc())?;
    if params.start_date.as_deref().is_none_or(str::is_empty)
        && params.end_date.as_deref().is_some_and(|v| !v.is_empty())
    {
        debug!("Ignoring endDate without startDate");
    }
    debug!("Resolved time window {:?}", window);
    Ok(window)
}

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    NotFound(String),
    BadRequest(String),
    Store(kentnet_store::Error),
}

impl AppError {
    /// Map a document lookup failure, using `message` for a missing document.
    fn not_found_or_store(e: kentnet_store::Error, message: &str) -> Self {
        if e.is_not_found() {
            AppError::NotFound(message.to_string())
        } else {
            AppError::Store(e)
        }
    }

    /// Map an aggregate failure, using `message` for an empty result.
    fn from_aggregate(e: AggregateError, message: &str) -> Self {
        match e {
            AggregateError::NotFound => AppError::NotFound(message.to_string()),
            AggregateError::Store(e) => AppError::Store(e),
        }
    }
}

impl From<kentnet_store::Error> for AppError {
    fn from(e: kentnet_store::Error) -> Self {
        AppError::Store(e)
    }
}

impl From<ParamError> for AppError {
    fn from(e: ParamError) -> Self {
        AppError::BadRequest(format!("User supplied parameter error: {}", e))
    }
}

impl From<QueryRejection> for AppError {
    fn from(e: QueryRejection) -> Self {
        AppError::BadRequest(format!("User supplied parameter error: {}", e.body_text()))
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let (status, message) = match self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Store(e) => {
                error!("Store error: {}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };

        let body = serde_json::json!({
            "error": message,
        });

        (status, Json(body)).into_response()
    }
}
