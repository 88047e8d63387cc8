//! HTTP adapter tests against local stub servers.

use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;

use axum::extract::{Path, Query};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::{Json, Router};
use serde_json::{Value, json};

use kentnet_store::{
    CouchClient, Error, InfluxClient, MetadataStore, ReadingQuery, TimeSeriesStore, decode_rows,
};
use kentnet_types::{SensorId, TimeWindow};
use time::macros::datetime;

async fn serve(app: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr: SocketAddr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

// ==========================================================================
// CouchDB stub
// ==========================================================================

async fn couch_doc(Path((db, id)): Path<(String, String)>) -> Response {
    if db != "kentnetwork" {
        return (StatusCode::NOT_FOUND, Json(json!({"error": "not_found"}))).into_response();
    }
    match id.as_str() {
        "dev-1" => Json(json!({
            "_id": "dev-1",
            "_rev": "1-abc",
            "@id": "dev-1",
            "location": {"nearestTown": "Canterbury", "lat": 51.28, "lon": 1.08},
            "batteryType": "AA"
        }))
        .into_response(),
        "a/b" => Json(json!({"@id": "a/b", "parentDevice": "dev-1", "unit": "mm"})).into_response(),
        "broken" => "not json".into_response(),
        "teapot" => StatusCode::IM_A_TEAPOT.into_response(),
        _ => (
            StatusCode::NOT_FOUND,
            Json(json!({"error": "not_found", "reason": "missing"})),
        )
            .into_response(),
    }
}

async fn couch_view(
    Path((db, design, view)): Path<(String, String, String)>,
    Query(params): Query<HashMap<String, String>>,
) -> Response {
    if db != "kentnetwork" {
        return StatusCode::NOT_FOUND.into_response();
    }
    let include_docs = params.get("include_docs").map(String::as_str) == Some("true");

    match (design.as_str(), view.as_str()) {
        ("sensors", "getByDeviceID") => {
            // Keys arrive JSON-encoded.
            let start: String = serde_json::from_str(&params["startkey"]).unwrap();
            let end: String = serde_json::from_str(&params["endkey"]).unwrap();
            assert_eq!(end, format!("{start}\u{fff0}"));

            let rows: Vec<Value> = if start == "dev-1" {
                ["s-1", "s-2"]
                    .iter()
                    .map(|id| {
                        let mut row = json!({"id": id, "key": "dev-1", "value": null});
                        if include_docs {
                            row["doc"] = json!({"@id": id, "parentDevice": "dev-1"});
                        }
                        row
                    })
                    .collect()
            } else {
                Vec::new()
            };
            Json(json!({"total_rows": 3, "offset": 0, "rows": rows})).into_response()
        }
        ("sensors", "getSensors") => {
            let rows: Vec<Value> = ["s-1", "s-2", "s-3"]
                .iter()
                .map(|id| {
                    let mut row = json!({"id": id, "key": id, "value": null});
                    if include_docs {
                        row["doc"] = json!({"@id": id});
                    }
                    row
                })
                .collect();
            Json(json!({"total_rows": 3, "offset": 0, "rows": rows})).into_response()
        }
        ("devices", "getDevices") => Json(json!({
            "total_rows": 1,
            "offset": 0,
            "rows": [{"id": "dev-1", "key": "dev-1", "value": null, "doc": {"@id": "dev-1"}}]
        }))
        .into_response(),
        _ => StatusCode::NOT_FOUND.into_response(),
    }
}

async fn couch() -> CouchClient {
    let app = Router::new()
        .route("/", get(|| async { Json(json!({"couchdb": "Welcome"})) }))
        .route("/{db}/{id}", get(couch_doc))
        .route("/{db}/_design/{design}/_view/{view}", get(couch_view));
    let url = serve(app).await;
    CouchClient::new(&url, "kentnetwork", Duration::from_secs(5)).unwrap()
}

#[tokio::test]
async fn test_couch_document_fetch() {
    let couch = couch().await;

    let device = couch.device("dev-1").await.unwrap();
    assert_eq!(device.id, "dev-1");
    assert_eq!(device.location.nearest_town.as_deref(), Some("Canterbury"));
    assert_eq!(device.battery_type.as_deref(), Some("AA"));

    let sensor = couch.sensor(&SensorId::from("a/b")).await.unwrap();
    assert_eq!(sensor.unit.as_deref(), Some("mm"));
}

#[tokio::test]
async fn test_couch_not_found_and_failures() {
    let couch = couch().await;

    match couch.device("nope").await {
        Err(Error::NotFound(id)) => assert_eq!(id, "nope"),
        other => panic!("expected NotFound, got {other:?}"),
    }

    assert!(matches!(
        couch.device("teapot").await,
        Err(Error::Status { status: 418, .. })
    ));
    assert!(matches!(
        couch.device("broken").await,
        Err(Error::Decode { .. })
    ));
}

#[tokio::test]
async fn test_couch_sensor_sets() {
    let couch = couch().await;

    let sensors = couch.sensors_of_device("dev-1").await.unwrap();
    assert_eq!(sensors, vec![SensorId::from("s-1"), SensorId::from("s-2")]);

    // Unknown device and sensorless device look the same.
    assert!(couch.sensors_of_device("dev-9").await.unwrap().is_empty());

    assert_eq!(couch.all_sensors().await.unwrap().len(), 3);
}

#[tokio::test]
async fn test_couch_document_listings() {
    let couch = couch().await;

    let devices = couch.devices().await.unwrap();
    assert_eq!(devices.len(), 1);

    let sensors = couch.sensors().await.unwrap();
    assert_eq!(sensors.len(), 3);

    let docs = couch.sensor_docs_of_device("dev-1").await.unwrap();
    assert_eq!(docs.len(), 2);
    assert!(
        docs.iter()
            .all(|s| s.parent_device.as_deref() == Some("dev-1"))
    );
}

#[tokio::test]
async fn test_couch_missing_database_is_store_error() {
    let url = serve(Router::new().route(
        "/{db}/_design/{design}/_view/{view}",
        get(|| async { StatusCode::NOT_FOUND }),
    ))
    .await;
    let couch = CouchClient::new(&url, "other", Duration::from_secs(5)).unwrap();

    let err = couch.all_sensors().await.unwrap_err();
    assert!(!err.is_not_found());
}

#[tokio::test]
async fn test_couch_ping() {
    let couch = couch().await;
    assert!(couch.ping().await.is_ok());
}

// ==========================================================================
// InfluxDB stub
// ==========================================================================

async fn influx_query(Query(params): Query<HashMap<String, String>>) -> Response {
    let db = params.get("db").cloned().unwrap_or_default();
    let q = params.get("q").cloned().unwrap_or_default();
    let bound: Value = params
        .get("params")
        .map(|p| serde_json::from_str(p).unwrap())
        .unwrap_or(Value::Null);

    match db.as_str() {
        "slow" => {
            tokio::time::sleep(Duration::from_secs(2)).await;
            Json(json!({"results": [{"statement_id": 0}]})).into_response()
        }
        "bad" => (
            StatusCode::BAD_REQUEST,
            Json(json!({"error": "error parsing query: found EOF"})),
        )
            .into_response(),
        "down" => StatusCode::SERVICE_UNAVAILABLE.into_response(),
        "kentnetwork" => {
            // Sensor ids must only travel as bound parameters.
            assert!(q.contains("$sensor"));
            assert!(!q.contains("R_T_0042"));

            if bound["sensor"] != "R_T_0042" {
                return Json(json!({"results": [{"statement_id": 0}]})).into_response();
            }
            let mut values = vec![
                json!(["2020-01-02T00:00:00Z", 2.5]),
                json!(["2020-01-01T00:00:00Z", 1]),
                json!(["not-a-time", 3.0]),
            ];
            if bound.get("start").is_some() {
                assert_eq!(bound["start"], "2020-01-01T00:00:00Z");
                assert_eq!(bound["end"], "2020-01-31T00:00:00Z");
                values.truncate(1);
            }
            Json(json!({"results": [{
                "statement_id": 0,
                "series": [{"name": "readings", "columns": ["time", "value"], "values": values}]
            }]}))
            .into_response()
        }
        _ => Json(json!({"results": [{"statement_id": 0, "error": "database not found"}]}))
            .into_response(),
    }
}

async fn influx(timeout: Duration) -> InfluxClient {
    let app = Router::new()
        .route("/query", get(influx_query))
        .route("/ping", get(|| async { StatusCode::NO_CONTENT }));
    let url = serve(app).await;
    InfluxClient::new(&url, timeout)
        .unwrap()
        .credentials("reader", "secret")
}

fn sensor() -> SensorId {
    SensorId::from("R_T_0042")
}

#[tokio::test]
async fn test_influx_execute_and_decode() {
    let influx = influx(Duration::from_secs(5)).await;
    let query = ReadingQuery::build(&sensor(), &TimeWindow::Latest, 100);

    let rows = influx.execute(&query, "kentnetwork").await.unwrap();
    assert_eq!(rows.len(), 3);

    let (readings, failures) = decode_rows(&sensor(), &rows);
    assert_eq!(readings.len(), 2);
    assert_eq!(readings[0].value, 2.5);
    assert_eq!(readings[1].value, 1.0);
    assert_eq!(failures.len(), 1);
}

#[tokio::test]
async fn test_influx_range_parameters() {
    let influx = influx(Duration::from_secs(5)).await;
    let window = TimeWindow::Range {
        start: datetime!(2020-01-01 00:00:00 UTC),
        end: datetime!(2020-01-31 00:00:00 UTC),
    };
    let query = ReadingQuery::build(&sensor(), &window, 100);

    let rows = influx.execute(&query, "kentnetwork").await.unwrap();
    assert_eq!(rows.len(), 1);
}

#[tokio::test]
async fn test_influx_no_series_is_empty() {
    let influx = influx(Duration::from_secs(5)).await;
    let query = ReadingQuery::build(&SensorId::from("quiet"), &TimeWindow::Unbounded, 100);
    assert!(influx.execute(&query, "kentnetwork").await.unwrap().is_empty());
}

#[tokio::test]
async fn test_influx_errors() {
    let influx = influx(Duration::from_secs(5)).await;
    let query = ReadingQuery::build(&sensor(), &TimeWindow::Latest, 100);

    assert!(matches!(
        influx.execute(&query, "bad").await,
        Err(Error::Query(m)) if m.contains("parsing")
    ));
    assert!(matches!(
        influx.execute(&query, "down").await,
        Err(Error::Status { status: 503, .. })
    ));
    assert!(matches!(
        influx.execute(&query, "unknown").await,
        Err(Error::Query(_))
    ));
}

#[tokio::test]
async fn test_influx_timeout() {
    let influx = influx(Duration::from_millis(200)).await;
    let query = ReadingQuery::build(&sensor(), &TimeWindow::Latest, 100);

    assert!(matches!(
        influx.execute(&query, "slow").await,
        Err(Error::Timeout { .. })
    ));
}

#[tokio::test]
async fn test_influx_unreachable() {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);

    let influx = InfluxClient::new(&format!("http://{addr}"), Duration::from_secs(2)).unwrap();
    let query = ReadingQuery::build(&sensor(), &TimeWindow::Latest, 100);

    let err = influx.execute(&query, "kentnetwork").await.unwrap_err();
    assert!(matches!(err, Error::Transport { .. } | Error::Timeout { .. }));
    assert!(influx.ping().await.is_err());
}

#[tokio::test]
async fn test_influx_ping() {
    let influx = influx(Duration::from_secs(5)).await;
    assert!(influx.ping().await.is_ok());
}
