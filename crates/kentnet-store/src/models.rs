//! Wire envelopes returned by the document and time-series stores.

use serde::Deserialize;
use serde_json::Value;

/// Response of a CouchDB view query.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewResponse<D> {
    /// Total rows in the view (not the number returned).
    #[serde(default)]
    pub total_rows: Option<u64>,
    /// Offset of the first returned row.
    #[serde(default)]
    pub offset: Option<u64>,
    /// Returned rows in view order.
    #[serde(default = "Vec::new")]
    pub rows: Vec<ViewRow<D>>,
}

/// A single CouchDB view row.
///
/// `doc` is only present when the view was queried with `include_docs=true`.
#[derive(Debug, Clone, Deserialize)]
pub struct ViewRow<D> {
    /// Id of the document that emitted the row.
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub key: Value,
    #[serde(default)]
    pub value: Value,
    #[serde(default = "Option::default")]
    pub doc: Option<D>,
}

/// Response of an InfluxDB 1.x `/query` call.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct QueryResponse {
    #[serde(default)]
    pub results: Vec<StatementResult>,
    /// Request-level error (bad syntax, authentication, unknown database).
    #[serde(default)]
    pub error: Option<String>,
}

/// Result of one InfluxQL statement.
///
/// An absent `series` means the statement matched no rows.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct StatementResult {
    #[serde(default)]
    pub statement_id: Option<u64>,
    #[serde(default)]
    pub series: Vec<Series>,
    #[serde(default)]
    pub error: Option<String>,
}

/// One series of an InfluxQL result.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Series {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub tags: Option<serde_json::Map<String, Value>>,
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub values: Vec<RawRow>,
}

/// An undecoded result row: `[time, value, ...]`.
pub type RawRow = Vec<Value>;
