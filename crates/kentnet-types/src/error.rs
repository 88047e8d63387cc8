//! Error types for request parameter parsing in kentnet-types.

use thiserror::Error;

/// Errors raised while interpreting a request's temporal parameters.
///
/// Every variant maps to a client error at the HTTP boundary.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[non_exhaustive]
pub enum ParamError {
    /// `latest` was supplied but is not a boolean.
    #[error("invalid 'latest' value '{0}': expected a boolean")]
    InvalidLatest(String),

    /// `startDate` was supplied but is not an RFC 3339 timestamp.
    #[error("invalid 'startDate' value '{0}': expected an RFC 3339 timestamp")]
    InvalidStartDate(String),

    /// `endDate` was supplied but is not an RFC 3339 timestamp.
    #[error("invalid 'endDate' value '{0}': expected an RFC 3339 timestamp")]
    InvalidEndDate(String),

    /// The requested range ends before it starts.
    #[error("invalid time range: 'startDate' ({start}) is after 'endDate' ({end})")]
    InvertedRange { start: String, end: String },
}

/// Result type alias using kentnet-types' ParamError type.
pub type ParamResult<T> = std::result::Result<T, ParamError>;
