//! Error types for kentnet-store.

/// Result type for kentnet-store operations.
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur while talking to the metadata or time-series store.
///
/// Apart from [`Error::NotFound`], every variant is a store failure and maps
/// to a server error at the HTTP boundary.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// The requested document does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The store could not be reached.
    #[error("Store not reachable at {url}: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    /// The store did not answer within the configured timeout.
    #[error("Store request to {url} timed out")]
    Timeout { url: String },

    /// The store answered with an unexpected HTTP status.
    #[error("Store at {url} returned HTTP {status}")]
    Status { url: String, status: u16 },

    /// The store rejected or failed the query.
    #[error("Query error: {0}")]
    Query(String),

    /// The response body could not be decoded.
    #[error("Malformed response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },

    /// A configured endpoint is not a usable URL.
    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    /// The HTTP client could not be constructed.
    #[error("HTTP client error: {0}")]
    Client(#[source] reqwest::Error),
}

impl Error {
    /// Whether this error means "no such document" rather than a failure.
    #[must_use]
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }

    /// Classify a reqwest send/receive failure.
    pub(crate) fn from_reqwest(url: &str, source: reqwest::Error) -> Self {
        if source.is_timeout() {
            Error::Timeout {
                url: url.to_string(),
            }
        } else {
            Error::Transport {
                url: url.to_string(),
                source,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_not_found_classification() {
        assert!(Error::NotFound("dev-1".to_string()).is_not_found());
        assert!(!Error::Query("boom".to_string()).is_not_found());
        assert!(
            !Error::Status {
                url: "http://couch/x".to_string(),
                status: 500
            }
            .is_not_found()
        );
    }

    #[test]
    fn test_error_display() {
        let err = Error::Status {
            url: "http://couch/kentnetwork/dev-1".to_string(),
            status: 503,
        };
        let display = err.to_string();
        assert!(display.contains("503"));
        assert!(display.contains("kentnetwork/dev-1"));

        let err = Error::Timeout {
            url: "http://influx/query".to_string(),
        };
        assert!(err.to_string().contains("timed out"));
    }
}
