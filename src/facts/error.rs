//! Error taxonomy for fact retrieval.
//!
//! An empty result is never an error: empty series and empty latest-value
//! maps are valid terminal states. Everything here maps onto an HTTP status
//! via [`FactError::status_code`].

use std::time::Duration;

use thiserror::Error;

/// Failure while validating or running a fact query.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum FactError {
    /// The store could not be reached (connection refused, auth, I/O).
    #[error("fact store unavailable: {0}")]
    StoreUnavailable(String),

    /// The store accepted the connection but the statement ran past the
    /// configured query timeout.
    #[error("fact store query timed out after {}s", .0.as_secs())]
    StoreTimeout(Duration),

    /// The store rejected the statement for some other reason.
    #[error("fact store rejected query: {0}")]
    QueryFailed(String),

    /// Invalid fact name or time bound. Raised before any network call.
    #[error("malformed query: {0}")]
    MalformedQuery(String),
}

impl FactError {
    /// HTTP status code surfaced to callers of the dashboard.
    pub fn status_code(&self) -> u16 {
        match self {
            Self::StoreUnavailable(_) => 503,
            Self::StoreTimeout(_) => 504,
            Self::QueryFailed(_) => 500,
            Self::MalformedQuery(_) => 400,
        }
    }
}
