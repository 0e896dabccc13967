//! Error types for LODES downloads and aggregation.

use thiserror::Error;

/// Errors surfaced by the public `wac`/`rac`/`od`/`to_points`/`to_lines`
/// operations. Everything except `Fetch` is detected before any network
/// access is attempted.
#[derive(Debug, Error)]
pub enum Error {
    /// LODES7 covers 2002 through 2017 inclusive.
    #[error("LODES data is unavailable for {0}; supported years are 2002-2017")]
    UnsupportedYear(u16),

    /// A geography, segment or job type code outside the accepted set.
    #[error("invalid {name}: {value:?} (expected one of {expected})")]
    InvalidParameter {
        name: &'static str,
        value: String,
        expected: &'static str,
    },

    /// OD request with neither origins nor destinations, or an empty
    /// location list for WAC/RAC.
    #[error("at least one non-empty list of origins or destinations is required")]
    MissingArea,

    /// A GEOID whose length does not correspond to any geography level,
    /// or a truncation request to a level finer than the id itself.
    #[error("invalid GEOID {0:?}: length must be one of 2, 5, 7, 10, 11, 12 or 15")]
    InvalidGeoId(String),

    /// Block-level point joins and polygon joins are not supported.
    #[error("unsupported geography for coordinate join: {0}")]
    UnsupportedGeography(String),

    #[error(transparent)]
    Fetch(#[from] FetchError),

    /// Failure while writing CSV output.
    #[error("failed to write CSV output: {0}")]
    Csv(#[from] csv::Error),
}

/// A remote resource could not be retrieved or decoded. There is no retry
/// and no partial result; the whole request aborts.
#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request for {url} failed: {source}")]
    Http {
        url: String,
        #[source]
        source: reqwest::Error,
    },

    #[error("{url} returned HTTP status {status}")]
    Status { url: String, status: u16 },

    #[error("malformed table at {url}: {reason}")]
    Malformed { url: String, reason: String },
}

impl FetchError {
    pub fn malformed(url: &str, reason: impl Into<String>) -> Self {
        FetchError::Malformed {
            url: url.to_string(),
            reason: reason.into(),
        }
    }
}

pub type Result<T, E = Error> = std::result::Result<T, E>;
