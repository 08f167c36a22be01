//! Error types surfaced by tracker backends and the sync pipeline.

use thiserror::Error;

use crate::store::StoreError;

use super::rate_limit::RateLimitInfo;

/// Fatal errors for a sync run.
///
/// Non-fatal per-item failures are [`ItemError`](super::ItemError) values
/// collected in the run summary instead.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum SyncError {
    /// No backend is registered under the configured name.
    #[error("backend {name} is not supported")]
    BackendNotSupported {
        /// The unrecognised backend name.
        name: String,
    },

    /// The tracker URL could not be parsed.
    #[error("tracker URL is invalid: {0}")]
    InvalidUrl(String),

    /// The tracker URL path does not contain owner and repository segments.
    #[error("tracker URL must match <host>/<owner>/<repo>")]
    MissingPathSegments,

    /// The remote tracker rejected the configured credentials.
    #[error("tracker rejected the credentials: {message}")]
    Authentication {
        /// Error message returned with the 401/403 response.
        message: String,
    },

    /// The remote quota was exhausted and did not recover within the
    /// bounded wait policy.
    #[error("tracker rate limit exceeded: {message}")]
    RateLimitExceeded {
        /// Quota snapshot from response headers, if available.
        rate_limit: Option<RateLimitInfo>,
        /// Error message describing the exhausted quota.
        message: String,
    },

    /// Networking failed after exhausting bounded retries.
    #[error("network error talking to the tracker: {message}")]
    Network {
        /// Transport-level error detail.
        message: String,
    },

    /// The remote API returned a non-authentication error.
    #[error("tracker API error: {message}")]
    Api {
        /// Response body or status describing the failure.
        message: String,
    },

    /// Configuration could not be loaded or validated.
    #[error("configuration error: {message}")]
    Configuration {
        /// Details about the configuration failure.
        message: String,
    },

    /// A datastore operation failed.
    #[error("datastore error: {0}")]
    Store(#[from] StoreError),

    /// Local I/O operation failed.
    #[error("I/O error: {message}")]
    Io {
        /// Error detail from the underlying I/O operation.
        message: String,
    },
}
