//! Tracker backends: the contract, the registry, and the GitHub
//! implementation.
//!
//! A backend talks to one remote tracker API and emits normalized
//! pull-request records page by page, ordered by modification time. The
//! sync pipeline drives any backend through the [`TrackerBackend`] trait;
//! the [`BackendRegistry`] selects an implementation by configured name and
//! fails fast on unknown names before any network or database activity.

pub mod error;
pub mod github;
pub mod locator;
pub mod models;
pub mod rate_limit;
pub mod registry;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use error::SyncError;
pub use github::GithubBackend;
pub use locator::{RepositoryName, RepositoryOwner, TrackerLocator};
pub use models::{
    CommentRecord, CommitRecord, FetchedPage, ItemError, PullRequestRecord, PullRequestState,
    ReviewRecord,
};
pub use rate_limit::RateLimitInfo;
pub use registry::{BackendBuilder, BackendRegistry};

/// A pluggable tracker integration.
///
/// Implementations handle their remote API's pagination, rate limits, and
/// field mapping, and emit pages of normalized records. Pages are requested
/// sequentially; `page` is 1-based and `since` carries the stored
/// watermark. Items modified exactly at the watermark must be included —
/// the store's idempotent upserts absorb the re-processed boundary item.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait TrackerBackend: Send + Sync {
    /// Fetches one page of pull requests modified at or after `since`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] for fatal failures: rejected credentials, an
    /// exhausted quota that does not recover within the bounded wait, or
    /// network errors that outlive the retry budget. Malformed items are
    /// not errors; they are reported in the page's `item_errors`.
    async fn fetch_page(
        &self,
        since: Option<DateTime<Utc>>,
        page: u32,
    ) -> Result<FetchedPage, SyncError>;
}
