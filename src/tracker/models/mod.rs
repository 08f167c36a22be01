//! Normalized pull-request records emitted by tracker backends.
//!
//! Backends map their remote API's representation into these records; the
//! store persists them keyed by external identifier. A record carries its
//! sub-entities (reviews, comments, commit references) so a page commit can
//! write a pull request and its children in one transaction.

use chrono::{DateTime, Utc};

use super::rate_limit::RateLimitInfo;

#[cfg(any(test, feature = "test-support"))]
pub mod test_support;

/// Lifecycle state of a pull request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum PullRequestState {
    /// Open and awaiting review or merge.
    #[default]
    Open,
    /// Closed without being merged.
    Closed,
    /// Merged into the target branch.
    Merged,
}

impl PullRequestState {
    /// Stable string form stored in the datastore.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Open => "open",
            Self::Closed => "closed",
            Self::Merged => "merged",
        }
    }
}

/// One review attached to a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ReviewRecord {
    /// External review identifier, unique within the parent pull request.
    pub external_id: String,
    /// Reviewer login if present.
    pub reviewer: Option<String>,
    /// Review verdict (e.g. approved, changes requested).
    pub state: Option<String>,
    /// Review body text.
    pub body: Option<String>,
    /// Submission timestamp.
    pub submitted_at: Option<DateTime<Utc>>,
}

/// One discussion comment attached to a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommentRecord {
    /// External comment identifier, unique within the parent pull request.
    pub external_id: String,
    /// Author login if present.
    pub author: Option<String>,
    /// Comment body text.
    pub body: Option<String>,
    /// Creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification timestamp.
    pub updated_at: Option<DateTime<Utc>>,
}

/// One commit referenced by a pull request.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommitRecord {
    /// Commit SHA, unique within the parent pull request.
    pub external_id: String,
    /// Author name or login if present.
    pub author: Option<String>,
    /// Commit message.
    pub message: Option<String>,
    /// Commit timestamp.
    pub committed_at: Option<DateTime<Utc>>,
}

/// One normalized pull request with its sub-entities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PullRequestRecord {
    /// External tracker identifier, immutable within a tracker system.
    pub external_id: String,
    /// Title of the pull request.
    pub title: Option<String>,
    /// Author login if present.
    pub author: Option<String>,
    /// Lifecycle state.
    pub state: PullRequestState,
    /// Creation timestamp.
    pub created_at: Option<DateTime<Utc>>,
    /// Last modification timestamp; drives the sync watermark.
    pub updated_at: DateTime<Utc>,
    /// Closing timestamp, if closed or merged.
    pub closed_at: Option<DateTime<Utc>>,
    /// Source branch ref.
    pub source_branch: Option<String>,
    /// Target branch ref.
    pub target_branch: Option<String>,
    /// Reviews attached to this pull request.
    pub reviews: Vec<ReviewRecord>,
    /// Discussion comments attached to this pull request.
    pub comments: Vec<CommentRecord>,
    /// Commits referenced by this pull request.
    pub commits: Vec<CommitRecord>,
}

/// A non-fatal mapping failure for one remote item.
///
/// Malformed items are skipped and surfaced in the run summary; they never
/// abort a run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ItemError {
    /// External identifier of the failed item, when recoverable.
    pub external_id: Option<String>,
    /// Why the item could not be mapped.
    pub message: String,
}

/// One bounded batch of remote results.
///
/// Items are sorted by modification time ascending before they are handed
/// to the pipeline, so committing pages in order keeps the watermark
/// meaningful.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FetchedPage {
    /// Normalized pull requests in this page, oldest modification first.
    pub items: Vec<PullRequestRecord>,
    /// Non-fatal mapping failures encountered in this page.
    pub item_errors: Vec<ItemError>,
    /// Whether the remote reports further pages after this one.
    pub has_next: bool,
    /// Remote quota snapshot observed while fetching this page, if any.
    pub rate_limit: Option<RateLimitInfo>,
}
