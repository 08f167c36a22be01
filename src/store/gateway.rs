//! Store gateway contract consumed by the sync pipeline.

use crate::tracker::PullRequestRecord;

use super::error::StoreError;
use super::models::{Project, TrackerSystem};

/// Entity counts produced by committing one page of remote results.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PageCounts {
    /// Pull requests inserted for the first time.
    pub pull_requests_created: u64,
    /// Pull requests updated in place with newer remote data.
    pub pull_requests_updated: u64,
    /// Reviews inserted for the first time.
    pub reviews_created: u64,
    /// Comments inserted for the first time.
    pub comments_created: u64,
    /// Comments updated in place with newer remote data.
    pub comments_updated: u64,
    /// Commit references inserted for the first time.
    pub commits_created: u64,
}

impl PageCounts {
    /// Folds another page's counts into this one.
    pub const fn absorb(&mut self, other: Self) {
        self.pull_requests_created += other.pull_requests_created;
        self.pull_requests_updated += other.pull_requests_updated;
        self.reviews_created += other.reviews_created;
        self.comments_created += other.comments_created;
        self.comments_updated += other.comments_updated;
        self.commits_created += other.commits_created;
    }

    /// Total number of rows created or updated across all entity types.
    #[must_use]
    pub const fn total_changes(&self) -> u64 {
        self.pull_requests_created
            + self.pull_requests_updated
            + self.reviews_created
            + self.comments_created
            + self.comments_updated
            + self.commits_created
    }
}

/// Gateway over the shared project datastore.
///
/// Implementations must keep upserts idempotent: re-persisting an unchanged
/// record leaves the datastore untouched and reports no changes.
#[cfg_attr(test, mockall::automock)]
pub trait StoreGateway: Send + Sync {
    /// Looks up a pre-existing project by name.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ProjectNotFound`] when no project with the
    /// given name exists; the project is owned externally and is never
    /// created by sync.
    fn find_project(&self, name: &str) -> Result<Project, StoreError>;

    /// Finds or creates the tracker-system row for `(project, url)`.
    ///
    /// Implemented as an idempotent upsert so concurrent runs cannot race a
    /// fetch-then-create window into duplicated rows.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the datastore cannot be reached or the
    /// write fails.
    fn find_or_create_tracker_system(
        &self,
        project: &Project,
        url: &str,
    ) -> Result<TrackerSystem, StoreError>;

    /// Commits one page of normalized pull requests atomically.
    ///
    /// Either every record in the page is durably written or none is. Each
    /// pull request is keyed by `(tracker_system, external_id)`: inserted on
    /// first sight, updated in place only when the incoming modification
    /// time is newer, and left untouched otherwise.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the transaction fails; no partial page is
    /// left behind.
    fn persist_page(
        &self,
        system: &TrackerSystem,
        records: &[PullRequestRecord],
    ) -> Result<PageCounts, StoreError>;

    /// Persists the tracker system's watermark.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::WriteFailed`] when the row no longer exists or
    /// the update fails.
    fn save_tracker_system(&self, system: &TrackerSystem) -> Result<(), StoreError>;
}
