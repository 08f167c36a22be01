//! Domain rows read from and written to the project datastore.

use chrono::{DateTime, Utc};

/// A software project being mined. Pre-existing input; sync only reads it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Project {
    /// Datastore row identifier.
    pub id: i64,
    /// Unique project name.
    pub name: String,
}

/// One configured remote tracker instance for a project.
///
/// Created at most once per `(project, url)` pair; its `last_synced`
/// watermark is the only field the sync pipeline mutates, exactly once per
/// successful run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerSystem {
    /// Datastore row identifier.
    pub id: i64,
    /// Owning project row identifier.
    pub project_id: i64,
    /// Tracker URL, unique within the project.
    pub url: String,
    /// High-water mark below which all data is known to be synced.
    /// `None` means the tracker has never been synced.
    pub last_synced: Option<DateTime<Utc>>,
}
