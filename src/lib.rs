//! Prmine library crate: incremental pull-request mining into a shared
//! `SQLite` datastore.
//!
//! The library talks to a tracker API (GitHub by default) through a
//! pluggable backend, normalizes pull requests with their reviews,
//! comments, and commits, and upserts them idempotently page by page. A
//! per-tracker watermark keeps repeat runs incremental: only items
//! modified at or after the stored watermark are re-processed, and the
//! watermark advances only after a run commits cleanly.

pub mod config;
pub mod report;
pub mod store;
pub mod sync;
pub mod tracker;

pub use config::MineConfig;
pub use report::{NoopSyncReporter, StderrJsonlReporter, SyncEvent, SyncReporter};
pub use store::{PageCounts, SqliteStore, StoreError, StoreGateway, migrate_database};
pub use sync::{SyncPipeline, SyncResult};
pub use tracker::{BackendRegistry, FetchedPage, PullRequestRecord, SyncError, TrackerBackend};
