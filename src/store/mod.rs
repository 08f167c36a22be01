//! Shared project datastore access and migrations.
//!
//! The datastore is a `SQLite` database shared with the wider mining
//! platform. Its schema is managed with Diesel migrations, and all sync
//! writes go through the [`StoreGateway`] trait so the pipeline can be
//! tested against mocks.

mod error;
mod gateway;
mod migrator;
mod models;
mod sqlite;

pub use error::StoreError;
pub use gateway::{PageCounts, StoreGateway};
pub use migrator::{INITIAL_SCHEMA_VERSION, SchemaVersion, migrate_database};
pub use models::{Project, TrackerSystem};
pub use sqlite::SqliteStore;

#[cfg(test)]
pub use gateway::MockStoreGateway;
