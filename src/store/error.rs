//! Error types for the shared project datastore.

use thiserror::Error;

/// Errors returned while accessing or migrating the project datastore.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    /// The database URL/path was present but blank.
    #[error("database URL must not be blank")]
    BlankDatabaseUrl,

    /// Establishing a `SQLite` connection failed.
    #[error("failed to connect to SQLite database: {message}")]
    ConnectionFailed {
        /// Error detail from Diesel.
        message: String,
    },

    /// Running pending migrations failed.
    #[error("failed to run database migrations: {message}")]
    MigrationFailed {
        /// Error detail from Diesel migrations.
        message: String,
    },

    /// Enabling foreign key enforcement failed.
    #[error("failed to enable foreign keys: {message}")]
    ForeignKeysEnableFailed {
        /// Error detail from the PRAGMA execution.
        message: String,
    },

    /// Reading the schema version from the migration table failed.
    #[error("failed to read schema version after migrations: {message}")]
    SchemaVersionQueryFailed {
        /// Error detail from Diesel query execution.
        message: String,
    },

    /// The migrations completed but no schema version could be found.
    #[error("no schema version recorded after migrations ran")]
    MissingSchemaVersion,

    /// The datastore schema has not been initialised.
    #[error("datastore schema is missing; run with --migrate-db first")]
    SchemaNotInitialised,

    /// The named project does not exist in the datastore.
    #[error("project {name} not found")]
    ProjectNotFound {
        /// Project name that failed to resolve.
        name: String,
    },

    /// A read query failed.
    #[error("datastore query failed: {message}")]
    QueryFailed {
        /// Error detail from Diesel query execution.
        message: String,
    },

    /// A write statement failed.
    #[error("datastore write failed: {message}")]
    WriteFailed {
        /// Error detail from Diesel statement execution.
        message: String,
    },
}
