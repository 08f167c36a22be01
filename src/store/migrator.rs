//! Diesel-backed migration runner for the project datastore.

use diesel::Connection;
use diesel::OptionalExtension;
use diesel::QueryableByName;
use diesel::RunQueryDsl;
use diesel::sql_query;
use diesel::sql_types::Text;
use diesel::sqlite::SqliteConnection;
use diesel_migrations::{EmbeddedMigrations, MigrationHarness, embed_migrations};

use crate::report::{SyncEvent, SyncReporter};

use super::error::StoreError;

/// Embedded Diesel migrations shipped with the binary.
pub const MIGRATIONS: EmbeddedMigrations = embed_migrations!("migrations");

/// Initial schema version recorded by the first migration in this repository.
pub const INITIAL_SCHEMA_VERSION: &str = "20260720000000";

/// A Diesel migration version string.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchemaVersion(String);

impl SchemaVersion {
    /// Returns the inner version string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Runs pending datastore migrations and reports the resulting schema
/// version.
///
/// # Errors
///
/// Returns [`StoreError`] when the database cannot be opened, migrations
/// fail, or the resulting schema version cannot be read.
pub fn migrate_database(
    database_url: &str,
    reporter: &dyn SyncReporter,
) -> Result<SchemaVersion, StoreError> {
    let database_url_trimmed = database_url.trim();
    if database_url_trimmed.is_empty() {
        return Err(StoreError::BlankDatabaseUrl);
    }

    let mut connection = SqliteConnection::establish(database_url_trimmed).map_err(|error| {
        StoreError::ConnectionFailed {
            message: error.to_string(),
        }
    })?;

    enable_foreign_keys(&mut connection)?;

    connection
        .run_pending_migrations(MIGRATIONS)
        .map_err(|error| StoreError::MigrationFailed {
            message: error.to_string(),
        })?;

    let schema_version = read_schema_version(&mut connection)?;
    reporter.record(SyncEvent::SchemaVersionRecorded {
        schema_version: schema_version.as_str().to_owned(),
    });

    Ok(schema_version)
}

fn enable_foreign_keys(connection: &mut SqliteConnection) -> Result<(), StoreError> {
    sql_query("PRAGMA foreign_keys = ON;")
        .execute(connection)
        .map(drop)
        .map_err(|error| StoreError::ForeignKeysEnableFailed {
            message: error.to_string(),
        })
}

fn read_schema_version(connection: &mut SqliteConnection) -> Result<SchemaVersion, StoreError> {
    #[derive(Debug, QueryableByName)]
    struct Row {
        #[diesel(sql_type = Text)]
        version: String,
    }

    let result: Option<Row> =
        sql_query("SELECT version FROM __diesel_schema_migrations ORDER BY version DESC LIMIT 1;")
            .get_result(connection)
            .optional()
            .map_err(|error| StoreError::SchemaVersionQueryFailed {
                message: error.to_string(),
            })?;

    let Some(row) = result else {
        return Err(StoreError::MissingSchemaVersion);
    };

    Ok(SchemaVersion(row.version))
}

#[cfg(test)]
mod tests {
    use super::{INITIAL_SCHEMA_VERSION, migrate_database};
    use crate::report::SyncEvent;
    use crate::report::test_support::RecordingReporter;

    #[test]
    fn migrate_database_reports_schema_version() {
        let reporter = RecordingReporter::default();

        let schema_version =
            migrate_database(":memory:", &reporter).expect("migration should succeed");

        assert_eq!(schema_version.as_str(), INITIAL_SCHEMA_VERSION);
        assert_eq!(
            reporter.take(),
            vec![SyncEvent::SchemaVersionRecorded {
                schema_version: INITIAL_SCHEMA_VERSION.to_owned(),
            }]
        );
    }

    #[test]
    fn migrate_database_rejects_blank_url() {
        let reporter = RecordingReporter::default();

        let error = migrate_database("   ", &reporter).expect_err("blank URL should fail");

        assert_eq!(error, super::StoreError::BlankDatabaseUrl);
    }
}
