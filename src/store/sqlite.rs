//! `SQLite` implementation of the store gateway.
//!
//! Connections are established per operation from the configured
//! `database_url`, with foreign key enforcement enabled. Writes use raw
//! `sql_query` upserts keyed by external identifiers; a page commit runs in
//! one transaction so either the whole page lands or none of it does.

use chrono::{DateTime, SecondsFormat, Timelike, Utc};
use diesel::Connection;
use diesel::OptionalExtension;
use diesel::QueryableByName;
use diesel::RunQueryDsl;
use diesel::sql_query;
use diesel::sql_types::{BigInt, Nullable, Text};
use diesel::sqlite::SqliteConnection;

use crate::tracker::models::{CommentRecord, CommitRecord, PullRequestRecord, ReviewRecord};

use super::error::StoreError;
use super::gateway::{PageCounts, StoreGateway};
use super::models::{Project, TrackerSystem};

/// SQLite-backed project datastore.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    database_url: String,
}

#[derive(Debug, QueryableByName)]
struct IdRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
}

#[derive(Debug, QueryableByName)]
struct CountRow {
    #[diesel(sql_type = BigInt)]
    count: i64,
}

#[derive(Debug, QueryableByName)]
struct ExistingRow {
    #[diesel(sql_type = BigInt)]
    id: i64,
    #[diesel(sql_type = Nullable<Text>)]
    updated_at: Option<String>,
}

impl SqliteStore {
    /// Create a store targeting the configured `database_url`.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::BlankDatabaseUrl`] when the URL is blank.
    pub fn new(database_url: impl Into<String>) -> Result<Self, StoreError> {
        let database_url_string = database_url.into();
        if database_url_string.trim().is_empty() {
            return Err(StoreError::BlankDatabaseUrl);
        }
        Ok(Self {
            database_url: database_url_string,
        })
    }

    /// Inserts a project row if absent and returns it.
    ///
    /// Provisioning helper for the surrounding platform and for tests;
    /// ordinary sync treats projects as externally owned and only reads
    /// them.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the datastore cannot be reached or the
    /// write fails.
    pub fn insert_project(&self, name: &str) -> Result<Project, StoreError> {
        let mut connection = self.establish_connection()?;

        sql_query("INSERT INTO projects (name) VALUES (?) ON CONFLICT (name) DO NOTHING;")
            .bind::<Text, _>(name)
            .execute(&mut connection)
            .map(drop)
            .map_err(|error| Self::map_write_error(&mut connection, &error))?;

        self.find_project(name)
    }

    /// Counts pull requests stored for a tracker system.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn pull_request_count(&self, system: &TrackerSystem) -> Result<u64, StoreError> {
        self.count_rows(
            "SELECT COUNT(*) AS count FROM pull_requests WHERE tracker_system_id = ?;",
            system.id,
        )
    }

    /// Counts sub-entity rows (reviews + comments + commits) stored for a
    /// tracker system.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the query fails.
    pub fn subentity_count(&self, system: &TrackerSystem) -> Result<u64, StoreError> {
        let reviews = self.count_rows(
            "SELECT COUNT(*) AS count FROM pr_reviews r \
             JOIN pull_requests p ON p.id = r.pull_request_id \
             WHERE p.tracker_system_id = ?;",
            system.id,
        )?;
        let comments = self.count_rows(
            "SELECT COUNT(*) AS count FROM pr_comments c \
             JOIN pull_requests p ON p.id = c.pull_request_id \
             WHERE p.tracker_system_id = ?;",
            system.id,
        )?;
        let commits = self.count_rows(
            "SELECT COUNT(*) AS count FROM pr_commits c \
             JOIN pull_requests p ON p.id = c.pull_request_id \
             WHERE p.tracker_system_id = ?;",
            system.id,
        )?;
        Ok(reviews + comments + commits)
    }

    fn count_rows(&self, sql: &str, system_id: i64) -> Result<u64, StoreError> {
        let mut connection = self.establish_connection()?;
        let row: CountRow = sql_query(sql)
            .bind::<BigInt, _>(system_id)
            .get_result(&mut connection)
            .map_err(|error| Self::map_query_error(&mut connection, &error))?;
        Ok(u64::try_from(row.count).unwrap_or(0))
    }

    fn establish_connection(&self) -> Result<SqliteConnection, StoreError> {
        let mut connection = SqliteConnection::establish(&self.database_url).map_err(|error| {
            StoreError::ConnectionFailed {
                message: error.to_string(),
            }
        })?;

        sql_query("PRAGMA foreign_keys = ON;")
            .execute(&mut connection)
            .map(drop)
            .map_err(|error| StoreError::ForeignKeysEnableFailed {
                message: error.to_string(),
            })?;

        Ok(connection)
    }

    fn schema_exists(connection: &mut SqliteConnection) -> Result<bool, diesel::result::Error> {
        let row: CountRow = sql_query(
            "SELECT COUNT(*) AS count FROM sqlite_master \
             WHERE type = 'table' AND name = 'pull_requests';",
        )
        .get_result(connection)?;

        Ok(row.count > 0)
    }

    fn map_error_with_schema_check<F>(
        connection: &mut SqliteConnection,
        error: &diesel::result::Error,
        create_error: F,
    ) -> StoreError
    where
        F: Fn(String) -> StoreError,
    {
        match Self::schema_exists(connection) {
            Ok(false) => StoreError::SchemaNotInitialised,
            Ok(true) => create_error(error.to_string()),
            Err(check_error) => create_error(format!(
                "schema presence check failed: {check_error}; original error: {error}"
            )),
        }
    }

    fn map_query_error(
        connection: &mut SqliteConnection,
        error: &diesel::result::Error,
    ) -> StoreError {
        Self::map_error_with_schema_check(connection, error, |message| StoreError::QueryFailed {
            message,
        })
    }

    fn map_write_error(
        connection: &mut SqliteConnection,
        error: &diesel::result::Error,
    ) -> StoreError {
        Self::map_error_with_schema_check(connection, error, |message| StoreError::WriteFailed {
            message,
        })
    }
}

impl StoreGateway for SqliteStore {
    fn find_project(&self, name: &str) -> Result<Project, StoreError> {
        let mut connection = self.establish_connection()?;

        let result: Option<IdRow> = sql_query("SELECT id FROM projects WHERE name = ? LIMIT 1;")
            .bind::<Text, _>(name)
            .get_result(&mut connection)
            .optional()
            .map_err(|error| Self::map_query_error(&mut connection, &error))?;

        let Some(row) = result else {
            return Err(StoreError::ProjectNotFound {
                name: name.to_owned(),
            });
        };

        Ok(Project {
            id: row.id,
            name: name.to_owned(),
        })
    }

    fn find_or_create_tracker_system(
        &self,
        project: &Project,
        url: &str,
    ) -> Result<TrackerSystem, StoreError> {
        #[derive(Debug, QueryableByName)]
        struct Row {
            #[diesel(sql_type = BigInt)]
            id: i64,
            #[diesel(sql_type = Nullable<Text>)]
            last_synced: Option<String>,
        }

        let mut connection = self.establish_connection()?;

        sql_query(
            "INSERT INTO tracker_systems (project_id, url) VALUES (?, ?) \
             ON CONFLICT (project_id, url) DO NOTHING;",
        )
        .bind::<BigInt, _>(project.id)
        .bind::<Text, _>(url)
        .execute(&mut connection)
        .map(drop)
        .map_err(|error| Self::map_write_error(&mut connection, &error))?;

        let row: Row = sql_query(
            "SELECT id, last_synced FROM tracker_systems \
             WHERE project_id = ? AND url = ? LIMIT 1;",
        )
        .bind::<BigInt, _>(project.id)
        .bind::<Text, _>(url)
        .get_result(&mut connection)
        .map_err(|error| Self::map_query_error(&mut connection, &error))?;

        Ok(TrackerSystem {
            id: row.id,
            project_id: project.id,
            url: url.to_owned(),
            last_synced: row.last_synced.as_deref().and_then(parse_timestamp),
        })
    }

    fn persist_page(
        &self,
        system: &TrackerSystem,
        records: &[PullRequestRecord],
    ) -> Result<PageCounts, StoreError> {
        let mut connection = self.establish_connection()?;

        connection
            .transaction::<PageCounts, diesel::result::Error, _>(|conn| {
                let mut counts = PageCounts::default();
                for record in records {
                    upsert_pull_request(conn, system.id, record, &mut counts)?;
                }
                Ok(counts)
            })
            .map_err(|error| Self::map_write_error(&mut connection, &error))
    }

    fn save_tracker_system(&self, system: &TrackerSystem) -> Result<(), StoreError> {
        let mut connection = self.establish_connection()?;

        let affected = sql_query("UPDATE tracker_systems SET last_synced = ? WHERE id = ?;")
            .bind::<Nullable<Text>, _>(system.last_synced.map(format_timestamp))
            .bind::<BigInt, _>(system.id)
            .execute(&mut connection)
            .map_err(|error| Self::map_write_error(&mut connection, &error))?;

        if affected == 0 {
            return Err(StoreError::WriteFailed {
                message: "expected to update 1 tracker system but updated 0".to_owned(),
            });
        }

        Ok(())
    }
}

/// Formats a timestamp for storage, normalised to whole-second UTC so the
/// stored text round-trips and compares consistently.
fn format_timestamp(value: DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Secs, true)
}

fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .ok()
        .map(|parsed| parsed.with_timezone(&Utc))
}

/// Drops sub-second precision so comparisons against stored whole-second
/// timestamps cannot mistake jitter for a newer remote snapshot.
fn truncate_to_seconds(value: DateTime<Utc>) -> DateTime<Utc> {
    value.with_nanosecond(0).unwrap_or(value)
}

fn find_existing_pull_request(
    conn: &mut SqliteConnection,
    system_id: i64,
    external_id: &str,
) -> Result<Option<ExistingRow>, diesel::result::Error> {
    sql_query(
        "SELECT id, updated_at FROM pull_requests \
         WHERE tracker_system_id = ? AND external_id = ? LIMIT 1;",
    )
    .bind::<BigInt, _>(system_id)
    .bind::<Text, _>(external_id)
    .get_result(conn)
    .optional()
}

fn upsert_pull_request(
    conn: &mut SqliteConnection,
    system_id: i64,
    record: &PullRequestRecord,
    counts: &mut PageCounts,
) -> Result<(), diesel::result::Error> {
    let existing = find_existing_pull_request(conn, system_id, &record.external_id)?;

    let pull_request_id = match existing {
        None => {
            insert_pull_request(conn, system_id, record)?;
            counts.pull_requests_created += 1;
            let row = find_existing_pull_request(conn, system_id, &record.external_id)?;
            match row {
                Some(inserted) => inserted.id,
                None => return Err(diesel::result::Error::NotFound),
            }
        }
        Some(row) => {
            let stored = row.updated_at.as_deref().and_then(parse_timestamp);
            // Re-fetched boundary items arrive with an unchanged timestamp;
            // only strictly newer data counts as an update.
            if stored.is_some_and(|stored_at| truncate_to_seconds(record.updated_at) <= stored_at) {
                return Ok(());
            }
            update_pull_request(conn, row.id, record)?;
            counts.pull_requests_updated += 1;
            row.id
        }
    };

    upsert_reviews(conn, pull_request_id, &record.reviews, counts)?;
    upsert_comments(conn, pull_request_id, &record.comments, counts)?;
    upsert_commits(conn, pull_request_id, &record.commits, counts)?;
    Ok(())
}

fn insert_pull_request(
    conn: &mut SqliteConnection,
    system_id: i64,
    record: &PullRequestRecord,
) -> Result<(), diesel::result::Error> {
    sql_query(
        "INSERT INTO pull_requests \
         (tracker_system_id, external_id, title, author, state, created_at, updated_at, \
          closed_at, source_branch, target_branch) \
         VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?);",
    )
    .bind::<BigInt, _>(system_id)
    .bind::<Text, _>(&record.external_id)
    .bind::<Nullable<Text>, _>(record.title.as_deref())
    .bind::<Nullable<Text>, _>(record.author.as_deref())
    .bind::<Text, _>(record.state.as_str())
    .bind::<Nullable<Text>, _>(record.created_at.map(format_timestamp))
    .bind::<Text, _>(format_timestamp(record.updated_at))
    .bind::<Nullable<Text>, _>(record.closed_at.map(format_timestamp))
    .bind::<Nullable<Text>, _>(record.source_branch.as_deref())
    .bind::<Nullable<Text>, _>(record.target_branch.as_deref())
    .execute(conn)
    .map(drop)
}

fn update_pull_request(
    conn: &mut SqliteConnection,
    pull_request_id: i64,
    record: &PullRequestRecord,
) -> Result<(), diesel::result::Error> {
    sql_query(
        "UPDATE pull_requests SET \
           title = ?, author = ?, state = ?, created_at = ?, updated_at = ?, \
           closed_at = ?, source_branch = ?, target_branch = ? \
         WHERE id = ?;",
    )
    .bind::<Nullable<Text>, _>(record.title.as_deref())
    .bind::<Nullable<Text>, _>(record.author.as_deref())
    .bind::<Text, _>(record.state.as_str())
    .bind::<Nullable<Text>, _>(record.created_at.map(format_timestamp))
    .bind::<Text, _>(format_timestamp(record.updated_at))
    .bind::<Nullable<Text>, _>(record.closed_at.map(format_timestamp))
    .bind::<Nullable<Text>, _>(record.source_branch.as_deref())
    .bind::<Nullable<Text>, _>(record.target_branch.as_deref())
    .bind::<BigInt, _>(pull_request_id)
    .execute(conn)
    .map(drop)
}

fn upsert_reviews(
    conn: &mut SqliteConnection,
    pull_request_id: i64,
    reviews: &[ReviewRecord],
    counts: &mut PageCounts,
) -> Result<(), diesel::result::Error> {
    for review in reviews {
        let affected = sql_query(
            "INSERT INTO pr_reviews \
             (pull_request_id, external_id, reviewer, state, body, submitted_at) \
             VALUES (?, ?, ?, ?, ?, ?) \
             ON CONFLICT (pull_request_id, external_id) DO NOTHING;",
        )
        .bind::<BigInt, _>(pull_request_id)
        .bind::<Text, _>(&review.external_id)
        .bind::<Nullable<Text>, _>(review.reviewer.as_deref())
        .bind::<Nullable<Text>, _>(review.state.as_deref())
        .bind::<Nullable<Text>, _>(review.body.as_deref())
        .bind::<Nullable<Text>, _>(review.submitted_at.map(format_timestamp))
        .execute(conn)?;
        counts.reviews_created += affected_count(affected);
    }
    Ok(())
}

fn upsert_comments(
    conn: &mut SqliteConnection,
    pull_request_id: i64,
    comments: &[CommentRecord],
    counts: &mut PageCounts,
) -> Result<(), diesel::result::Error> {
    #[derive(Debug, QueryableByName)]
    struct Row {
        #[diesel(sql_type = Nullable<Text>)]
        updated_at: Option<String>,
    }

    for comment in comments {
        let existing: Option<Row> = sql_query(
            "SELECT updated_at FROM pr_comments \
             WHERE pull_request_id = ? AND external_id = ? LIMIT 1;",
        )
        .bind::<BigInt, _>(pull_request_id)
        .bind::<Text, _>(&comment.external_id)
        .get_result(conn)
        .optional()?;

        match existing {
            None => {
                sql_query(
                    "INSERT INTO pr_comments \
                     (pull_request_id, external_id, author, body, created_at, updated_at) \
                     VALUES (?, ?, ?, ?, ?, ?);",
                )
                .bind::<BigInt, _>(pull_request_id)
                .bind::<Text, _>(&comment.external_id)
                .bind::<Nullable<Text>, _>(comment.author.as_deref())
                .bind::<Nullable<Text>, _>(comment.body.as_deref())
                .bind::<Nullable<Text>, _>(comment.created_at.map(format_timestamp))
                .bind::<Nullable<Text>, _>(comment.updated_at.map(format_timestamp))
                .execute(conn)
                .map(drop)?;
                counts.comments_created += 1;
            }
            Some(row) => {
                let stored = row.updated_at.as_deref().and_then(parse_timestamp);
                let incoming = comment.updated_at;
                let newer = match (incoming, stored) {
                    (Some(incoming_at), Some(stored_at)) => {
                        truncate_to_seconds(incoming_at) > stored_at
                    }
                    (Some(_), None) => true,
                    (None, _) => false,
                };
                if !newer {
                    continue;
                }
                sql_query(
                    "UPDATE pr_comments SET author = ?, body = ?, created_at = ?, updated_at = ? \
                     WHERE pull_request_id = ? AND external_id = ?;",
                )
                .bind::<Nullable<Text>, _>(comment.author.as_deref())
                .bind::<Nullable<Text>, _>(comment.body.as_deref())
                .bind::<Nullable<Text>, _>(comment.created_at.map(format_timestamp))
                .bind::<Nullable<Text>, _>(comment.updated_at.map(format_timestamp))
                .bind::<BigInt, _>(pull_request_id)
                .bind::<Text, _>(&comment.external_id)
                .execute(conn)
                .map(drop)?;
                counts.comments_updated += 1;
            }
        }
    }
    Ok(())
}

fn upsert_commits(
    conn: &mut SqliteConnection,
    pull_request_id: i64,
    commits: &[CommitRecord],
    counts: &mut PageCounts,
) -> Result<(), diesel::result::Error> {
    for commit in commits {
        let affected = sql_query(
            "INSERT INTO pr_commits \
             (pull_request_id, external_id, author, message, committed_at) \
             VALUES (?, ?, ?, ?, ?) \
             ON CONFLICT (pull_request_id, external_id) DO NOTHING;",
        )
        .bind::<BigInt, _>(pull_request_id)
        .bind::<Text, _>(&commit.external_id)
        .bind::<Nullable<Text>, _>(commit.author.as_deref())
        .bind::<Nullable<Text>, _>(commit.message.as_deref())
        .bind::<Nullable<Text>, _>(commit.committed_at.map(format_timestamp))
        .execute(conn)?;
        counts.commits_created += affected_count(affected);
    }
    Ok(())
}

/// Diesel reports affected rows as `usize`; counts are aggregated as `u64`.
fn affected_count(affected: usize) -> u64 {
    u64::try_from(affected).unwrap_or(u64::MAX)
}
