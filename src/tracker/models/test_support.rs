//! Test helpers for constructing normalized record fixtures.
//!
//! These builders keep record construction terse in unit and integration
//! tests; only the identity and modification time vary per test, the rest
//! defaults to benign values.

use chrono::{DateTime, Utc};

use super::{CommentRecord, PullRequestRecord, PullRequestState, ReviewRecord};

/// Parses an RFC 3339 timestamp for fixtures.
///
/// # Panics
///
/// Panics when the literal is not valid RFC 3339; fixture input is
/// hard-coded in tests.
#[must_use]
pub fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .expect("fixture timestamp should be valid RFC 3339")
}

/// Constructs a minimal open pull request with only identity and
/// modification time set.
#[must_use]
pub fn minimal_pull_request(external_id: &str, updated_at: &str) -> PullRequestRecord {
    PullRequestRecord {
        external_id: external_id.to_owned(),
        title: Some(format!("PR {external_id}")),
        author: Some("alice".to_owned()),
        state: PullRequestState::Open,
        created_at: Some(ts("2026-01-01T00:00:00Z")),
        updated_at: ts(updated_at),
        closed_at: None,
        source_branch: Some("feature".to_owned()),
        target_branch: Some("main".to_owned()),
        reviews: Vec::new(),
        comments: Vec::new(),
        commits: Vec::new(),
    }
}

/// Constructs a pull request carrying one review and one comment.
#[must_use]
pub fn pull_request_with_children(external_id: &str, updated_at: &str) -> PullRequestRecord {
    let mut record = minimal_pull_request(external_id, updated_at);
    record.reviews.push(ReviewRecord {
        external_id: format!("{external_id}-r1"),
        reviewer: Some("bob".to_owned()),
        state: Some("approved".to_owned()),
        body: Some("looks good".to_owned()),
        submitted_at: Some(ts(updated_at)),
    });
    record.comments.push(CommentRecord {
        external_id: format!("{external_id}-c1"),
        author: Some("carol".to_owned()),
        body: Some("question".to_owned()),
        created_at: Some(ts("2026-01-01T00:00:00Z")),
        updated_at: Some(ts(updated_at)),
    });
    record
}
