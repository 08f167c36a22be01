//! Deserialisation targets and field mapping for the GitHub REST API.
//!
//! Remote payloads are taken apart item by item so one malformed element
//! degrades into a single [`ItemError`] instead of failing its whole page.

use chrono::{DateTime, Utc};
use serde::Deserialize;
use serde_json::Value;

use crate::tracker::models::{
    CommentRecord, CommitRecord, ItemError, PullRequestRecord, PullRequestState, ReviewRecord,
};

#[derive(Debug, Clone, Deserialize)]
struct ApiUser {
    login: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiBranchRef {
    #[serde(rename = "ref")]
    branch: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiPullRequest {
    number: u64,
    title: Option<String>,
    state: Option<String>,
    user: Option<ApiUser>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
    closed_at: Option<DateTime<Utc>>,
    merged_at: Option<DateTime<Utc>>,
    head: Option<ApiBranchRef>,
    base: Option<ApiBranchRef>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiReview {
    id: u64,
    user: Option<ApiUser>,
    state: Option<String>,
    body: Option<String>,
    submitted_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiComment {
    id: u64,
    user: Option<ApiUser>,
    body: Option<String>,
    created_at: Option<DateTime<Utc>>,
    updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCommitAuthor {
    name: Option<String>,
    date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCommitDetail {
    message: Option<String>,
    author: Option<ApiCommitAuthor>,
}

#[derive(Debug, Clone, Deserialize)]
struct ApiCommit {
    sha: String,
    commit: Option<ApiCommitDetail>,
    author: Option<ApiUser>,
}

/// Builds an [`ItemError`] for a raw payload element, recovering an
/// external identifier when one is present.
pub(super) fn item_error(raw: &Value, message: impl Into<String>) -> ItemError {
    let external_id = raw
        .get("number")
        .or_else(|| raw.get("id"))
        .map(Value::to_string)
        .or_else(|| {
            raw.get("sha")
                .and_then(Value::as_str)
                .map(ToOwned::to_owned)
        });
    ItemError {
        external_id,
        message: message.into(),
    }
}

/// Maps one raw pull-request element into a normalized record without its
/// sub-entities.
///
/// # Errors
///
/// Returns the mapping failure message when required fields (number,
/// modification time, a recognisable state) are missing or malformed.
pub(super) fn map_pull_request(raw: &Value) -> Result<(u64, PullRequestRecord), String> {
    let api: ApiPullRequest = serde_json::from_value(raw.clone())
        .map_err(|error| format!("malformed pull request: {error}"))?;

    let updated_at = api
        .updated_at
        .ok_or_else(|| "pull request is missing updated_at".to_owned())?;
    let state = map_state(api.state.as_deref(), api.merged_at.is_some())?;

    Ok((
        api.number,
        PullRequestRecord {
            external_id: api.number.to_string(),
            title: api.title,
            author: api.user.and_then(|user| user.login),
            state,
            created_at: api.created_at,
            updated_at,
            closed_at: api.merged_at.or(api.closed_at),
            source_branch: api.head.and_then(|head| head.branch),
            target_branch: api.base.and_then(|base| base.branch),
            reviews: Vec::new(),
            comments: Vec::new(),
            commits: Vec::new(),
        },
    ))
}

fn map_state(state: Option<&str>, merged: bool) -> Result<PullRequestState, String> {
    match state {
        Some("closed") if merged => Ok(PullRequestState::Merged),
        Some("closed") => Ok(PullRequestState::Closed),
        Some("open") => Ok(PullRequestState::Open),
        Some(other) => Err(format!("unrecognised pull request state {other}")),
        None => Err("pull request is missing state".to_owned()),
    }
}

/// Maps one raw review element into a normalized record.
pub(super) fn map_review(raw: &Value) -> Result<ReviewRecord, String> {
    let api: ApiReview =
        serde_json::from_value(raw.clone()).map_err(|error| format!("malformed review: {error}"))?;

    Ok(ReviewRecord {
        external_id: api.id.to_string(),
        reviewer: api.user.and_then(|user| user.login),
        state: api.state,
        body: api.body,
        submitted_at: api.submitted_at,
    })
}

/// Maps one raw issue-comment element into a normalized record.
pub(super) fn map_comment(raw: &Value) -> Result<CommentRecord, String> {
    let api: ApiComment = serde_json::from_value(raw.clone())
        .map_err(|error| format!("malformed comment: {error}"))?;

    Ok(CommentRecord {
        external_id: api.id.to_string(),
        author: api.user.and_then(|user| user.login),
        body: api.body,
        created_at: api.created_at,
        updated_at: api.updated_at,
    })
}

/// Maps one raw commit element into a normalized commit reference.
pub(super) fn map_commit(raw: &Value) -> Result<CommitRecord, String> {
    let api: ApiCommit =
        serde_json::from_value(raw.clone()).map_err(|error| format!("malformed commit: {error}"))?;

    let detail = api.commit;
    let author = api
        .author
        .and_then(|user| user.login)
        .or_else(|| {
            detail
                .as_ref()
                .and_then(|commit| commit.author.as_ref())
                .and_then(|commit_author| commit_author.name.clone())
        });

    Ok(CommitRecord {
        external_id: api.sha,
        author,
        message: detail.as_ref().and_then(|commit| commit.message.clone()),
        committed_at: detail
            .and_then(|commit| commit.author)
            .and_then(|commit_author| commit_author.date),
    })
}
