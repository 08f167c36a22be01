//! Wiremock-backed tests for the GitHub backend.

use chrono::{DateTime, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use super::GithubBackend;
use crate::config::MineConfig;
use crate::tracker::TrackerBackend;
use crate::tracker::error::SyncError;

const PULLS_PATH: &str = "/api/v3/repos/owner/repo/pulls";

fn backend_for(server: &MockServer) -> GithubBackend {
    let config = MineConfig {
        tracker_url: Some(format!("{}/owner/repo", server.uri())),
        token: Some("test-token".to_owned()),
        ..MineConfig::default()
    };
    GithubBackend::from_config(&config).expect("backend should build")
}

fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .expect("fixture timestamp should parse")
}

fn pull_request_json(number: u64, updated_at: &str) -> serde_json::Value {
    json!({
        "number": number,
        "title": format!("PR {number}"),
        "state": "open",
        "user": { "login": "octocat" },
        "created_at": "2026-01-01T00:00:00Z",
        "updated_at": updated_at,
        "closed_at": null,
        "merged_at": null,
        "head": { "ref": "feature" },
        "base": { "ref": "main" }
    })
}

async fn mount_empty_subentities(server: &MockServer, number: u64) {
    for sub_path in [
        format!("{PULLS_PATH}/{number}/reviews"),
        format!("{PULLS_PATH}/{number}/commits"),
        format!("/api/v3/repos/owner/repo/issues/{number}/comments"),
    ] {
        Mock::given(method("GET"))
            .and(path(sub_path))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
    }
}

#[tokio::test]
async fn fetch_page_maps_items_and_loads_subentities() {
    let server = MockServer::start().await;
    let backend = backend_for(&server);

    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .and(query_param("state", "all"))
        .and(query_param("sort", "updated"))
        .and(query_param("direction", "asc"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([pull_request_json(1, "2026-02-01T10:00:00Z")])),
        )
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(format!("{PULLS_PATH}/1/reviews")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 900,
            "user": { "login": "bob" },
            "state": "APPROVED",
            "body": "ship it",
            "submitted_at": "2026-02-01T09:00:00Z"
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/issues/1/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "id": 901,
            "user": { "login": "carol" },
            "body": "question",
            "created_at": "2026-02-01T08:00:00Z",
            "updated_at": "2026-02-01T08:30:00Z"
        }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{PULLS_PATH}/1/commits")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{
            "sha": "abc123",
            "commit": {
                "message": "fix",
                "author": { "name": "Grace", "date": "2026-01-31T00:00:00Z" }
            },
            "author": { "login": "grace" }
        }])))
        .mount(&server)
        .await;

    let fetched = backend
        .fetch_page(None, 1)
        .await
        .expect("fetch should succeed");

    assert_eq!(fetched.items.len(), 1);
    assert!(fetched.item_errors.is_empty());
    assert!(!fetched.has_next);
    let record = fetched.items.first().expect("one item expected");
    assert_eq!(record.external_id, "1");
    assert_eq!(record.reviews.len(), 1);
    assert_eq!(record.comments.len(), 1);
    assert_eq!(record.commits.len(), 1);
    assert_eq!(
        record.commits.first().map(|commit| commit.author.as_deref()),
        Some(Some("grace"))
    );
}

#[tokio::test]
async fn fetch_page_applies_inclusive_watermark_filter() {
    let server = MockServer::start().await;
    let backend = backend_for(&server);

    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            pull_request_json(1, "2026-01-15T00:00:00Z"),
            pull_request_json(2, "2026-02-01T00:00:00Z"),
            pull_request_json(3, "2026-02-10T00:00:00Z"),
        ])))
        .mount(&server)
        .await;
    mount_empty_subentities(&server, 2).await;
    mount_empty_subentities(&server, 3).await;

    let fetched = backend
        .fetch_page(Some(ts("2026-02-01T00:00:00Z")), 1)
        .await
        .expect("fetch should succeed");

    let ids: Vec<&str> = fetched
        .items
        .iter()
        .map(|record| record.external_id.as_str())
        .collect();
    assert_eq!(
        ids,
        vec!["2", "3"],
        "boundary item must be re-included, older items dropped"
    );
}

#[tokio::test]
async fn fetch_page_skips_malformed_items_without_failing() {
    let server = MockServer::start().await;
    let backend = backend_for(&server);

    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([
            { "number": 5, "state": "open" },
            pull_request_json(6, "2026-02-01T00:00:00Z"),
        ])))
        .mount(&server)
        .await;
    mount_empty_subentities(&server, 6).await;

    let fetched = backend
        .fetch_page(None, 1)
        .await
        .expect("fetch should succeed");

    assert_eq!(fetched.items.len(), 1, "well-formed item must survive");
    assert_eq!(fetched.item_errors.len(), 1);
    let error = fetched.item_errors.first().expect("one error expected");
    assert_eq!(error.external_id.as_deref(), Some("5"));
}

#[tokio::test]
async fn fetch_page_maps_auth_failures_as_fatal() {
    let server = MockServer::start().await;
    let backend = backend_for(&server);

    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .respond_with(ResponseTemplate::new(401).set_body_json(json!({
            "message": "Bad credentials"
        })))
        .mount(&server)
        .await;

    let error = backend
        .fetch_page(None, 1)
        .await
        .expect_err("auth failure should be fatal");

    match error {
        SyncError::Authentication { message } => {
            assert!(message.contains("Bad credentials"), "unexpected: {message}");
        }
        other => panic!("expected Authentication, got {other:?}"),
    }
}

#[tokio::test]
async fn fetch_page_waits_out_a_rate_limit_rejection() {
    let server = MockServer::start().await;
    let backend = backend_for(&server);

    let reset_at = Utc::now().timestamp().max(0).unsigned_abs() + 1;
    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .respond_with(
            ResponseTemplate::new(403)
                .set_body_json(json!({ "message": "API rate limit exceeded" }))
                .insert_header("x-ratelimit-limit", "60")
                .insert_header("x-ratelimit-remaining", "0")
                .insert_header("x-ratelimit-reset", reset_at.to_string().as_str()),
        )
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([]))
                .insert_header("x-ratelimit-limit", "60")
                .insert_header("x-ratelimit-remaining", "59")
                .insert_header("x-ratelimit-reset", (reset_at + 3600).to_string().as_str()),
        )
        .mount(&server)
        .await;

    let fetched = backend
        .fetch_page(None, 1)
        .await
        .expect("fetch should recover after the reset");

    assert!(fetched.items.is_empty());
    let quota = fetched.rate_limit.expect("quota snapshot expected");
    assert_eq!(quota.remaining(), 59);
}

#[tokio::test]
async fn fetch_page_retries_transient_server_errors() {
    let server = MockServer::start().await;
    let backend = backend_for(&server);

    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .respond_with(ResponseTemplate::new(502))
        .up_to_n_times(2)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let fetched = backend
        .fetch_page(None, 1)
        .await
        .expect("fetch should succeed after retries");

    assert!(fetched.items.is_empty());
}

#[tokio::test]
async fn fetch_page_follows_subentity_pagination() {
    let server = MockServer::start().await;
    let backend = backend_for(&server);

    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([pull_request_json(9, "2026-02-01T00:00:00Z")])),
        )
        .mount(&server)
        .await;

    let reviews_path = format!("{PULLS_PATH}/9/reviews");
    let next_link = format!(
        "<{}{reviews_path}?per_page=100&page=2>; rel=\"next\"",
        server.uri()
    );
    Mock::given(method("GET"))
        .and(path(reviews_path.as_str()))
        .and(query_param("page", "1"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!([{ "id": 1, "state": "APPROVED" }]))
                .insert_header("Link", next_link.as_str()),
        )
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(reviews_path.as_str()))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([{ "id": 2 }])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{PULLS_PATH}/9/commits")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/v3/repos/owner/repo/issues/9/comments"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(&server)
        .await;

    let fetched = backend
        .fetch_page(None, 1)
        .await
        .expect("fetch should succeed");

    let record = fetched.items.first().expect("one item expected");
    assert_eq!(record.reviews.len(), 2, "both review pages expected");
}
