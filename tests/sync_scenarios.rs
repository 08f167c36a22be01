//! End-to-end incremental sync scenarios against a mocked GitHub API and a
//! real `SQLite` datastore.
//!
//! These tests exercise the whole pipeline: backend fetch and mapping,
//! transactional page commits, idempotent re-runs, update-in-place for
//! remotely modified pull requests, and watermark advancement.

mod support;

use chrono::{DateTime, Utc};
use serde_json::json;
use wiremock::matchers::{method, path, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use prmine::report::test_support::RecordingReporter;
use prmine::store::TrackerSystem;
use prmine::tracker::GithubBackend;
use prmine::{
    MineConfig, SqliteStore, StoreGateway, SyncError, SyncEvent, SyncPipeline, SyncResult,
    migrate_database,
};
use support::create_temp_dir;

const PULLS_PATH: &str = "/api/v3/repos/owner/repo/pulls";
const PROJECT_NAME: &str = "hello-world";

#[expect(
    clippy::expect_used,
    reason = "integration test fixture; allow-expect-in-tests does not cover integration tests"
)]
fn ts(value: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(value)
        .map(|parsed| parsed.with_timezone(&Utc))
        .expect("fixture timestamp should parse")
}

fn pull_request_json(number: u64, title: &str, updated_at: &str) -> serde_json::Value {
    json!({
        "number": number,
        "title": title,
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

async fn mount_pulls(server: &MockServer, items: &[serde_json::Value]) {
    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .respond_with(ResponseTemplate::new(200).set_body_json(items))
        .mount(server)
        .await;
}

async fn mount_pulls_page(
    server: &MockServer,
    page: u32,
    items: &[serde_json::Value],
    has_next: bool,
) {
    let mut response = ResponseTemplate::new(200).set_body_json(items);
    if has_next {
        let next_link = format!("<{}{PULLS_PATH}?page={}>; rel=\"next\"", server.uri(), page + 1);
        response = response.insert_header("Link", next_link.as_str());
    }
    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .and(query_param("page", page.to_string().as_str()))
        .respond_with(response)
        .mount(server)
        .await;
}

async fn mount_subentities(
    server: &MockServer,
    number: u64,
    reviews: serde_json::Value,
    comments: serde_json::Value,
) {
    Mock::given(method("GET"))
        .and(path(format!("{PULLS_PATH}/{number}/reviews")))
        .respond_with(ResponseTemplate::new(200).set_body_json(&reviews))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!(
            "/api/v3/repos/owner/repo/issues/{number}/comments"
        )))
        .respond_with(ResponseTemplate::new(200).set_body_json(&comments))
        .mount(server)
        .await;
    Mock::given(method("GET"))
        .and(path(format!("{PULLS_PATH}/{number}/commits")))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
        .mount(server)
        .await;
}

async fn mount_empty_subentities(server: &MockServer, number: u64) {
    mount_subentities(server, number, json!([]), json!([])).await;
}

struct SyncHarness {
    server: MockServer,
    store: SqliteStore,
    system: TrackerSystem,
    _temp_dir: tempfile::TempDir,
}

#[expect(
    clippy::expect_used,
    reason = "integration test fixture; allow-expect-in-tests does not cover integration tests"
)]
async fn harness() -> SyncHarness {
    let temp_dir = create_temp_dir();
    let database_url = temp_dir
        .path()
        .join("prmine.sqlite")
        .to_string_lossy()
        .into_owned();

    let reporter = RecordingReporter::default();
    migrate_database(&database_url, &reporter).expect("migrations should apply");

    let store = SqliteStore::new(&database_url).expect("store should open");
    let project = store
        .insert_project(PROJECT_NAME)
        .expect("project provisioning should succeed");

    let server = MockServer::start().await;
    let tracker_url = format!("{}/owner/repo", server.uri());
    let system = store
        .find_or_create_tracker_system(&project, &tracker_url)
        .expect("tracker system should be created");

    SyncHarness {
        server,
        store,
        system,
        _temp_dir: temp_dir,
    }
}

#[expect(
    clippy::expect_used,
    reason = "integration test step; allow-expect-in-tests does not cover integration tests"
)]
async fn try_run_sync(harness: &mut SyncHarness) -> (Result<SyncResult, SyncError>, Vec<SyncEvent>) {
    let config = MineConfig {
        tracker_url: Some(harness.system.url.clone()),
        token: Some("test-token".to_owned()),
        ..MineConfig::default()
    };
    let backend = GithubBackend::from_config(&config).expect("backend should build");
    let reporter = RecordingReporter::default();
    let pipeline = SyncPipeline::new(&backend, &harness.store, &reporter);

    let outcome = pipeline.sync(&mut harness.system).await;
    (outcome, reporter.take())
}

#[expect(
    clippy::expect_used,
    reason = "integration test step; allow-expect-in-tests does not cover integration tests"
)]
async fn run_sync(harness: &mut SyncHarness) -> (SyncResult, Vec<SyncEvent>) {
    let (outcome, events) = try_run_sync(harness).await;
    (outcome.expect("sync run should succeed"), events)
}

#[tokio::test]
#[expect(
    clippy::expect_used,
    reason = "integration test assertions; allow-expect-in-tests does not cover integration tests"
)]
async fn repeated_runs_stay_incremental_and_idempotent() {
    let mut harness = harness().await;

    // First run: the tracker has never been synced, everything is new.
    mount_pulls(
        &harness.server,
        &[
            pull_request_json(1, "PR 1", "2026-02-01T10:00:00Z"),
            pull_request_json(2, "PR 2", "2026-02-02T10:00:00Z"),
            pull_request_json(3, "PR 3", "2026-02-03T10:00:00Z"),
        ],
    )
    .await;
    mount_subentities(
        &harness.server,
        1,
        json!([{
            "id": 900,
            "user": { "login": "bob" },
            "state": "APPROVED",
            "body": "ship it",
            "submitted_at": "2026-02-01T09:00:00Z"
        }]),
        json!([]),
    )
    .await;
    mount_empty_subentities(&harness.server, 2).await;
    mount_empty_subentities(&harness.server, 3).await;

    let (first, first_events) = run_sync(&mut harness).await;
    assert_eq!(first.counts.pull_requests_created, 3);
    assert_eq!(first.counts.pull_requests_updated, 0);
    assert_eq!(first.counts.reviews_created, 1);
    assert_eq!(harness.system.last_synced, Some(ts("2026-02-03T10:00:00Z")));
    assert_eq!(
        harness
            .store
            .pull_request_count(&harness.system)
            .expect("count should succeed"),
        3
    );
    assert!(first_events.iter().any(|event| matches!(
        event,
        SyncEvent::WatermarkAdvanced { last_synced } if last_synced == "2026-02-03T10:00:00+00:00"
    )));

    // Second run: nothing changed remotely. Only the boundary item is
    // re-fetched and the upsert absorbs it without touching any row.
    harness.server.reset().await;
    mount_pulls(
        &harness.server,
        &[
            pull_request_json(1, "PR 1", "2026-02-01T10:00:00Z"),
            pull_request_json(2, "PR 2", "2026-02-02T10:00:00Z"),
            pull_request_json(3, "PR 3", "2026-02-03T10:00:00Z"),
        ],
    )
    .await;
    mount_empty_subentities(&harness.server, 3).await;

    let (second, second_events) = run_sync(&mut harness).await;
    assert_eq!(second.counts.total_changes(), 0);
    assert_eq!(harness.system.last_synced, Some(ts("2026-02-03T10:00:00Z")));
    assert!(!second_events
        .iter()
        .any(|event| matches!(event, SyncEvent::WatermarkAdvanced { .. })));

    // Third run: PR 2 was modified remotely. It is updated in place and
    // the watermark follows its new modification time.
    harness.server.reset().await;
    mount_pulls(
        &harness.server,
        &[
            pull_request_json(1, "PR 1", "2026-02-01T10:00:00Z"),
            pull_request_json(3, "PR 3", "2026-02-03T10:00:00Z"),
            pull_request_json(2, "PR 2 revised", "2026-02-04T10:00:00Z"),
        ],
    )
    .await;
    mount_empty_subentities(&harness.server, 2).await;
    mount_empty_subentities(&harness.server, 3).await;

    let (third, _third_events) = run_sync(&mut harness).await;
    assert_eq!(third.counts.pull_requests_created, 0);
    assert_eq!(third.counts.pull_requests_updated, 1);
    assert_eq!(harness.system.last_synced, Some(ts("2026-02-04T10:00:00Z")));
    assert_eq!(
        harness
            .store
            .pull_request_count(&harness.system)
            .expect("count should succeed"),
        3
    );
}

#[tokio::test]
#[expect(
    clippy::expect_used,
    reason = "integration test assertions; allow-expect-in-tests does not cover integration tests"
)]
async fn interrupted_run_resumes_to_the_uninterrupted_final_state() {
    let mut harness = harness().await;

    // First attempt: page 1 commits, then fetching page 2 fails fatally
    // (the remote hands back a non-array payload).
    mount_pulls_page(
        &harness.server,
        1,
        &[
            pull_request_json(1, "PR 1", "2026-02-01T10:00:00Z"),
            pull_request_json(2, "PR 2", "2026-02-02T10:00:00Z"),
        ],
        true,
    )
    .await;
    Mock::given(method("GET"))
        .and(path(PULLS_PATH))
        .and(query_param("page", "2"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "message": "truncated" })))
        .mount(&harness.server)
        .await;
    mount_empty_subentities(&harness.server, 1).await;
    mount_empty_subentities(&harness.server, 2).await;

    let (outcome, events) = try_run_sync(&mut harness).await;
    assert!(
        matches!(outcome, Err(SyncError::Api { .. })),
        "second page must fail the run"
    );
    assert_eq!(
        harness.system.last_synced, None,
        "watermark must stay untouched after a failed run"
    );
    assert_eq!(
        harness
            .store
            .pull_request_count(&harness.system)
            .expect("count should succeed"),
        2,
        "page 1 committed before the failure"
    );
    assert!(events
        .iter()
        .any(|event| matches!(event, SyncEvent::RunFailed { .. })));

    // Retry against a healthy remote: page 1 is re-fetched from the old
    // watermark and absorbed, page 2 lands, and the final state matches an
    // uninterrupted two-page run.
    harness.server.reset().await;
    mount_pulls_page(
        &harness.server,
        1,
        &[
            pull_request_json(1, "PR 1", "2026-02-01T10:00:00Z"),
            pull_request_json(2, "PR 2", "2026-02-02T10:00:00Z"),
        ],
        true,
    )
    .await;
    mount_pulls_page(
        &harness.server,
        2,
        &[pull_request_json(3, "PR 3", "2026-02-03T10:00:00Z")],
        false,
    )
    .await;
    mount_empty_subentities(&harness.server, 1).await;
    mount_empty_subentities(&harness.server, 2).await;
    mount_empty_subentities(&harness.server, 3).await;

    let (result, _events) = run_sync(&mut harness).await;
    assert_eq!(result.pages, 2);
    assert_eq!(result.counts.pull_requests_created, 1, "only PR 3 is new");
    assert_eq!(result.counts.pull_requests_updated, 0);
    assert_eq!(harness.system.last_synced, Some(ts("2026-02-03T10:00:00Z")));
    assert_eq!(
        harness
            .store
            .pull_request_count(&harness.system)
            .expect("count should succeed"),
        3,
        "re-run must not duplicate page 1's rows"
    );
}

#[tokio::test]
#[expect(
    clippy::expect_used,
    reason = "integration test assertions; allow-expect-in-tests does not cover integration tests"
)]
async fn watermark_survives_a_new_store_handle() {
    let mut harness = harness().await;

    mount_pulls(
        &harness.server,
        &[pull_request_json(1, "PR 1", "2026-02-01T10:00:00Z")],
    )
    .await;
    mount_empty_subentities(&harness.server, 1).await;

    let (_result, _events) = run_sync(&mut harness).await;
    let expected = Some(ts("2026-02-01T10:00:00Z"));
    assert_eq!(harness.system.last_synced, expected);

    // A fresh process would re-read the row; simulate it with a re-fetch.
    let project = harness
        .store
        .find_project(PROJECT_NAME)
        .expect("project should exist");
    let reloaded = harness
        .store
        .find_or_create_tracker_system(&project, &harness.system.url)
        .expect("tracker system should be found");
    assert_eq!(reloaded.id, harness.system.id);
    assert_eq!(reloaded.last_synced, expected);
}
