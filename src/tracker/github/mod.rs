//! GitHub implementation of the tracker backend contract.
//!
//! Lists a repository's pull requests ordered by modification time
//! ascending, filters them against the stored watermark (inclusive, since
//! GitHub's pulls endpoint has no `since` parameter), and loads each
//! surviving item's reviews, comments, and commits before handing the page
//! to the pipeline.

mod api;
mod request;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::config::MineConfig;

use super::TrackerBackend;
use super::error::SyncError;
use super::locator::TrackerLocator;
use super::models::{FetchedPage, ItemError, PullRequestRecord};

use request::ApiClient;

/// Items requested per page; GitHub's maximum.
const PER_PAGE: &str = "100";

/// GitHub-backed tracker integration.
pub struct GithubBackend {
    client: ApiClient,
    locator: TrackerLocator,
}

impl GithubBackend {
    /// Builds a backend from the resolved run configuration.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError`] when the tracker URL is missing or
    /// unparseable, or when the proxy configuration is unusable.
    pub fn from_config(config: &MineConfig) -> Result<Self, SyncError> {
        let locator = TrackerLocator::parse(config.require_tracker_url()?)?;
        let token = config.resolve_token();
        let proxy = config.proxy_settings()?;
        let client = ApiClient::new(locator.api_base().clone(), token.as_deref(), proxy.as_ref())?;
        Ok(Self { client, locator })
    }

    /// Fetches every page of a list endpoint and concatenates the elements.
    async fn fetch_all(&self, path: &str) -> Result<Vec<Value>, SyncError> {
        let mut elements = Vec::new();
        let mut page: u32 = 1;
        loop {
            let page_string = page.to_string();
            let response = self
                .client
                .get_json(path, &[("per_page", PER_PAGE), ("page", &page_string)])
                .await?;
            elements.extend(into_elements(response.body, path)?);
            if !response.has_next {
                return Ok(elements);
            }
            page += 1;
        }
    }

    /// Loads reviews, comments, and commits for one pull request.
    ///
    /// Malformed sub-entities degrade into item errors on the page rather
    /// than failing the pull request that carries them.
    async fn load_subentities(
        &self,
        number: u64,
        record: &mut PullRequestRecord,
        item_errors: &mut Vec<ItemError>,
    ) -> Result<(), SyncError> {
        for raw in self.fetch_all(&self.locator.reviews_path(number)).await? {
            match api::map_review(&raw) {
                Ok(review) => record.reviews.push(review),
                Err(message) => item_errors.push(api::item_error(&raw, message)),
            }
        }
        for raw in self.fetch_all(&self.locator.comments_path(number)).await? {
            match api::map_comment(&raw) {
                Ok(comment) => record.comments.push(comment),
                Err(message) => item_errors.push(api::item_error(&raw, message)),
            }
        }
        for raw in self.fetch_all(&self.locator.commits_path(number)).await? {
            match api::map_commit(&raw) {
                Ok(commit) => record.commits.push(commit),
                Err(message) => item_errors.push(api::item_error(&raw, message)),
            }
        }
        Ok(())
    }
}

#[async_trait]
impl TrackerBackend for GithubBackend {
    async fn fetch_page(
        &self,
        since: Option<DateTime<Utc>>,
        page: u32,
    ) -> Result<FetchedPage, SyncError> {
        let page_string = page.to_string();
        let response = self
            .client
            .get_json(
                &self.locator.pulls_path(),
                &[
                    ("state", "all"),
                    ("sort", "updated"),
                    ("direction", "asc"),
                    ("per_page", PER_PAGE),
                    ("page", &page_string),
                ],
            )
            .await?;

        let mut items = Vec::new();
        let mut item_errors = Vec::new();

        for raw in into_elements(response.body, &self.locator.pulls_path())? {
            let (number, mut record) = match api::map_pull_request(&raw) {
                Ok(mapped) => mapped,
                Err(message) => {
                    item_errors.push(api::item_error(&raw, message));
                    continue;
                }
            };

            // Inclusive watermark boundary: the store absorbs re-processed
            // boundary items.
            if since.is_some_and(|watermark| record.updated_at < watermark) {
                continue;
            }

            self.load_subentities(number, &mut record, &mut item_errors)
                .await?;
            items.push(record);
        }

        // The remote already orders by modification time; re-sort in case a
        // proxy or enterprise install serves a differently ordered page.
        items.sort_by_key(|record| record.updated_at);

        Ok(FetchedPage {
            items,
            item_errors,
            has_next: response.has_next,
            rate_limit: self.client.quota_snapshot(),
        })
    }
}

fn into_elements(body: Value, path: &str) -> Result<Vec<Value>, SyncError> {
    match body {
        Value::Array(elements) => Ok(elements),
        other => Err(SyncError::Api {
            message: format!("expected a JSON array from {path}, got {other}"),
        }),
    }
}

#[cfg(test)]
mod tests;
