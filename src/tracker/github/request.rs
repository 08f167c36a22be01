//! Authenticated, rate-limited HTTP plumbing for the GitHub backend.
//!
//! Every outbound request goes through [`ApiClient::get_json`], which
//! applies the quota gate before sending, retries transient failures with
//! bounded backoff, and maps HTTP failures onto the sync error taxonomy.

use std::sync::Mutex;
use std::time::Duration;

use http::StatusCode;
use serde_json::Value;
use url::Url;

use crate::config::ProxySettings;
use crate::tracker::error::SyncError;
use crate::tracker::rate_limit::RateLimitInfo;

/// Attempts per request before a transient failure becomes fatal.
const MAX_ATTEMPTS: u32 = 3;

/// Base delay between retry attempts; doubled after each failure.
const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);

const USER_AGENT: &str = concat!("prmine/", env!("CARGO_PKG_VERSION"));

/// A JSON response body plus whether the remote reports a further page.
pub(super) struct JsonPage {
    /// Parsed response body.
    pub(super) body: Value,
    /// True when the `Link` header carries a `rel="next"` relation.
    pub(super) has_next: bool,
}

/// Shared HTTP client carrying auth, proxy routing, and the last quota
/// snapshot.
pub(super) struct ApiClient {
    http: reqwest::Client,
    api_base: Url,
    quota: Mutex<Option<RateLimitInfo>>,
}

impl ApiClient {
    /// Builds a client for the given API base, token, and proxy settings.
    pub(super) fn new(
        api_base: Url,
        token: Option<&str>,
        proxy: Option<&ProxySettings>,
    ) -> Result<Self, SyncError> {
        let mut headers = http::HeaderMap::new();
        headers.insert(
            http::header::USER_AGENT,
            http::HeaderValue::from_static(USER_AGENT),
        );
        headers.insert(
            http::header::ACCEPT,
            http::HeaderValue::from_static("application/vnd.github+json"),
        );
        if let Some(token_value) = token {
            let mut value = http::HeaderValue::from_str(&format!("Bearer {token_value}"))
                .map_err(|error| SyncError::Configuration {
                    message: format!("token is not a valid header value: {error}"),
                })?;
            value.set_sensitive(true);
            headers.insert(http::header::AUTHORIZATION, value);
        }

        let mut builder = reqwest::Client::builder().default_headers(headers);
        if let Some(proxy_settings) = proxy {
            let mut proxy_config =
                reqwest::Proxy::all(proxy_settings.url()).map_err(|error| {
                    SyncError::Configuration {
                        message: format!("proxy configuration is invalid: {error}"),
                    }
                })?;
            if let (Some(user), Some(password)) = (
                proxy_settings.user.as_deref(),
                proxy_settings.password.as_deref(),
            ) {
                proxy_config = proxy_config.basic_auth(user, password);
            }
            builder = builder.proxy(proxy_config);
        }

        let client = builder.build().map_err(|error| SyncError::Configuration {
            message: format!("failed to build HTTP client: {error}"),
        })?;

        Ok(Self {
            http: client,
            api_base,
            quota: Mutex::new(None),
        })
    }

    /// Returns the most recent quota snapshot, if any response carried one.
    pub(super) fn quota_snapshot(&self) -> Option<RateLimitInfo> {
        self.quota.lock().ok().and_then(|guard| *guard)
    }

    /// Fetches one JSON page from `path` (relative to the API base).
    ///
    /// Waits out a depleted quota before sending, retries transient
    /// failures with doubling backoff, and fails with the appropriate
    /// [`SyncError`] variant once the bounded policies are exhausted.
    pub(super) async fn get_json(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<JsonPage, SyncError> {
        let url = self
            .api_base
            .join(path)
            .map_err(|error| SyncError::InvalidUrl(error.to_string()))?;

        self.wait_for_quota().await?;

        let mut attempt: u32 = 1;
        loop {
            let outcome = self.http.get(url.clone()).query(query).send().await;
            let response = match outcome {
                Ok(response) => response,
                Err(error) => {
                    if attempt >= MAX_ATTEMPTS {
                        return Err(SyncError::Network {
                            message: format!("request to {url} failed: {error}"),
                        });
                    }
                    tracing::debug!("transient failure talking to {url}: {error}");
                    tokio::time::sleep(retry_delay(attempt)).await;
                    attempt += 1;
                    continue;
                }
            };

            self.record_quota(response.headers());
            let status = response.status();

            if status.is_success() {
                let has_next = has_next_page(response.headers());
                let body =
                    response
                        .json::<Value>()
                        .await
                        .map_err(|error| SyncError::Api {
                            message: format!("invalid JSON from {url}: {error}"),
                        })?;
                return Ok(JsonPage { body, has_next });
            }

            if status.is_server_error() {
                if attempt >= MAX_ATTEMPTS {
                    return Err(SyncError::Api {
                        message: format!("{url} failed with status {status}"),
                    });
                }
                tokio::time::sleep(retry_delay(attempt)).await;
                attempt += 1;
                continue;
            }

            let message = extract_message(response).await;
            if is_rate_limit_response(status, &message) {
                if attempt >= MAX_ATTEMPTS {
                    return Err(self.rate_limit_error(&message));
                }
                self.wait_for_quota_reset(&message).await?;
                attempt += 1;
                continue;
            }

            if matches!(status, StatusCode::UNAUTHORIZED | StatusCode::FORBIDDEN) {
                return Err(SyncError::Authentication {
                    message: format!("tracker returned {status}: {message}"),
                });
            }

            return Err(SyncError::Api {
                message: format!("{url} failed with status {status}: {message}"),
            });
        }
    }

    /// Suspends until quota recovers when the last snapshot is depleted.
    async fn wait_for_quota(&self) -> Result<(), SyncError> {
        let Some(snapshot) = self.quota_snapshot() else {
            return Ok(());
        };
        if !snapshot.is_depleted() {
            return Ok(());
        }

        let Some(wait) = snapshot.bounded_wait() else {
            return Err(SyncError::RateLimitExceeded {
                rate_limit: Some(snapshot),
                message: "quota reset lies beyond the bounded wait ceiling".to_owned(),
            });
        };

        tracing::info!("quota depleted; suspending for {wait}s until reset");
        tokio::time::sleep(Duration::from_secs(wait)).await;
        Ok(())
    }

    /// Waits out a rate-limit rejection using the advertised reset time.
    async fn wait_for_quota_reset(&self, message: &str) -> Result<(), SyncError> {
        let Some(snapshot) = self.quota_snapshot() else {
            return Err(self.rate_limit_error(message));
        };
        let Some(wait) = snapshot.bounded_wait() else {
            return Err(self.rate_limit_error(message));
        };

        tracing::info!("rate limited; suspending for {wait}s until reset");
        tokio::time::sleep(Duration::from_secs(wait)).await;
        Ok(())
    }

    fn rate_limit_error(&self, message: &str) -> SyncError {
        SyncError::RateLimitExceeded {
            rate_limit: self.quota_snapshot(),
            message: message.to_owned(),
        }
    }

    fn record_quota(&self, headers: &http::HeaderMap) {
        if let Some(snapshot) = RateLimitInfo::from_headers(headers)
            && let Ok(mut guard) = self.quota.lock()
        {
            *guard = Some(snapshot);
        }
    }
}

fn retry_delay(attempt: u32) -> Duration {
    RETRY_BASE_DELAY.saturating_mul(1_u32 << attempt.saturating_sub(1).min(8))
}

fn has_next_page(headers: &http::HeaderMap) -> bool {
    headers
        .get(http::header::LINK)
        .and_then(|value| value.to_str().ok())
        .is_some_and(|link| link.contains("rel=\"next\""))
}

fn is_rate_limit_response(status: StatusCode, message: &str) -> bool {
    matches!(
        status,
        StatusCode::FORBIDDEN | StatusCode::TOO_MANY_REQUESTS
    ) && message.to_lowercase().contains("rate limit")
}

async fn extract_message(response: reqwest::Response) -> String {
    let body = response.text().await.unwrap_or_default();
    let parsed = serde_json::from_str::<Value>(&body).ok();
    parsed
        .as_ref()
        .and_then(|value| value.get("message"))
        .and_then(Value::as_str)
        .map(ToOwned::to_owned)
        .unwrap_or(body)
}
