//! Tracker URL parsing and identity wrappers.

use url::Url;

use super::error::SyncError;

/// Repository owner wrapper to avoid stringly typed parameters.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryOwner(String);

impl RepositoryOwner {
    pub(crate) fn new(value: &str) -> Result<Self, SyncError> {
        if value.is_empty() {
            return Err(SyncError::MissingPathSegments);
        }
        Ok(Self(value.to_owned()))
    }

    /// Borrow the owner value.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Repository name wrapper to prevent parameter mix-ups.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RepositoryName(String);

impl RepositoryName {
    pub(crate) fn new(value: &str) -> Result<Self, SyncError> {
        if value.is_empty() {
            return Err(SyncError::MissingPathSegments);
        }
        Ok(Self(value.to_owned()))
    }

    /// Borrow the repository name.
    #[must_use]
    pub const fn as_str(&self) -> &str {
        self.0.as_str()
    }
}

/// Parsed tracker URL and derived API base.
///
/// A tracker URL names the repository whose pull requests are mined, e.g.
/// `https://github.com/owner/repo`. Hosts other than `github.com` are
/// treated as enterprise installs with their API under `/api/v3`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackerLocator {
    api_base: Url,
    owner: RepositoryOwner,
    repository: RepositoryName,
}

impl TrackerLocator {
    /// Parses a tracker URL in the form `https://<host>/<owner>/<repo>`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::InvalidUrl`] when parsing fails and
    /// [`SyncError::MissingPathSegments`] when the path does not contain
    /// owner and repository segments.
    pub fn parse(input: &str) -> Result<Self, SyncError> {
        let parsed = Url::parse(input).map_err(|error| SyncError::InvalidUrl(error.to_string()))?;

        let mut segments = parsed
            .path_segments()
            .ok_or(SyncError::MissingPathSegments)?;

        let owner_segment = segments.next().ok_or(SyncError::MissingPathSegments)?;
        let repository_segment = segments.next().ok_or(SyncError::MissingPathSegments)?;

        let owner = RepositoryOwner::new(owner_segment)?;
        let repository = RepositoryName::new(repository_segment)?;
        let api_base = derive_api_base(&parsed)?;

        Ok(Self {
            api_base,
            owner,
            repository,
        })
    }

    /// API base URL derived from the tracker host.
    #[must_use]
    pub const fn api_base(&self) -> &Url {
        &self.api_base
    }

    /// Repository owner.
    #[must_use]
    pub const fn owner(&self) -> &RepositoryOwner {
        &self.owner
    }

    /// Repository name.
    #[must_use]
    pub const fn repository(&self) -> &RepositoryName {
        &self.repository
    }

    pub(crate) fn pulls_path(&self) -> String {
        format!(
            "repos/{}/{}/pulls",
            self.owner.as_str(),
            self.repository.as_str()
        )
    }

    pub(crate) fn reviews_path(&self, number: u64) -> String {
        format!("{}/{number}/reviews", self.pulls_path())
    }

    pub(crate) fn commits_path(&self, number: u64) -> String {
        format!("{}/{number}/commits", self.pulls_path())
    }

    pub(crate) fn comments_path(&self, number: u64) -> String {
        format!(
            "repos/{}/{}/issues/{number}/comments",
            self.owner.as_str(),
            self.repository.as_str()
        )
    }
}

/// Derives the API base URL from the tracker host.
fn derive_api_base(parsed: &Url) -> Result<Url, SyncError> {
    let host = parsed
        .host_str()
        .ok_or_else(|| SyncError::InvalidUrl("URL must include a host".to_owned()))?;

    if host.eq_ignore_ascii_case("github.com") {
        return Url::parse("https://api.github.com/")
            .map_err(|error| SyncError::InvalidUrl(error.to_string()));
    }

    let mut api_url = Url::parse(&format!("{}://{host}", parsed.scheme()))
        .map_err(|error| SyncError::InvalidUrl(error.to_string()))?;
    api_url
        .set_port(parsed.port())
        .map_err(|()| SyncError::InvalidUrl("invalid port".to_owned()))?;
    api_url.set_path("api/v3/");
    Ok(api_url)
}

#[cfg(test)]
mod tests {
    use super::TrackerLocator;
    use crate::tracker::error::SyncError;

    #[test]
    fn parse_derives_public_api_base_for_github_dot_com() {
        let locator = TrackerLocator::parse("https://github.com/octocat/hello-world")
            .expect("URL should parse");

        assert_eq!(locator.api_base().as_str(), "https://api.github.com/");
        assert_eq!(locator.owner().as_str(), "octocat");
        assert_eq!(locator.repository().as_str(), "hello-world");
    }

    #[test]
    fn parse_derives_enterprise_api_base_for_other_hosts() {
        let locator =
            TrackerLocator::parse("http://git.example.com:8080/team/project").expect("should parse");

        assert_eq!(
            locator.api_base().as_str(),
            "http://git.example.com:8080/api/v3/"
        );
    }

    #[test]
    fn parse_rejects_url_without_repository_segment() {
        let error =
            TrackerLocator::parse("https://github.com/octocat").expect_err("should reject");

        assert_eq!(error, SyncError::MissingPathSegments);
    }

    #[test]
    fn parse_rejects_unparseable_input() {
        let error = TrackerLocator::parse("not a url").expect_err("should reject");

        assert!(matches!(error, SyncError::InvalidUrl(_)));
    }

    #[test]
    fn paths_target_the_expected_endpoints() {
        let locator =
            TrackerLocator::parse("https://github.com/octocat/hello-world").expect("should parse");

        assert_eq!(locator.pulls_path(), "repos/octocat/hello-world/pulls");
        assert_eq!(
            locator.reviews_path(7),
            "repos/octocat/hello-world/pulls/7/reviews"
        );
        assert_eq!(
            locator.comments_path(7),
            "repos/octocat/hello-world/issues/7/comments"
        );
        assert_eq!(
            locator.commits_path(7),
            "repos/octocat/hello-world/pulls/7/commits"
        );
    }
}
