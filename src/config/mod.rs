//! Run configuration loaded from CLI, environment, and files.
//!
//! Configuration merges command-line arguments, `PRMINE_*` environment
//! variables, and discovered configuration files using ortho-config's
//! layered approach (CLI over environment over file over defaults).
//!
//! # Configuration File
//!
//! Place `.prmine.toml` in the current directory, home directory, or XDG
//! config directory with:
//!
//! ```toml
//! project_name = "hello-world"
//! tracker_url = "https://github.com/octocat/hello-world"
//! backend = "github"
//! token = "ghp_example"
//! database_url = "prmine.sqlite"
//! ```

use std::env;

use ortho_config::OrthoConfig;
use serde::{Deserialize, Serialize};

use crate::tracker::error::SyncError;

/// Outbound proxy routing resolved from configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProxySettings {
    /// Proxy hostname or IP address.
    pub host: String,
    /// Proxy port.
    pub port: u16,
    /// Username for HTTP basic auth on the proxy, if any.
    pub user: Option<String>,
    /// Password for HTTP basic auth on the proxy, if any.
    pub password: Option<String>,
}

impl ProxySettings {
    /// Proxy URL in the form `http://host:port`.
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}:{}", self.host, self.port)
    }
}

/// Run configuration supporting CLI, environment, and file sources.
///
/// # Environment Variables
///
/// - `PRMINE_PROJECT_NAME` or `--project-name`: target project
/// - `PRMINE_TRACKER_URL` or `--tracker-url`: tracker repository URL
/// - `PRMINE_BACKEND` or `--backend`: backend registry name
/// - `PRMINE_TOKEN`, `GITHUB_TOKEN`, or `--token`: bearer credential
/// - `PRMINE_DATABASE_URL` or `--database-url`: `SQLite` datastore path
#[derive(Debug, Clone, Deserialize, Serialize, OrthoConfig)]
#[serde(default)]
#[ortho_config(
    prefix = "PRMINE",
    discovery(
        dotfile_name = ".prmine.toml",
        config_file_name = "prmine.toml",
        app_name = "prmine"
    )
)]
pub struct MineConfig {
    /// Name of the project whose pull requests are mined.
    ///
    /// The project must already exist in the datastore; sync never creates
    /// it.
    #[ortho_config(cli_short = 'p')]
    pub project_name: Option<String>,

    /// Tracker URL identifying the repository, e.g.
    /// `https://github.com/owner/repo`. Also the identity of the
    /// tracker-system row in the datastore.
    #[ortho_config(cli_short = 'i')]
    pub tracker_url: Option<String>,

    /// Backend used to talk to the tracker. Defaults to `github`.
    #[ortho_config(cli_short = 'b')]
    pub backend: Option<String>,

    /// Bearer token for the tracker API.
    ///
    /// Optional: without a token the backend makes unauthenticated requests
    /// where the remote API allows it, at a lower rate-limit quota. Falls
    /// back to the `GITHUB_TOKEN` environment variable.
    #[ortho_config(cli_short = 't')]
    pub token: Option<String>,

    /// Proxy hostname or IP address for outbound requests.
    #[ortho_config()]
    pub proxy_host: Option<String>,

    /// Port of the proxy to use.
    #[ortho_config()]
    pub proxy_port: Option<u16>,

    /// Username for HTTP basic auth on the proxy.
    #[ortho_config()]
    pub proxy_user: Option<String>,

    /// Password for HTTP basic auth on the proxy.
    #[ortho_config()]
    pub proxy_password: Option<String>,

    /// Log verbosity hint consumed by the orchestration layer.
    #[ortho_config()]
    pub log_level: Option<String>,

    /// `SQLite` datastore URL/path shared with the wider mining platform.
    #[ortho_config()]
    pub database_url: Option<String>,

    /// Runs datastore migrations and exits without syncing.
    #[ortho_config()]
    pub migrate_db: bool,
}

impl Default for MineConfig {
    fn default() -> Self {
        Self {
            project_name: None,
            tracker_url: None,
            backend: None,
            token: None,
            proxy_host: None,
            proxy_port: None,
            proxy_user: None,
            proxy_password: None,
            log_level: None,
            database_url: None,
            migrate_db: false,
        }
    }
}

/// Backend selected when none is configured.
pub const DEFAULT_BACKEND: &str = "github";

impl MineConfig {
    /// Returns the project name or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] when no project name is
    /// configured.
    pub fn require_project_name(&self) -> Result<&str, SyncError> {
        self.project_name
            .as_deref()
            .ok_or_else(|| SyncError::Configuration {
                message: "project name is required (use --project-name or -p)".to_owned(),
            })
    }

    /// Returns the tracker URL or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] when no tracker URL is
    /// configured.
    pub fn require_tracker_url(&self) -> Result<&str, SyncError> {
        self.tracker_url
            .as_deref()
            .ok_or_else(|| SyncError::Configuration {
                message: "tracker URL is required (use --tracker-url or -i)".to_owned(),
            })
    }

    /// Returns the datastore URL or an error if missing.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] when no database URL is
    /// configured.
    pub fn require_database_url(&self) -> Result<&str, SyncError> {
        self.database_url
            .as_deref()
            .ok_or_else(|| SyncError::Configuration {
                message: "database URL is required (use --database-url)".to_owned(),
            })
    }

    /// Returns the configured backend name, defaulting to `github`.
    #[must_use]
    pub fn backend_name(&self) -> &str {
        self.backend.as_deref().unwrap_or(DEFAULT_BACKEND)
    }

    /// Resolves the token from configuration or the `GITHUB_TOKEN`
    /// environment variable. `None` selects unauthenticated access.
    #[must_use]
    pub fn resolve_token(&self) -> Option<String> {
        self.token
            .clone()
            .or_else(|| env::var("GITHUB_TOKEN").ok())
            .filter(|token| !token.trim().is_empty())
    }

    /// Resolves proxy settings when a proxy is configured.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Configuration`] when only one of host and port
    /// is provided.
    pub fn proxy_settings(&self) -> Result<Option<ProxySettings>, SyncError> {
        match (self.proxy_host.as_deref(), self.proxy_port) {
            (Some(host), Some(port)) => Ok(Some(ProxySettings {
                host: host.to_owned(),
                port,
                user: self.proxy_user.clone(),
                password: self.proxy_password.clone(),
            })),
            (None, None) => Ok(None),
            (Some(_), None) => Err(SyncError::Configuration {
                message: "proxy host configured without proxy port".to_owned(),
            }),
            (None, Some(_)) => Err(SyncError::Configuration {
                message: "proxy port configured without proxy host".to_owned(),
            }),
        }
    }
}
