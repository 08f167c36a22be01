//! Name-keyed registry of tracker backend constructors.
//!
//! Adding a backend means registering a new constructor; the dispatch logic
//! never changes. Unknown names fail before any network or database
//! activity occurs.

use std::collections::HashMap;

use crate::config::MineConfig;

use super::TrackerBackend;
use super::error::SyncError;
use super::github::GithubBackend;

/// Constructs a backend from the resolved run configuration.
pub type BackendBuilder = fn(&MineConfig) -> Result<Box<dyn TrackerBackend>, SyncError>;

/// Maps configured backend names to constructors.
#[derive(Debug, Default)]
pub struct BackendRegistry {
    builders: HashMap<&'static str, BackendBuilder>,
}

impl BackendRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry with the built-in backends registered.
    #[must_use]
    pub fn with_builtin() -> Self {
        let mut registry = Self::new();
        registry.register("github", build_github);
        registry
    }

    /// Registers a constructor under `name`, replacing any previous entry.
    pub fn register(&mut self, name: &'static str, builder: BackendBuilder) {
        self.builders.insert(name, builder);
    }

    /// Builds the backend registered under `name`.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::BackendNotSupported`] for unknown names, or the
    /// constructor's error when the configuration is unusable.
    pub fn build(
        &self,
        name: &str,
        config: &MineConfig,
    ) -> Result<Box<dyn TrackerBackend>, SyncError> {
        let builder = self
            .builders
            .get(name)
            .ok_or_else(|| SyncError::BackendNotSupported {
                name: name.to_owned(),
            })?;
        builder(config)
    }
}

fn build_github(config: &MineConfig) -> Result<Box<dyn TrackerBackend>, SyncError> {
    Ok(Box::new(GithubBackend::from_config(config)?))
}
