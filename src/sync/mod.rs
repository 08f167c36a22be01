//! The incremental sync pipeline.
//!
//! One run alternates fetching and committing pages, then advances the
//! watermark, failing fast on the first fatal error. Pages arrive in order
//! of remote modification time and the watermark only advances after every
//! page has been committed, so an interrupted run loses at most the
//! in-flight page's uncommitted writes and resumes safely from the old
//! watermark.

use std::time::Instant;

use chrono::{DateTime, Utc};

use crate::report::{SyncEvent, SyncReporter};
use crate::store::{PageCounts, StoreGateway, TrackerSystem};
use crate::tracker::{ItemError, SyncError, TrackerBackend};

/// Pipeline phase in which a run currently is, used for failure reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncPhase {
    /// Fetching a page from the backend.
    Fetching,
    /// Committing a fetched page to the store.
    Committing,
    /// Persisting the advanced watermark.
    AdvancingWatermark,
}

impl SyncPhase {
    /// Stable string form used in events and logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Fetching => "fetching",
            Self::Committing => "committing",
            Self::AdvancingWatermark => "advancing_watermark",
        }
    }
}

/// Aggregated outcome of one successful sync run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncResult {
    /// Created/updated entity counts across all committed pages.
    pub counts: PageCounts,
    /// Number of pages committed.
    pub pages: u32,
    /// Latest modification timestamp observed across all fetched items.
    pub latest_update: Option<DateTime<Utc>>,
    /// Non-fatal per-item errors collected during the run.
    pub item_errors: Vec<ItemError>,
}

/// Drives one backend against one store for a single tracker system.
pub struct SyncPipeline<'run> {
    backend: &'run dyn TrackerBackend,
    store: &'run dyn StoreGateway,
    reporter: &'run dyn SyncReporter,
}

impl<'run> SyncPipeline<'run> {
    /// Creates a pipeline over the given collaborators.
    #[must_use]
    pub const fn new(
        backend: &'run dyn TrackerBackend,
        store: &'run dyn StoreGateway,
        reporter: &'run dyn SyncReporter,
    ) -> Self {
        Self {
            backend,
            store,
            reporter,
        }
    }

    /// Runs one end-to-end incremental sync for `system`.
    ///
    /// On success the system's watermark has been advanced to the maximum
    /// modification time observed (never backwards) and persisted. On
    /// failure the watermark is left untouched so the next run re-fetches
    /// from the old one; pages committed before the failure are absorbed
    /// by the idempotent upserts.
    ///
    /// # Errors
    ///
    /// Propagates the first fatal [`SyncError`] from the backend or the
    /// store.
    pub async fn sync(&self, system: &mut TrackerSystem) -> Result<SyncResult, SyncError> {
        let started = Instant::now();
        self.reporter.record(SyncEvent::RunStarted {
            tracker_url: system.url.clone(),
            since: system.last_synced.map(|watermark| watermark.to_rfc3339()),
        });

        match self.run(system).await {
            Ok(result) => {
                self.reporter.record(SyncEvent::RunCompleted {
                    created: result.counts.pull_requests_created,
                    updated: result.counts.pull_requests_updated,
                    skipped: saturating_count(result.item_errors.len()),
                    elapsed_ms: elapsed_ms(started),
                });
                tracing::info!(
                    "synced {} in {}ms: {} created, {} updated, {} skipped",
                    system.url,
                    elapsed_ms(started),
                    result.counts.pull_requests_created,
                    result.counts.pull_requests_updated,
                    result.item_errors.len(),
                );
                Ok(result)
            }
            Err((phase, error)) => {
                self.reporter.record(SyncEvent::RunFailed {
                    phase: phase.as_str().to_owned(),
                    message: error.to_string(),
                });
                Err(error)
            }
        }
    }

    async fn run(&self, system: &mut TrackerSystem) -> Result<SyncResult, (SyncPhase, SyncError)> {
        let since = system.last_synced;

        let mut counts = PageCounts::default();
        let mut item_errors: Vec<ItemError> = Vec::new();
        let mut latest_update: Option<DateTime<Utc>> = None;
        let mut pages: u32 = 0;
        let mut page: u32 = 1;

        loop {
            let fetched = self
                .backend
                .fetch_page(since, page)
                .await
                .map_err(|error| (SyncPhase::Fetching, error))?;

            let page_counts = self
                .store
                .persist_page(system, &fetched.items)
                .map_err(|error| (SyncPhase::Committing, SyncError::Store(error)))?;

            counts.absorb(page_counts);
            pages += 1;
            let page_latest = fetched.items.iter().map(|item| item.updated_at).max();
            latest_update = latest_update.max(page_latest);

            self.reporter.record(SyncEvent::PageCommitted {
                page,
                items: saturating_count(fetched.items.len()),
            });
            tracing::debug!(
                "page {page}: {} items, {} skipped",
                fetched.items.len(),
                fetched.item_errors.len(),
            );
            for item_error in &fetched.item_errors {
                self.reporter.record(SyncEvent::ItemSkipped {
                    external_id: item_error.external_id.clone(),
                    message: item_error.message.clone(),
                });
            }
            item_errors.extend(fetched.item_errors);

            if !fetched.has_next {
                break;
            }
            page += 1;
        }

        self.advance_watermark(system, latest_update)?;

        Ok(SyncResult {
            counts,
            pages,
            latest_update,
            item_errors,
        })
    }

    /// Advances the watermark to the maximum of its old value and the
    /// latest observed modification time. No observation, or an
    /// observation at or behind the old watermark, leaves the row
    /// untouched.
    fn advance_watermark(
        &self,
        system: &mut TrackerSystem,
        latest_update: Option<DateTime<Utc>>,
    ) -> Result<(), (SyncPhase, SyncError)> {
        let Some(observed) = latest_update else {
            return Ok(());
        };
        let advanced = system
            .last_synced
            .map_or(observed, |current| current.max(observed));
        if system.last_synced == Some(advanced) {
            return Ok(());
        }

        let mut updated = system.clone();
        updated.last_synced = Some(advanced);
        self.store
            .save_tracker_system(&updated)
            .map_err(|error| (SyncPhase::AdvancingWatermark, SyncError::Store(error)))?;
        system.last_synced = Some(advanced);
        self.reporter.record(SyncEvent::WatermarkAdvanced {
            last_synced: advanced.to_rfc3339(),
        });
        Ok(())
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX)
}

fn saturating_count(len: usize) -> u64 {
    u64::try_from(len).unwrap_or(u64::MAX)
}
