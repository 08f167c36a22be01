//! Run reporting events and sinks.
//!
//! The sync pipeline reports progress through an explicitly passed
//! [`SyncReporter`] rather than a process-wide logger, so callers decide
//! where run summaries and skipped-item notices end up.

use std::io;

use serde::{Deserialize, Serialize};

/// A structured event emitted during a sync run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SyncEvent {
    /// A sync run started against a tracker system.
    RunStarted {
        /// Tracker URL being synced.
        tracker_url: String,
        /// Stored watermark at the start of the run, RFC 3339, if any.
        since: Option<String>,
    },
    /// One page of remote results was committed to the store.
    PageCommitted {
        /// 1-based page number.
        page: u32,
        /// Number of pull requests persisted from this page.
        items: u64,
    },
    /// A malformed remote item was skipped.
    ItemSkipped {
        /// External identifier of the skipped item, when recoverable.
        external_id: Option<String>,
        /// Why the item could not be mapped.
        message: String,
    },
    /// The watermark was advanced after a successful run.
    WatermarkAdvanced {
        /// New watermark value, RFC 3339.
        last_synced: String,
    },
    /// A sync run finished successfully.
    RunCompleted {
        /// Pull requests created during the run.
        created: u64,
        /// Pull requests updated during the run.
        updated: u64,
        /// Non-fatal item errors recorded during the run.
        skipped: u64,
        /// Elapsed wall-clock time in milliseconds.
        elapsed_ms: u64,
    },
    /// A sync run failed with a fatal error.
    RunFailed {
        /// Pipeline phase in which the failure occurred.
        phase: String,
        /// Error detail.
        message: String,
    },
    /// Records the database schema version after migrations apply.
    SchemaVersionRecorded {
        /// Diesel migration version string (e.g. `20260720000000`).
        schema_version: String,
    },
}

/// A sink that can record sync events.
pub trait SyncReporter: Send + Sync {
    /// Records a sync event.
    fn record(&self, event: SyncEvent);
}

/// Reporter that drops all events.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSyncReporter;

impl SyncReporter for NoopSyncReporter {
    fn record(&self, _event: SyncEvent) {}
}

/// Records sync events to stderr as JSON lines (JSONL).
#[derive(Debug, Default)]
pub struct StderrJsonlReporter;

impl SyncReporter for StderrJsonlReporter {
    fn record(&self, event: SyncEvent) {
        let Ok(serialised) = serde_json::to_string(&event) else {
            return;
        };

        let _ignored = writeln_stderr(&serialised);
    }
}

fn writeln_stderr(message: &str) -> io::Result<()> {
    use io::Write;

    let mut stderr = io::stderr().lock();
    writeln!(stderr, "{message}")
}

#[cfg(any(test, feature = "test-support"))]
pub mod test_support {
    //! Recording reporter used by unit and integration tests.

    use super::{SyncEvent, SyncReporter};

    /// Reporter that captures events in memory for assertions.
    #[derive(Debug, Default)]
    pub struct RecordingReporter {
        events: std::sync::Mutex<Vec<SyncEvent>>,
    }

    impl RecordingReporter {
        /// Drains and returns all recorded events.
        ///
        /// # Panics
        ///
        /// Panics if the internal mutex was poisoned by another test thread.
        #[must_use]
        pub fn take(&self) -> Vec<SyncEvent> {
            self.events
                .lock()
                .expect("events mutex should be available")
                .drain(..)
                .collect()
        }
    }

    impl SyncReporter for RecordingReporter {
        fn record(&self, event: SyncEvent) {
            self.events
                .lock()
                .expect("events mutex should be available")
                .push(event);
        }
    }
}
