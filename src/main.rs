//! Prmine CLI entrypoint: one incremental sync run per invocation.

use std::io::{self, Write};
use std::process::ExitCode;

use ortho_config::OrthoConfig;
use prmine::{
    BackendRegistry, MineConfig, SqliteStore, StderrJsonlReporter, StoreGateway, SyncError,
    SyncPipeline, SyncResult, migrate_database,
};

#[tokio::main]
async fn main() -> ExitCode {
    match run().await {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            if writeln!(io::stderr().lock(), "{error}").is_err() {
                return ExitCode::FAILURE;
            }
            ExitCode::FAILURE
        }
    }
}

async fn run() -> Result<(), SyncError> {
    let config = load_config()?;
    init_tracing(&config);

    let database_url = config.require_database_url()?;
    let reporter = StderrJsonlReporter;

    if config.migrate_db {
        migrate_database(database_url, &reporter)?;
        return Ok(());
    }

    let project_name = config.require_project_name()?;
    let tracker_url = config.require_tracker_url()?;
    let backend = BackendRegistry::with_builtin().build(config.backend_name(), &config)?;

    let store = SqliteStore::new(database_url)?;
    let project = store.find_project(project_name)?;
    let mut system = store.find_or_create_tracker_system(&project, tracker_url)?;

    let pipeline = SyncPipeline::new(backend.as_ref(), &store, &reporter);
    let result = pipeline.sync(&mut system).await?;
    write_summary(tracker_url, &result)?;
    Ok(())
}

fn write_summary(tracker_url: &str, result: &SyncResult) -> Result<(), SyncError> {
    let mut stdout = io::stdout().lock();
    let message = format!(
        "Synced {tracker_url}: {} created, {} updated, {} skipped across {} page(s)",
        result.counts.pull_requests_created,
        result.counts.pull_requests_updated,
        result.item_errors.len(),
        result.pages
    );

    writeln!(stdout, "{message}").map_err(|error| SyncError::Io {
        message: error.to_string(),
    })
}

/// Loads configuration from CLI, environment, and files.
///
/// # Errors
///
/// Returns [`SyncError::Configuration`] when ortho-config fails to parse
/// arguments or load configuration files.
fn load_config() -> Result<MineConfig, SyncError> {
    MineConfig::load().map_err(|error| SyncError::Configuration {
        message: error.to_string(),
    })
}

/// Installs a stderr tracing subscriber honouring the configured level,
/// falling back to `RUST_LOG` and then `info`.
fn init_tracing(config: &MineConfig) {
    use tracing_subscriber::EnvFilter;

    let filter = config.log_level.as_deref().map_or_else(
        || EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        EnvFilter::new,
    );
    let _ignored = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .try_init();
}
