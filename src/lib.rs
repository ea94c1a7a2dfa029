pub mod collaborators;
pub mod config;
pub mod coordinator;
pub mod db;
pub mod detectors;
pub mod error;
pub mod evaluation;
pub mod history;
pub mod keychain;
pub mod migrations;
pub mod pattern;
pub mod profile;
pub mod remote;
pub mod render;
pub mod report;
pub mod retry;
pub mod severity;
pub mod store;
pub mod types;
pub mod watcher;

use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use tracing::info;
use tracing_subscriber::EnvFilter;

use crate::collaborators::ProfileResolver;
use crate::config::RemoteEndpoints;
use crate::coordinator::RunCoordinator;
use crate::error::MonitorError;
use crate::remote::{HttpIncidentAdvisor, HttpProfileResolver};
use crate::retry::RetryPolicy;
use crate::store::{JsonUploadStore, MarkdownProfileStore};
use crate::types::config::MonitorConfig;

/// Initialize structured logging with tracing.
/// Respects RUST_LOG env var; defaults to `info` level for the uploadwatch crate.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("uploadwatch=info,uploadwatch_lib=info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
        .with_writer(std::io::stderr)
        .init();
}

/// A coordinator wired to the batch for `date` under `data_dir`, plus the
/// sources that batch contains.
///
/// Profiles come from the profile service when `endpoints.profile_url` is
/// set, otherwise from the markdown files next to the batch. An advisor is
/// attached only when `endpoints.advisor_url` is set.
pub fn prepare_run(
    data_dir: &Path,
    date: NaiveDate,
    config: MonitorConfig,
    endpoints: &RemoteEndpoints,
) -> Result<(RunCoordinator, Vec<String>), MonitorError> {
    let store = JsonUploadStore::open(data_dir, date)?;
    let source_ids = store.source_ids();
    let policy = RetryPolicy::from_config(&config);

    let profiles: Arc<dyn ProfileResolver> = match &endpoints.profile_url {
        Some(url) => {
            info!(url = %url, "Resolving profiles through the profile service");
            Arc::new(HttpProfileResolver::new(
                url,
                keychain::resolve_api_key(keychain::PROFILE)?,
                policy,
            )?)
        }
        None => Arc::new(MarkdownProfileStore::new(data_dir)),
    };

    let mut coordinator = RunCoordinator::new(profiles, Arc::new(store), config);
    if let Some(url) = &endpoints.advisor_url {
        info!(url = %url, "Incident advisor enabled");
        coordinator = coordinator.with_advisor(Arc::new(HttpIncidentAdvisor::new(
            url,
            keychain::resolve_api_key(keychain::ADVISOR)?,
            policy,
        )?));
    }
    Ok((coordinator, source_ids))
}
