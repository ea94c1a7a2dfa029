use std::collections::HashSet;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use clap::{Parser, Subcommand};
use tracing::{error, info, warn};

use uploadwatch_lib::config::{load_config, RemoteEndpoints};
use uploadwatch_lib::db::{self, DbPool};
use uploadwatch_lib::error::MonitorError;
use uploadwatch_lib::evaluation::{evaluate, load_ground_truth, render_evaluation};
use uploadwatch_lib::history;
use uploadwatch_lib::keychain;
use uploadwatch_lib::render::render_summary;
use uploadwatch_lib::types::report::GlobalReport;
use uploadwatch_lib::watcher::{create_watcher, WatchEvent};

#[derive(Parser)]
#[command(name = "uploadwatch", version, about = "Daily anomaly detection for scheduled file uploads")]
struct Cli {
    /// Config file (JSON). Defaults to <data-dir>/config.json when present.
    #[arg(long, global = true, env = "UPLOADWATCH_CONFIG")]
    config: Option<PathBuf>,

    /// History database. Defaults to ~/.uploadwatch/state/history.sqlite.
    #[arg(long, global = true, env = "UPLOADWATCH_DB")]
    db: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Evaluate every source of one day's batch.
    Run {
        #[arg(long)]
        date: String,
        #[arg(long, default_value = "data", env = "UPLOADWATCH_DATA_DIR")]
        data_dir: PathBuf,
        /// Only evaluate the first N sources.
        #[arg(long)]
        limit: Option<usize>,
        /// Print the report as JSON instead of the summary table.
        #[arg(long)]
        json: bool,
        #[arg(long)]
        no_save: bool,
    },
    /// Show archived runs.
    History {
        #[arg(long)]
        date: Option<String>,
        #[arg(long)]
        source: Option<String>,
    },
    /// Score an archived run against labelled statuses.
    Evaluate {
        #[arg(long)]
        date: String,
        #[arg(long)]
        ground_truth: PathBuf,
    },
    /// Run each new batch as it lands in the data directory.
    Watch {
        #[arg(long, default_value = "data", env = "UPLOADWATCH_DATA_DIR")]
        data_dir: PathBuf,
    },
    /// Manage API keys of the remote services in the OS keychain.
    Key {
        #[command(subcommand)]
        action: KeyAction,
    },
}

#[derive(Subcommand)]
enum KeyAction {
    Set { service: String, api_key: String },
    Delete { service: String },
    Status { service: String },
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    uploadwatch_lib::init_tracing();

    let cli = Cli::parse();
    if let Err(e) = dispatch(cli).await {
        error!(error = %e, "uploadwatch failed");
        eprintln!("error: {}", e);
        std::process::exit(1);
    }
}

async fn dispatch(cli: Cli) -> Result<(), MonitorError> {
    match cli.command {
        Command::Run {
            date,
            data_dir,
            limit,
            json,
            no_save,
        } => {
            let date = parse_date(&date)?;
            let pool = if no_save {
                None
            } else {
                Some(open_db(cli.db.as_deref())?)
            };
            let report = run_once(&data_dir, cli.config.as_deref(), date, limit).await?;
            if let Some(pool) = &pool {
                history::save_global_report(pool, &report)?;
            }
            if json {
                println!("{}", serde_json::to_string_pretty(&report)?);
            } else {
                print!("{}", render_summary(&report));
            }
            Ok(())
        }
        Command::History { date, source } => {
            let pool = open_db(cli.db.as_deref())?;
            show_history(&pool, date, source)
        }
        Command::Evaluate { date, ground_truth } => {
            let date = parse_date(&date)?.format("%Y-%m-%d").to_string();
            let pool = open_db(cli.db.as_deref())?;
            let report = history::load_global_report(&pool, &date)?.ok_or_else(|| {
                MonitorError::MissingRunInput(format!("no archived run for {}", date))
            })?;
            let truth = load_ground_truth(&ground_truth)?;
            print!("{}", render_evaluation(&evaluate(&report, &truth)));
            Ok(())
        }
        Command::Watch { data_dir } => {
            let pool = open_db(cli.db.as_deref())?;
            watch(&data_dir, cli.config.as_deref(), &pool).await
        }
        Command::Key { action } => manage_key(action),
    }
}

fn parse_date(raw: &str) -> Result<NaiveDate, MonitorError> {
    NaiveDate::parse_from_str(raw.trim(), "%Y-%m-%d").map_err(|_| {
        MonitorError::MissingRunInput(format!("'{}' is not a YYYY-MM-DD date", raw))
    })
}

fn open_db(path: Option<&Path>) -> Result<DbPool, MonitorError> {
    let path = match path {
        Some(p) => p.to_path_buf(),
        None => db::default_db_path()?,
    };
    db::open(&path)
}

async fn run_once(
    data_dir: &Path,
    config_path: Option<&Path>,
    date: NaiveDate,
    limit: Option<usize>,
) -> Result<GlobalReport, MonitorError> {
    let config = load_config(config_path, data_dir)?;
    let (coordinator, mut source_ids) =
        uploadwatch_lib::prepare_run(data_dir, date, config, &RemoteEndpoints::from_env())?;
    if let Some(limit) = limit {
        source_ids.truncate(limit);
    }

    let cancel = coordinator.cancellation_token();
    let interrupt = tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            warn!("Interrupted, finishing with the sources already evaluated");
            cancel.cancel();
        }
    });
    let result = coordinator.run(date, &source_ids).await;
    interrupt.abort();
    result
}

fn show_history(
    pool: &DbPool,
    date: Option<String>,
    source: Option<String>,
) -> Result<(), MonitorError> {
    if let Some(source) = source {
        for entry in history::source_history(pool, &source)? {
            println!(
                "{}  {:<18} {} incident(s)",
                entry.date,
                entry.status.as_str(),
                entry.incident_count
            );
        }
        return Ok(());
    }
    if let Some(date) = date {
        let date = parse_date(&date)?.format("%Y-%m-%d").to_string();
        return match history::load_global_report(pool, &date)? {
            Some(report) => {
                print!("{}", render_summary(&report));
                Ok(())
            }
            None => Err(MonitorError::MissingRunInput(format!(
                "no archived run for {}",
                date
            ))),
        };
    }
    for date in history::list_run_dates(pool)? {
        println!("{}", date);
    }
    Ok(())
}

async fn watch(
    data_dir: &Path,
    config_path: Option<&Path>,
    pool: &DbPool,
) -> Result<(), MonitorError> {
    let (tx, rx) = std::sync::mpsc::channel();
    let _watcher = create_watcher(tx, data_dir)
        .map_err(|e| MonitorError::Config(format!("cannot watch {}: {}", data_dir.display(), e)))?;

    let (forward, mut events) = tokio::sync::mpsc::unbounded_channel();
    tokio::task::spawn_blocking(move || {
        while let Ok(event) = rx.recv() {
            if forward.send(event).is_err() {
                break;
            }
        }
    });

    info!(data_dir = %data_dir.display(), "Watching for new batches");
    let mut processed: HashSet<NaiveDate> = HashSet::new();
    loop {
        let event = tokio::select! {
            _ = tokio::signal::ctrl_c() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        match event {
            WatchEvent::BatchArrived { date } if processed.insert(date) => {
                // Let the writer finish the companion last-week file.
                tokio::time::sleep(std::time::Duration::from_secs(2)).await;
                match run_once(data_dir, config_path, date, None).await {
                    Ok(report) => {
                        archive(pool, &report);
                        print!("{}", render_summary(&report));
                    }
                    Err(e) => {
                        processed.remove(&date);
                        warn!(date = %date, error = %e, "Batch run failed");
                    }
                }
            }
            WatchEvent::BatchArrived { .. } => {}
            WatchEvent::ProfileChanged { source_id } => {
                info!(source_id = %source_id, "Profile updated, used from the next run");
            }
        }
    }
    info!("Watcher stopped");
    Ok(())
}

/// Archives a watched run. Failures are logged so the watcher keeps going.
fn archive(pool: &DbPool, report: &GlobalReport) -> bool {
    match history::save_global_report(pool, report) {
        Ok(()) => true,
        Err(e) => {
            warn!(date = %report.date, error = %e, "Could not archive report");
            false
        }
    }
}

fn manage_key(action: KeyAction) -> Result<(), MonitorError> {
    match action {
        KeyAction::Set { service, api_key } => {
            keychain::keychain_set(&service, &api_key)?;
            println!("stored {} key", service);
        }
        KeyAction::Delete { service } => {
            keychain::keychain_delete(&service)?;
            println!("deleted {} key", service);
        }
        KeyAction::Status { service } => {
            let state = if keychain::keychain_exists(&service)? {
                "set"
            } else {
                "not set"
            };
            println!("{}: {}", service, state);
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn report() -> GlobalReport {
        GlobalReport {
            date: "2025-09-08".into(),
            source_reports: vec![],
        }
    }

    #[test]
    fn archive_failure_is_reported_not_propagated() {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("history.sqlite")).unwrap();
        assert!(archive(&pool, &report()));

        pool.get()
            .unwrap()
            .execute_batch("DROP TABLE incidents; DROP TABLE source_reports; DROP TABLE runs;")
            .unwrap();
        assert!(!archive(&pool, &report()));
    }

    #[test]
    fn invalid_dates_are_missing_run_input() {
        assert!(parse_date("2025-09-08").is_ok());
        assert!(matches!(parse_date("08/09/2025"), Err(MonitorError::MissingRunInput(_))));
    }
}
