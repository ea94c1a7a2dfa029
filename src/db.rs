use std::path::{Path, PathBuf};

use r2d2::Pool;
use r2d2_sqlite::SqliteConnectionManager;

use crate::error::MonitorError;
use crate::migrations;

pub type DbPool = Pool<SqliteConnectionManager>;

pub fn uploadwatch_data_dir() -> Result<PathBuf, MonitorError> {
    dirs::home_dir()
        .map(|home| home.join(".uploadwatch"))
        .ok_or_else(|| MonitorError::Config("could not determine home directory".to_string()))
}

pub fn default_db_path() -> Result<PathBuf, MonitorError> {
    Ok(uploadwatch_data_dir()?.join("state").join("history.sqlite"))
}

pub fn create_pool(db_path: &Path) -> Result<DbPool, MonitorError> {
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let manager = SqliteConnectionManager::file(db_path)
        .with_init(|conn| conn.execute_batch("PRAGMA foreign_keys=ON;"));
    let pool = Pool::builder().max_size(4).build(manager)?;

    let conn = pool.get()?;
    conn.execute_batch("PRAGMA journal_mode=WAL;")?;

    Ok(pool)
}

pub fn init_db(pool: &DbPool) -> Result<(), MonitorError> {
    let conn = pool.get()?;

    conn.execute_batch(
        "CREATE TABLE IF NOT EXISTS migrations (
            id INTEGER PRIMARY KEY,
            name TEXT NOT NULL UNIQUE,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS runs (
            date TEXT PRIMARY KEY,
            report TEXT NOT NULL,
            source_count INTEGER NOT NULL DEFAULT 0,
            urgent_count INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL DEFAULT (datetime('now'))
        );",
    )?;

    Ok(())
}

/// Pool with the full schema applied.
pub fn open(db_path: &Path) -> Result<DbPool, MonitorError> {
    let pool = create_pool(db_path)?;
    init_db(&pool)?;
    migrations::run_pending(&pool)?;
    Ok(pool)
}
