use std::collections::HashSet;

use crate::db::DbPool;
use crate::error::MonitorError;

pub struct Migration {
    pub name: &'static str,
    pub sql: &'static str,
}

pub fn all_migrations() -> Vec<Migration> {
    vec![
        Migration {
            name: "001_initial_schema",
            sql: "-- runs table created by init_db
                  SELECT 1;",
        },
        Migration {
            name: "002_source_reports",
            sql: "CREATE TABLE IF NOT EXISTS source_reports (
                      date TEXT NOT NULL REFERENCES runs(date) ON DELETE CASCADE,
                      position INTEGER NOT NULL,
                      source_id TEXT NOT NULL,
                      status TEXT NOT NULL CHECK(status IN ('ALL_GOOD','ATTENTION_REQUIRED','URGENT')),
                      incident_count INTEGER NOT NULL DEFAULT 0,
                      PRIMARY KEY (date, source_id)
                  );
                  CREATE INDEX IF NOT EXISTS idx_source_reports_source ON source_reports(source_id);
                  CREATE INDEX IF NOT EXISTS idx_source_reports_status ON source_reports(status);",
        },
        Migration {
            name: "003_incidents",
            sql: "CREATE TABLE IF NOT EXISTS incidents (
                      id INTEGER PRIMARY KEY AUTOINCREMENT,
                      date TEXT NOT NULL REFERENCES runs(date) ON DELETE CASCADE,
                      source_id TEXT NOT NULL,
                      incident_type TEXT NOT NULL,
                      severity TEXT NOT NULL,
                      file_name TEXT,
                      description TEXT NOT NULL
                  );
                  CREATE INDEX IF NOT EXISTS idx_incidents_date ON incidents(date);
                  CREATE INDEX IF NOT EXISTS idx_incidents_type ON incidents(incident_type);",
        },
    ]
}

pub fn run_pending(pool: &DbPool) -> Result<Vec<String>, MonitorError> {
    let conn = pool.get()?;
    let applied_set: HashSet<String> = conn
        .prepare("SELECT name FROM migrations ORDER BY id")?
        .query_map([], |row| row.get::<_, String>(0))?
        .filter_map(|r| r.ok())
        .collect();

    let mut newly_applied = Vec::new();

    for migration in all_migrations() {
        if !applied_set.contains(migration.name) {
            conn.execute_batch(migration.sql)?;
            conn.execute("INSERT INTO migrations (name) VALUES (?1)", [migration.name])?;
            newly_applied.push(migration.name.to_string());
        }
    }

    Ok(newly_applied)
}

pub fn applied(pool: &DbPool) -> Result<Vec<String>, MonitorError> {
    let conn = pool.get()?;
    let names: Vec<String> = conn
        .prepare("SELECT name FROM migrations ORDER BY id")?
        .query_map([], |row| row.get(0))?
        .filter_map(|r| r.ok())
        .collect();
    Ok(names)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;

    fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::create_pool(&dir.path().join("test.sqlite")).unwrap();
        db::init_db(&pool).unwrap();
        (dir, pool)
    }

    #[test]
    fn run_pending_on_fresh_db_applies_all() {
        let (_dir, pool) = test_pool();
        let applied = run_pending(&pool).unwrap();
        assert_eq!(applied.len(), all_migrations().len());
    }

    #[test]
    fn run_pending_is_idempotent() {
        let (_dir, pool) = test_pool();
        let first = run_pending(&pool).unwrap();
        let second = run_pending(&pool).unwrap();
        assert!(!first.is_empty());
        assert!(second.is_empty());
    }

    #[test]
    fn applied_returns_names_in_order() {
        let (_dir, pool) = test_pool();
        run_pending(&pool).unwrap();
        let names = applied(&pool).unwrap();
        let expected: Vec<&str> = all_migrations().iter().map(|m| m.name).collect();
        assert_eq!(names, expected);
    }

    #[test]
    fn report_tables_have_expected_columns() {
        let (_dir, pool) = test_pool();
        run_pending(&pool).unwrap();
        let conn = pool.get().unwrap();
        conn.execute_batch(
            "SELECT date, position, source_id, status, incident_count FROM source_reports LIMIT 0;
             SELECT date, source_id, incident_type, severity, file_name, description FROM incidents LIMIT 0;",
        )
        .unwrap();
    }
}
