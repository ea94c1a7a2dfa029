//! Archive of produced global reports, one run per date.

use rusqlite::{params, OptionalExtension};
use tracing::debug;

use crate::db::DbPool;
use crate::error::MonitorError;
use crate::types::incident::Severity;
use crate::types::report::GlobalReport;

/// One source's status on one archived date.
#[derive(Debug, Clone, PartialEq)]
pub struct SourceHistoryEntry {
    pub date: String,
    pub status: Severity,
    pub incident_count: usize,
}

/// Stores `report`, replacing any earlier run for the same date.
pub fn save_global_report(pool: &DbPool, report: &GlobalReport) -> Result<(), MonitorError> {
    let mut conn = pool.get()?;
    let tx = conn.transaction()?;

    tx.execute("DELETE FROM incidents WHERE date = ?1", [&report.date])?;
    tx.execute("DELETE FROM source_reports WHERE date = ?1", [&report.date])?;
    tx.execute("DELETE FROM runs WHERE date = ?1", [&report.date])?;

    tx.execute(
        "INSERT INTO runs (date, report, source_count, urgent_count) VALUES (?1, ?2, ?3, ?4)",
        params![
            report.date,
            serde_json::to_string(report)?,
            report.source_reports.len() as i64,
            report.count_with_status(Severity::Urgent) as i64,
        ],
    )?;

    for (position, source) in report.source_reports.iter().enumerate() {
        tx.execute(
            "INSERT INTO source_reports (date, position, source_id, status, incident_count)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                report.date,
                position as i64,
                source.source_id,
                source.status.as_str(),
                source.incidents.len() as i64,
            ],
        )?;
        for incident in &source.incidents {
            tx.execute(
                "INSERT INTO incidents (date, source_id, incident_type, severity, file_name, description)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
                params![
                    report.date,
                    source.source_id,
                    incident.incident_type.label(),
                    incident.severity.as_str(),
                    incident.file_name,
                    incident.description,
                ],
            )?;
        }
    }

    tx.commit()?;
    debug!(date = %report.date, sources = report.source_reports.len(), "Saved run");
    Ok(())
}

pub fn load_global_report(pool: &DbPool, date: &str) -> Result<Option<GlobalReport>, MonitorError> {
    let conn = pool.get()?;
    let raw: Option<String> = conn
        .query_row("SELECT report FROM runs WHERE date = ?1", [date], |row| row.get(0))
        .optional()?;
    match raw {
        Some(json) => Ok(Some(serde_json::from_str(&json)?)),
        None => Ok(None),
    }
}

/// Archived run dates, newest first.
pub fn list_run_dates(pool: &DbPool) -> Result<Vec<String>, MonitorError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare("SELECT date FROM runs ORDER BY date DESC")?;
    let dates = stmt
        .query_map([], |row| row.get(0))?
        .collect::<Result<Vec<String>, _>>()?;
    Ok(dates)
}

/// Status of one source across archived runs, newest first.
pub fn source_history(pool: &DbPool, source_id: &str) -> Result<Vec<SourceHistoryEntry>, MonitorError> {
    let conn = pool.get()?;
    let mut stmt = conn.prepare(
        "SELECT date, status, incident_count FROM source_reports
         WHERE source_id = ?1 ORDER BY date DESC",
    )?;
    let rows = stmt.query_map([source_id], |row| {
        Ok((
            row.get::<_, String>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, i64>(2)?,
        ))
    })?;

    let mut entries = Vec::new();
    for row in rows {
        let (date, status, count) = row?;
        entries.push(SourceHistoryEntry {
            date,
            status: Severity::parse(&status).unwrap_or(Severity::AttentionRequired),
            incident_count: count.max(0) as usize,
        });
    }
    Ok(entries)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db;
    use crate::types::incident::{Incident, IncidentType};
    use crate::types::report::SourceReport;

    fn test_pool() -> (tempfile::TempDir, DbPool) {
        let dir = tempfile::tempdir().unwrap();
        let pool = db::open(&dir.path().join("history.sqlite")).unwrap();
        (dir, pool)
    }

    fn report(date: &str, status: Severity) -> GlobalReport {
        let incidents = match status {
            Severity::AllGood => vec![],
            _ => vec![Incident::attention(
                "s1",
                IncidentType::LateUpload,
                Some("a.csv"),
                "late".into(),
            )],
        };
        GlobalReport {
            date: date.to_string(),
            source_reports: vec![
                SourceReport {
                    source_id: "s1".into(),
                    incidents,
                    status,
                    recommendations: vec![],
                },
                SourceReport::analysis_failed("s2", "timeout"),
            ],
        }
    }

    #[test]
    fn save_and_load_roundtrip() {
        let (_dir, pool) = test_pool();
        let original = report("2025-09-08", Severity::AttentionRequired);
        save_global_report(&pool, &original).unwrap();
        let loaded = load_global_report(&pool, "2025-09-08").unwrap();
        assert_eq!(loaded, Some(original));
        assert_eq!(load_global_report(&pool, "2025-09-09").unwrap(), None);
    }

    #[test]
    fn saving_same_date_replaces_previous_run() {
        let (_dir, pool) = test_pool();
        save_global_report(&pool, &report("2025-09-08", Severity::AttentionRequired)).unwrap();
        save_global_report(&pool, &report("2025-09-08", Severity::AllGood)).unwrap();

        let loaded = load_global_report(&pool, "2025-09-08").unwrap().unwrap();
        assert_eq!(loaded.get("s1").unwrap().status, Severity::AllGood);
        assert_eq!(list_run_dates(&pool).unwrap(), vec!["2025-09-08".to_string()]);

        let conn = pool.get().unwrap();
        let incidents: i64 = conn
            .query_row("SELECT COUNT(*) FROM incidents", [], |row| row.get(0))
            .unwrap();
        assert_eq!(incidents, 0);
    }

    #[test]
    fn dates_are_listed_newest_first() {
        let (_dir, pool) = test_pool();
        for date in ["2025-09-08", "2025-09-10", "2025-09-09"] {
            save_global_report(&pool, &report(date, Severity::AllGood)).unwrap();
        }
        assert_eq!(
            list_run_dates(&pool).unwrap(),
            vec!["2025-09-10", "2025-09-09", "2025-09-08"]
        );
    }

    #[test]
    fn source_history_tracks_status_per_date() {
        let (_dir, pool) = test_pool();
        save_global_report(&pool, &report("2025-09-08", Severity::AttentionRequired)).unwrap();
        save_global_report(&pool, &report("2025-09-09", Severity::AllGood)).unwrap();
        let history = source_history(&pool, "s1").unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].date, "2025-09-09");
        assert_eq!(history[0].status, Severity::AllGood);
        assert_eq!(history[1].incident_count, 1);
        assert!(source_history(&pool, "nobody").unwrap().is_empty());
    }
}
