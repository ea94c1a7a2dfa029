use chrono::{DateTime, FixedOffset, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::MonitorError;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum UploadStatus {
    Succeeded,
    Stopped,
    Failed,
    Other(String),
}

impl UploadStatus {
    /// `STOPPED` and `FAILED` uploads never delivered usable data.
    pub fn is_failure(&self) -> bool {
        matches!(self, UploadStatus::Stopped | UploadStatus::Failed)
    }
}

impl From<String> for UploadStatus {
    fn from(value: String) -> Self {
        match value.trim().to_ascii_uppercase().as_str() {
            "SUCCEEDED" => UploadStatus::Succeeded,
            "STOPPED" => UploadStatus::Stopped,
            "FAILED" => UploadStatus::Failed,
            _ => UploadStatus::Other(value),
        }
    }
}

impl From<UploadStatus> for String {
    fn from(value: UploadStatus) -> Self {
        match value {
            UploadStatus::Succeeded => "SUCCEEDED".to_string(),
            UploadStatus::Stopped => "STOPPED".to_string(),
            UploadStatus::Failed => "FAILED".to_string(),
            UploadStatus::Other(other) => other,
        }
    }
}

/// One file observed for a source on the run date.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UploadRecord {
    pub filename: String,
    #[serde(alias = "rows")]
    pub row_count: u64,
    pub status: UploadStatus,
    #[serde(alias = "is_duplicated")]
    pub is_duplicated: bool,
    #[serde(default, alias = "file_size")]
    pub file_size_bytes: Option<f64>,
    #[serde(alias = "uploaded_at", deserialize_with = "deserialize_instant")]
    pub uploaded_at: DateTime<FixedOffset>,
    #[serde(default, alias = "status_message")]
    pub status_message: Option<String>,
}

impl UploadRecord {
    pub fn new(filename: &str, row_count: u64, uploaded_at: DateTime<FixedOffset>) -> Self {
        Self {
            filename: filename.to_string(),
            row_count,
            status: UploadStatus::Succeeded,
            is_duplicated: false,
            file_size_bytes: None,
            uploaded_at,
            status_message: None,
        }
    }

    pub fn with_status(mut self, status: UploadStatus) -> Self {
        self.status = status;
        self
    }

    pub fn duplicated(mut self) -> Self {
        self.is_duplicated = true;
        self
    }

    pub fn uploaded_at_utc(&self) -> DateTime<Utc> {
        self.uploaded_at.with_timezone(&Utc)
    }
}

/// Accepts RFC 3339 timestamps. Offset-less timestamps are read as UTC.
fn deserialize_instant<'de, D>(deserializer: D) -> Result<DateTime<FixedOffset>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    parse_instant(&raw).map_err(serde::de::Error::custom)
}

pub fn parse_instant(raw: &str) -> Result<DateTime<FixedOffset>, String> {
    let raw = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Ok(dt);
    }
    for fmt in ["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, fmt) {
            return Ok(naive.and_utc().fixed_offset());
        }
    }
    Err(format!("invalid timestamp '{}'", raw))
}

/// Validate a single raw record.
pub fn parse_record(
    source_id: &str,
    index: usize,
    value: &serde_json::Value,
) -> Result<UploadRecord, MonitorError> {
    let malformed = |reason: String| MonitorError::MalformedRecord {
        source_id: source_id.to_string(),
        index,
        reason,
    };
    let record: UploadRecord =
        serde_json::from_value(value.clone()).map_err(|e| malformed(e.to_string()))?;
    if record.filename.trim().is_empty() {
        return Err(malformed("empty filename".to_string()));
    }
    Ok(record)
}

/// Parse a source's raw record list, logging and dropping malformed entries.
pub fn parse_records(source_id: &str, values: &[serde_json::Value]) -> Vec<UploadRecord> {
    values
        .iter()
        .enumerate()
        .filter_map(|(index, value)| match parse_record(source_id, index, value) {
            Ok(record) => Some(record),
            Err(e) => {
                warn!(source_id, error = %e, "Excluding malformed upload record");
                None
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn status_parses_known_and_other_values() {
        assert_eq!(UploadStatus::from("SUCCEEDED".to_string()), UploadStatus::Succeeded);
        assert_eq!(UploadStatus::from("failed".to_string()), UploadStatus::Failed);
        assert_eq!(UploadStatus::from("STOPPED".to_string()), UploadStatus::Stopped);
        assert_eq!(
            UploadStatus::from("PROCESSING".to_string()),
            UploadStatus::Other("PROCESSING".to_string())
        );
        assert!(UploadStatus::Failed.is_failure());
        assert!(!UploadStatus::Other("QUEUED".into()).is_failure());
    }

    #[test]
    fn record_accepts_snake_case_fields() {
        let value = json!({
            "filename": "sales_20250910.csv",
            "rows": 1200,
            "status": "SUCCEEDED",
            "is_duplicated": false,
            "file_size": 2048.5,
            "uploaded_at": "2025-09-10T08:15:00+00:00",
            "status_message": null
        });
        let record = parse_record("s1", 0, &value).unwrap();
        assert_eq!(record.row_count, 1200);
        assert_eq!(record.file_size_bytes, Some(2048.5));
        assert_eq!(record.status, UploadStatus::Succeeded);
    }

    #[test]
    fn naive_timestamp_is_read_as_utc() {
        let dt = parse_instant("2025-09-10T08:15:00").unwrap();
        assert_eq!(dt.offset().local_minus_utc(), 0);
        assert!(parse_instant("yesterday").is_err());
    }

    #[test]
    fn negative_rows_are_malformed() {
        let value = json!({
            "filename": "a.csv",
            "rows": -3,
            "status": "SUCCEEDED",
            "is_duplicated": false,
            "uploaded_at": "2025-09-10T08:15:00Z"
        });
        let err = parse_record("s1", 4, &value).unwrap_err();
        match err {
            MonitorError::MalformedRecord { index, .. } => assert_eq!(index, 4),
            other => panic!("Expected MalformedRecord, got {}", other),
        }
    }

    #[test]
    fn parse_records_skips_bad_entries() {
        let values = vec![
            json!({
                "filename": "a.csv",
                "rows": 10,
                "status": "SUCCEEDED",
                "is_duplicated": false,
                "uploaded_at": "2025-09-10T08:15:00Z"
            }),
            json!({ "filename": "b.csv", "rows": 10 }),
            json!({
                "filename": "  ",
                "rows": 1,
                "status": "SUCCEEDED",
                "is_duplicated": false,
                "uploaded_at": "2025-09-10T08:15:00Z"
            }),
        ];
        let records = parse_records("s1", &values);
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].filename, "a.csv");
    }
}
