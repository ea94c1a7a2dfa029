//! File-backed collaborators over the daily drop layout:
//!
//! ```text
//! <data>/Files/<YYYY-MM-DD>_20_00_UTC/files.json
//! <data>/Files/<YYYY-MM-DD>_20_00_UTC/files_last_weekday.json
//! <data>/Files/datasource_cvs/<source_id>_native.md
//! ```

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::NaiveDate;
use serde_json::Value;
use tracing::{debug, warn};

use crate::collaborators::{ProfileResolver, UploadRecordSource};
use crate::error::MonitorError;
use crate::profile::parse_profile;
use crate::types::profile::SourceProfile;
use crate::types::upload::{parse_records, UploadRecord};

pub const TODAY_FILE: &str = "files.json";
pub const LAST_WEEK_FILE: &str = "files_last_weekday.json";
const BATCH_SUFFIX: &str = "_20_00_UTC";
const PROFILE_SUFFIX: &str = "_native.md";

pub fn batch_dir(data_dir: &Path, date: NaiveDate) -> PathBuf {
    data_dir
        .join("Files")
        .join(format!("{}{}", date.format("%Y-%m-%d"), BATCH_SUFFIX))
}

pub fn profiles_dir(data_dir: &Path) -> PathBuf {
    data_dir.join("Files").join("datasource_cvs")
}

/// Run date encoded in a batch directory name.
pub fn batch_date(dir_name: &str) -> Option<NaiveDate> {
    let date = dir_name.strip_suffix(BATCH_SUFFIX)?;
    NaiveDate::parse_from_str(date, "%Y-%m-%d").ok()
}

/// Source id encoded in a profile file name.
pub fn profile_source_id(file_name: &str) -> Option<&str> {
    file_name
        .strip_suffix(PROFILE_SUFFIX)
        .filter(|id| !id.is_empty())
}

pub struct MarkdownProfileStore {
    dir: PathBuf,
}

impl MarkdownProfileStore {
    pub fn new(data_dir: &Path) -> Self {
        Self {
            dir: profiles_dir(data_dir),
        }
    }

    pub fn profile_path(&self, source_id: &str) -> PathBuf {
        self.dir.join(format!("{}{}", source_id, PROFILE_SUFFIX))
    }
}

#[async_trait]
impl ProfileResolver for MarkdownProfileStore {
    async fn resolve_profile(&self, source_id: &str) -> Result<SourceProfile, MonitorError> {
        let path = self.profile_path(source_id);
        let raw = match tokio::fs::read_to_string(&path).await {
            Ok(raw) => Some(raw),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => return Err(e.into()),
        };
        parse_profile(source_id, raw.as_deref())
    }
}

/// Today's and last week's records for one run date, loaded up front.
#[derive(Debug, Clone, Default)]
pub struct JsonUploadStore {
    today: HashMap<String, Vec<UploadRecord>>,
    last_week: HashMap<String, Vec<UploadRecord>>,
}

impl JsonUploadStore {
    /// Fails with `MissingRunInput` when the date has no batch.
    pub fn open(data_dir: &Path, date: NaiveDate) -> Result<Self, MonitorError> {
        let dir = batch_dir(data_dir, date);
        let today_path = dir.join(TODAY_FILE);
        if !today_path.exists() {
            return Err(MonitorError::MissingRunInput(format!(
                "no upload batch for {} at {}",
                date,
                today_path.display()
            )));
        }
        let today = read_json(&today_path)?;

        let last_week_path = dir.join(LAST_WEEK_FILE);
        let last_week = if last_week_path.exists() {
            Some(read_json(&last_week_path)?)
        } else {
            warn!(date = %date, "No last-week batch, volume comparison will use profile stats only");
            None
        };

        Self::from_values(&today, last_week.as_ref())
    }

    pub fn from_values(today: &Value, last_week: Option<&Value>) -> Result<Self, MonitorError> {
        let store = Self {
            today: index_batch(today, TODAY_FILE)?,
            last_week: match last_week {
                Some(value) => index_batch(value, LAST_WEEK_FILE)?,
                None => HashMap::new(),
            },
        };
        debug!(
            sources = store.today.len(),
            last_week_sources = store.last_week.len(),
            "Loaded upload batch"
        );
        Ok(store)
    }

    /// Sources present in today's batch, sorted.
    pub fn source_ids(&self) -> Vec<String> {
        let mut ids: Vec<String> = self.today.keys().cloned().collect();
        ids.sort();
        ids
    }
}

fn read_json(path: &Path) -> Result<Value, MonitorError> {
    let raw = std::fs::read_to_string(path)?;
    Ok(serde_json::from_str(&raw)?)
}

fn index_batch(value: &Value, label: &str) -> Result<HashMap<String, Vec<UploadRecord>>, MonitorError> {
    let Some(object) = value.as_object() else {
        return Err(MonitorError::MissingRunInput(format!(
            "{} must be an object keyed by source id",
            label
        )));
    };
    Ok(object
        .iter()
        .map(|(source_id, entries)| {
            let records = match entries.as_array() {
                Some(values) => parse_records(source_id, values),
                None => {
                    warn!(source_id = %source_id, file = label, "Expected a list of upload records");
                    Vec::new()
                }
            };
            (source_id.clone(), records)
        })
        .collect())
}

#[async_trait]
impl UploadRecordSource for JsonUploadStore {
    async fn today_records(&self, source_id: &str) -> Result<Vec<UploadRecord>, MonitorError> {
        Ok(self.today.get(source_id).cloned().unwrap_or_default())
    }

    async fn last_week_records(&self, source_id: &str) -> Result<Vec<UploadRecord>, MonitorError> {
        Ok(self.last_week.get(source_id).cloned().unwrap_or_default())
    }
}
