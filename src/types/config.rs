use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::MonitorError;

/// Upper bound for any configured delay, in seconds.
const MAX_DELAY_SECONDS: f64 = 86_400.0;

/// Detection and escalation constants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct Thresholds {
    pub late_upload_hours: f64,
    pub volume_drop_ratio: f64,
    pub volume_spike_ratio: f64,
    pub range_tolerance: f64,
    pub urgent_incident_limit: usize,
    pub total_incident_limit: usize,
    pub missing_category_limit: usize,
    pub previous_file_grace_days: i64,
}

impl Default for Thresholds {
    fn default() -> Self {
        Self {
            late_upload_hours: 4.0,
            volume_drop_ratio: 0.5,
            volume_spike_ratio: 1.0,
            range_tolerance: 0.1,
            urgent_incident_limit: 1,
            total_incident_limit: 3,
            missing_category_limit: 1,
            previous_file_grace_days: 0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct MonitorConfig {
    pub max_retries: u32,
    pub base_delay_seconds: f64,
    pub inter_source_delay_seconds: f64,
    pub concurrency_limit: usize,
    pub thresholds: Thresholds,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay_seconds: 10.0,
            inter_source_delay_seconds: 0.0,
            concurrency_limit: 4,
            thresholds: Thresholds::default(),
        }
    }
}

fn seconds(value: f64) -> Duration {
    Duration::try_from_secs_f64(value.clamp(0.0, MAX_DELAY_SECONDS)).unwrap_or(Duration::ZERO)
}

fn check(name: &str, value: f64, max: f64) -> Result<(), MonitorError> {
    if value.is_finite() && (0.0..=max).contains(&value) {
        Ok(())
    } else {
        Err(MonitorError::Config(format!(
            "{} must be between 0 and {}, got {}",
            name, max, value
        )))
    }
}

impl MonitorConfig {
    pub fn base_delay(&self) -> Duration {
        seconds(self.base_delay_seconds)
    }

    pub fn inter_source_delay(&self) -> Duration {
        seconds(self.inter_source_delay_seconds)
    }

    /// Rejects delays and thresholds that are negative, non-finite or out of range.
    pub fn validate(&self) -> Result<(), MonitorError> {
        let t = &self.thresholds;
        check("baseDelaySeconds", self.base_delay_seconds, MAX_DELAY_SECONDS)?;
        check("interSourceDelaySeconds", self.inter_source_delay_seconds, MAX_DELAY_SECONDS)?;
        check("thresholds.lateUploadHours", t.late_upload_hours, 24.0 * 7.0)?;
        check("thresholds.volumeDropRatio", t.volume_drop_ratio, 1.0)?;
        check("thresholds.volumeSpikeRatio", t.volume_spike_ratio, 1_000.0)?;
        check("thresholds.rangeTolerance", t.range_tolerance, 1.0)?;
        if !(0..=366).contains(&t.previous_file_grace_days) {
            return Err(MonitorError::Config(format!(
                "thresholds.previousFileGraceDays must be between 0 and 366, got {}",
                t.previous_file_grace_days
            )));
        }
        Ok(())
    }

    pub fn concurrency(&self) -> usize {
        self.concurrency_limit.max(1)
    }
}
