use std::collections::HashMap;

use chrono::{NaiveTime, Weekday};
use serde::{Deserialize, Deserializer, Serialize, Serializer};

pub const WEEK: [Weekday; 7] = [
    Weekday::Mon,
    Weekday::Tue,
    Weekday::Wed,
    Weekday::Thu,
    Weekday::Fri,
    Weekday::Sat,
    Weekday::Sun,
];

/// Expected time of day, written as `HH:MM`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScheduleTime(pub NaiveTime);

impl ScheduleTime {
    pub fn parse(raw: &str) -> Option<Self> {
        NaiveTime::parse_from_str(raw.trim(), "%H:%M")
            .ok()
            .map(ScheduleTime)
    }

    pub fn hm(hour: u32, minute: u32) -> Option<Self> {
        NaiveTime::from_hms_opt(hour, minute, 0).map(ScheduleTime)
    }

    pub fn time(&self) -> NaiveTime {
        self.0
    }
}

impl Serialize for ScheduleTime {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(&self.0.format("%H:%M"))
    }
}

impl<'de> Deserialize<'de> for ScheduleTime {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        ScheduleTime::parse(&raw)
            .ok_or_else(|| serde::de::Error::custom(format!("invalid HH:MM time '{}'", raw)))
    }
}

/// Row-count statistics for one weekday. Absent values carry no expectation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct VolumeStats {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mean: Option<f64>,
}

impl VolumeStats {
    pub fn new(min: f64, max: f64, mean: f64) -> Self {
        Self {
            min: Some(min),
            max: Some(max),
            mean: Some(mean),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.min.is_none() && self.max.is_none() && self.mean.is_none()
    }

    /// Zero rows are part of normal behaviour only when the recorded minimum is zero.
    pub fn allows_empty(&self) -> bool {
        self.min == Some(0.0)
    }

    /// Reference value for drop/spike comparisons: mean, else the min/max
    /// midpoint, else max.
    pub fn baseline(&self) -> Option<f64> {
        match (self.mean, self.min, self.max) {
            (Some(mean), _, _) => Some(mean),
            (None, Some(min), Some(max)) => Some((min + max) / 2.0),
            (None, _, Some(max)) => Some(max),
            _ => None,
        }
        .filter(|b| *b > 0.0)
    }
}

/// A source's expected behaviour, derived offline from its history.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceProfile {
    #[serde(default, alias = "resource_id", alias = "source_id")]
    pub source_id: String,
    #[serde(default, alias = "workspace_id")]
    pub workspace_id: String,
    #[serde(default, alias = "filename_pattern")]
    pub filename_pattern: String,
    #[serde(default, alias = "upload_schedule")]
    pub upload_schedule: HashMap<Weekday, ScheduleTime>,
    #[serde(default, alias = "volume_stats")]
    pub volume_stats: HashMap<Weekday, VolumeStats>,
}

impl SourceProfile {
    pub fn new(source_id: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            workspace_id: String::new(),
            filename_pattern: String::new(),
            upload_schedule: HashMap::new(),
            volume_stats: HashMap::new(),
        }
    }

    pub fn with_pattern(mut self, pattern: &str) -> Self {
        self.filename_pattern = pattern.to_string();
        self
    }

    pub fn with_schedule(mut self, day: Weekday, at: ScheduleTime) -> Self {
        self.upload_schedule.insert(day, at);
        self
    }

    pub fn with_stats(mut self, day: Weekday, stats: VolumeStats) -> Self {
        self.volume_stats.insert(day, stats);
        self
    }

    pub fn scheduled_at(&self, day: Weekday) -> Option<NaiveTime> {
        self.upload_schedule.get(&day).map(ScheduleTime::time)
    }

    pub fn stats_for(&self, day: Weekday) -> Option<&VolumeStats> {
        self.volume_stats.get(&day).filter(|s| !s.is_empty())
    }

    pub fn has_expectations(&self, day: Weekday) -> bool {
        self.scheduled_at(day).is_some() || self.stats_for(day).is_some()
    }

    /// Days since the closest scheduled weekday strictly before `day`.
    /// 1 when nothing is scheduled, 7 when `day` is the only scheduled weekday.
    pub fn days_since_previous_slot(&self, day: Weekday) -> i64 {
        if self.upload_schedule.is_empty() {
            return 1;
        }
        let mut cursor = day;
        for gap in 1..=7 {
            cursor = cursor.pred();
            if self.upload_schedule.contains_key(&cursor) {
                return gap;
            }
        }
        1
    }
}
