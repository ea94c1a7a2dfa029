//! Turns a source's behavioural summary into a [`SourceProfile`].
//!
//! Summaries are either a JSON profile or the markdown report produced by the
//! offline baseline job. From the markdown we pick up:
//! - `Workspace ID**: <digits>`
//! - ``Common structure: `<template>` ``
//! - schedule rows `| Mon | 15:00 | ... |`
//! - volume rows `| Mon | • Min: 1<br>• Max: 10,762<br>• Mean: 5,953.54 | ... |`

use std::sync::OnceLock;

use chrono::Weekday;
use regex::Regex;
use tracing::debug;

use crate::error::MonitorError;
use crate::types::profile::{ScheduleTime, SourceProfile, VolumeStats, WEEK};

pub fn parse_profile(source_id: &str, raw: Option<&str>) -> Result<SourceProfile, MonitorError> {
    let raw = match raw.map(str::trim) {
        Some(text) if !text.is_empty() => text,
        _ => {
            return Err(MonitorError::ProfileNotFound {
                source_id: source_id.to_string(),
            })
        }
    };

    if raw.starts_with('{') {
        let mut profile: SourceProfile =
            serde_json::from_str(raw).map_err(|e| MonitorError::ParseFailure {
                source_id: source_id.to_string(),
                message: format!("invalid JSON profile: {}", e),
            })?;
        profile.source_id = source_id.to_string();
        return Ok(profile);
    }

    Ok(parse_markdown(source_id, raw))
}

fn parse_markdown(source_id: &str, content: &str) -> SourceProfile {
    let mut profile = SourceProfile::new(source_id);

    profile.workspace_id = capture(r"Workspace ID\*\*:\s*(\d+)", content)
        .unwrap_or_else(|| "Unknown".to_string());
    profile.filename_pattern =
        capture(r"Common structure:\s*`([^`]+)`", content).unwrap_or_default();

    for day in WEEK {
        let cells: Vec<&str> = day_rows(content, day).collect();

        if let Some(at) = cells.iter().find_map(|cell| ScheduleTime::parse(cell)) {
            profile.upload_schedule.insert(day, at);
        }

        if let Some(stats) = cells.iter().map(|cell| volume_stats(cell)).find(|s| !s.is_empty()) {
            profile.volume_stats.insert(day, stats);
        }
    }

    debug!(
        source_id,
        scheduled_days = profile.upload_schedule.len(),
        stats_days = profile.volume_stats.len(),
        "Parsed profile description"
    );
    profile
}

fn capture(pattern: &str, content: &str) -> Option<String> {
    Regex::new(pattern)
        .ok()?
        .captures(content)
        .map(|caps| caps[1].trim().to_string())
}

/// First cell after the weekday label, for every table row labelled `day`.
fn day_rows<'a>(content: &'a str, day: Weekday) -> impl Iterator<Item = &'a str> + 'a {
    let label = day.to_string();
    content.lines().filter_map(move |line| {
        let mut cells = line.trim().strip_prefix('|')?.split('|');
        if cells.next()?.trim() != label {
            return None;
        }
        cells.next().map(str::trim)
    })
}

fn volume_stats(cell: &str) -> VolumeStats {
    VolumeStats {
        min: stat_value(cell, "Min"),
        max: stat_value(cell, "Max"),
        mean: stat_value(cell, "Mean"),
    }
}

fn stat_value(cell: &str, name: &str) -> Option<f64> {
    static STAT: OnceLock<Option<Regex>> = OnceLock::new();
    let re = STAT
        .get_or_init(|| Regex::new(r"(Min|Max|Mean|Median):\s*([\d,.]+)").ok())
        .as_ref()?;
    re.captures_iter(cell)
        .find(|caps| &caps[1] == name)
        .and_then(|caps| caps[2].replace(',', "").trim_end_matches('.').parse().ok())
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = r#"
# Data source 220504

- **Workspace ID**: 8812
- **Files**: Common structure: `sales_YYYYMMDD.csv`

## 3. Upload Schedule Patterns by Day

| Day | Upload Hour Slot Mean (UTC) | Files |
|-----|-----|-----|
| Mon | 15:00 | 3 |
| Tue | 09:30 | 3 |
| Sat | n/a | 0 |

## **4. Day-of-Week Summary**

| Day | Row Statistics | Notes |
|-----|-----|-----|
| Mon | • Min: 1<br>• Max: 10,762<br>• Mean: 5,953.54<br>• Median: 5,477.00 | ok |
| Tue | • Min: 0<br>• Mean: 120 | ok |
| Sun | no data | |
"#;

    #[test]
    fn missing_description_is_not_found() {
        assert!(matches!(
            parse_profile("s1", None),
            Err(MonitorError::ProfileNotFound { .. })
        ));
        assert!(matches!(
            parse_profile("s1", Some("   \n")),
            Err(MonitorError::ProfileNotFound { .. })
        ));
    }

    #[test]
    fn markdown_metadata_is_extracted() {
        let profile = parse_profile("220504", Some(SAMPLE)).unwrap();
        assert_eq!(profile.source_id, "220504");
        assert_eq!(profile.workspace_id, "8812");
        assert_eq!(profile.filename_pattern, "sales_YYYYMMDD.csv");
    }

    #[test]
    fn schedule_rows_are_extracted_and_gaps_left_empty() {
        let profile = parse_profile("220504", Some(SAMPLE)).unwrap();
        assert_eq!(
            profile.upload_schedule.get(&Weekday::Mon),
            ScheduleTime::hm(15, 0).as_ref()
        );
        assert_eq!(
            profile.upload_schedule.get(&Weekday::Tue),
            ScheduleTime::hm(9, 30).as_ref()
        );
        assert!(profile.upload_schedule.get(&Weekday::Sat).is_none());
        assert!(profile.upload_schedule.get(&Weekday::Wed).is_none());
    }

    #[test]
    fn volume_stats_strip_thousands_and_omit_absent_values() {
        let profile = parse_profile("220504", Some(SAMPLE)).unwrap();
        let mon = profile.volume_stats.get(&Weekday::Mon).unwrap();
        assert_eq!(mon.min, Some(1.0));
        assert_eq!(mon.max, Some(10762.0));
        assert_eq!(mon.mean, Some(5953.54));

        let tue = profile.volume_stats.get(&Weekday::Tue).unwrap();
        assert_eq!(tue.min, Some(0.0));
        assert_eq!(tue.max, None);
        assert!(tue.allows_empty());

        assert!(profile.volume_stats.get(&Weekday::Sun).is_none());
    }

    #[test]
    fn unknown_workspace_defaults() {
        let profile = parse_profile("s2", Some("| Wed | 07:45 |")).unwrap();
        assert_eq!(profile.workspace_id, "Unknown");
        assert_eq!(profile.filename_pattern, "");
        assert_eq!(profile.upload_schedule.len(), 1);
    }

    #[test]
    fn json_profiles_are_accepted() {
        let raw = r#"{"sourceId": "other", "uploadSchedule": {"Fri": "06:00"}}"#;
        let profile = parse_profile("s3", Some(raw)).unwrap();
        assert_eq!(profile.source_id, "s3");
        assert!(profile.scheduled_at(Weekday::Fri).is_some());

        let err = parse_profile("s3", Some("{ not json")).unwrap_err();
        assert!(matches!(err, MonitorError::ParseFailure { .. }));
    }
}
