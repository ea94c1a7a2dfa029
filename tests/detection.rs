use chrono::{NaiveDate, TimeZone, Utc, Weekday};

use uploadwatch_lib::detectors::DetectionContext;
use uploadwatch_lib::pattern::FilenamePattern;
use uploadwatch_lib::report::assess;
use uploadwatch_lib::severity::base_severity;
use uploadwatch_lib::types::config::Thresholds;
use uploadwatch_lib::types::incident::{Incident, IncidentType, Severity};
use uploadwatch_lib::types::profile::{ScheduleTime, SourceProfile, VolumeStats};
use uploadwatch_lib::types::report::SourceReport;
use uploadwatch_lib::types::upload::UploadRecord;

fn monday() -> NaiveDate {
    NaiveDate::from_ymd_opt(2025, 9, 8).unwrap()
}

fn upload(filename: &str, rows: u64, hour: u32) -> UploadRecord {
    let at = Utc
        .from_utc_datetime(&monday().and_hms_opt(hour, 0, 0).unwrap())
        .fixed_offset();
    UploadRecord::new(filename, rows, at)
}

fn monday_profile(stats: VolumeStats) -> SourceProfile {
    SourceProfile::new("220504")
        .with_pattern("sales_YYYYMMDD.csv")
        .with_schedule(Weekday::Mon, ScheduleTime::hm(9, 0).unwrap())
        .with_stats(Weekday::Mon, stats)
}

fn evaluate(profile: &SourceProfile, today: &[UploadRecord]) -> SourceReport {
    let pattern = FilenamePattern::compile(&profile.filename_pattern);
    let thresholds = Thresholds::default();
    assess(&DetectionContext {
        profile,
        pattern: &pattern,
        today,
        last_week: &[],
        run_date: monday(),
        thresholds: &thresholds,
    })
}

fn types(report: &SourceReport) -> Vec<IncidentType> {
    report.incidents.iter().map(|i| i.incident_type).collect()
}

#[test]
fn nothing_received_on_a_scheduled_day_is_urgent() {
    let report = evaluate(&monday_profile(VolumeStats::new(100.0, 500.0, 300.0)), &[]);
    assert_eq!(report.status, Severity::Urgent);
    assert_eq!(types(&report), vec![IncidentType::MissingFile]);
    assert!(!report.recommendations.is_empty());
}

#[test]
fn expected_delivery_is_all_good() {
    let report = evaluate(
        &monday_profile(VolumeStats::new(100.0, 500.0, 300.0)),
        &[upload("sales_20250908.csv", 320, 9)],
    );
    assert_eq!(report.status, Severity::AllGood);
    assert!(report.incidents.is_empty());
    assert!(report.recommendations.is_empty());
}

#[test]
fn severe_volume_drop_is_one_urgent_variation() {
    let report = evaluate(
        &monday_profile(VolumeStats::new(100.0, 500.0, 300.0)),
        &[upload("sales_20250908.csv", 40, 9)],
    );
    assert_eq!(types(&report), vec![IncidentType::VolumeVariation]);
    assert_eq!(report.incidents[0].severity, Severity::Urgent);
    assert_eq!(report.status, Severity::Urgent);
}

#[test]
fn repeated_filename_is_one_duplicate_needing_attention() {
    let report = evaluate(
        &monday_profile(VolumeStats::new(100.0, 500.0, 300.0)),
        &[
            upload("sales_20250908.csv", 300, 9),
            upload("sales_20250908.csv", 300, 9),
        ],
    );
    assert_eq!(types(&report), vec![IncidentType::DuplicatedFile]);
    assert_eq!(report.status, Severity::AttentionRequired);
}

#[test]
fn empty_file_depends_on_recorded_minimum() {
    let today = [upload("sales_20250908.csv", 0, 9)];

    let zero_allowed = evaluate(&monday_profile(VolumeStats::new(0.0, 500.0, 200.0)), &today);
    assert!(!types(&zero_allowed).contains(&IncidentType::UnexpectedEmpty));

    let zero_unusual = evaluate(&monday_profile(VolumeStats::new(5.0, 500.0, 200.0)), &today);
    assert_eq!(types(&zero_unusual), vec![IncidentType::UnexpectedEmpty]);
    assert_eq!(zero_unusual.status, Severity::AttentionRequired);
}

#[test]
fn upload_five_hours_late_is_flagged_once() {
    let report = evaluate(
        &monday_profile(VolumeStats::new(100.0, 500.0, 300.0)),
        &[upload("sales_20250908.csv", 300, 14)],
    );
    assert_eq!(types(&report), vec![IncidentType::LateUpload]);
    assert_eq!(report.status, Severity::AttentionRequired);
}

#[test]
fn assessment_is_repeatable() {
    let profile = monday_profile(VolumeStats::new(100.0, 500.0, 300.0));
    let today = [
        upload("sales_20250908.csv", 40, 15),
        upload("sales_20250901.csv", 0, 9),
    ];
    assert_eq!(evaluate(&profile, &today), evaluate(&profile, &today));
}

#[test]
fn base_rule_counts_urgent_and_total_incidents() {
    let t = Thresholds::default();
    let attention = |n: usize| -> Vec<Incident> {
        (0..n)
            .map(|i| Incident::attention("s", IncidentType::LateUpload, None, format!("late #{}", i)))
            .collect()
    };
    let urgent = || Incident::urgent("s", IncidentType::MissingFile, None, "gone".to_string());

    assert_eq!(base_severity(&[], &t), Severity::AllGood);
    assert_eq!(base_severity(&attention(3), &t), Severity::AttentionRequired);
    assert_eq!(base_severity(&attention(4), &t), Severity::Urgent);
    assert_eq!(base_severity(&[urgent()], &t), Severity::AttentionRequired);
    assert_eq!(base_severity(&[urgent(), urgent()], &t), Severity::Urgent);
}
