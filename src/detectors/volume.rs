//! Row-count checks against the weekday statistics and against last week's
//! delivery for the same weekday.

use super::{DetectionContext, DetectionOutcome, Escalation};
use crate::types::config::Thresholds;
use crate::types::incident::{Incident, IncidentType};
use crate::types::profile::VolumeStats;
use crate::types::upload::UploadRecord;

pub fn detect(ctx: &DetectionContext) -> DetectionOutcome {
    let mut out = DetectionOutcome::default();
    // Zero records today belong to the missing-file detector.
    if !ctx.profile.has_expectations(ctx.weekday()) || ctx.today.is_empty() {
        return out;
    }

    if let Some(stats) = ctx.profile.stats_for(ctx.weekday()) {
        for record in delivered(ctx.today).filter(|r| r.row_count > 0) {
            check_record(ctx, stats, record, &mut out);
        }
    }

    if !ctx.last_week.is_empty() {
        check_against_last_week(ctx, &mut out);
    }
    out
}

fn delivered(records: &[UploadRecord]) -> impl Iterator<Item = &UploadRecord> {
    records.iter().filter(|r| !r.status.is_failure())
}

/// Fractional drop of `observed` below `baseline`; negative for a rise.
fn drop_ratio(baseline: f64, observed: f64) -> Option<f64> {
    (baseline > 0.0).then(|| (baseline - observed) / baseline)
}

fn check_record(
    ctx: &DetectionContext,
    stats: &VolumeStats,
    record: &UploadRecord,
    out: &mut DetectionOutcome,
) {
    let t: &Thresholds = ctx.thresholds;
    let rows = record.row_count as f64;
    let baseline = stats.baseline();
    let drop = baseline.and_then(|b| drop_ratio(b, rows));

    if let (Some(baseline), Some(ratio)) = (baseline, drop) {
        if ratio > t.volume_drop_ratio {
            out.push(Incident::urgent(
                ctx.source_id(),
                IncidentType::VolumeVariation,
                Some(&record.filename),
                format!(
                    "{} rows against an expected {:.0} for {} ({:.0}% drop)",
                    record.row_count,
                    baseline,
                    ctx.weekday(),
                    ratio * 100.0
                ),
            ));
            out.escalate(Escalation::VolumeDrop {
                observed: rows,
                baseline,
                ratio,
            });
            return;
        }
    }

    let below = stats
        .min
        .is_some_and(|min| rows < min * (1.0 - t.range_tolerance));
    let above = stats
        .max
        .is_some_and(|max| rows > max * (1.0 + t.range_tolerance));
    let spike = drop.is_some_and(|ratio| -ratio > t.volume_spike_ratio);

    if below || above || spike {
        out.push(Incident::attention(
            ctx.source_id(),
            IncidentType::VolumeVariation,
            Some(&record.filename),
            format!(
                "{} rows outside the usual {} range ({})",
                record.row_count,
                ctx.weekday(),
                describe_range(stats)
            ),
        ));
    }
}

fn describe_range(stats: &VolumeStats) -> String {
    let fmt = |v: Option<f64>| v.map_or_else(|| "?".to_string(), |v| format!("{:.0}", v));
    format!(
        "min {}, max {}, mean {}",
        fmt(stats.min),
        fmt(stats.max),
        fmt(stats.mean)
    )
}

fn check_against_last_week(ctx: &DetectionContext, out: &mut DetectionOutcome) {
    let t = ctx.thresholds;
    let rows_today: u64 = delivered(ctx.today).map(|r| r.row_count).sum();
    let rows_before: u64 = delivered(ctx.last_week).map(|r| r.row_count).sum();
    let files_today = ctx.today.len() as f64;
    let files_before = ctx.last_week.len() as f64;

    let row_drop = drop_ratio(rows_before as f64, rows_today as f64);
    let file_drop = drop_ratio(files_before, files_today);

    if let Some(ratio) = row_drop.filter(|r| *r > t.volume_drop_ratio) {
        out.push(Incident::urgent(
            ctx.source_id(),
            IncidentType::VolumeVariation,
            None,
            format!(
                "{} rows today against {} last {} ({:.0}% drop)",
                rows_today,
                rows_before,
                ctx.weekday(),
                ratio * 100.0
            ),
        ));
        out.escalate(Escalation::VolumeDrop {
            observed: rows_today as f64,
            baseline: rows_before as f64,
            ratio,
        });
    } else if let Some(ratio) = file_drop.filter(|r| *r > t.volume_drop_ratio) {
        out.push(Incident::urgent(
            ctx.source_id(),
            IncidentType::VolumeVariation,
            None,
            format!(
                "{} files today against {} last {} ({:.0}% drop)",
                files_today,
                files_before,
                ctx.weekday(),
                ratio * 100.0
            ),
        ));
        out.escalate(Escalation::VolumeDrop {
            observed: files_today,
            baseline: files_before,
            ratio,
        });
    } else if row_drop.is_some_and(|r| -r > t.volume_spike_ratio) {
        out.push(Incident::attention(
            ctx.source_id(),
            IncidentType::VolumeVariation,
            None,
            format!(
                "{} rows today against {} last {}",
                rows_today,
                rows_before,
                ctx.weekday()
            ),
        ));
    }
}
