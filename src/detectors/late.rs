use super::{DetectionContext, DetectionOutcome};
use crate::types::incident::{Incident, IncidentType};

/// Flags uploads that landed more than `late_upload_hours` after the
/// scheduled time on the run date. Schedules are UTC.
pub fn detect(ctx: &DetectionContext) -> DetectionOutcome {
    let mut out = DetectionOutcome::default();
    let Some(scheduled) = ctx.profile.scheduled_at(ctx.weekday()) else {
        return out;
    };
    let expected = ctx.run_date.and_time(scheduled).and_utc();
    let allowed_ms = ctx.thresholds.late_upload_hours * 3_600_000.0;

    for record in ctx.today {
        let delay = record.uploaded_at_utc() - expected;
        if delay.num_milliseconds() as f64 > allowed_ms {
            out.push(Incident::attention(
                ctx.source_id(),
                IncidentType::LateUpload,
                Some(&record.filename),
                format!(
                    "Uploaded at {} UTC, {:.1}h after the {} slot",
                    record.uploaded_at_utc().format("%H:%M"),
                    delay.num_minutes() as f64 / 60.0,
                    scheduled.format("%H:%M")
                ),
            ));
        }
    }
    out
}
