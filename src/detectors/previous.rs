use super::{DetectionContext, DetectionOutcome};
use crate::types::incident::{Incident, IncidentType};

/// Flags files whose embedded date is older than the upload cadence allows.
/// A file dated within `days_since_previous_slot` (+ grace) of the run date is
/// the latest of its batch, not stale.
pub fn detect(ctx: &DetectionContext) -> DetectionOutcome {
    let mut out = DetectionOutcome::default();
    let tolerance = ctx.profile.days_since_previous_slot(ctx.weekday())
        + ctx.thresholds.previous_file_grace_days;

    for record in ctx.today {
        let Some(file_date) = ctx.pattern.embedded_date(&record.filename) else {
            continue;
        };
        let age = (ctx.run_date - file_date).num_days();
        if age > tolerance {
            out.push(Incident::attention(
                ctx.source_id(),
                IncidentType::PreviousFile,
                Some(&record.filename),
                format!(
                    "File is dated {} ({} days before the run date, {} allowed)",
                    file_date, age, tolerance
                ),
            ));
        }
    }
    out
}
