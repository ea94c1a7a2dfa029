use super::{DetectionContext, DetectionOutcome};
use crate::types::incident::{Incident, IncidentType};

pub fn detect(ctx: &DetectionContext) -> DetectionOutcome {
    let mut out = DetectionOutcome::default();
    let zero_expected = ctx
        .profile
        .stats_for(ctx.weekday())
        .is_some_and(|stats| stats.allows_empty());
    if zero_expected {
        return out;
    }

    for record in ctx.today.iter().filter(|r| r.row_count == 0) {
        out.push(Incident::attention(
            ctx.source_id(),
            IncidentType::UnexpectedEmpty,
            Some(&record.filename),
            format!("File arrived with 0 rows on {}", ctx.weekday()),
        ));
    }
    out
}
