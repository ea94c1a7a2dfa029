use super::{DetectionContext, DetectionOutcome, Escalation};
use crate::pattern::FileCategory;
use crate::types::incident::{Incident, IncidentType};

/// Flags scheduled deliveries that never arrived.
///
/// With no records at all the source is in total outage. Otherwise each
/// expected file category that no record matches is reported on its own.
pub fn detect(ctx: &DetectionContext) -> DetectionOutcome {
    let mut out = DetectionOutcome::default();
    let Some(expected_at) = ctx.profile.scheduled_at(ctx.weekday()) else {
        return out;
    };
    let source_id = ctx.source_id();

    if ctx.today.is_empty() {
        out.push(Incident::urgent(
            source_id,
            IncidentType::MissingFile,
            None,
            format!(
                "No files received on {} ({}); uploads are expected around {} UTC",
                ctx.run_date,
                ctx.weekday(),
                expected_at.format("%H:%M")
            ),
        ));
        out.escalate(Escalation::TotalOutage);
        return out;
    }

    let absent: Vec<&FileCategory> = ctx
        .pattern
        .categories()
        .iter()
        .filter(|category| !ctx.today.iter().any(|r| category.matches(&r.filename)))
        .collect();

    for category in &absent {
        out.push(Incident::attention(
            source_id,
            IncidentType::MissingFile,
            None,
            format!(
                "No file matching `{}` received on {}",
                category.template, ctx.run_date
            ),
        ));
    }

    if absent.len() > ctx.thresholds.missing_category_limit {
        out.escalate(Escalation::MissingCategories {
            count: absent.len(),
        });
    }
    out
}
