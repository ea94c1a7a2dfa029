//! Reduces a source's incidents to one overall status.

use crate::detectors::Escalation;
use crate::types::config::Thresholds;
use crate::types::incident::{Incident, Severity};

/// Status from incident counts alone.
pub fn base_severity(incidents: &[Incident], thresholds: &Thresholds) -> Severity {
    let urgent = incidents.iter().filter(|i| i.is_urgent()).count();
    if urgent > thresholds.urgent_incident_limit || incidents.len() > thresholds.total_incident_limit
    {
        Severity::Urgent
    } else if incidents.is_empty() {
        Severity::AllGood
    } else {
        Severity::AttentionRequired
    }
}

/// Severity floor imposed by escalations, if any.
pub fn escalated(escalations: &[Escalation]) -> Option<Severity> {
    (!escalations.is_empty()).then_some(Severity::Urgent)
}

/// Base rule, then overrides. An override can only raise the result.
pub fn aggregate(
    incidents: &[Incident],
    override_severity: Option<Severity>,
    thresholds: &Thresholds,
) -> Severity {
    let base = base_severity(incidents, thresholds);
    match override_severity {
        Some(floor) => base.max(floor),
        None => base,
    }
}
