use std::collections::HashSet;

use crate::detectors::{detect_all, DetectionContext, DetectionOutcome};
use crate::severity;
use crate::types::config::Thresholds;
use crate::types::incident::{Incident, IncidentType, Severity};
use crate::types::report::{GlobalReport, SourceReport};

/// Fixed advisory line for each incident type.
pub fn recommendation_for(incident_type: IncidentType) -> &'static str {
    match incident_type {
        IncidentType::MissingFile => {
            "Contact the source owner to confirm whether the scheduled export ran"
        }
        IncidentType::DuplicatedFile => {
            "Check for duplicate submissions and remove redundant copies before processing"
        }
        IncidentType::UnexpectedEmpty => {
            "Verify the export query; the file arrived with no rows"
        }
        IncidentType::VolumeVariation => {
            "Compare row counts with the source system to confirm the volume change is genuine"
        }
        IncidentType::LateUpload => {
            "Review the upstream job schedule; delivery missed its usual window"
        }
        IncidentType::PreviousFile => {
            "Confirm today's file was generated; an older file was uploaded instead"
        }
        IncidentType::FailedFile => "Inspect the ingestion error and re-submit the file",
    }
}

/// One line per distinct incident type in order of first occurrence, then the
/// extra lines with duplicates removed.
pub fn recommendations(incidents: &[Incident], extra: &[String]) -> Vec<String> {
    let mut lines: Vec<String> = Vec::new();
    let mut seen_types: HashSet<IncidentType> = HashSet::new();
    for incident in incidents {
        if seen_types.insert(incident.incident_type) {
            lines.push(recommendation_for(incident.incident_type).to_string());
        }
    }
    for line in extra {
        let line = line.trim();
        if !line.is_empty() && !lines.iter().any(|l| l == line) {
            lines.push(line.to_string());
        }
    }
    lines
}

/// Appends incidents not already reported with the same type and file.
/// `AllGood` entries are never incidents and are dropped.
pub fn merge_incidents(incidents: &mut Vec<Incident>, extra: Vec<Incident>) {
    for incident in extra {
        if incident.severity == Severity::AllGood {
            continue;
        }
        let known = incidents.iter().any(|i| {
            i.incident_type == incident.incident_type && i.file_name == incident.file_name
        });
        if !known {
            incidents.push(incident);
        }
    }
}

pub fn build_source_report(
    source_id: &str,
    incidents: Vec<Incident>,
    override_severity: Option<Severity>,
    advisory: &[String],
    thresholds: &Thresholds,
) -> SourceReport {
    let status = severity::aggregate(&incidents, override_severity, thresholds);
    let recommendations = recommendations(&incidents, advisory);
    SourceReport {
        source_id: source_id.to_string(),
        incidents,
        status,
        recommendations,
    }
}

/// Report for an already computed detection outcome.
pub fn report_outcome(
    source_id: &str,
    outcome: DetectionOutcome,
    advisory: &[String],
    thresholds: &Thresholds,
) -> SourceReport {
    let floor = severity::escalated(&outcome.escalations);
    build_source_report(source_id, outcome.incidents, floor, advisory, thresholds)
}

/// Detection plus report building for one source.
pub fn assess(ctx: &DetectionContext) -> SourceReport {
    report_outcome(ctx.source_id(), detect_all(ctx), &[], ctx.thresholds)
}

pub fn build_global_report(date: &str, source_reports: Vec<SourceReport>) -> GlobalReport {
    GlobalReport {
        date: date.to_string(),
        source_reports,
    }
}
