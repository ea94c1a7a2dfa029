use std::collections::HashSet;

use super::{DetectionContext, DetectionOutcome};
use crate::types::incident::{Incident, IncidentType};

/// One incident per failed, stopped or duplicated record. A repeated filename
/// is reported on its second and later occurrences only.
pub fn detect(ctx: &DetectionContext) -> DetectionOutcome {
    let mut out = DetectionOutcome::default();
    let mut seen: HashSet<&str> = HashSet::new();

    for record in ctx.today {
        let repeated = !seen.insert(record.filename.as_str());

        if record.status.is_failure() {
            let status = String::from(record.status.clone());
            let detail = record
                .status_message
                .as_deref()
                .map(|m| format!(": {}", m))
                .unwrap_or_default();
            out.push(Incident::attention(
                ctx.source_id(),
                IncidentType::FailedFile,
                Some(&record.filename),
                format!("Upload ended with status {}{}", status, detail),
            ));
        } else if record.is_duplicated || repeated {
            let reason = if record.is_duplicated {
                "flagged as duplicated by the ingestion pipeline"
            } else {
                "same filename already received in this batch"
            };
            out.push(Incident::attention(
                ctx.source_id(),
                IncidentType::DuplicatedFile,
                Some(&record.filename),
                format!("Duplicate upload: {}", reason),
            ));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detectors::fixtures::*;
    use crate::pattern::FilenamePattern;
    use crate::types::config::Thresholds;
    use crate::types::incident::Severity;
    use crate::types::profile::SourceProfile;
    use crate::types::upload::{UploadRecord, UploadStatus};

    fn run(today: &[UploadRecord]) -> DetectionOutcome {
        let profile = SourceProfile::new("s1");
        let pattern = FilenamePattern::default();
        let thresholds = Thresholds::default();
        detect(&DetectionContext {
            profile: &profile,
            pattern: &pattern,
            today,
            last_week: &[],
            run_date: monday(),
            thresholds: &thresholds,
        })
    }

    #[test]
    fn repeated_filename_flags_second_occurrence() {
        let out = run(&[record("a.csv", 10, 9, 0), record("a.csv", 10, 9, 30)]);
        assert_eq!(out.incidents.len(), 1);
        let incident = &out.incidents[0];
        assert_eq!(incident.incident_type, IncidentType::DuplicatedFile);
        assert_eq!(incident.severity, Severity::AttentionRequired);
        assert_eq!(incident.file_name.as_deref(), Some("a.csv"));
    }

    #[test]
    fn failed_and_stopped_become_failed_file() {
        let mut failed = record("a.csv", 0, 9, 0).with_status(UploadStatus::Failed);
        failed.status_message = Some("schema mismatch".into());
        let stopped = record("b.csv", 0, 9, 0).with_status(UploadStatus::Stopped);
        let out = run(&[failed, stopped, record("c.csv", 5, 9, 0)]);
        assert_eq!(out.incidents.len(), 2);
        assert!(out
            .incidents
            .iter()
            .all(|i| i.incident_type == IncidentType::FailedFile));
        assert!(out.incidents[0].description.contains("schema mismatch"));
    }

    #[test]
    fn flagged_duplicate_is_reported_once() {
        let out = run(&[record("a.csv", 10, 9, 0).duplicated()]);
        assert_eq!(out.incidents.len(), 1);
        assert_eq!(out.incidents[0].incident_type, IncidentType::DuplicatedFile);
    }

    #[test]
    fn failed_duplicate_counts_as_failed_only() {
        let out = run(&[
            record("a.csv", 10, 9, 0),
            record("a.csv", 0, 9, 5).with_status(UploadStatus::Failed),
        ]);
        assert_eq!(out.incidents.len(), 1);
        assert_eq!(out.incidents[0].incident_type, IncidentType::FailedFile);
    }

    #[test]
    fn processing_status_is_not_a_failure() {
        let out = run(&[record("a.csv", 10, 9, 0).with_status(UploadStatus::Other("PROCESSING".into()))]);
        assert!(out.incidents.is_empty());
    }
}
