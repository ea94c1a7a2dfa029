use serde::{Deserialize, Serialize};

use super::incident::{Incident, Severity};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SourceReport {
    pub source_id: String,
    #[serde(default)]
    pub incidents: Vec<Incident>,
    pub status: Severity,
    #[serde(default)]
    pub recommendations: Vec<String>,
}

impl SourceReport {
    /// Stand-in report for a source whose analysis could not complete.
    pub fn analysis_failed(source_id: &str, reason: &str) -> Self {
        Self {
            source_id: source_id.to_string(),
            incidents: Vec::new(),
            status: Severity::AttentionRequired,
            recommendations: vec![format!("Automated analysis failed: {}", reason)],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GlobalReport {
    pub date: String,
    pub source_reports: Vec<SourceReport>,
}

impl GlobalReport {
    pub fn get(&self, source_id: &str) -> Option<&SourceReport> {
        self.source_reports.iter().find(|r| r.source_id == source_id)
    }

    pub fn count_with_status(&self, status: Severity) -> usize {
        self.source_reports
            .iter()
            .filter(|r| r.status == status)
            .count()
    }

    pub fn total_incidents(&self) -> usize {
        self.source_reports.iter().map(|r| r.incidents.len()).sum()
    }
}
