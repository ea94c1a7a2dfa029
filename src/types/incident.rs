use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum IncidentType {
    #[serde(rename = "Missing File")]
    MissingFile,
    #[serde(rename = "Duplicated File")]
    DuplicatedFile,
    #[serde(rename = "Unexpected Empty File")]
    UnexpectedEmpty,
    #[serde(rename = "Unexpected Volume Variation")]
    VolumeVariation,
    #[serde(rename = "File Upload After Schedule")]
    LateUpload,
    #[serde(rename = "Upload of Previous File")]
    PreviousFile,
    #[serde(rename = "Failed File")]
    FailedFile,
}

impl IncidentType {
    pub const ALL: [IncidentType; 7] = [
        IncidentType::MissingFile,
        IncidentType::DuplicatedFile,
        IncidentType::UnexpectedEmpty,
        IncidentType::VolumeVariation,
        IncidentType::LateUpload,
        IncidentType::PreviousFile,
        IncidentType::FailedFile,
    ];

    pub fn label(&self) -> &'static str {
        match self {
            IncidentType::MissingFile => "Missing File",
            IncidentType::DuplicatedFile => "Duplicated File",
            IncidentType::UnexpectedEmpty => "Unexpected Empty File",
            IncidentType::VolumeVariation => "Unexpected Volume Variation",
            IncidentType::LateUpload => "File Upload After Schedule",
            IncidentType::PreviousFile => "Upload of Previous File",
            IncidentType::FailedFile => "Failed File",
        }
    }

    pub fn from_label(label: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|t| t.label() == label.trim())
    }
}

/// Ordered from least to most severe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Severity {
    AllGood,
    AttentionRequired,
    Urgent,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::AllGood => "ALL_GOOD",
            Severity::AttentionRequired => "ATTENTION_REQUIRED",
            Severity::Urgent => "URGENT",
        }
    }

    pub fn parse(raw: &str) -> Option<Self> {
        match raw.trim() {
            "ALL_GOOD" => Some(Severity::AllGood),
            "ATTENTION_REQUIRED" => Some(Severity::AttentionRequired),
            "URGENT" => Some(Severity::Urgent),
            _ => None,
        }
    }
}

/// One detected deviation. Never carries `AllGood`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Incident {
    pub incident_type: IncidentType,
    pub severity: Severity,
    pub description: String,
    pub file_name: Option<String>,
    pub source_id: String,
}

impl Incident {
    pub fn urgent(
        source_id: &str,
        incident_type: IncidentType,
        file_name: Option<&str>,
        description: String,
    ) -> Self {
        Self::build(source_id, incident_type, Severity::Urgent, file_name, description)
    }

    pub fn attention(
        source_id: &str,
        incident_type: IncidentType,
        file_name: Option<&str>,
        description: String,
    ) -> Self {
        Self::build(
            source_id,
            incident_type,
            Severity::AttentionRequired,
            file_name,
            description,
        )
    }

    /// Returns `None` for `AllGood`, which is not an incident severity.
    pub fn with_severity(
        source_id: &str,
        incident_type: IncidentType,
        severity: Severity,
        file_name: Option<&str>,
        description: String,
    ) -> Option<Self> {
        match severity {
            Severity::AllGood => None,
            _ => Some(Self::build(source_id, incident_type, severity, file_name, description)),
        }
    }

    fn build(
        source_id: &str,
        incident_type: IncidentType,
        severity: Severity,
        file_name: Option<&str>,
        description: String,
    ) -> Self {
        Self {
            incident_type,
            severity,
            description,
            file_name: file_name.map(str::to_string),
            source_id: source_id.to_string(),
        }
    }

    pub fn is_urgent(&self) -> bool {
        self.severity == Severity::Urgent
    }
}
