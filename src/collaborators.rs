//! Interfaces to the services the engine depends on. Retry and pacing live
//! behind these traits; detection itself stays synchronous.

use async_trait::async_trait;
use serde::Serialize;

use crate::error::MonitorError;
use crate::types::incident::{Incident, Severity};
use crate::types::profile::SourceProfile;
use crate::types::upload::UploadRecord;

#[async_trait]
pub trait ProfileResolver: Send + Sync {
    /// `MonitorError::ProfileNotFound` when the source has no profile.
    async fn resolve_profile(&self, source_id: &str) -> Result<SourceProfile, MonitorError>;
}

/// Upload records for one run date.
#[async_trait]
pub trait UploadRecordSource: Send + Sync {
    async fn today_records(&self, source_id: &str) -> Result<Vec<UploadRecord>, MonitorError>;

    /// Empty when there is nothing to compare against.
    async fn last_week_records(&self, source_id: &str) -> Result<Vec<UploadRecord>, MonitorError>;
}

/// Everything an advisor gets to see about one source.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ReviewRequest {
    pub source_id: String,
    pub run_date: String,
    pub profile: SourceProfile,
    pub today: Vec<UploadRecord>,
    pub last_week: Vec<UploadRecord>,
    pub detected: Vec<Incident>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Advice {
    pub incidents: Vec<Incident>,
    pub status: Option<Severity>,
    pub recommendations: Vec<String>,
}

/// Optional second opinion on a source's detected incidents.
#[async_trait]
pub trait IncidentAdvisor: Send + Sync {
    async fn review(&self, request: &ReviewRequest) -> Result<Advice, MonitorError>;
}
