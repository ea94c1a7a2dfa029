//! HTTP-backed collaborators. Both clients retry throttled calls through
//! [`with_backoff`] and give up with `ExternalServiceFailure`.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::collaborators::{Advice, IncidentAdvisor, ProfileResolver, ReviewRequest};
use crate::error::MonitorError;
use crate::profile::parse_profile;
use crate::retry::{is_throttling, with_backoff, AttemptError, RetryPolicy};
use crate::types::incident::{Incident, IncidentType, Severity};
use crate::types::profile::SourceProfile;

const USER_AGENT: &str = concat!("uploadwatch/", env!("CARGO_PKG_VERSION"));
const PROFILE_SERVICE: &str = "profile service";
const ADVISOR_SERVICE: &str = "incident advisor";

fn build_client() -> Result<reqwest::Client, MonitorError> {
    reqwest::Client::builder()
        .user_agent(USER_AGENT)
        .timeout(Duration::from_secs(60))
        .build()
        .map_err(|e| MonitorError::Config(format!("failed to build HTTP client: {}", e)))
}

fn transport_failure(service: &str, attempt: u32, e: reqwest::Error) -> AttemptError {
    AttemptError::Fatal(MonitorError::ExternalServiceFailure {
        service: service.to_string(),
        attempts: attempt + 1,
        message: e.to_string(),
    })
}

/// Maps a finished HTTP exchange to a body, a retryable throttle, or a
/// terminal error.
fn classify_response(
    service: &str,
    source_id: &str,
    attempt: u32,
    status: u16,
    body: String,
) -> Result<String, AttemptError> {
    if (200..300).contains(&status) {
        return Ok(body);
    }
    if status == 404 {
        return Err(AttemptError::Fatal(MonitorError::ProfileNotFound {
            source_id: source_id.to_string(),
        }));
    }
    if is_throttling(status, &body) {
        return Err(AttemptError::Throttled(format!("HTTP {}: {}", status, body.trim())));
    }
    Err(AttemptError::Fatal(MonitorError::ExternalServiceFailure {
        service: service.to_string(),
        attempts: attempt + 1,
        message: format!("HTTP {}: {}", status, body.trim()),
    }))
}

pub struct HttpProfileResolver {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    policy: RetryPolicy,
}

impl HttpProfileResolver {
    pub fn new(base_url: &str, api_key: Option<String>, policy: RetryPolicy) -> Result<Self, MonitorError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            policy,
        })
    }

    async fn fetch(&self, source_id: &str, attempt: u32) -> Result<String, AttemptError> {
        let url = format!("{}/sources/{}/profile", self.base_url, source_id);
        let mut request = self.client.get(&url);
        if let Some(key) = &self.api_key {
            request = request.bearer_auth(key);
        }
        let response = request
            .send()
            .await
            .map_err(|e| transport_failure(PROFILE_SERVICE, attempt, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| transport_failure(PROFILE_SERVICE, attempt, e))?;
        debug!(source_id, status, attempt, "Profile service responded");
        classify_response(PROFILE_SERVICE, source_id, attempt, status, body)
    }
}

#[async_trait]
impl ProfileResolver for HttpProfileResolver {
    async fn resolve_profile(&self, source_id: &str) -> Result<SourceProfile, MonitorError> {
        let body = with_backoff(&self.policy, PROFILE_SERVICE, move |attempt| {
            self.fetch(source_id, attempt)
        })
        .await?;
        parse_profile(source_id, Some(&body))
    }
}

pub struct HttpIncidentAdvisor {
    client: reqwest::Client,
    base_url: String,
    api_key: Option<String>,
    policy: RetryPolicy,
}

impl HttpIncidentAdvisor {
    pub fn new(base_url: &str, api_key: Option<String>, policy: RetryPolicy) -> Result<Self, MonitorError> {
        Ok(Self {
            client: build_client()?,
            base_url: base_url.trim_end_matches('/').to_string(),
            api_key,
            policy,
        })
    }

    async fn post(&self, request: &ReviewRequest, attempt: u32) -> Result<String, AttemptError> {
        let url = format!("{}/review", self.base_url);
        let mut builder = self.client.post(&url).json(request);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        let response = builder
            .send()
            .await
            .map_err(|e| transport_failure(ADVISOR_SERVICE, attempt, e))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| transport_failure(ADVISOR_SERVICE, attempt, e))?;
        match classify_response(ADVISOR_SERVICE, &request.source_id, attempt, status, body) {
            // A missing review endpoint is a service failure, not a missing profile.
            Err(AttemptError::Fatal(MonitorError::ProfileNotFound { .. })) => {
                Err(AttemptError::Fatal(MonitorError::ExternalServiceFailure {
                    service: ADVISOR_SERVICE.to_string(),
                    attempts: attempt + 1,
                    message: format!("HTTP 404 from {}", url),
                }))
            }
            other => other,
        }
    }
}

#[async_trait]
impl IncidentAdvisor for HttpIncidentAdvisor {
    async fn review(&self, request: &ReviewRequest) -> Result<Advice, MonitorError> {
        let body = with_backoff(&self.policy, ADVISOR_SERVICE, move |attempt| {
            self.post(request, attempt)
        })
        .await?;
        parse_advice(&request.source_id, &body)
    }
}

/// Removes a surrounding ```` ``` ```` / ```` ```json ```` fence, if any.
pub fn strip_code_fence(text: &str) -> &str {
    let trimmed = text.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let body = rest.split_once('\n').map_or("", |(_, body)| body);
    body.trim_end().strip_suffix("```").unwrap_or(body).trim()
}

#[derive(Deserialize)]
struct RawAdvice {
    #[serde(default)]
    incidents: Vec<RawIncident>,
    #[serde(default)]
    status: Option<String>,
    #[serde(default)]
    recommendations: Vec<String>,
}

#[derive(Deserialize)]
struct RawIncident {
    #[serde(alias = "incidentType")]
    incident_type: String,
    #[serde(default)]
    severity: String,
    #[serde(default)]
    description: String,
    #[serde(default, alias = "fileName")]
    file_name: Option<String>,
}

/// Parses an advisor answer. Unknown incident types become `FailedFile`,
/// unknown severities `AttentionRequired`; `ALL_GOOD` incidents are dropped.
pub fn parse_advice(source_id: &str, text: &str) -> Result<Advice, MonitorError> {
    let raw: RawAdvice =
        serde_json::from_str(strip_code_fence(text)).map_err(|e| MonitorError::ParseFailure {
            source_id: source_id.to_string(),
            message: e.to_string(),
        })?;

    let incidents = raw
        .incidents
        .into_iter()
        .filter_map(|i| {
            let incident_type =
                IncidentType::from_label(&i.incident_type).unwrap_or(IncidentType::FailedFile);
            let severity = Severity::parse(&i.severity).unwrap_or(Severity::AttentionRequired);
            Incident::with_severity(
                source_id,
                incident_type,
                severity,
                i.file_name.as_deref(),
                i.description,
            )
        })
        .collect();

    Ok(Advice {
        incidents,
        status: raw.status.as_deref().and_then(Severity::parse),
        recommendations: raw.recommendations,
    })
}
