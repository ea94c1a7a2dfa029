//! Runs every source of a batch through resolution, detection and report
//! building, with a bounded number of sources in flight.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{IncidentAdvisor, ProfileResolver, ReviewRequest, UploadRecordSource};
use crate::detectors::{detect_all, DetectionContext, DetectionOutcome};
use crate::error::MonitorError;
use crate::pattern::FilenamePattern;
use crate::report::{build_global_report, merge_incidents, report_outcome};
use crate::types::config::{MonitorConfig, Thresholds};
use crate::types::incident::Severity;
use crate::types::profile::SourceProfile;
use crate::types::report::{GlobalReport, SourceReport};
use crate::types::upload::UploadRecord;

pub struct RunCoordinator {
    profiles: Arc<dyn ProfileResolver>,
    records: Arc<dyn UploadRecordSource>,
    advisor: Option<Arc<dyn IncidentAdvisor>>,
    config: MonitorConfig,
    cancel: CancellationToken,
    detector: DetectFn,
}

type DetectFn = fn(
    &SourceProfile,
    &[UploadRecord],
    &[UploadRecord],
    NaiveDate,
    &Thresholds,
) -> DetectionOutcome;

/// Shared handles a per-source task needs.
#[derive(Clone)]
struct SourceJob {
    profiles: Arc<dyn ProfileResolver>,
    records: Arc<dyn UploadRecordSource>,
    advisor: Option<Arc<dyn IncidentAdvisor>>,
    thresholds: Thresholds,
    run_date: NaiveDate,
    detector: DetectFn,
}

impl RunCoordinator {
    pub fn new(
        profiles: Arc<dyn ProfileResolver>,
        records: Arc<dyn UploadRecordSource>,
        config: MonitorConfig,
    ) -> Self {
        Self {
            profiles,
            records,
            advisor: None,
            config,
            cancel: CancellationToken::new(),
            detector: detect,
        }
    }

    #[cfg(test)]
    fn with_detector(mut self, detector: DetectFn) -> Self {
        self.detector = detector;
        self
    }

    pub fn with_advisor(mut self, advisor: Arc<dyn IncidentAdvisor>) -> Self {
        self.advisor = Some(advisor);
        self
    }

    /// Cancelling this token stops the run. Reports finished so far are kept.
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub async fn run(
        &self,
        run_date: NaiveDate,
        source_ids: &[String],
    ) -> Result<GlobalReport, MonitorError> {
        if source_ids.is_empty() {
            return Err(MonitorError::MissingRunInput(
                "no sources to evaluate".to_string(),
            ));
        }
        let date = run_date.format("%Y-%m-%d").to_string();
        info!(
            date = %date,
            sources = source_ids.len(),
            concurrency = self.config.concurrency(),
            "Starting run"
        );

        let job = SourceJob {
            profiles: self.profiles.clone(),
            records: self.records.clone(),
            advisor: self.advisor.clone(),
            thresholds: self.config.thresholds.clone(),
            run_date,
            detector: self.detector,
        };
        let semaphore = Arc::new(Semaphore::new(self.config.concurrency()));
        let pacing = self.config.inter_source_delay();
        let mut tasks: JoinSet<(usize, Option<SourceReport>)> = JoinSet::new();
        let mut spawned: HashMap<tokio::task::Id, usize> = HashMap::new();

        for (index, source_id) in source_ids.iter().enumerate() {
            if index > 0 && !pacing.is_zero() {
                tokio::select! {
                    _ = self.cancel.cancelled() => break,
                    _ = tokio::time::sleep(pacing) => {}
                }
            }
            let permit = tokio::select! {
                _ = self.cancel.cancelled() => break,
                permit = semaphore.clone().acquire_owned() => match permit {
                    Ok(permit) => permit,
                    Err(_) => break,
                },
            };
            let job = job.clone();
            let source_id = source_id.clone();
            let handle = tasks.spawn(async move {
                let report = job.evaluate(&source_id).await;
                drop(permit);
                (index, report)
            });
            spawned.insert(handle.id(), index);
        }

        let mut slots: Vec<Option<SourceReport>> = vec![None; source_ids.len()];
        loop {
            tokio::select! {
                biased;
                _ = self.cancel.cancelled() => {
                    warn!(date = %date, "Run cancelled, keeping finished sources");
                    tasks.abort_all();
                    while let Some(joined) = tasks.join_next().await {
                        if let Ok((index, report)) = joined {
                            slots[index] = report;
                        }
                    }
                    break;
                }
                joined = tasks.join_next() => match joined {
                    Some(Ok((index, report))) => slots[index] = report,
                    Some(Err(e)) => match spawned.get(&e.id()) {
                        Some(&index) => {
                            let source_id = &source_ids[index];
                            warn!(
                                source_id = %source_id,
                                error = %e,
                                "Source task ended abnormally, recording synthetic report"
                            );
                            slots[index] = Some(SourceReport::analysis_failed(
                                source_id,
                                &format!("analysis task did not complete: {}", e),
                            ));
                        }
                        None => warn!(error = %e, "Unknown source task ended abnormally"),
                    },
                    None => break,
                },
            }
        }

        let reports: Vec<SourceReport> = slots.into_iter().flatten().collect();
        info!(date = %date, reports = reports.len(), "Run finished");
        Ok(build_global_report(&date, reports))
    }
}

impl SourceJob {
    /// `None` when the source has no profile.
    async fn evaluate(&self, source_id: &str) -> Option<SourceReport> {
        match self.analyse(source_id).await {
            Ok(report) => {
                info!(
                    source_id,
                    status = report.status.as_str(),
                    incidents = report.incidents.len(),
                    "Source evaluated"
                );
                Some(report)
            }
            Err(e) if e.wants_synthetic_report() => {
                warn!(source_id, error = %e, "Analysis failed, recording synthetic report");
                Some(SourceReport::analysis_failed(source_id, &e.to_string()))
            }
            Err(e) => {
                warn!(source_id, error = %e, "Skipping source");
                None
            }
        }
    }

    async fn analyse(&self, source_id: &str) -> Result<SourceReport, MonitorError> {
        let profile = self.profiles.resolve_profile(source_id).await?;
        let today = self.records.today_records(source_id).await?;
        let last_week = self.records.last_week_records(source_id).await?;

        let thresholds = self.thresholds.clone();
        let run_date = self.run_date;
        let detector = self.detector;
        let detected = tokio::task::spawn_blocking(move || {
            let outcome = detector(&profile, &today, &last_week, run_date, &thresholds);
            (profile, today, last_week, outcome)
        })
        .await;

        let (profile, today, last_week, mut outcome) = match detected {
            Ok(done) => done,
            Err(e) => {
                warn!(source_id, error = %e, "Detection task failed");
                return Ok(SourceReport::analysis_failed(
                    source_id,
                    &format!("detection did not complete: {}", e),
                ));
            }
        };
        debug!(source_id, incidents = outcome.incidents.len(), "Detection complete");

        let mut advisory = Vec::new();
        let mut advisor_failure = None;
        if let Some(advisor) = &self.advisor {
            let request = ReviewRequest {
                source_id: source_id.to_string(),
                run_date: self.run_date.format("%Y-%m-%d").to_string(),
                profile,
                today,
                last_week,
                detected: outcome.incidents.clone(),
            };
            match advisor.review(&request).await {
                Ok(advice) => {
                    merge_incidents(&mut outcome.incidents, advice.incidents);
                    advisory = advice.recommendations;
                }
                Err(e) => {
                    warn!(source_id, error = %e, "Advisor failed, keeping detected incidents");
                    advisor_failure = Some(e);
                }
            }
        }

        let mut report = report_outcome(source_id, outcome, &advisory, &self.thresholds);
        if let Some(e) = advisor_failure {
            report
                .recommendations
                .push(format!("Automated analysis failed: {}", e));
            report.status = report.status.max(Severity::AttentionRequired);
        }
        Ok(report)
    }
}

fn detect(
    profile: &SourceProfile,
    today: &[UploadRecord],
    last_week: &[UploadRecord],
    run_date: NaiveDate,
    thresholds: &Thresholds,
) -> DetectionOutcome {
    let pattern = FilenamePattern::compile(&profile.filename_pattern);
    detect_all(&DetectionContext {
        profile,
        pattern: &pattern,
        today,
        last_week,
        run_date,
        thresholds,
    })
}
