//! The six detectors. Each one reads the same [`DetectionContext`] and returns
//! the incidents it found plus any escalation it wants the aggregator to apply.

pub mod duplicated;
pub mod empty;
pub mod late;
pub mod missing;
pub mod previous;
pub mod volume;

use chrono::{Datelike, NaiveDate, Weekday};
use tracing::debug;

use crate::pattern::FilenamePattern;
use crate::types::config::Thresholds;
use crate::types::incident::Incident;
use crate::types::profile::SourceProfile;
use crate::types::upload::UploadRecord;

pub struct DetectionContext<'a> {
    pub profile: &'a SourceProfile,
    pub pattern: &'a FilenamePattern,
    pub today: &'a [UploadRecord],
    pub last_week: &'a [UploadRecord],
    pub run_date: NaiveDate,
    pub thresholds: &'a Thresholds,
}

impl<'a> DetectionContext<'a> {
    pub fn weekday(&self) -> Weekday {
        self.run_date.weekday()
    }

    pub fn source_id(&self) -> &str {
        &self.profile.source_id
    }
}

/// Conditions that force a source to `Urgent` regardless of incident counts.
#[derive(Debug, Clone, PartialEq)]
pub enum Escalation {
    TotalOutage,
    VolumeDrop {
        observed: f64,
        baseline: f64,
        ratio: f64,
    },
    MissingCategories {
        count: usize,
    },
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct DetectionOutcome {
    pub incidents: Vec<Incident>,
    pub escalations: Vec<Escalation>,
}

impl DetectionOutcome {
    pub fn push(&mut self, incident: Incident) {
        self.incidents.push(incident);
    }

    pub fn escalate(&mut self, escalation: Escalation) {
        self.escalations.push(escalation);
    }

    fn absorb(&mut self, other: DetectionOutcome) {
        self.incidents.extend(other.incidents);
        self.escalations.extend(other.escalations);
    }
}

type Detector = fn(&DetectionContext) -> DetectionOutcome;

const DETECTORS: [(&str, Detector); 6] = [
    ("missing", missing::detect),
    ("duplicated", duplicated::detect),
    ("empty", empty::detect),
    ("volume", volume::detect),
    ("late", late::detect),
    ("previous", previous::detect),
];

/// Runs every detector and concatenates their output in a fixed order.
pub fn detect_all(ctx: &DetectionContext) -> DetectionOutcome {
    let mut outcome = DetectionOutcome::default();
    for (name, detector) in DETECTORS {
        let found = detector(ctx);
        debug!(
            source_id = %ctx.source_id(),
            detector = name,
            incidents = found.incidents.len(),
            escalations = found.escalations.len(),
            "Detector finished"
        );
        outcome.absorb(found);
    }
    outcome
}
