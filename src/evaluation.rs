//! Scores a run against hand-labelled statuses, with `Urgent` as the
//! positive class.

use std::collections::HashMap;
use std::fmt::Write;
use std::path::Path;

use serde::Serialize;

use crate::error::MonitorError;
use crate::types::incident::Severity;
use crate::types::report::GlobalReport;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Outcome {
    TruePositive,
    FalsePositive,
    FalseNegative,
    TrueNegative,
}

impl Outcome {
    fn classify(predicted: Severity, actual: Severity) -> Self {
        match (predicted == Severity::Urgent, actual == Severity::Urgent) {
            (true, true) => Outcome::TruePositive,
            (true, false) => Outcome::FalsePositive,
            (false, true) => Outcome::FalseNegative,
            (false, false) => Outcome::TrueNegative,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Outcome::TruePositive => "TP",
            Outcome::FalsePositive => "FP",
            Outcome::FalseNegative => "FN",
            Outcome::TrueNegative => "TN",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationRow {
    pub source_id: String,
    pub actual: Severity,
    pub predicted: Severity,
    pub outcome: Outcome,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct Evaluation {
    pub true_positives: usize,
    pub false_positives: usize,
    pub false_negatives: usize,
    pub true_negatives: usize,
    pub rows: Vec<EvaluationRow>,
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

impl Evaluation {
    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_positives)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.true_positives + self.false_negatives)
    }

    pub fn f1(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r == 0.0 {
            0.0
        } else {
            2.0 * p * r / (p + r)
        }
    }
}

/// Sources missing from `ground_truth` are taken to be `AllGood`.
pub fn evaluate(report: &GlobalReport, ground_truth: &HashMap<String, Severity>) -> Evaluation {
    let mut eval = Evaluation::default();
    for source in &report.source_reports {
        let actual = ground_truth
            .get(&source.source_id)
            .copied()
            .unwrap_or(Severity::AllGood);
        let outcome = Outcome::classify(source.status, actual);
        match outcome {
            Outcome::TruePositive => eval.true_positives += 1,
            Outcome::FalsePositive => eval.false_positives += 1,
            Outcome::FalseNegative => eval.false_negatives += 1,
            Outcome::TrueNegative => eval.true_negatives += 1,
        }
        eval.rows.push(EvaluationRow {
            source_id: source.source_id.clone(),
            actual,
            predicted: source.status,
            outcome,
        });
    }
    eval
}

/// Reads a JSON object mapping source ids to `URGENT` / `ATTENTION_REQUIRED` /
/// `ALL_GOOD`.
pub fn load_ground_truth(path: &Path) -> Result<HashMap<String, Severity>, MonitorError> {
    let raw = std::fs::read_to_string(path)?;
    let labels: HashMap<String, Severity> = serde_json::from_str(&raw)
        .map_err(|e| MonitorError::Config(format!("{}: {}", path.display(), e)))?;
    Ok(labels)
}

pub fn render_evaluation(eval: &Evaluation) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "{:<12} {:<18} {:<18} {}", "Source", "Actual", "Predicted", "Result");
    for row in &eval.rows {
        let _ = writeln!(
            out,
            "{:<12} {:<18} {:<18} {}",
            row.source_id,
            row.actual.as_str(),
            row.predicted.as_str(),
            row.outcome.code()
        );
    }
    let _ = writeln!(out, "\nMetrics (class URGENT):");
    let _ = writeln!(out, "Precision: {:.2}", eval.precision());
    let _ = writeln!(out, "Recall:    {:.2}", eval.recall());
    let _ = writeln!(out, "F1 Score:  {:.2}", eval.f1());
    out
}
