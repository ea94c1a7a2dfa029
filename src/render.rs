//! Plain-text rendering of a [`GlobalReport`] for the terminal.

use std::fmt::Write;

use crate::types::incident::Severity;
use crate::types::report::GlobalReport;

fn marker(status: Severity) -> &'static str {
    match status {
        Severity::Urgent => "[!!]",
        Severity::AttentionRequired => "[! ]",
        Severity::AllGood => "[ok]",
    }
}

fn rule(out: &mut String, title: &str) {
    let line = "=".repeat(60);
    let _ = writeln!(out, "{}\n{}\n{}", line, title, line);
}

/// Executive summary (one line per source) followed by incident details and
/// recommendations for every source that has incidents.
pub fn render_summary(report: &GlobalReport) -> String {
    let mut out = String::new();
    rule(&mut out, &format!("EXECUTIVE REPORT - {}", report.date));

    let id_width = report
        .source_reports
        .iter()
        .map(|r| r.source_id.len())
        .chain(std::iter::once("Source".len()))
        .max()
        .unwrap_or(6);

    let _ = writeln!(
        out,
        "{:<6} {:<id_width$} {:<18} {:>9}",
        "Status", "Source", "Severity", "Incidents"
    );
    for source in &report.source_reports {
        let _ = writeln!(
            out,
            "{:<6} {:<id_width$} {:<18} {:>9}",
            marker(source.status),
            source.source_id,
            source.status.as_str(),
            source.incidents.len()
        );
    }
    let _ = writeln!(
        out,
        "\n{} sources: {} urgent, {} attention required, {} all good",
        report.source_reports.len(),
        report.count_with_status(Severity::Urgent),
        report.count_with_status(Severity::AttentionRequired),
        report.count_with_status(Severity::AllGood)
    );

    let detailed: Vec<_> = report
        .source_reports
        .iter()
        .filter(|r| !r.incidents.is_empty() || !r.recommendations.is_empty())
        .collect();
    if detailed.is_empty() {
        return out;
    }

    out.push('\n');
    rule(&mut out, "DETAILED INCIDENTS");
    for source in detailed {
        let _ = writeln!(out, "\nSource: {} ({})", source.source_id, source.status.as_str());
        for incident in &source.incidents {
            let _ = writeln!(
                out,
                "  {:<18} {:<28} {:<30} {}",
                incident.severity.as_str(),
                incident.incident_type.label(),
                incident.file_name.as_deref().unwrap_or("N/A"),
                incident.description
            );
        }
        if !source.recommendations.is_empty() {
            let _ = writeln!(out, "  Recommendations:");
            for line in &source.recommendations {
                let _ = writeln!(out, "  - {}", line);
            }
        }
    }
    out
}
