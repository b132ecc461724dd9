use crate::metrics::DatasetMetrics;
use crate::model::{RuleOutcome, ValidationReport};

/// Render a deterministic markdown report from a validation run and dataset metrics.
pub fn render_report(
    report: &ValidationReport,
    metrics: &DatasetMetrics,
    max_examples: usize,
) -> String {
    let mut lines = Vec::new();

    lines.push("# regsynth Validation Report".to_string());
    lines.push(String::new());
    lines.push("## Dataset".to_string());
    lines.push(format!("- reference_date: {}", metrics.reference_date));
    lines.push(format!("- seed: {}", metrics.seed));
    lines.push(format!("- catalog_version: {}", metrics.catalog_version));
    if let Some(fingerprint) = &metrics.fingerprint {
        lines.push(format!("- fingerprint: {fingerprint}"));
    }
    lines.push(format!(
        "- persons: {} alive, {} deceased",
        metrics.persons.alive, metrics.persons.deceased
    ));
    lines.push(String::new());

    lines.push("## Tables".to_string());
    lines.push("| table | rows | statuses |".to_string());
    lines.push("| --- | --- | --- |".to_string());
    for table in &metrics.tables {
        let statuses = if table.statuses.is_empty() {
            "-".to_string()
        } else {
            table
                .statuses
                .iter()
                .map(|(status, count)| format!("{status}={count}"))
                .collect::<Vec<_>>()
                .join(", ")
        };
        lines.push(format!("| {} | {} | {} |", table.table, table.rows, statuses));
    }
    lines.push(String::new());

    lines.push("## Rules".to_string());
    lines.push(format!(
        "- run: {}, passed: {}, failed: {}, not run: {}",
        report.rules_run, report.passed, report.failed, report.not_run
    ));
    lines.push(String::new());
    lines.push("| rule | outcome | offenders |".to_string());
    lines.push("| --- | --- | --- |".to_string());
    for result in &report.results {
        lines.push(format!(
            "| {} | {} | {} |",
            result.rule,
            result.outcome.label(),
            result.outcome.offenders().len()
        ));
    }
    lines.push(String::new());

    let failures = report
        .results
        .iter()
        .filter_map(|result| match &result.outcome {
            RuleOutcome::Fail { offenders, message } => Some((result.rule, offenders, message)),
            _ => None,
        })
        .collect::<Vec<_>>();
    if !failures.is_empty() {
        lines.push("## Failures".to_string());
        for (rule, offenders, message) in failures {
            let shown = offenders
                .iter()
                .take(max_examples)
                .map(|row| row.to_string())
                .collect::<Vec<_>>()
                .join(", ");
            let more = offenders.len().saturating_sub(max_examples);
            let suffix = if more > 0 {
                format!(" (+{more} more)")
            } else {
                String::new()
            };
            lines.push(format!("- {rule}: {message}: {shown}{suffix}"));
        }
        lines.push(String::new());
    }

    let skipped = report
        .results
        .iter()
        .filter_map(|result| match &result.outcome {
            RuleOutcome::NotRun { reason } => Some((result.rule, reason)),
            _ => None,
        })
        .collect::<Vec<_>>();
    if !skipped.is_empty() {
        lines.push("## Not run".to_string());
        for (rule, reason) in skipped {
            lines.push(format!("- {rule}: {reason}"));
        }
        lines.push(String::new());
    }

    lines.push("## Recommendations".to_string());
    lines.extend(recommendations(report));
    lines.join("\n")
}

fn recommendations(report: &ValidationReport) -> Vec<String> {
    let mut lines = Vec::new();
    if report.not_run > 0 {
        lines.push("- rules were skipped; check for missing tables, columns or malformed cells.".to_string());
    }
    if report.failed > 0 {
        lines.push("- inspect the offending rows listed above or regenerate the dataset.".to_string());
    }
    if report.is_clean() {
        lines.push("- no violations detected; the dataset satisfies every requested rule.".to_string());
    }
    lines
}
