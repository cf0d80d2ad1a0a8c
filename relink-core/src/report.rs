// Human-readable and JSON run reports

use crate::audit::AuditSummary;
use crate::discover::DiscoverySummary;
use crate::model::RecoveryResult;
use crate::reconcile::ReconcileStats;
use crate::recover::RecoverySummary;
use colored::Colorize;
use relink_scanner::{PageSample, ProbeResult};
use serde::Serialize;
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";

/// Failed URLs listed in the text audit report.
const MAX_LISTED_FAILURES: usize = 25;

fn section(report: &mut String, title: &str) {
    report.push_str(RULE);
    report.push('\n');
    report.push_str(title);
    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");
}

fn status_label(status: i32) -> String {
    let label = status.to_string();
    match status {
        200..=299 => label.green().to_string(),
        300..=399 => label.cyan().to_string(),
        400..=499 => label.yellow().to_string(),
        500..=599 => label.red().to_string(),
        _ => label.dimmed().to_string(),
    }
}

pub fn generate_audit_report(summary: &AuditSummary, results: &[ProbeResult]) -> String {
    let mut report = String::new();
    section(&mut report, "# Link audit");

    report.push_str(&format!("  Rows:         {}\n", summary.rows));
    report.push_str(&format!("  Unique URLs:  {}\n", summary.unique_urls));
    report.push_str(&format!("  Live URLs:    {}\n", summary.ok_urls));
    report.push_str(&format!("  Dead URLs:    {}\n", summary.bad_urls));
    report.push_str(&format!("  Live rows:    {}\n", summary.ok_rows));
    report.push_str(&format!("  Dead rows:    {}\n", summary.bad_rows));
    report.push_str(&format!("  Elapsed:      {:.2}s\n\n", summary.elapsed_sec));

    let mut by_status: BTreeMap<i32, usize> = BTreeMap::new();
    for result in results {
        *by_status.entry(result.status).or_default() += 1;
    }
    if !by_status.is_empty() {
        report.push_str("## Status breakdown\n");
        for (status, count) in &by_status {
            report.push_str(&format!("  {}  {}\n", status_label(*status), count));
        }
        report.push('\n');
    }

    let failures: Vec<&ProbeResult> = results.iter().filter(|r| !r.ok).collect();
    if !failures.is_empty() {
        report.push_str("## Dead links\n");
        for result in failures.iter().take(MAX_LISTED_FAILURES) {
            let mut line = format!("  {} {} {}", status_label(result.status), result.method, result.url);
            if let Some(ref error) = result.error {
                line.push_str(&format!(" {}", error.dimmed()));
            }
            report.push_str(&line);
            report.push('\n');
        }
        if failures.len() > MAX_LISTED_FAILURES {
            report.push_str(&format!("  ... and {} more\n", failures.len() - MAX_LISTED_FAILURES));
        }
        report.push('\n');
    }

    report
}

pub fn generate_placeholder_report(samples: &[PageSample], demoted: usize) -> String {
    let mut report = String::new();
    section(&mut report, "# Placeholder pages");

    let flagged: Vec<&PageSample> = samples.iter().filter(|s| s.is_placeholder()).collect();
    report.push_str(&format!("  Pages inspected: {}\n", samples.len()));
    report.push_str(&format!("  Pages flagged:   {}\n", flagged.len()));
    report.push_str(&format!("  Rows demoted:    {}\n\n", demoted));

    for sample in flagged {
        report.push_str(&format!(
            "  {} {}  [{}]\n",
            status_label(sample.status),
            sample.url,
            sample.signatures.join(", ")
        ));
    }
    report
}

pub fn generate_recovery_report(summary: &RecoverySummary, results: &[RecoveryResult]) -> String {
    let mut report = String::new();
    section(&mut report, "# Link recovery");

    report.push_str(&format!("  Targets:      {}\n", summary.recover_targets));
    report.push_str(&format!("  Accepted:     {}\n", summary.accepted_replacements));
    report.push_str(&format!("  Accept rate:  {:.1}%\n", summary.accept_rate * 100.0));
    report.push_str(&format!("  Elapsed:      {:.2}s\n\n", summary.elapsed_sec));

    let mut by_reason: BTreeMap<String, usize> = BTreeMap::new();
    for result in results {
        let key = match result.reason.to_string() {
            reason if reason.starts_with("error:") => "error".to_string(),
            reason => reason,
        };
        *by_reason.entry(key).or_default() += 1;
    }
    if !by_reason.is_empty() {
        report.push_str("## Outcomes\n");
        for (reason, count) in &by_reason {
            report.push_str(&format!("  {:<18} {}\n", reason, count));
        }
        report.push('\n');
    }

    let accepted: Vec<&RecoveryResult> = results.iter().filter(|r| r.accepted).collect();
    if !accepted.is_empty() {
        report.push_str("## Replacements\n");
        for result in accepted {
            report.push_str(&format!(
                "  {:.2}  {}  {} → {}\n",
                result.confidence, result.tool_name, result.old_url, result.candidate_url
            ));
        }
        report.push('\n');
    }

    report
}

pub fn generate_discovery_report(summary: &DiscoverySummary) -> String {
    let mut report = String::new();
    section(&mut report, "# Tool discovery");
    report.push_str(&format!("  Candidates:   {}\n", summary.candidates));
    report.push_str(&format!("  Validated:    {}\n", summary.validated));
    report.push_str(&format!("  Accepted:     {}\n", summary.accepted));
    report.push_str(&format!("  Elapsed:      {:.2}s\n\n", summary.elapsed_sec));
    report
}

pub fn generate_dataset_report(stats: &ReconcileStats) -> String {
    let mut report = String::new();
    section(&mut report, "# Canonical dataset");
    report.push_str(&format!("  Tools:                  {}\n", stats.final_tool_count));
    report.push_str(&format!("  Categories:             {}\n", stats.categories));
    report.push_str(&format!("  Recovered links used:   {}\n", stats.recovered_links_used));
    report.push_str(&format!("  New tools merged:       {}\n", stats.new_scraped_tools_merged));
    report.push_str(&format!("  Name mismatches dropped: {}\n", stats.legacy_mismatch_rows_dropped));
    report.push_str(&format!("  Tracker links dropped:  {}\n", stats.blacklisted_rows_dropped));
    report.push_str(&format!("  Unusable rows dropped:  {}\n", stats.unusable_rows_dropped));
    report.push_str(&format!("  Duplicates dropped:     {}\n\n", stats.duplicates_dropped));
    report
}

/// Wrap a stage summary with generator metadata.
pub fn generate_json_report<T: Serialize>(stage: &str, summary: &T) -> Result<String, serde_json::Error> {
    let json_report = serde_json::json!({
        "metadata": {
            "generator": "relink",
            "version": env!("CARGO_PKG_VERSION"),
            "generated_at": chrono::Utc::now().to_rfc3339(),
            "stage": stage,
        },
        "summary": summary,
    });
    serde_json::to_string_pretty(&json_report)
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecoveryReason;

    #[test]
    fn test_recovery_report_groups_errors() {
        let summary = RecoverySummary {
            recover_targets: 2,
            accepted_replacements: 0,
            accept_rate: 0.0,
            elapsed_sec: 1.0,
        };
        let results = vec![
            RecoveryResult::empty("A", "a", RecoveryReason::Error("timeout".to_string())),
            RecoveryResult::empty("B", "b", RecoveryReason::Error("refused".to_string())),
        ];
        let report = generate_recovery_report(&summary, &results);
        assert!(report.contains("error"));
        assert!(report.contains(" 2\n"));
        assert!(!report.contains("timeout"));
    }

    #[test]
    fn test_audit_report_lists_dead_links_with_errors() {
        colored::control::set_override(false);
        let summary = AuditSummary {
            rows: 1,
            unique_urls: 1,
            ok_urls: 0,
            bad_urls: 1,
            ok_rows: 0,
            bad_rows: 1,
            elapsed_sec: 0.5,
        };
        let results = vec![ProbeResult::with_error(
            "https://gone.example".to_string(),
            "dns error".to_string(),
        )];
        let report = generate_audit_report(&summary, &results);
        assert!(!report.contains('\x1b'));
        assert!(report.contains("## Dead links"));
        assert!(report.contains("https://gone.example dns error"));
    }
}
