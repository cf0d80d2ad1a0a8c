// Link health audit over a whole catalog

use crate::error::Result;
use crate::model::{CatalogEntry, Verdict};
use indicatif::{ProgressBar, ProgressStyle};
use relink_scanner::{ProbeConfig, ProbeResult, Prober, ProgressCallback, ProgressUpdate};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Instant;

/// Options for configuring an audit run
#[derive(Default)]
pub struct AuditOptions {
    pub probe: ProbeConfig,
    pub show_progress_bars: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditSummary {
    pub rows: usize,
    pub unique_urls: usize,
    pub ok_urls: usize,
    pub bad_urls: usize,
    pub ok_rows: usize,
    pub bad_rows: usize,
    pub elapsed_sec: f64,
}

pub struct AuditOutcome {
    /// Input rows in input order, annotated with their probe outcome.
    pub entries: Vec<CatalogEntry>,
    /// One record per unique URL, sorted by URL.
    pub results: Vec<ProbeResult>,
    pub summary: AuditSummary,
}

impl AuditOutcome {
    pub fn invalid_entries(&self) -> impl Iterator<Item = &CatalogEntry> {
        self.entries.iter().filter(|e| !e.is_ok())
    }
}

/// Unique trimmed URLs in first-seen order.
pub fn unique_urls(entries: &[CatalogEntry]) -> Vec<String> {
    let mut seen = HashSet::new();
    entries
        .iter()
        .map(|e| e.url.trim().to_string())
        .filter(|url| seen.insert(url.clone()))
        .collect()
}

/// Copy a probe outcome onto an entry and settle its verdict.
pub fn apply_probe_result(entry: &mut CatalogEntry, result: &ProbeResult) {
    entry.status = Some(result.status);
    entry.final_url = Some(result.final_url.clone());
    entry.method = Some(result.method);
    entry.error = result.error.clone();
    entry.verdict = Some(if result.ok {
        Verdict::Verified
    } else {
        Verdict::Invalid
    });
}

/// Probe every distinct URL of the catalog and join the outcomes back onto
/// the rows.
pub async fn execute_audit(
    entries: Vec<CatalogEntry>,
    options: AuditOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<AuditOutcome> {
    let AuditOptions {
        probe,
        show_progress_bars,
    } = options;

    let started = Instant::now();
    let mut entries: Vec<CatalogEntry> = entries
        .into_iter()
        .map(|mut e| {
            e.url = e.url.trim().to_string();
            e
        })
        .collect();
    let urls = unique_urls(&entries);

    let progress_bar = if show_progress_bars {
        let pb = ProgressBar::new(urls.len() as u64);
        pb.set_style(
            ProgressStyle::default_bar()
                .template("[{bar:40.cyan/blue}] {pos}/{len} links checked {msg}")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );
        Some(pb)
    } else {
        None
    };

    let prober = Prober::new(probe)?.with_progress_callback(batch_progress(
        progress_bar.clone(),
        progress_callback,
    ));
    let mut results = prober.probe_all(urls.clone()).await;
    results.sort_by(|a, b| a.url.cmp(&b.url));

    if let Some(ref pb) = progress_bar {
        pb.finish_with_message("done");
    }

    let by_url: HashMap<&str, &ProbeResult> =
        results.iter().map(|r| (r.url.as_str(), r)).collect();
    for entry in entries.iter_mut() {
        if let Some(result) = by_url.get(entry.url.as_str()) {
            apply_probe_result(entry, result);
        }
    }

    let ok_urls = results.iter().filter(|r| r.ok).count();
    let ok_rows = entries.iter().filter(|e| e.is_ok()).count();
    let summary = AuditSummary {
        rows: entries.len(),
        unique_urls: urls.len(),
        ok_urls,
        bad_urls: results.len() - ok_urls,
        ok_rows,
        bad_rows: entries.len() - ok_rows,
        elapsed_sec: round2(started.elapsed().as_secs_f64()),
    };

    Ok(AuditOutcome {
        entries,
        results,
        summary,
    })
}

/// Fan a scanner progress update out to an optional bar and an optional
/// caller callback.
pub(crate) fn batch_progress(
    progress_bar: Option<ProgressBar>,
    callback: Option<ProgressCallback>,
) -> ProgressCallback {
    Arc::new(move |update: ProgressUpdate| {
        if let Some(ref pb) = progress_bar {
            pb.set_position(update.completed as u64);
        }
        if let Some(ref cb) = callback {
            cb(update);
        }
    })
}

pub(crate) fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
