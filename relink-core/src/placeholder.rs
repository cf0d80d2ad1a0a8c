// Second-pass audit that demotes reachable links serving parking or default pages

use crate::audit::batch_progress;
use crate::error::Result;
use crate::model::{CatalogEntry, Verdict};
use relink_scanner::{PageSample, ProbeConfig, Prober, ProgressCallback};
use std::collections::HashMap;
use tracing::info;

pub struct PlaceholderOptions {
    pub probe: ProbeConfig,
    /// Inspect every row instead of only the ones currently verified.
    pub include_unverified: bool,
}

impl Default for PlaceholderOptions {
    fn default() -> Self {
        Self {
            probe: ProbeConfig::inspection(),
            include_unverified: false,
        }
    }
}

pub struct PlaceholderOutcome {
    pub entries: Vec<CatalogEntry>,
    pub samples: Vec<PageSample>,
    pub demoted: usize,
}

impl PlaceholderOutcome {
    pub fn flagged_samples(&self) -> impl Iterator<Item = &PageSample> {
        self.samples.iter().filter(|s| s.is_placeholder())
    }
}

/// Demote an entry whose page carries placeholder signatures. Returns true
/// when the entry changed verdict.
pub fn apply_page_sample(entry: &mut CatalogEntry, sample: &PageSample) -> bool {
    if sample.signatures.is_empty() {
        return false;
    }
    entry.signature_hits = Some(sample.signatures.join("|"));
    if !sample.final_url.is_empty() {
        entry.final_url = Some(sample.final_url.clone());
    }
    let was = entry.verdict;
    entry.verdict = Some(Verdict::Placeholder);
    was != entry.verdict
}

pub async fn execute_placeholder_audit(
    entries: Vec<CatalogEntry>,
    options: PlaceholderOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<PlaceholderOutcome> {
    let PlaceholderOptions {
        probe,
        include_unverified,
    } = options;

    let mut urls: Vec<String> = entries
        .iter()
        .filter(|e| include_unverified || e.is_ok())
        .map(|e| e.effective_url().to_string())
        .collect();
    urls.sort();
    urls.dedup();
    info!("Inspecting {} pages for placeholder signatures", urls.len());

    let prober = Prober::new(probe)?.with_progress_callback(batch_progress(None, progress_callback));
    let mut samples = prober.inspect_all(urls).await;
    samples.sort_by(|a, b| a.url.cmp(&b.url));

    let mut entries = entries;
    let mut demoted = 0;
    {
        let by_url: HashMap<&str, &PageSample> =
            samples.iter().map(|s| (s.url.as_str(), s)).collect();
        for entry in entries.iter_mut() {
            if !(include_unverified || entry.is_ok()) {
                continue;
            }
            if let Some(sample) = by_url.get(entry.effective_url())
                && apply_page_sample(entry, sample)
            {
                demoted += 1;
            }
        }
    }

    Ok(PlaceholderOutcome {
        entries,
        samples,
        demoted,
    })
}
