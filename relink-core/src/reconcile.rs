// Merge audited, recovered and discovered tools into one canonical catalog

use crate::domain::{
    canonical_homepage, host_of, is_tracking_domain, name_domain_match_score, root_domain, slugify,
};
use crate::model::{CanonicalEntry, CatalogEntry, DiscoveredTool, RecoveryResult, Verdict};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeSet, HashMap, HashSet};
use tracing::{debug, info};

#[derive(Debug, Clone, Default)]
pub struct ReconcileOptions {
    /// Legacy rows whose name/domain score is at or below this are dropped.
    pub drop_mismatch_score: f64,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReconcileStats {
    pub final_tool_count: usize,
    pub recovered_links_used: usize,
    pub new_scraped_tools_merged: usize,
    pub legacy_mismatch_rows_dropped: usize,
    pub blacklisted_rows_dropped: usize,
    pub unusable_rows_dropped: usize,
    pub duplicates_dropped: usize,
    pub categories: usize,
}

pub struct Reconciliation {
    /// Sorted by name.
    pub catalog: Vec<CanonicalEntry>,
    pub stats: ReconcileStats,
}

/// Pure merge of the three input streams. Same inputs, same output.
///
/// Postconditions: every entry has a trusted verdict, and domain roots and
/// slugs are unique across the catalog.
pub fn reconcile(
    legacy: &[CatalogEntry],
    recoveries: &[RecoveryResult],
    discovered: &[DiscoveredTool],
    options: &ReconcileOptions,
) -> Reconciliation {
    let mut stats = ReconcileStats::default();

    let mut accepted: HashMap<(&str, &str), &RecoveryResult> = HashMap::new();
    for recovery in recoveries.iter().filter(|r| r.accepted) {
        accepted
            .entry((recovery.tool_name.trim(), recovery.old_url.trim()))
            .or_insert(recovery);
    }

    let mut rows = Vec::with_capacity(legacy.len() + discovered.len());
    for entry in legacy {
        let name = entry.name.trim();
        let original_url = entry.url.trim();
        let mut link = entry.effective_url().trim().to_string();
        let mut verdict = entry.verdict;
        let mut confidence = entry.recovered_confidence;

        if let Some(recovery) = accepted.get(&(name, original_url)) {
            link = recovery.candidate_url.trim().to_string();
            verdict = Some(Verdict::Recovered);
            confidence = Some(recovery.confidence);
            stats.recovered_links_used += 1;
        }

        let Some(verdict) = verdict.filter(Verdict::is_trusted) else {
            continue;
        };

        let url = canonical_homepage(&link);
        let domain = host_of(&url);
        if domain.is_empty() || name.is_empty() {
            stats.unusable_rows_dropped += 1;
            continue;
        }
        if is_tracking_domain(&domain) {
            stats.blacklisted_rows_dropped += 1;
            continue;
        }
        if verdict.is_legacy() {
            let (score, tokens) = name_domain_match_score(name, &domain);
            if tokens > 0 && score <= options.drop_mismatch_score {
                debug!("Dropping '{}' ({}): name does not match domain", name, domain);
                stats.legacy_mismatch_rows_dropped += 1;
                continue;
            }
        }

        rows.push(CanonicalEntry {
            slug: slugify(name),
            name: name.to_string(),
            category: entry.category.trim().to_string(),
            tags: entry.tags.trim().to_string(),
            description: entry.description.trim().to_string(),
            url,
            domain,
            verdict,
            recovered_confidence: if verdict == Verdict::Recovered {
                confidence
            } else {
                None
            },
        });
    }

    let mut discovered_roots = HashSet::new();
    for tool in discovered {
        let name = tool.name.trim();
        let url = canonical_homepage(&tool.url);
        let domain = host_of(&url);
        if name.is_empty() || domain.is_empty() {
            stats.unusable_rows_dropped += 1;
            continue;
        }
        if is_tracking_domain(&domain) {
            stats.blacklisted_rows_dropped += 1;
            continue;
        }
        if !discovered_roots.insert(root_domain(&domain)) {
            stats.duplicates_dropped += 1;
            continue;
        }
        let category = tool.category.trim().to_string();
        rows.push(CanonicalEntry {
            slug: slugify(name),
            name: name.to_string(),
            tags: category.clone(),
            category,
            description: tool.description.trim().to_string(),
            url,
            domain,
            verdict: Verdict::ScrapedVerified,
            recovered_confidence: None,
        });
        stats.new_scraped_tools_merged += 1;
    }

    let before = rows.len();
    let mut catalog = dedupe(rows);
    stats.duplicates_dropped += before - catalog.len();

    catalog.sort_by(|a, b| a.name.cmp(&b.name));
    stats.final_tool_count = catalog.len();
    stats.categories = catalog
        .iter()
        .map(|e| e.category.as_str())
        .collect::<BTreeSet<_>>()
        .len();

    info!(
        "Reconciled {} tools ({} recovered links, {} new)",
        stats.final_tool_count, stats.recovered_links_used, stats.new_scraped_tools_merged
    );
    Reconciliation { catalog, stats }
}

/// Priority sort followed by keep-first passes over `(name, domain)`, the
/// slug and the domain root.
fn dedupe(mut rows: Vec<CanonicalEntry>) -> Vec<CanonicalEntry> {
    rows.sort_by(|a, b| {
        a.verdict
            .rank()
            .cmp(&b.verdict.rank())
            .then_with(|| a.name.cmp(&b.name))
    });

    let mut by_name_domain = HashSet::new();
    let mut by_slug = HashSet::new();
    let mut by_root = HashSet::new();
    rows.into_iter()
        .filter(|e| by_name_domain.insert((e.name.clone(), e.domain.clone())))
        .filter(|e| by_slug.insert(e.slug.clone()))
        .filter(|e| by_root.insert(root_domain(&e.domain)))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::RecoveryReason;

    fn audited(name: &str, url: &str, verdict: Verdict) -> CatalogEntry {
        let mut entry = CatalogEntry::new(name, "writing", url);
        entry.verdict = Some(verdict);
        entry
    }

    #[test]
    fn test_invalid_rows_without_recovery_are_dropped() {
        let legacy = vec![
            audited("Acme", "https://acme.io/", Verdict::Verified),
            audited("Dead", "https://dead.io/", Verdict::Invalid),
            audited("Parked", "https://parked.io/", Verdict::Placeholder),
        ];
        let out = reconcile(&legacy, &[], &[], &ReconcileOptions::default());
        assert_eq!(out.catalog.len(), 1);
        assert_eq!(out.catalog[0].name, "Acme");
    }

    #[test]
    fn test_accepted_recovery_switches_link_and_verdict() {
        let legacy = vec![audited("Dead Tool", "https://old.io/x", Verdict::Invalid)];
        let recovery = RecoveryResult {
            tool_name: "Dead Tool".to_string(),
            old_url: "https://old.io/x".to_string(),
            candidate_url: "https://deadtool.com/home".to_string(),
            candidate_domain: "deadtool.com".to_string(),
            http_status: 200,
            confidence: 0.8,
            accepted: true,
            reason: RecoveryReason::Accepted,
        };
        let rejected = RecoveryResult {
            accepted: false,
            reason: RecoveryReason::LowConfidence,
            ..recovery.clone()
        };

        let out = reconcile(&legacy, &[recovery], &[], &ReconcileOptions::default());
        assert_eq!(out.catalog.len(), 1);
        let entry = &out.catalog[0];
        assert_eq!(entry.url, "https://deadtool.com/");
        assert_eq!(entry.verdict, Verdict::Recovered);
        assert_eq!(entry.recovered_confidence, Some(0.8));
        assert_eq!(out.stats.recovered_links_used, 1);

        let out = reconcile(&legacy, &[rejected], &[], &ReconcileOptions::default());
        assert!(out.catalog.is_empty());
    }

    #[test]
    fn test_final_url_is_preferred_for_legacy_rows() {
        let mut entry = audited("Acme", "http://acme.io/pricing", Verdict::Verified);
        entry.final_url = Some("https://www.acme.io/en/pricing".to_string());
        let out = reconcile(&[entry], &[], &[], &ReconcileOptions::default());
        assert_eq!(out.catalog[0].url, "https://www.acme.io/");
        assert_eq!(out.catalog[0].domain, "www.acme.io");
    }

    #[test]
    fn test_discovered_rows_are_unique_by_root() {
        let tool = |name: &str, url: &str| DiscoveredTool {
            name: name.to_string(),
            heading: "Developer Tools".to_string(),
            category: "code assistant".to_string(),
            description: String::new(),
            domain: host_of(url),
            url: url.to_string(),
            score: 1.0,
            source: "test".to_string(),
            status: Some(200),
        };
        let discovered = vec![
            tool("Zeta", "https://zeta.io/"),
            tool("Zeta Docs", "https://docs.zeta.io/"),
        ];
        let out = reconcile(&[], &[], &discovered, &ReconcileOptions::default());
        assert_eq!(out.catalog.len(), 1);
        assert_eq!(out.catalog[0].verdict, Verdict::ScrapedVerified);
        assert_eq!(out.catalog[0].tags, "code assistant");
        assert_eq!(out.stats.new_scraped_tools_merged, 1);
        assert_eq!(out.stats.duplicates_dropped, 1);
    }
}
