// Search-based replacement of dead catalog links

use crate::audit::round2;
use crate::domain::{host_of, normalize_text, strip_www, token_overlap_ratio};
use crate::error::{CatalogError, Result};
use crate::model::{CatalogEntry, RecoveryCandidate, RecoveryReason, RecoveryResult};
use relink_scanner::error::describe_error;
use relink_scanner::prober::head_status;
use relink_scanner::result::is_ok_status;
use relink_scanner::{ProbeConfig, ProgressCallback, ProgressUpdate, SearchHit, SearchProvider};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::{Mutex, mpsc};
use tracing::{debug, info, warn};
use url::Url;

/// Tool directories that list the tool rather than host it.
pub const DIRECTORY_DOMAIN_BLACKLIST: &[&str] = &[
    "futurepedia.io",
    "aitoolnet.com",
    "toolify.ai",
    "aipure.ai",
    "theresanaiforthat.com",
    "topai.tools",
    "alternativeto.net",
    "producthunt.com",
];

/// Search failures are recorded as `error:<message>` with the message cut here.
pub const SEARCH_ERROR_CHARS: usize = 80;

const TITLE_WEIGHT: f64 = 0.45;
const DOMAIN_WEIGHT: f64 = 0.35;
const OVERLAP_WEIGHT: f64 = 0.20;
const HOMEPAGE_WEIGHT: f64 = 0.05;

#[derive(Debug, Clone)]
pub struct RecoveryOptions {
    pub workers: usize,
    pub candidate_limit: usize,
    pub min_confidence: f64,
    /// Cap on the number of targets, 0 for no cap.
    pub max_rows: usize,
    pub progress_every: usize,
    /// Timeout for the liveness HEAD on each candidate.
    pub liveness_timeout: Duration,
}

impl Default for RecoveryOptions {
    fn default() -> Self {
        Self {
            workers: 10,
            candidate_limit: 5,
            min_confidence: 0.62,
            max_rows: 0,
            progress_every: 50,
            liveness_timeout: Duration::from_secs(12),
        }
    }
}

impl RecoveryOptions {
    pub fn validate(&self) -> Result<()> {
        if self.workers == 0 {
            return Err(CatalogError::InvalidConfig(
                "recovery needs at least one worker".to_string(),
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(CatalogError::InvalidConfig(format!(
                "min confidence {} is outside [0, 1]",
                self.min_confidence
            )));
        }
        Ok(())
    }
}

/// A dead link to find a replacement for.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct RecoveryTarget {
    pub tool_name: String,
    pub old_url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoverySummary {
    pub recover_targets: usize,
    pub accepted_replacements: usize,
    pub accept_rate: f64,
    pub elapsed_sec: f64,
}

pub struct RecoveryOutcome {
    /// Accepted first, then by confidence, highest first.
    pub results: Vec<RecoveryResult>,
    pub summary: RecoverySummary,
}

pub fn is_directory_domain(domain: &str) -> bool {
    let lowered = domain.trim().to_lowercase();
    DIRECTORY_DOMAIN_BLACKLIST.contains(&strip_www(&lowered))
}

/// Confidence that a search hit is the official homepage of `tool_name`.
pub fn score_candidate(tool_name: &str, title: &str, domain: &str, url: &str) -> f64 {
    let tool = normalize_text(tool_name);
    let title = normalize_text(title);
    let domain_text = normalize_text(domain);
    let mut score = 0.0;

    if !tool.is_empty() && title.contains(&tool) {
        score += TITLE_WEIGHT;
    }
    if !tool.is_empty() && domain_text.replace(' ', "").contains(&tool.replace(' ', "")) {
        score += DOMAIN_WEIGHT;
    }
    score += (OVERLAP_WEIGHT * token_overlap_ratio(tool_name, domain)).min(OVERLAP_WEIGHT);

    let path = Url::parse(url).map(|u| u.path().to_string()).unwrap_or_default();
    if path.is_empty() || path == "/" {
        score += HOMEPAGE_WEIGHT;
    }

    score.clamp(0.0, 1.0)
}

/// Non-ok rows, unique by `(name, url)` in first-seen order, capped at
/// `max_rows` when it is non-zero.
pub fn recovery_targets(entries: &[CatalogEntry], max_rows: usize) -> Vec<RecoveryTarget> {
    let mut seen = HashSet::new();
    let targets = entries
        .iter()
        .filter(|e| !e.is_ok())
        .map(|e| RecoveryTarget {
            tool_name: e.name.clone(),
            old_url: e.url.clone(),
        })
        .filter(|t| seen.insert(t.clone()));

    if max_rows > 0 {
        targets.take(max_rows).collect()
    } else {
        targets.collect()
    }
}

pub fn sort_results(results: &mut [RecoveryResult]) {
    results.sort_by(|a, b| {
        b.accepted
            .cmp(&a.accepted)
            .then(b.confidence.total_cmp(&a.confidence))
    });
}

pub fn summarize(results: &[RecoveryResult], elapsed: Duration) -> RecoverySummary {
    let accepted = results.iter().filter(|r| r.accepted).count();
    let accept_rate = if results.is_empty() {
        0.0
    } else {
        ((accepted as f64 / results.len() as f64) * 10_000.0).round() / 10_000.0
    };
    RecoverySummary {
        recover_targets: results.len(),
        accepted_replacements: accepted,
        accept_rate,
        elapsed_sec: round2(elapsed.as_secs_f64()),
    }
}

/// Runs recovery attempts against a search collaborator.
pub struct Recoverer<S: SearchProvider> {
    search: Arc<S>,
    client: Client,
    options: RecoveryOptions,
}

impl<S: SearchProvider> Clone for Recoverer<S> {
    fn clone(&self) -> Self {
        Self {
            search: self.search.clone(),
            client: self.client.clone(),
            options: self.options.clone(),
        }
    }
}

impl<S: SearchProvider + 'static> Recoverer<S> {
    pub fn new(search: S, options: RecoveryOptions) -> Result<Self> {
        options.validate()?;
        let liveness = ProbeConfig {
            concurrency: options.workers,
            total_timeout: options.liveness_timeout,
            ..ProbeConfig::default()
        };
        let client = liveness.build_client()?;
        Ok(Self::with_client(search, client, options))
    }

    pub fn with_client(search: S, client: Client, options: RecoveryOptions) -> Self {
        Self {
            search: Arc::new(search),
            client,
            options,
        }
    }

    /// Exactly one result for one dead link. Never fails: search errors become
    /// an `error:` reason.
    pub async fn recover_one(&self, target: &RecoveryTarget) -> RecoveryResult {
        let RecoveryTarget { tool_name, old_url } = target;
        match self
            .search
            .search_official_site(tool_name, self.options.candidate_limit)
            .await
        {
            Err(e) => {
                warn!("Search for '{}' failed: {}", tool_name, e);
                RecoveryResult::empty(
                    tool_name,
                    old_url,
                    RecoveryReason::Error(describe_error(&e, SEARCH_ERROR_CHARS)),
                )
            }
            Ok(hits) if hits.is_empty() => {
                RecoveryResult::empty(tool_name, old_url, RecoveryReason::NoSearchResult)
            }
            Ok(hits) => self.choose_replacement(tool_name, old_url, hits).await,
        }
    }

    /// Walk the hits in order, returning the first accepted one. Falls back to
    /// the best live hit seen, or `no_candidate` when none was live.
    pub async fn choose_replacement(
        &self,
        tool_name: &str,
        old_url: &str,
        hits: Vec<SearchHit>,
    ) -> RecoveryResult {
        let old_host = host_of(old_url);
        let old_domain = strip_www(&old_host);
        let mut best: Option<RecoveryResult> = None;

        for hit in hits {
            let domain = hit.domain.trim().to_lowercase();
            if strip_www(&domain) == old_domain || is_directory_domain(&domain) {
                continue;
            }

            let status = head_status(&self.client, &hit.url).await;
            if !is_ok_status(status) {
                debug!("Candidate {} for '{}' is not live ({})", hit.url, tool_name, status);
                continue;
            }

            let candidate = RecoveryCandidate {
                confidence: score_candidate(tool_name, &hit.title, &domain, &hit.url),
                url: hit.url,
                domain,
                title: hit.title,
            };
            let result = RecoveryResult::from_candidate(
                tool_name,
                old_url,
                &candidate,
                status,
                self.options.min_confidence,
            );
            if result.accepted {
                return result;
            }
            if best
                .as_ref()
                .is_none_or(|b| result.confidence > b.confidence)
            {
                best = Some(result);
            }
        }

        best.unwrap_or_else(|| {
            RecoveryResult::empty(tool_name, old_url, RecoveryReason::NoCandidate)
        })
    }

    /// Fixed pool of workers pulling targets from a shared queue. Completion
    /// is counted on the receiving end of the result channel.
    pub async fn recover_all(
        &self,
        targets: Vec<RecoveryTarget>,
        progress_callback: Option<ProgressCallback>,
    ) -> Vec<RecoveryResult> {
        let total = targets.len();
        if total == 0 {
            return Vec::new();
        }
        let workers = self.options.workers.clamp(1, total);
        info!("Recovering {} links with {} workers", total, workers);

        let started = Instant::now();
        let queue = Arc::new(Mutex::new(VecDeque::from(targets.clone())));
        let (tx, mut rx) = mpsc::unbounded_channel();

        let mut handles = Vec::with_capacity(workers);
        for worker_id in 0..workers {
            let recoverer = self.clone();
            let queue = queue.clone();
            let tx = tx.clone();

            handles.push(tokio::spawn(async move {
                debug!("Worker {} started", worker_id);
                loop {
                    let next = {
                        let mut queue = queue.lock().await;
                        queue.pop_front()
                    };
                    let Some(target) = next else {
                        break;
                    };
                    let result = recoverer.recover_one(&target).await;
                    if tx.send(result).is_err() {
                        break;
                    }
                }
                debug!("Worker {} exiting", worker_id);
            }));
        }
        drop(tx);

        let mut results = Vec::with_capacity(total);
        while let Some(result) = rx.recv().await {
            results.push(result);
            let completed = results.len();
            if let Some(ref cb) = progress_callback
                && ProgressUpdate::is_due(completed, total, self.options.progress_every)
            {
                cb(ProgressUpdate {
                    completed,
                    total,
                    elapsed: started.elapsed(),
                });
            }
        }

        for handle in futures::future::join_all(handles).await {
            if let Err(e) = handle {
                warn!("Recovery worker failed: {}", e);
            }
        }

        // A worker that died mid-item takes its target with it.
        if results.len() < total {
            let answered: HashSet<(String, String)> = results
                .iter()
                .map(|r| (r.tool_name.clone(), r.old_url.clone()))
                .collect();
            for target in targets {
                if !answered.contains(&(target.tool_name.clone(), target.old_url.clone())) {
                    results.push(RecoveryResult::empty(
                        &target.tool_name,
                        &target.old_url,
                        RecoveryReason::Error("worker task failed".to_string()),
                    ));
                }
            }
        }

        results
    }
}

/// Recover every non-ok row of an audited catalog.
pub async fn execute_recovery<S: SearchProvider + 'static>(
    entries: &[CatalogEntry],
    search: S,
    options: RecoveryOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<RecoveryOutcome> {
    let started = Instant::now();
    let targets = recovery_targets(entries, options.max_rows);
    let recoverer = Recoverer::new(search, options)?;

    let mut results = recoverer.recover_all(targets, progress_callback).await;
    sort_results(&mut results);
    let summary = summarize(&results, started.elapsed());

    Ok(RecoveryOutcome { results, summary })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::Verdict;
    use relink_scanner::ScanError;
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    /// Canned answers keyed by tool name.
    struct StaticSearch {
        answers: HashMap<String, std::result::Result<Vec<SearchHit>, String>>,
    }

    impl StaticSearch {
        fn new() -> Self {
            Self {
                answers: HashMap::new(),
            }
        }

        fn hits(mut self, name: &str, hits: Vec<SearchHit>) -> Self {
            self.answers.insert(name.to_string(), Ok(hits));
            self
        }

        fn failure(mut self, name: &str, message: &str) -> Self {
            self.answers
                .insert(name.to_string(), Err(message.to_string()));
            self
        }
    }

    impl SearchProvider for StaticSearch {
        async fn search_official_site(
            &self,
            name: &str,
            limit: usize,
        ) -> relink_scanner::error::Result<Vec<SearchHit>> {
            match self.answers.get(name) {
                Some(Ok(hits)) => Ok(hits.iter().take(limit).cloned().collect()),
                Some(Err(message)) => Err(ScanError::Other(message.clone())),
                None => Ok(Vec::new()),
            }
        }
    }

    fn hit(url: &str, title: &str) -> SearchHit {
        SearchHit {
            url: url.to_string(),
            domain: host_of(url),
            title: title.to_string(),
        }
    }

    fn recoverer(search: StaticSearch, options: RecoveryOptions) -> Recoverer<StaticSearch> {
        Recoverer::with_client(search, Client::new(), options)
    }

    fn target(name: &str, url: &str) -> RecoveryTarget {
        RecoveryTarget {
            tool_name: name.to_string(),
            old_url: url.to_string(),
        }
    }

    #[test]
    fn test_widgetai_scores_high() {
        let score = score_candidate(
            "WidgetAI",
            "WidgetAI – Official Site",
            "widgetai.com",
            "https://widgetai.com/",
        );
        assert!(score >= 0.80, "score was {}", score);
        assert!(score <= 1.0);
    }

    #[test]
    fn test_score_rewards_homepage_only_a_little() {
        let deep = score_candidate("Acme", "Unrelated", "other.com", "https://other.com/acme");
        let root = score_candidate("Acme", "Unrelated", "other.com", "https://other.com/");
        assert_eq!(deep, 0.0);
        assert!((root - HOMEPAGE_WEIGHT).abs() < 1e-9);
    }

    #[test]
    fn test_score_never_drops_as_signals_are_added() {
        // (title, domain, url), each row adding one signal to the previous
        let steps = [
            ("Unrelated", "other.com", "https://other.com/deep"),
            ("WidgetAI Official Site", "other.com", "https://other.com/deep"),
            ("WidgetAI Official Site", "getwidgetai.com", "https://getwidgetai.com/deep"),
            ("WidgetAI Official Site", "widgetai.com", "https://widgetai.com/deep"),
            ("WidgetAI Official Site", "widgetai.com", "https://widgetai.com/"),
        ];

        let mut previous = 0.0;
        for (title, domain, url) in steps {
            let score = score_candidate("WidgetAI", title, domain, url);
            assert!((0.0..=1.0).contains(&score), "{} out of range for {}", score, url);
            assert!(score >= previous, "{} dropped below {} for {}", score, previous, url);
            previous = score;
        }
        assert_eq!(previous, 1.0);
    }

    #[test]
    fn test_directory_domains() {
        assert!(is_directory_domain("futurepedia.io"));
        assert!(is_directory_domain("www.ProductHunt.com"));
        assert!(!is_directory_domain("acme.io"));
    }

    #[test]
    fn test_recovery_targets_skip_ok_rows_and_dedupe() {
        let mut ok = CatalogEntry::new("Fine", "x", "https://fine.io");
        ok.verdict = Some(Verdict::Verified);
        let mut dead = CatalogEntry::new("Dead", "x", "https://dead.io");
        dead.verdict = Some(Verdict::Invalid);
        let mut parked = CatalogEntry::new("Parked", "x", "https://parked.io");
        parked.verdict = Some(Verdict::Placeholder);

        let entries = vec![ok, dead.clone(), dead, parked];
        let targets = recovery_targets(&entries, 0);
        assert_eq!(
            targets,
            vec![target("Dead", "https://dead.io"), target("Parked", "https://parked.io")]
        );
        assert_eq!(recovery_targets(&entries, 1).len(), 1);
    }

    #[test]
    fn test_sort_results_accepted_first_then_confidence() {
        let mut low = RecoveryResult::empty("A", "a", RecoveryReason::LowConfidence);
        low.confidence = 0.5;
        let mut accepted = RecoveryResult::empty("B", "b", RecoveryReason::Accepted);
        accepted.confidence = 0.7;
        accepted.accepted = true;
        let none = RecoveryResult::empty("C", "c", RecoveryReason::NoCandidate);

        let mut results = vec![none, low, accepted];
        sort_results(&mut results);
        let names: Vec<&str> = results.iter().map(|r| r.tool_name.as_str()).collect();
        assert_eq!(names, vec!["B", "A", "C"]);
    }

    #[tokio::test]
    async fn test_no_search_result() {
        let recoverer = recoverer(StaticSearch::new(), RecoveryOptions::default());
        let result = recoverer.recover_one(&target("Ghost", "https://ghost.io")).await;
        assert_eq!(result.reason, RecoveryReason::NoSearchResult);
        assert_eq!(result.http_status, -1);
        assert!(!result.accepted);
    }

    #[tokio::test]
    async fn test_search_error_is_truncated() {
        let search = StaticSearch::new().failure("Flaky", &"rate limited ".repeat(20));
        let recoverer = recoverer(search, RecoveryOptions::default());
        let result = recoverer.recover_one(&target("Flaky", "https://flaky.io")).await;

        let RecoveryReason::Error(message) = &result.reason else {
            panic!("expected an error reason, got {}", result.reason);
        };
        assert!(message.chars().count() <= SEARCH_ERROR_CHARS);
        assert!(result.reason.to_string().starts_with("error:"));
    }

    #[tokio::test]
    async fn test_old_domain_and_directories_are_never_candidates() {
        let search = StaticSearch::new().hits(
            "Acme",
            vec![
                hit("https://acme.io/", "Acme"),
                hit("https://www.futurepedia.io/tool/acme", "Acme on Futurepedia"),
            ],
        );
        let recoverer = recoverer(search, RecoveryOptions::default());
        let result = recoverer.recover_one(&target("Acme", "https://www.acme.io/old")).await;
        assert_eq!(result.reason, RecoveryReason::NoCandidate);
        assert!(result.candidate_url.is_empty());
    }

    #[tokio::test]
    async fn test_dead_candidates_are_skipped() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let url = format!("{}/", server.uri());
        let search = StaticSearch::new().hits("Acme Writer", vec![hit(&url, "Acme Writer")]);
        let recoverer = recoverer(search, RecoveryOptions::default());
        let result = recoverer
            .recover_one(&target("Acme Writer", "https://gone.example"))
            .await;
        assert_eq!(result.reason, RecoveryReason::NoCandidate);
    }

    #[tokio::test]
    async fn test_live_candidate_below_threshold_is_low_confidence() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let url = format!("{}/", server.uri());
        let search = StaticSearch::new().hits(
            "Acme Writer",
            vec![hit(&url, "Acme Writer - Official Site")],
        );
        let recoverer = recoverer(search, RecoveryOptions::default());
        let result = recoverer
            .recover_one(&target("Acme Writer", "https://gone.example"))
            .await;

        assert_eq!(result.reason, RecoveryReason::LowConfidence);
        assert!(!result.accepted);
        assert_eq!(result.http_status, 200);
        assert_eq!(result.candidate_url, url);
        assert!((result.confidence - 0.5).abs() < 1e-9);
    }

    #[tokio::test]
    async fn test_official_homepage_is_accepted() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .and(path("/"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let url = format!("{}/", server.uri());
        let official = SearchHit {
            url: url.clone(),
            domain: "widgetai.com".to_string(),
            title: "WidgetAI - Official Site".to_string(),
        };
        let search = StaticSearch::new().hits("WidgetAI", vec![official]);
        let recoverer = recoverer(search, RecoveryOptions::default());
        let result = recoverer
            .recover_one(&target("WidgetAI", "https://old-widget.example/home"))
            .await;

        assert_eq!(result.reason, RecoveryReason::Accepted);
        assert!(result.accepted);
        assert!(result.confidence >= RecoveryOptions::default().min_confidence);
        assert_eq!(result.candidate_url, url);
        assert_eq!(result.candidate_domain, "widgetai.com");
        assert_eq!(result.http_status, 200);
    }

    #[tokio::test]
    async fn test_first_accepted_candidate_wins() {
        let server = MockServer::start().await;
        Mock::given(method("HEAD"))
            .respond_with(ResponseTemplate::new(200))
            .mount(&server)
            .await;

        let first = format!("{}/", server.uri());
        let second = format!("{}/other", server.uri());
        let search = StaticSearch::new().hits(
            "Acme Writer",
            vec![
                hit(&first, "Acme Writer - Official Site"),
                hit(&second, "Acme Writer"),
            ],
        );
        let options = RecoveryOptions {
            min_confidence: 0.4,
            ..RecoveryOptions::default()
        };
        let recoverer = recoverer(search, options);
        let result = recoverer
            .recover_one(&target("Acme Writer", "https://gone.example"))
            .await;

        assert_eq!(result.reason, RecoveryReason::Accepted);
        assert!(result.accepted);
        assert_eq!(result.candidate_url, first);
        assert!(result.confidence >= 0.4);
        assert!(is_ok_status(result.http_status));
    }

    #[tokio::test]
    async fn test_recover_all_answers_every_target_once() {
        let search = StaticSearch::new().failure("B", "boom");
        let options = RecoveryOptions {
            workers: 3,
            progress_every: 2,
            ..RecoveryOptions::default()
        };
        let recoverer = recoverer(search, options);

        let seen = Arc::new(AtomicUsize::new(0));
        let seen_cb = seen.clone();
        let callback: ProgressCallback = Arc::new(move |update: ProgressUpdate| {
            seen_cb.store(update.completed, Ordering::SeqCst);
        });

        let targets: Vec<RecoveryTarget> = ["A", "B", "C", "D", "E"]
            .iter()
            .map(|name| target(name, &format!("https://{}.io", name.to_lowercase())))
            .collect();
        let results = recoverer.recover_all(targets, Some(callback)).await;

        assert_eq!(results.len(), 5);
        let names: HashSet<&str> = results.iter().map(|r| r.tool_name.as_str()).collect();
        assert_eq!(names.len(), 5);
        assert_eq!(seen.load(Ordering::SeqCst), 5);

        let summary = summarize(&results, Duration::from_millis(10));
        assert_eq!(summary.recover_targets, 5);
        assert_eq!(summary.accepted_replacements, 0);
        assert_eq!(summary.accept_rate, 0.0);
    }

    #[test]
    fn test_options_validation() {
        assert!(RecoveryOptions::default().validate().is_ok());
        let bad = RecoveryOptions {
            min_confidence: 1.5,
            ..RecoveryOptions::default()
        };
        assert!(bad.validate().is_err());
    }
}
