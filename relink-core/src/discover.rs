// Discovery of new tools from curated markdown listings

use crate::audit::{batch_progress, round2};
use crate::domain::{canonical_homepage, host_of, name_domain_match_score, root_domain, strip_www};
use crate::error::{CatalogError, Result};
use crate::model::DiscoveredTool;
use regex::Regex;
use relink_scanner::result::is_ok_status;
use relink_scanner::{ProbeConfig, Prober, ProgressCallback, ScanError};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;
use std::time::{Duration, Instant};
use tracing::{debug, info, warn};

pub const DEFAULT_SOURCES: &[&str] = &[
    "https://raw.githubusercontent.com/mahseema/awesome-ai-tools/main/README.md",
    "https://raw.githubusercontent.com/tankvn/awesome-ai-tools/master/README.md",
];

/// Domains that never count as a tool's own homepage. Subdomains are blocked too.
pub const BLOCKED_DOMAINS: &[&str] = &[
    "awesome.re",
    "github.com",
    "raw.githubusercontent.com",
    "altern.ai",
    "newsletter.altern.ai",
    "theresanai.com",
    "futurepedia.io",
    "toolify.ai",
    "aitoolnet.com",
    "aipure.ai",
    "theresanaiforthat.com",
    "topai.tools",
    "alternativeto.net",
    "youtube.com",
    "x.com",
    "twitter.com",
    "linkedin.com",
    "facebook.com",
    "instagram.com",
    "discord.gg",
    "reddit.com",
    "huggingface.co",
    "ai.meta.com",
    "ai.facebook.com",
    "deepmind.com",
    "docs.google.com",
    "chrome.google.com",
    "workspace.google.com",
    "apps.apple.com",
    "play.google.com",
    "wikipedia.org",
];

const SKIP_SECTION_PATTERNS: &[&str] = &["learning resources", "extensions", "models"];
const BAD_URL_PATTERNS: &[&str] = &["utm_", "?ref=", "&ref=", "badge-flat.svg"];

/// Heading fragment → catalog category. First match wins.
const HEADING_CATEGORIES: &[(&str, &str)] = &[
    ("text", "writing generators"),
    ("chatbots", "ai chatbots"),
    ("search engines", "search engine"),
    ("writing assistants", "writing generators"),
    ("productivity", "personal assistant"),
    ("meeting assistants", "meeting assistant"),
    ("customer support", "customer support"),
    ("developer tools", "code assistant"),
    ("code with ai", "code assistant"),
    ("image generator", "image generators"),
    ("generative ai images", "image generators"),
    ("generative ai video", "video generators"),
    ("generative ai audio", "audio generators"),
    ("marketing ai tools", "marketing"),
    ("startup tools", "startup tools"),
    ("design generators", "design generators"),
    ("low-code/no-code", "low-code/no-code"),
    ("finance", "finance"),
];

/// Multi-word names must share at least this much with their domain.
const MIN_NAME_DOMAIN_SCORE: f64 = 0.25;

static HEADING_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^#{2,4}\s+(.+?)\s*$").unwrap());
static BULLET_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r"^\s*[-*]\s*\[([^\]]{2,100})\]\((https?://[^)\s]+)\)\s*(?:[-:]\s*(.*))?$").unwrap()
});
static HEADING_CHARS_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"[^a-zA-Z0-9 /&-]").unwrap());
static DOMAIN_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"^[a-z0-9.-]+$").unwrap());
static WORD_RE: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").unwrap());

pub struct DiscoveryOptions {
    pub sources: Vec<String>,
    pub max_checks: usize,
    pub max_add: usize,
    pub probe: ProbeConfig,
    pub source_timeout: Duration,
}

impl Default for DiscoveryOptions {
    fn default() -> Self {
        Self {
            sources: DEFAULT_SOURCES.iter().map(|s| s.to_string()).collect(),
            max_checks: 900,
            max_add: 220,
            probe: ProbeConfig::discovery(),
            source_timeout: Duration::from_secs(30),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoverySummary {
    pub candidates: usize,
    pub validated: usize,
    pub accepted: usize,
    pub elapsed_sec: f64,
}

pub struct DiscoveryOutcome {
    /// Verified new tools, best name/domain score first.
    pub tools: Vec<DiscoveredTool>,
    pub summary: DiscoverySummary,
}

pub fn normalize_heading(raw: &str) -> String {
    let heading = HEADING_CHARS_RE.replace_all(raw, "");
    let heading = heading.trim();
    if heading.is_empty() {
        "Other".to_string()
    } else {
        heading.to_string()
    }
}

pub fn heading_to_category(heading: &str) -> String {
    let lowered = heading.to_lowercase();
    HEADING_CATEGORIES
        .iter()
        .find(|(fragment, _)| lowered.contains(fragment))
        .map(|(_, category)| category.to_string())
        .unwrap_or_else(|| heading.to_string())
}

pub fn is_blocked_domain(domain: &str) -> bool {
    let root = root_domain(domain);
    BLOCKED_DOMAINS.iter().any(|blocked| {
        root == *blocked
            || domain == *blocked
            || domain
                .strip_suffix(blocked)
                .is_some_and(|prefix| prefix.ends_with('.'))
    })
}

/// Share of the name's significant tokens that appear in the domain, 0 when
/// the name has none.
pub fn discovery_score(name: &str, domain: &str) -> f64 {
    match name_domain_match_score(name, domain) {
        (_, 0) => 0.0,
        (score, _) => score,
    }
}

/// Root domains of the catalog's current links.
pub fn existing_roots<'a>(urls: impl IntoIterator<Item = &'a str>) -> HashSet<String> {
    urls.into_iter()
        .map(host_of)
        .filter(|host| !host.is_empty())
        .map(|host| root_domain(&host))
        .collect()
}

/// Extract candidate tools from one markdown listing, skipping anything whose
/// root domain is already known.
pub fn parse_markdown(
    text: &str,
    source: &str,
    existing_roots: &HashSet<String>,
) -> Vec<DiscoveredTool> {
    let mut heading = "Other".to_string();
    let mut tools = Vec::new();

    for line in text.lines() {
        if let Some(caps) = HEADING_RE.captures(line) {
            heading = normalize_heading(&caps[1]);
            continue;
        }
        let Some(caps) = BULLET_RE.captures(line) else {
            continue;
        };
        let name = caps[1].trim();
        let raw_url = caps[2].trim();
        let description = caps.get(3).map(|m| m.as_str().trim()).unwrap_or_default();

        if name.starts_with("![") || name.chars().count() < 2 {
            continue;
        }
        let heading_lower = heading.to_lowercase();
        if SKIP_SECTION_PATTERNS.iter().any(|p| heading_lower.contains(p)) {
            continue;
        }
        let url_lower = raw_url.to_lowercase();
        if BAD_URL_PATTERNS.iter().any(|p| url_lower.contains(p)) {
            continue;
        }

        let host = host_of(raw_url);
        let domain = strip_www(&host).to_string();
        if domain.is_empty() || existing_roots.contains(&root_domain(&domain)) {
            continue;
        }
        if is_blocked_domain(&domain) || !DOMAIN_RE.is_match(&domain) {
            continue;
        }

        let score = discovery_score(name, &domain);
        let words = WORD_RE.find_iter(&name.to_lowercase()).count();
        if score < MIN_NAME_DOMAIN_SCORE && words > 1 {
            debug!("Skipping '{}' ({}): name does not match domain", name, domain);
            continue;
        }

        tools.push(DiscoveredTool {
            name: name.to_string(),
            heading: heading.clone(),
            category: heading_to_category(&heading),
            description: description.to_string(),
            url: canonical_homepage(&format!("https://{}/", domain)),
            domain,
            score: (score * 10_000.0).round() / 10_000.0,
            source: source.to_string(),
            status: None,
        });
    }

    tools
}

/// Unique by domain (first listing wins), best score first then by name,
/// at most `max_checks`.
pub fn select_candidates(tools: Vec<DiscoveredTool>, max_checks: usize) -> Vec<DiscoveredTool> {
    let mut seen = HashSet::new();
    let mut unique: Vec<DiscoveredTool> = tools
        .into_iter()
        .filter(|t| seen.insert(t.domain.clone()))
        .collect();
    unique.sort_by(|a, b| b.score.total_cmp(&a.score).then_with(|| a.name.cmp(&b.name)));
    unique.truncate(max_checks);
    unique
}

pub async fn fetch_source(client: &Client, url: &str) -> Result<String> {
    debug!("Fetching listing {}", url);
    let response = client
        .get(url)
        .send()
        .await
        .and_then(|r| r.error_for_status())
        .map_err(ScanError::from)?;
    Ok(response.text().await.map_err(ScanError::from)?)
}

/// Parse every source, then verify the surviving homepages with the prober.
pub async fn execute_discovery(
    existing_roots: &HashSet<String>,
    options: DiscoveryOptions,
    progress_callback: Option<ProgressCallback>,
) -> Result<DiscoveryOutcome> {
    let DiscoveryOptions {
        sources,
        max_checks,
        max_add,
        probe,
        source_timeout,
    } = options;
    if sources.is_empty() {
        return Err(CatalogError::InvalidConfig(
            "discovery needs at least one source".to_string(),
        ));
    }

    let started = Instant::now();
    let client = Client::builder()
        .timeout(source_timeout)
        .build()
        .map_err(ScanError::from)?;

    let mut parsed = Vec::new();
    for source in &sources {
        match fetch_source(&client, source).await {
            Ok(text) => {
                let found = parse_markdown(&text, source, existing_roots);
                info!("{} candidate tools in {}", found.len(), source);
                parsed.extend(found);
            }
            Err(e) => warn!("Skipping listing {}: {}", source, e),
        }
    }

    let mut candidates = select_candidates(parsed, max_checks);
    let urls: Vec<String> = candidates.iter().map(|t| t.url.clone()).collect();

    let prober = Prober::new(probe)?.with_progress_callback(batch_progress(None, progress_callback));
    let results = prober.probe_all(urls).await;
    let validated = results.len();
    let statuses: HashMap<String, i32> = results.into_iter().map(|r| (r.url, r.status)).collect();

    for tool in candidates.iter_mut() {
        tool.status = Some(statuses.get(&tool.url).copied().unwrap_or(-1));
    }
    let candidate_count = candidates.len();
    let tools: Vec<DiscoveredTool> = candidates
        .into_iter()
        .filter(|t| t.status.is_some_and(is_ok_status))
        .take(max_add)
        .collect();

    let summary = DiscoverySummary {
        candidates: candidate_count,
        validated,
        accepted: tools.len(),
        elapsed_sec: round2(started.elapsed().as_secs_f64()),
    };
    Ok(DiscoveryOutcome { tools, summary })
}
