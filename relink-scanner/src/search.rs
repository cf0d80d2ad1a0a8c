// Search collaborator used to find replacement homepages

use crate::error::{Result, ScanError};
use reqwest::Client;
use scraper::{Html, Selector};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::time::Duration;
use tracing::debug;
use url::Url;

const DUCKDUCKGO_HTML_ENDPOINT: &str = "https://duckduckgo.com/html/";
const SEARCH_USER_AGENT: &str = "Mozilla/5.0 (compatible; relink-recovery/0.2)";

/// One organic search result.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchHit {
    pub url: String,
    pub domain: String,
    pub title: String,
}

/// Anything that can answer "where is the official site of `name`".
///
/// Hits must be returned in relevance order; callers treat the first good
/// enough hit as the answer.
pub trait SearchProvider: Send + Sync {
    fn search_official_site(
        &self,
        name: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Vec<SearchHit>>> + Send;
}

/// Scrapes DuckDuckGo's no-JavaScript results page.
pub struct DuckDuckGoSearch {
    client: Client,
    endpoint: String,
}

impl DuckDuckGoSearch {
    pub fn new() -> Result<Self> {
        Self::with_endpoint(DUCKDUCKGO_HTML_ENDPOINT)
    }

    pub fn with_endpoint(endpoint: &str) -> Result<Self> {
        let client = Client::builder()
            .user_agent(SEARCH_USER_AGENT)
            .timeout(Duration::from_secs(15))
            .connect_timeout(Duration::from_secs(8))
            .build()?;
        Ok(Self {
            client,
            endpoint: endpoint.to_string(),
        })
    }
}

impl SearchProvider for DuckDuckGoSearch {
    async fn search_official_site(&self, name: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let query = format!("{} official website", name);
        debug!("Searching for '{}'", query);

        let response = self
            .client
            .get(&self.endpoint)
            .query(&[("q", query.as_str())])
            .send()
            .await?
            .error_for_status()?;
        let body = response.text().await?;

        parse_results(&body, limit)
    }
}

/// Pull `(url, domain, title)` triples out of a DuckDuckGo HTML results page.
pub fn parse_results(html: &str, limit: usize) -> Result<Vec<SearchHit>> {
    let document = Html::parse_document(html);
    let result_selector =
        Selector::parse(".result").map_err(|e| ScanError::ParseError(e.to_string()))?;
    let anchor_selector =
        Selector::parse(".result__a").map_err(|e| ScanError::ParseError(e.to_string()))?;

    let mut hits = Vec::new();
    for result in document.select(&result_selector) {
        if hits.len() >= limit {
            break;
        }
        let Some(anchor) = result.select(&anchor_selector).next() else {
            continue;
        };
        let href = anchor.value().attr("href").unwrap_or_default();
        let target = unwrap_redirect(href);
        if !(target.starts_with("http://") || target.starts_with("https://")) {
            continue;
        }
        let Some(domain) = Url::parse(&target)
            .ok()
            .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        else {
            continue;
        };
        let title = anchor
            .text()
            .map(str::trim)
            .filter(|t| !t.is_empty())
            .collect::<Vec<_>>()
            .join(" ");

        hits.push(SearchHit {
            url: target,
            domain,
            title,
        });
    }

    Ok(hits)
}

/// Result links go through `/l/?uddg=<target>`; return the target.
pub fn unwrap_redirect(href: &str) -> String {
    if href.is_empty() {
        return String::new();
    }
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };
    if !absolute.contains("duckduckgo.com/l/?") {
        return absolute;
    }
    Url::parse(&absolute)
        .ok()
        .and_then(|u| {
            u.query_pairs()
                .find(|(key, _)| key == "uddg")
                .map(|(_, value)| value.into_owned())
        })
        .unwrap_or_default()
}
