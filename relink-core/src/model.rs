use relink_scanner::ProbeMethod;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Trust classification attached to a catalog entry once a probe or a
/// recovery attempt has finished with it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    Verified,
    Invalid,
    Recovered,
    Placeholder,
    ScrapedVerified,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::Verified => "verified",
            Verdict::Invalid => "invalid",
            Verdict::Recovered => "recovered",
            Verdict::Placeholder => "placeholder",
            Verdict::ScrapedVerified => "scraped_verified",
        }
    }

    /// Dedup priority, lower wins.
    pub fn rank(&self) -> u8 {
        match self {
            Verdict::Verified => 1,
            Verdict::Recovered => 2,
            Verdict::ScrapedVerified => 3,
            Verdict::Invalid | Verdict::Placeholder => 9,
        }
    }

    /// Verdicts allowed in a canonical catalog.
    pub fn is_trusted(&self) -> bool {
        matches!(
            self,
            Verdict::Verified | Verdict::Recovered | Verdict::ScrapedVerified
        )
    }

    /// Verdicts that came out of the legacy catalog rather than discovery.
    pub fn is_legacy(&self) -> bool {
        matches!(self, Verdict::Verified | Verdict::Recovered)
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "verified" => Some(Verdict::Verified),
            "invalid" => Some(Verdict::Invalid),
            "recovered" => Some(Verdict::Recovered),
            "placeholder" => Some(Verdict::Placeholder),
            "scraped_verified" => Some(Verdict::ScrapedVerified),
            _ => None,
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One row of the tool directory, plus whatever the pipeline has learned
/// about its link so far.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct CatalogEntry {
    #[serde(alias = "Tool Name", alias = "tool_name")]
    pub name: String,
    #[serde(default, alias = "Category")]
    pub category: String,
    #[serde(default, alias = "Tags")]
    pub tags: String,
    #[serde(default, alias = "Description")]
    pub description: String,
    #[serde(alias = "Website Link", alias = "website_link", alias = "website_url")]
    pub url: String,
    #[serde(default)]
    pub status: Option<i32>,
    #[serde(default)]
    pub final_url: Option<String>,
    #[serde(default)]
    pub method: Option<ProbeMethod>,
    #[serde(default, alias = "quality_status")]
    pub verdict: Option<Verdict>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub signature_hits: Option<String>,
    #[serde(default)]
    pub recovered_confidence: Option<f64>,
}

impl CatalogEntry {
    pub fn new(name: &str, category: &str, url: &str) -> Self {
        Self {
            name: name.to_string(),
            category: category.to_string(),
            url: url.to_string(),
            ..Self::default()
        }
    }

    /// True once a probe has reported this entry reachable.
    pub fn is_ok(&self) -> bool {
        matches!(self.verdict, Some(Verdict::Verified))
    }

    /// The post-redirect link when it is a usable http(s) URL, otherwise the
    /// link as entered.
    pub fn effective_url(&self) -> &str {
        match self.final_url.as_deref() {
            Some(final_url)
                if final_url.starts_with("http://") || final_url.starts_with("https://") =>
            {
                final_url
            }
            _ => &self.url,
        }
    }
}

/// Why a recovery attempt ended the way it did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecoveryReason {
    NoSearchResult,
    NoCandidate,
    LowConfidence,
    Accepted,
    Error(String),
}

impl RecoveryReason {
    pub fn parse(s: &str) -> Self {
        match s {
            "no_search_result" => RecoveryReason::NoSearchResult,
            "no_candidate" => RecoveryReason::NoCandidate,
            "low_confidence" => RecoveryReason::LowConfidence,
            "accepted" => RecoveryReason::Accepted,
            other => RecoveryReason::Error(
                other.strip_prefix("error:").unwrap_or(other).to_string(),
            ),
        }
    }
}

impl fmt::Display for RecoveryReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecoveryReason::NoSearchResult => f.write_str("no_search_result"),
            RecoveryReason::NoCandidate => f.write_str("no_candidate"),
            RecoveryReason::LowConfidence => f.write_str("low_confidence"),
            RecoveryReason::Accepted => f.write_str("accepted"),
            RecoveryReason::Error(msg) => write!(f, "error:{}", msg),
        }
    }
}

impl Serialize for RecoveryReason {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

impl<'de> Deserialize<'de> for RecoveryReason {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        Ok(RecoveryReason::parse(&raw))
    }
}

/// A scored search hit considered during one recovery attempt.
#[derive(Debug, Clone, PartialEq)]
pub struct RecoveryCandidate {
    pub url: String,
    pub domain: String,
    pub title: String,
    pub confidence: f64,
}

/// The single outcome of trying to replace one dead link.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecoveryResult {
    pub tool_name: String,
    pub old_url: String,
    #[serde(default)]
    pub candidate_url: String,
    #[serde(default)]
    pub candidate_domain: String,
    pub http_status: i32,
    pub confidence: f64,
    #[serde(with = "flag")]
    pub accepted: bool,
    pub reason: RecoveryReason,
}

impl RecoveryResult {
    pub fn empty(tool_name: &str, old_url: &str, reason: RecoveryReason) -> Self {
        Self {
            tool_name: tool_name.to_string(),
            old_url: old_url.to_string(),
            candidate_url: String::new(),
            candidate_domain: String::new(),
            http_status: relink_scanner::result::TRANSPORT_FAILURE,
            confidence: 0.0,
            accepted: false,
            reason,
        }
    }

    pub fn from_candidate(
        tool_name: &str,
        old_url: &str,
        candidate: &RecoveryCandidate,
        http_status: i32,
        min_confidence: f64,
    ) -> Self {
        let accepted = candidate.confidence >= min_confidence;
        Self {
            tool_name: tool_name.to_string(),
            old_url: old_url.to_string(),
            candidate_url: candidate.url.clone(),
            candidate_domain: candidate.domain.clone(),
            http_status,
            confidence: candidate.confidence,
            accepted,
            reason: if accepted {
                RecoveryReason::Accepted
            } else {
                RecoveryReason::LowConfidence
            },
        }
    }
}

/// A tool found in a curated listing that is not in the catalog yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiscoveredTool {
    #[serde(alias = "tool_name")]
    pub name: String,
    #[serde(default)]
    pub heading: String,
    #[serde(default)]
    pub category: String,
    #[serde(default, alias = "desc")]
    pub description: String,
    #[serde(default)]
    pub domain: String,
    #[serde(alias = "website", alias = "website_link")]
    pub url: String,
    #[serde(default)]
    pub score: f64,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub status: Option<i32>,
}

/// One row of the reconciled catalog.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CanonicalEntry {
    #[serde(alias = "tool_slug")]
    pub slug: String,
    #[serde(alias = "tool_name")]
    pub name: String,
    pub category: String,
    pub tags: String,
    pub description: String,
    #[serde(alias = "website_link")]
    pub url: String,
    pub domain: String,
    #[serde(alias = "quality_status")]
    pub verdict: Verdict,
    #[serde(default)]
    pub recovered_confidence: Option<f64>,
}

impl From<&CanonicalEntry> for CatalogEntry {
    fn from(entry: &CanonicalEntry) -> Self {
        CatalogEntry {
            name: entry.name.clone(),
            category: entry.category.clone(),
            tags: entry.tags.clone(),
            description: entry.description.clone(),
            url: entry.url.clone(),
            verdict: Some(entry.verdict),
            recovered_confidence: entry.recovered_confidence,
            ..CatalogEntry::default()
        }
    }
}

/// Accepts `1`/`0`, `true`/`false` and spreadsheet floats for flags.
mod flag {
    use serde::de::{self, Visitor};
    use serde::{Deserializer, Serializer};
    use std::fmt;

    pub fn serialize<S: Serializer>(value: &bool, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u8(u8::from(*value))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<bool, D::Error> {
        deserializer.deserialize_any(FlagVisitor)
    }

    struct FlagVisitor;

    impl Visitor<'_> for FlagVisitor {
        type Value = bool;

        fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
            f.write_str("a 0/1 or true/false flag")
        }

        fn visit_bool<E: de::Error>(self, v: bool) -> Result<bool, E> {
            Ok(v)
        }

        fn visit_u64<E: de::Error>(self, v: u64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_i64<E: de::Error>(self, v: i64) -> Result<bool, E> {
            Ok(v != 0)
        }

        fn visit_f64<E: de::Error>(self, v: f64) -> Result<bool, E> {
            Ok(v != 0.0)
        }

        fn visit_str<E: de::Error>(self, v: &str) -> Result<bool, E> {
            match v.trim().to_lowercase().as_str() {
                "1" | "1.0" | "true" => Ok(true),
                "0" | "0.0" | "false" | "" => Ok(false),
                other => Err(E::custom(format!("invalid flag value '{}'", other))),
            }
        }
    }
}
