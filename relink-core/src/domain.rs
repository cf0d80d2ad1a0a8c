// URL canonicalization, domain roots and name/domain identity helpers

use std::collections::HashSet;
use std::sync::LazyLock;

use regex::Regex;
use url::Url;

/// Upper bound on identity key length.
pub const MAX_SLUG_LEN: usize = 110;

/// Words too generic to tie a tool name to a domain.
pub const NAME_TOKEN_STOPWORDS: &[&str] = &["ai", "tool", "tools", "app", "the", "and", "for", "with"];

/// Link shorteners and affiliate redirectors. Never a canonical identity.
pub const TRACKING_DOMAIN_BLACKLIST: &[&str] = &[
    "sjv.io",
    "jvz8.com",
    "bit.ly",
    "tinyurl.com",
    "lnkd.in",
    "t.co",
    "buff.ly",
    "linktr.ee",
];

/// Country codes whose registrable domains sit one level deeper.
const SECOND_LEVEL_TLDS: &[&str] = &["uk", "au", "in", "jp", "nz", "za", "br"];
const SECOND_LEVEL_LABELS: &[&str] = &["co", "com", "org", "net", "gov", "edu"];

static NON_ALNUM: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[^a-z0-9]+").unwrap());
static ALNUM_RUN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"[a-z0-9]+").unwrap());

/// Reduce a link to `scheme://host/`. Non-http(s) or unparsable input is
/// returned trimmed but otherwise untouched.
pub fn canonical_homepage(url: &str) -> String {
    let trimmed = url.trim();
    match Url::parse(trimmed) {
        Ok(parsed) if matches!(parsed.scheme(), "http" | "https") => match parsed.host_str() {
            Some(host) => {
                let mut homepage = format!("{}://{}", parsed.scheme(), host.to_lowercase());
                if let Some(port) = parsed.port() {
                    homepage.push_str(&format!(":{}", port));
                }
                homepage.push('/');
                homepage
            }
            None => trimmed.to_string(),
        },
        _ => trimmed.to_string(),
    }
}

/// Lowercased host of a URL, empty when there is none.
pub fn host_of(url: &str) -> String {
    Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
        .unwrap_or_default()
}

pub fn strip_www(domain: &str) -> &str {
    domain.strip_prefix("www.").unwrap_or(domain)
}

/// Registrable part of a domain: `app.example.com` → `example.com`,
/// `shop.acme.co.uk` → `acme.co.uk`.
pub fn root_domain(domain: &str) -> String {
    let lowered = domain.trim().to_lowercase();
    let domain = strip_www(&lowered);
    let parts: Vec<&str> = domain.split('.').collect();
    if parts.len() <= 2 {
        return domain.to_string();
    }

    let tld = parts[parts.len() - 1];
    let second = parts[parts.len() - 2];
    let keep = if SECOND_LEVEL_TLDS.contains(&tld) && SECOND_LEVEL_LABELS.contains(&second) {
        3
    } else {
        2
    };
    parts[parts.len() - keep..].join(".")
}

pub fn is_tracking_domain(domain: &str) -> bool {
    TRACKING_DOMAIN_BLACKLIST.contains(&domain.trim().to_lowercase().as_str())
}

/// Identity key: lowercase, non-alphanumeric runs become one `-`, no leading
/// or trailing `-`, at most [`MAX_SLUG_LEN`] characters.
pub fn slugify(value: &str) -> String {
    let lowered = value.to_lowercase();
    let slug = NON_ALNUM.replace_all(&lowered, "-");
    let slug = slug.trim_matches('-');
    let bounded: String = slug.chars().take(MAX_SLUG_LEN).collect();
    bounded.trim_end_matches('-').to_string()
}

/// Lowercase, non-alphanumeric runs become one space, trimmed.
pub fn normalize_text(value: &str) -> String {
    let lowered = value.to_lowercase();
    NON_ALNUM.replace_all(&lowered, " ").trim().to_string()
}

/// Name tokens that carry identity: longer than two characters and not a
/// stopword. Order and duplicates follow the name.
pub fn significant_tokens(name: &str) -> Vec<String> {
    let lowered = name.to_lowercase();
    ALNUM_RUN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|token| token.len() > 2 && !NAME_TOKEN_STOPWORDS.contains(token))
        .map(str::to_string)
        .collect()
}

/// Share of a name's significant tokens that are whole words of the domain.
/// Zero when the name has no significant tokens.
pub fn token_overlap_ratio(name: &str, domain: &str) -> f64 {
    let tokens = significant_tokens(name);
    if tokens.is_empty() {
        return 0.0;
    }
    let normalized = normalize_text(domain);
    let words: HashSet<&str> = normalized.split(' ').collect();
    let hits = tokens.iter().filter(|t| words.contains(t.as_str())).count();
    hits as f64 / tokens.len() as f64
}

/// Name/domain consistency: `(score, token_count)` where score is the share
/// of significant tokens found anywhere in the domain text. A name without
/// significant tokens scores 1.0 with a token count of 0, so it is never
/// treated as a mismatch.
pub fn name_domain_match_score(name: &str, domain: &str) -> (f64, usize) {
    let tokens = significant_tokens(name);
    if tokens.is_empty() {
        return (1.0, 0);
    }
    let lowered = domain.trim().to_lowercase();
    let domain_text = NON_ALNUM.replace_all(strip_www(&lowered), " ").into_owned();
    let hits = tokens.iter().filter(|t| domain_text.contains(t.as_str())).count();
    (hits as f64 / tokens.len() as f64, tokens.len())
}
