// Placeholder and parked-domain detection

use url::Url;

/// How much of a body is considered. Anything past this is never inspected.
pub const MAX_BODY_BYTES: usize = 80_000;

/// Default install pages and domain parking copy, as `(tag, lowercase phrase)`.
pub const PHRASE_SIGNATURES: &[(&str, &str)] = &[
    ("nginx_default_1", "welcome to nginx"),
    (
        "nginx_default_2",
        "if you see this page, the nginx web server is successfully installed",
    ),
    ("apache_default_1", "apache2 debian default page"),
    ("apache_default_2", "it works! apache"),
    ("iis_default", "iis windows server"),
    ("parking_sedo", "sedo domain parking"),
    ("parking_generic_1", "this domain is parked"),
    ("parking_generic_2", "domain for sale"),
    ("parking_generic_3", "buy this domain"),
];

/// Parking services. Matched against the host a request ended up on.
pub const PARKING_HOSTS: &[&str] = &[
    "sedoparking.com",
    "parkingcrew.net",
    "bodis.com",
    "afternic.com",
    "dan.com",
    "undeveloped.com",
    "parking-page.net",
];

/// Returns the signature tags found in `body` and on the host of `final_url`.
///
/// Tags come back in table order, phrases first, without duplicates. A missing
/// body or an unparsable URL simply contributes nothing.
pub fn detect_signatures(body: &str, final_url: &str) -> Vec<String> {
    let text = truncate_body(body).to_lowercase();
    let mut hits: Vec<String> = PHRASE_SIGNATURES
        .iter()
        .filter(|(_, phrase)| text.contains(phrase))
        .map(|(tag, _)| tag.to_string())
        .collect();

    if let Some(host) = final_host(final_url) {
        hits.extend(
            PARKING_HOSTS
                .iter()
                .filter(|parked| host_matches(&host, parked))
                .map(|parked| format!("parked_host:{}", parked)),
        );
    }

    hits
}

fn truncate_body(body: &str) -> &str {
    if body.len() <= MAX_BODY_BYTES {
        return body;
    }
    let mut end = MAX_BODY_BYTES;
    while !body.is_char_boundary(end) {
        end -= 1;
    }
    &body[..end]
}

fn final_host(final_url: &str) -> Option<String> {
    Url::parse(final_url)
        .ok()
        .and_then(|u| u.host_str().map(|h| h.to_lowercase()))
}

fn host_matches(host: &str, parked: &str) -> bool {
    host == parked || host.ends_with(&format!(".{}", parked))
}
