use serde::{Deserialize, Serialize};
use std::fmt;

/// Sentinel status for a request that never produced an HTTP response.
pub const TRANSPORT_FAILURE: i32 = -1;

/// Whether a status code counts as a reachable link.
pub fn is_ok_status(status: i32) -> bool {
    (200..400).contains(&status)
}

/// The HTTP verb that produced the recorded outcome of a probe.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ProbeMethod {
    Head,
    Get,
}

impl ProbeMethod {
    pub fn as_str(&self) -> &'static str {
        match self {
            ProbeMethod::Head => "HEAD",
            ProbeMethod::Get => "GET",
        }
    }
}

impl fmt::Display for ProbeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Outcome of probing one URL. Built once by the prober and never mutated
/// afterwards.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ProbeResult {
    pub url: String,
    pub status: i32,
    pub method: ProbeMethod,
    pub final_url: String,
    pub ok: bool,
    pub error: Option<String>,
}

impl ProbeResult {
    pub(crate) fn new(url: String) -> Self {
        Self {
            final_url: url.clone(),
            url,
            status: TRANSPORT_FAILURE,
            method: ProbeMethod::Head,
            ok: false,
            error: None,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url)
        }
    }

    pub(crate) fn finish(mut self) -> Self {
        self.ok = is_ok_status(self.status);
        self
    }
}

/// Outcome of fetching the head of a page and scanning it for placeholder
/// signatures.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PageSample {
    pub url: String,
    pub status: i32,
    pub final_url: String,
    pub signatures: Vec<String>,
    pub ok: bool,
    pub error: Option<String>,
}

impl PageSample {
    pub(crate) fn new(url: String) -> Self {
        Self {
            url,
            status: TRANSPORT_FAILURE,
            final_url: String::new(),
            signatures: Vec::new(),
            ok: false,
            error: None,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url)
        }
    }

    /// A reachable page that carries any signature is not a live site.
    pub(crate) fn finish(mut self) -> Self {
        self.ok = is_ok_status(self.status) && self.signatures.is_empty();
        self
    }

    pub fn is_placeholder(&self) -> bool {
        !self.signatures.is_empty()
    }
}
