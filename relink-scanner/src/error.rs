use thiserror::Error;

#[derive(Error, Debug)]
pub enum ScanError {
    #[error("HTTP request failed: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Parse error: {0}")]
    ParseError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Task join error: {0}")]
    JoinError(#[from] tokio::task::JoinError),

    #[error("Other error: {0}")]
    Other(String),
}

pub type Result<T> = std::result::Result<T, ScanError>;

/// Longest error text kept on a probe record.
pub const MAX_ERROR_CHARS: usize = 220;

/// Flattens an error and its source chain onto one line, cut to `max_chars`.
///
/// reqwest only prints the outermost layer in `Display`, which hides the
/// interesting part ("dns error", "connection refused") in the source chain.
pub fn describe_error(err: &(dyn std::error::Error + 'static), max_chars: usize) -> String {
    let mut message = err.to_string();
    let mut source = err.source();
    while let Some(inner) = source {
        let text = inner.to_string();
        if !message.contains(&text) {
            message.push_str(": ");
            message.push_str(&text);
        }
        source = inner.source();
    }
    truncate_chars(&message.replace(['\n', '\r'], " "), max_chars)
}

pub fn truncate_chars(text: &str, max_chars: usize) -> String {
    text.chars().take(max_chars).collect()
}
