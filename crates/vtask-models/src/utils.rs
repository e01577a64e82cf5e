//! Utility functions for URL validation.

use thiserror::Error;
use url::Url;

/// Errors that can occur when validating a source URL.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlError {
    #[error("URL is empty")]
    Empty,
    #[error("URL could not be parsed: {0}")]
    Malformed(String),
    #[error("Unsupported URL scheme '{0}', expected http or https")]
    UnsupportedScheme(String),
    #[error("URL has no host")]
    MissingHost,
}

/// Validate a user-supplied media URL and return it normalised.
///
/// Only absolute `http`/`https` URLs with a host are accepted; anything
/// else would be handed verbatim to yt-dlp, which also understands local
/// paths and extractor prefixes.
pub fn validate_source_url(raw: &str) -> Result<String, UrlError> {
    let raw = raw.trim();
    if raw.is_empty() {
        return Err(UrlError::Empty);
    }

    let parsed = Url::parse(raw).map_err(|e| UrlError::Malformed(e.to_string()))?;
    match parsed.scheme() {
        "http" | "https" => {}
        other => return Err(UrlError::UnsupportedScheme(other.to_string())),
    }
    if parsed.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::MissingHost);
    }

    Ok(parsed.to_string())
}
