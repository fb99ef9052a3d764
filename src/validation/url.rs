//! URL validation and normalization for crawl requests.

use url::Url;

use crate::error::UrlError;

/// Validates `raw` as an absolute http(s) URL and strips its fragment.
///
/// The returned string is the caller's input up to the first `#`, not the
/// parser's serialization, so case, default ports and escapes are preserved.
pub fn normalize_url(raw: &str) -> Result<String, UrlError> {
    if raw.is_empty() || raw.chars().any(char::is_whitespace) {
        return Err(UrlError::InvalidFormat);
    }

    let url = Url::parse(raw).map_err(|_| UrlError::InvalidFormat)?;

    if url.cannot_be_a_base() || url.host_str().map_or(true, str::is_empty) {
        return Err(UrlError::InvalidFormat);
    }

    if !matches!(url.scheme(), "http" | "https") {
        return Err(UrlError::UnsupportedScheme {
            scheme: url.scheme().to_string(),
        });
    }

    let end = raw.find('#').unwrap_or(raw.len());
    Ok(raw[..end].to_string())
}
