//! Helpers for keeping credentials and noisy payloads out of logs.

use std::sync::LazyLock;

use regex::Regex;

static RE_SESSKEY_PARAM: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(sesskey=)[^&#\s]+").unwrap());

/// Longest response excerpt carried into an error message.
const MAX_BODY_EXCERPT: usize = 200;

/// Masks the session key in a URL or query string.
///
/// - `https://host/lib/ajax/service.php?sesskey=abc&info=x` → `...?sesskey=****&info=x`
/// - URLs without a session key are returned unchanged.
pub fn redact_sesskey(url: &str) -> String {
    RE_SESSKEY_PARAM.replace_all(url, "${1}****").into_owned()
}

/// Shortens a response body for error messages, on a char boundary.
pub fn truncate_body(body: &str) -> String {
    let trimmed = body.trim();
    match trimmed.char_indices().nth(MAX_BODY_EXCERPT) {
        Some((cut, _)) => format!("{}...", &trimmed[..cut]),
        None => trimmed.to_string(),
    }
}
