//! Utility functions and helpers.

pub mod http;
pub mod lock;

use url::Url;

/// Resolve a potentially relative URL against a base URL.
///
/// Returns `None` when the result is not an absolute http(s) URL.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty() {
        return None;
    }
    base.join(href)
        .ok()
        .filter(|u| matches!(u.scheme(), "http" | "https") && u.host_str().is_some())
        .map(|u| u.to_string())
}

/// Collapse runs of whitespace into single spaces and trim.
pub fn normalize_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Drop punctuation and symbols, keeping letters, digits and single spaces.
pub fn strip_symbols(s: &str) -> String {
    let kept: String = s
        .chars()
        .filter(|c| c.is_alphanumeric() || *c == '_' || c.is_whitespace())
        .collect();
    normalize_whitespace(&kept)
}
