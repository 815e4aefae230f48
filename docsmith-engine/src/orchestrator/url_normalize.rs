//! Documentation URL normalisation for hit deduplication.
//!
//! Canonicalises URLs so that links to the same documentation anchor
//! (differing only in scheme/host case, default ports, `index.html`,
//! trailing slashes, search highlighting or query-parameter order)
//! compare as equal. Fragments are kept: on a documentation page the
//! anchor identifies the API item.

use url::Url;

/// Query parameters that documentation sites add for navigation only.
const NAVIGATION_PARAMS: &[&str] = &[
    "highlight",
    "check_keywords",
    "area",
    "utm_source",
    "utm_medium",
    "utm_campaign",
    "utm_term",
    "utm_content",
    "ref",
];

/// Normalise a documentation URL for deduplication comparison.
///
/// 1. Lowercase scheme and host (`Url::parse` does this).
/// 2. Drop default ports.
/// 3. Drop navigation-only query parameters, sort the rest.
/// 4. Strip a trailing `index.html`, then a trailing slash (except root).
/// 5. Drop an empty fragment; keep non-empty ones.
///
/// Unparseable input is returned trimmed but otherwise unchanged.
///
/// # Examples
///
/// ```
/// use docsmith_engine::orchestrator::url_normalize::normalize_url;
///
/// let a = normalize_url("https://Docs.Python.org/3/library/index.html?highlight=io");
/// let b = normalize_url("https://docs.python.org/3/library");
/// assert_eq!(a, b);
/// ```
pub fn normalize_url(raw: &str) -> String {
    let Ok(mut parsed) = Url::parse(raw.trim()) else {
        return raw.trim().to_string();
    };

    if matches!(
        (parsed.scheme(), parsed.port()),
        ("http", Some(80)) | ("https", Some(443))
    ) {
        let _ = parsed.set_port(None);
    }

    let mut params: Vec<(String, String)> = parsed
        .query_pairs()
        .filter(|(key, _)| !NAVIGATION_PARAMS.contains(&key.to_lowercase().as_str()))
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    params.sort();
    if params.is_empty() {
        parsed.set_query(None);
    } else {
        parsed.query_pairs_mut().clear().extend_pairs(params);
    }

    let mut path = parsed.path().to_string();
    if let Some(stripped) = path.strip_suffix("index.html") {
        path = stripped.to_string();
    }
    if path.len() > 1 && path.ends_with('/') {
        path.pop();
    }
    parsed.set_path(&path);

    if parsed.fragment() == Some("") {
        parsed.set_fragment(None);
    }

    parsed.to_string()
}
