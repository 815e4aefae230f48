//! Merging of hits that refer to the same resource.
//!
//! Search hits are compared by normalised URL, code examples by their code
//! with whitespace collapsed. Input is expected in ranked order; the first
//! occurrence of each resource survives and the output keeps that order.

use std::collections::HashSet;

use crate::types::Hit;

use super::url_normalize::normalize_url;

/// Identity of the resource a hit points at, or `None` if it has none.
pub fn dedup_key(hit: &Hit) -> Option<String> {
    match hit {
        Hit::Search(search) => {
            let url = normalize_url(&search.url);
            (!url.is_empty()).then(|| format!("url:{url}"))
        }
        Hit::Example(example) => {
            let code = example.code.split_whitespace().collect::<Vec<_>>().join(" ");
            (!code.is_empty()).then(|| format!("code:{code}"))
        }
    }
}

/// Drop later hits whose resource already appeared. Keyless hits always stay.
pub fn deduplicate(ranked: Vec<Hit>) -> Vec<Hit> {
    let mut seen: HashSet<String> = HashSet::new();
    ranked
        .into_iter()
        .filter(|hit| match dedup_key(hit) {
            Some(key) => seen.insert(key),
            None => true,
        })
        .collect()
}
