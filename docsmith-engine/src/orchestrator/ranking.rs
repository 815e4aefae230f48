//! Deterministic merge-and-order of hits from several adapters.
//!
//! Total order:
//!
//! 1. `raw_score` descending (NaN last)
//! 2. adapter priority ascending (unknown adapters last)
//! 3. emission order
//!
//! followed by dedup of equivalent resources and truncation. The ranker is
//! a pure function of its input, so identical hit sets always rank the same.

use std::collections::HashMap;

use crate::types::Hit;

use super::dedup::deduplicate;
use super::scoring::ordering_score;

/// Order `hits` (given in emission order), merge duplicates, keep `max_results`.
pub fn rank(hits: Vec<Hit>, priorities: &HashMap<String, u32>, max_results: usize) -> Vec<Hit> {
    let priority_of = |hit: &Hit| {
        priorities
            .get(hit.source_adapter())
            .copied()
            .unwrap_or(u32::MAX)
    };

    let mut indexed: Vec<(usize, Hit)> = hits.into_iter().enumerate().collect();
    indexed.sort_by(|(ia, a), (ib, b)| {
        ordering_score(b.raw_score())
            .total_cmp(&ordering_score(a.raw_score()))
            .then_with(|| priority_of(a).cmp(&priority_of(b)))
            .then_with(|| ia.cmp(ib))
    });

    let mut ranked = deduplicate(indexed.into_iter().map(|(_, hit)| hit).collect());
    ranked.truncate(max_results);
    ranked
}
