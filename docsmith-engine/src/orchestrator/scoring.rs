//! Position-decay scoring for adapters that only know result order.
//!
//! Documentation sites return results in their own relevance order without
//! exposing a score. Adapters turn that order into a `raw_score`:
//!
//! ```text
//! raw_score = adapter_weight * position_decay
//! position_decay = 1.0 / (1.0 + position_index * 0.1)
//! ```

/// Score for the result at 0-based `position` from an adapter with `weight`.
pub fn position_score(weight: f64, position: usize) -> f64 {
    weight / (1.0 + position as f64 * 0.1)
}

/// Sanitise a score for ordering: NaN sorts below every real score.
pub fn ordering_score(score: f64) -> f64 {
    if score.is_nan() {
        f64::NEG_INFINITY
    } else {
        score
    }
}
