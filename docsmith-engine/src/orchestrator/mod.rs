//! Query orchestration: concurrent adapter fan-out, scoring, dedup, ranking.
//!
//! [`fanout`] gathers hits from every relevant adapter under a per-adapter
//! deadline; [`ranking`] turns the gathered hits into one deterministic,
//! deduplicated list.

pub mod dedup;
pub mod fanout;
pub mod ranking;
pub mod scoring;
pub mod url_normalize;
