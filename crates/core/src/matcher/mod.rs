//! Query normalisation, candidate scoring and optional re-ranking.
//!
//! - `query`: filename to search query, plus fallback variants
//! - `scorer`: token-overlap confidence and deterministic ranking
//! - `rerank`: pluggable re-rank capability (no-op by default)
//! - `studio`: studio name inference for persisted scenes

mod query;
mod rerank;
mod scorer;
mod studio;
mod types;

pub use query::{expand_queries, is_noise_token, normalize_query};
pub use rerank::{parse_reply, HttpReranker, NoopReranker, RerankReply};
pub use scorer::{
    apply_overrides, compare, confidence, score_candidates, sort_and_rank, BASELINE_REASON,
};
pub use studio::infer_studio;
pub use types::*;
