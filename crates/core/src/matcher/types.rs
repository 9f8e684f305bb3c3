//! Types for scoring and re-ranking.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::searcher::Candidate;

/// A candidate with its confidence and 1-based rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredCandidate {
    #[serde(flatten)]
    pub candidate: Candidate,
    /// Match confidence in [0, 1].
    pub confidence: f64,
    pub rank: usize,
    pub reason: String,
}

/// A single re-rank correction, addressed by position in the ranked list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RerankOverride {
    pub index: usize,
    pub confidence: f64,
    #[serde(default)]
    pub reason: String,
}

/// Errors from a re-rank provider.
#[derive(Debug, Error)]
pub enum RerankError {
    #[error("Re-rank provider not configured")]
    NotConfigured,

    #[error("Re-rank request failed: {0}")]
    RequestFailed(String),

    #[error("Re-rank request timed out")]
    Timeout,

    #[error("Invalid re-rank response: {0}")]
    InvalidResponse(String),
}

/// Optional second opinion on the baseline ranking.
#[async_trait]
pub trait Reranker: Send + Sync {
    /// Name of this re-ranker for logging.
    fn name(&self) -> &str;

    /// Return sparse overrides for the ranked list. An empty vector keeps
    /// the baseline unchanged.
    async fn rerank(
        &self,
        query: &str,
        ranked: &[ScoredCandidate],
    ) -> Result<Vec<RerankOverride>, RerankError>;
}
