//! Types for the catalog search system.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One remote catalog entry found for a query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Candidate {
    /// Stable short identifier derived from `detail_url`.
    pub id: String,
    pub title: String,
    /// Canonical detail-page URL, the identity key of a candidate.
    pub detail_url: String,
    /// Absolute thumbnail URL, empty when unknown.
    #[serde(default)]
    pub thumbnail_url: String,
}

/// Unprocessed extraction output, before canonicalisation and dedup.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RawCandidate {
    pub detail_url: String,
    pub title: String,
    pub thumbnail_url: String,
}

/// Errors that can occur during search and enrichment.
#[derive(Debug, Error)]
pub enum SearchError {
    #[error("Catalog site connection failed: {0}")]
    ConnectionFailed(String),

    #[error("Request timeout")]
    Timeout,

    #[error("Catalog site returned HTTP {status} for {url}")]
    HttpStatus { status: u16, url: String },

    #[error("Catalog request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid URL: {0}")]
    InvalidUrl(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl SearchError {
    /// Whether another attempt at the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            SearchError::ConnectionFailed(_) | SearchError::Timeout => true,
            SearchError::RequestFailed(_) => true,
            SearchError::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            SearchError::InvalidUrl(_) | SearchError::Internal(_) => false,
        }
    }
}

/// Trait for catalog search backends.
#[async_trait]
pub trait Searcher: Send + Sync {
    /// Provider name for logging.
    fn name(&self) -> &str;

    /// Search the catalog, returning at most `limit` deduplicated candidates.
    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, SearchError>;
}

/// Trait for fetching a candidate's detail page to improve its data.
#[async_trait]
pub trait Enricher: Send + Sync {
    /// Return the candidate with title/thumbnail replaced where the detail
    /// page offers better values. On error the caller keeps its copy.
    async fn enrich(&self, candidate: &Candidate) -> Result<Candidate, SearchError>;
}
