//! Mock re-ranker for testing.

use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::RwLock;

use crate::matcher::{RerankError, RerankOverride, Reranker, ScoredCandidate};

/// Mock implementation of the Reranker trait.
///
/// Returns the configured overrides, or fails when an error message is set.
#[derive(Debug, Default)]
pub struct MockReranker {
    overrides: Arc<RwLock<Vec<RerankOverride>>>,
    error: Arc<RwLock<Option<String>>>,
    calls: Arc<RwLock<Vec<(String, usize)>>>,
}

impl MockReranker {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_overrides(&self, overrides: Vec<RerankOverride>) {
        *self.overrides.write().await = overrides;
    }

    /// Fail every call with a request error carrying `message`.
    pub async fn set_error(&self, message: &str) {
        *self.error.write().await = Some(message.to_string());
    }

    /// `(query, ranked list length)` of each call.
    pub async fn recorded_calls(&self) -> Vec<(String, usize)> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Reranker for MockReranker {
    fn name(&self) -> &str {
        "mock"
    }

    async fn rerank(
        &self,
        query: &str,
        ranked: &[ScoredCandidate],
    ) -> Result<Vec<RerankOverride>, RerankError> {
        self.calls
            .write()
            .await
            .push((query.to_string(), ranked.len()));
        if let Some(message) = self.error.read().await.clone() {
            return Err(RerankError::RequestFailed(message));
        }
        Ok(self.overrides.read().await.clone())
    }
}
