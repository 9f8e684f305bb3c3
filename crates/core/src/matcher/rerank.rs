//! Optional re-rank capability.
//!
//! [`NoopReranker`] is the default and returns no overrides.
//! [`HttpReranker`] posts the query and ranked list to an external provider
//! and reads back `{best_index, best_confidence, per_candidate}`.

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tracing::debug;

use crate::config::RerankConfig;
use crate::metrics::FETCH_DURATION;

use super::types::{RerankError, RerankOverride, Reranker, ScoredCandidate};

/// Keeps the baseline ranking.
#[derive(Debug, Default, Clone)]
pub struct NoopReranker;

#[async_trait]
impl Reranker for NoopReranker {
    fn name(&self) -> &str {
        "noop"
    }

    async fn rerank(
        &self,
        _query: &str,
        _ranked: &[ScoredCandidate],
    ) -> Result<Vec<RerankOverride>, RerankError> {
        Ok(Vec::new())
    }
}

#[derive(Debug, Serialize)]
struct RerankRequest<'a> {
    query: &'a str,
    candidates: Vec<RerankRequestItem<'a>>,
}

#[derive(Debug, Serialize)]
struct RerankRequestItem<'a> {
    index: usize,
    title: &'a str,
    detail_url: &'a str,
    confidence: f64,
}

/// Reply expected from a re-rank provider.
#[derive(Debug, Deserialize)]
pub struct RerankReply {
    #[serde(default)]
    pub best_index: Option<usize>,
    #[serde(default)]
    pub best_confidence: Option<f64>,
    #[serde(default)]
    pub per_candidate: Vec<RerankOverride>,
}

impl RerankReply {
    /// Flatten into overrides; `best_*` only counts when its index has no
    /// per-candidate entry.
    pub fn into_overrides(self) -> Vec<RerankOverride> {
        let mut overrides = self.per_candidate;
        if let (Some(index), Some(confidence)) = (self.best_index, self.best_confidence) {
            if !overrides.iter().any(|o| o.index == index) {
                overrides.push(RerankOverride {
                    index,
                    confidence,
                    reason: String::new(),
                });
            }
        }
        overrides
    }
}

/// Parse a provider reply that may be wrapped in prose or a code fence.
pub fn parse_reply(text: &str) -> Result<RerankReply, RerankError> {
    let json_str = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if end > start => &text[start..=end],
        _ => text,
    };
    serde_json::from_str(json_str).map_err(|e| {
        RerankError::InvalidResponse(format!(
            "{} - Response: {}",
            e,
            text.chars().take(200).collect::<String>()
        ))
    })
}

/// Re-ranks through an HTTP JSON endpoint.
#[derive(Debug, Clone)]
pub struct HttpReranker {
    client: Client,
    endpoint: String,
}

impl HttpReranker {
    pub fn new(config: &RerankConfig) -> Result<Self, RerankError> {
        let endpoint = config
            .endpoint
            .as_deref()
            .map(str::trim)
            .filter(|e| !e.is_empty())
            .ok_or(RerankError::NotConfigured)?
            .to_string();

        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .build()
            .map_err(|e| RerankError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client, endpoint })
    }

    async fn post(&self, body: &RerankRequest<'_>) -> Result<String, RerankError> {
        let response = self
            .client
            .post(&self.endpoint)
            .json(body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    RerankError::Timeout
                } else {
                    RerankError::RequestFailed(e.to_string())
                }
            })?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| RerankError::RequestFailed(e.to_string()))?;
        if !status.is_success() {
            return Err(RerankError::RequestFailed(format!(
                "HTTP {}: {}",
                status,
                text.chars().take(200).collect::<String>()
            )));
        }
        Ok(text)
    }
}

#[async_trait]
impl Reranker for HttpReranker {
    fn name(&self) -> &str {
        "http"
    }

    async fn rerank(
        &self,
        query: &str,
        ranked: &[ScoredCandidate],
    ) -> Result<Vec<RerankOverride>, RerankError> {
        if ranked.is_empty() {
            return Ok(Vec::new());
        }

        let body = RerankRequest {
            query,
            candidates: ranked
                .iter()
                .enumerate()
                .map(|(index, s)| RerankRequestItem {
                    index,
                    title: &s.candidate.title,
                    detail_url: &s.candidate.detail_url,
                    confidence: s.confidence,
                })
                .collect(),
        };

        let start = Instant::now();
        let result = self.post(&body).await.and_then(|text| parse_reply(&text));
        FETCH_DURATION
            .with_label_values(&["rerank", if result.is_ok() { "ok" } else { "error" }])
            .observe(start.elapsed().as_secs_f64());

        let overrides = result?.into_overrides();
        debug!(query = query, overrides = overrides.len(), "Re-rank reply parsed");
        Ok(overrides)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::Candidate;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn ranked() -> Vec<ScoredCandidate> {
        ["First", "Second"]
            .iter()
            .enumerate()
            .map(|(i, title)| ScoredCandidate {
                candidate: Candidate {
                    id: title.to_lowercase(),
                    title: title.to_string(),
                    detail_url: format!("https://pmvhaven.com/{}", title.to_lowercase()),
                    thumbnail_url: String::new(),
                },
                confidence: 0.5,
                rank: i + 1,
                reason: "baseline text similarity".to_string(),
            })
            .collect()
    }

    #[tokio::test]
    async fn test_noop_returns_nothing() {
        let overrides = NoopReranker.rerank("q", &ranked()).await.unwrap();
        assert!(overrides.is_empty());
    }

    #[test]
    fn test_parse_reply_in_code_fence() {
        let text = "Sure!\n```json\n{\"best_index\": 1, \"best_confidence\": 0.9, \"per_candidate\": [{\"index\": 0, \"confidence\": 0.2, \"reason\": \"different video\"}]}\n```";
        let overrides = parse_reply(text).unwrap().into_overrides();
        assert_eq!(overrides.len(), 2);
        assert_eq!(overrides[0].index, 0);
        assert_eq!(overrides[0].reason, "different video");
        assert_eq!(overrides[1].index, 1);
        assert_eq!(overrides[1].confidence, 0.9);
    }

    #[test]
    fn test_best_ignored_when_listed() {
        let text = r#"{"best_index":0,"best_confidence":0.9,"per_candidate":[{"index":0,"confidence":0.7}]}"#;
        let overrides = parse_reply(text).unwrap().into_overrides();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].confidence, 0.7);
    }

    #[test]
    fn test_parse_reply_garbage() {
        let err = parse_reply("no json here").unwrap_err();
        assert!(matches!(err, RerankError::InvalidResponse(_)));
    }

    #[test]
    fn test_http_reranker_requires_endpoint() {
        let err = HttpReranker::new(&RerankConfig::default()).unwrap_err();
        assert!(matches!(err, RerankError::NotConfigured));
    }

    #[tokio::test]
    async fn test_http_reranker_round_trip() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/rerank"))
            .and(body_partial_json(serde_json::json!({"query": "first"})))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"{"best_index":1,"best_confidence":0.95,"per_candidate":[]}"#,
            ))
            .expect(1)
            .mount(&server)
            .await;

        let reranker = HttpReranker::new(&RerankConfig {
            enabled: true,
            endpoint: Some(format!("{}/rerank", server.uri())),
            timeout_secs: 5,
        })
        .unwrap();

        let overrides = reranker.rerank("first", &ranked()).await.unwrap();
        assert_eq!(overrides.len(), 1);
        assert_eq!(overrides[0].index, 1);
    }

    #[tokio::test]
    async fn test_http_reranker_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(502).set_body_string("bad gateway"))
            .mount(&server)
            .await;

        let reranker = HttpReranker::new(&RerankConfig {
            enabled: true,
            endpoint: Some(server.uri()),
            timeout_secs: 5,
        })
        .unwrap();

        let err = reranker.rerank("q", &ranked()).await.unwrap_err();
        assert!(matches!(err, RerankError::RequestFailed(_)));
    }
}
