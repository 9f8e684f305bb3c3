//! Bounded HTTP GET shared by search and enrichment.

use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use crate::config::SiteConfig;
use crate::metrics::FETCH_DURATION;

use super::SearchError;

/// Pause before retry `n` is `n * RETRY_BACKOFF`.
const RETRY_BACKOFF: Duration = Duration::from_millis(250);

/// Which kind of page a fetch is for; used as a metric label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FetchKind {
    Search,
    Detail,
}

impl FetchKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FetchKind::Search => "search",
            FetchKind::Detail => "detail",
        }
    }
}

/// A successfully fetched page.
#[derive(Debug, Clone)]
pub struct FetchedPage {
    pub status: u16,
    pub body: String,
}

/// HTTP client with a per-request timeout and a small retry budget.
///
/// Transport failures, 429 and 5xx responses are retried; other non-2xx
/// statuses fail immediately.
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: Client,
    max_retries: u32,
}

impl HttpFetcher {
    pub fn new(config: &SiteConfig) -> Result<Self, SearchError> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs as u64))
            .user_agent(config.user_agent.clone())
            .build()
            .map_err(|e| SearchError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            client,
            max_retries: config.max_retries,
        })
    }

    pub async fn get(&self, url: &str, kind: FetchKind) -> Result<FetchedPage, SearchError> {
        let start = Instant::now();
        let mut attempt = 0;

        let result = loop {
            match self.get_once(url).await {
                Ok(page) => break Ok(page),
                Err(e) if e.is_retryable() && attempt < self.max_retries => {
                    attempt += 1;
                    warn!(url = url, attempt = attempt, error = %e, "Retrying catalog request");
                    tokio::time::sleep(RETRY_BACKOFF * attempt).await;
                }
                Err(e) => break Err(e),
            }
        };

        let label = if result.is_ok() { "ok" } else { "error" };
        FETCH_DURATION
            .with_label_values(&[kind.as_str(), label])
            .observe(start.elapsed().as_secs_f64());
        result
    }

    async fn get_once(&self, url: &str) -> Result<FetchedPage, SearchError> {
        let response = self.client.get(url).send().await.map_err(map_reqwest_error)?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::HttpStatus {
                status: status.as_u16(),
                url: url.to_string(),
            });
        }

        let body = response.text().await.map_err(map_reqwest_error)?;
        debug!(url = url, status = status.as_u16(), bytes = body.len(), "Fetched catalog page");

        Ok(FetchedPage {
            status: status.as_u16(),
            body,
        })
    }
}

pub(crate) fn map_reqwest_error(e: reqwest::Error) -> SearchError {
    if e.is_timeout() {
        SearchError::Timeout
    } else if e.is_connect() {
        SearchError::ConnectionFailed(e.to_string())
    } else {
        SearchError::RequestFailed(e.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fetch_kind_labels() {
        assert_eq!(FetchKind::Search.as_str(), "search");
        assert_eq!(FetchKind::Detail.as_str(), "detail");
    }

    #[test]
    fn test_fetcher_builds_from_default_config() {
        let fetcher = HttpFetcher::new(&SiteConfig::default()).unwrap();
        assert_eq!(fetcher.max_retries, 2);
    }

    #[tokio::test]
    async fn test_connection_refused_is_error() {
        let config = SiteConfig {
            timeout_secs: 2,
            max_retries: 0,
            ..SiteConfig::default()
        };
        let fetcher = HttpFetcher::new(&config).unwrap();
        // Port 9 (discard) on localhost is essentially never listening.
        let err = fetcher
            .get("http://127.0.0.1:9/search", FetchKind::Search)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }
}
