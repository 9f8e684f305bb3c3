//! Mock searcher and enricher for testing.

use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;

use crate::searcher::{Candidate, Enricher, SearchError, Searcher};

/// Mock implementation of the Searcher trait.
///
/// Results are configured per query string, with an optional fallback for
/// any other query. Queries can be made to fail, searches can be slowed
/// down, and the peak number of concurrent searches is tracked.
///
/// # Example
///
/// ```rust,ignore
/// use reelmatch_core::testing::{fixtures, MockSearcher};
///
/// let searcher = MockSearcher::new();
/// searcher
///     .set_results("hot mess", vec![fixtures::candidate("hot-mess", "Hot Mess")])
///     .await;
/// searcher.fail_query("other", "boom").await;
/// ```
pub struct MockSearcher {
    results: Arc<RwLock<HashMap<String, Vec<Candidate>>>>,
    fallback: Arc<RwLock<Vec<Candidate>>>,
    errors: Arc<RwLock<HashMap<String, String>>>,
    fail_all: Arc<RwLock<Option<String>>>,
    queries: Arc<RwLock<Vec<String>>>,
    delay: Arc<RwLock<Option<Duration>>>,
    query_delays: Arc<RwLock<HashMap<String, Duration>>>,
    in_flight: Arc<AtomicUsize>,
    peak_in_flight: Arc<AtomicUsize>,
}

impl std::fmt::Debug for MockSearcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockSearcher")
            .field("results", &"<results>")
            .field("errors", &"<errors>")
            .field("peak_in_flight", &self.peak_in_flight())
            .finish()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

impl MockSearcher {
    /// Create a mock searcher that finds nothing.
    pub fn new() -> Self {
        Self {
            results: Arc::new(RwLock::new(HashMap::new())),
            fallback: Arc::new(RwLock::new(Vec::new())),
            errors: Arc::new(RwLock::new(HashMap::new())),
            fail_all: Arc::new(RwLock::new(None)),
            queries: Arc::new(RwLock::new(Vec::new())),
            delay: Arc::new(RwLock::new(None)),
            query_delays: Arc::new(RwLock::new(HashMap::new())),
            in_flight: Arc::new(AtomicUsize::new(0)),
            peak_in_flight: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Results for an exact query string.
    pub async fn set_results(&self, query: &str, candidates: Vec<Candidate>) {
        self.results
            .write()
            .await
            .insert(query.to_string(), candidates);
    }

    /// Results for any query without its own entry.
    pub async fn set_fallback(&self, candidates: Vec<Candidate>) {
        *self.fallback.write().await = candidates;
    }

    /// Make one query fail with a connection error.
    pub async fn fail_query(&self, query: &str, message: &str) {
        self.errors
            .write()
            .await
            .insert(query.to_string(), message.to_string());
    }

    /// Make every query fail with a connection error.
    pub async fn fail_all(&self, message: &str) {
        *self.fail_all.write().await = Some(message.to_string());
    }

    /// Sleep this long inside every search.
    pub async fn set_delay(&self, delay: Duration) {
        *self.delay.write().await = Some(delay);
    }

    /// Sleep this long when searching one query. Overrides [`Self::set_delay`].
    pub async fn set_delay_for(&self, query: &str, delay: Duration) {
        self.query_delays
            .write()
            .await
            .insert(query.to_string(), delay);
    }

    /// Queries searched so far, in order.
    pub async fn recorded_queries(&self) -> Vec<String> {
        self.queries.read().await.clone()
    }

    pub async fn search_count(&self) -> usize {
        self.queries.read().await.len()
    }

    /// Highest number of searches that were running at the same time.
    pub fn peak_in_flight(&self) -> usize {
        self.peak_in_flight.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl Searcher for MockSearcher {
    fn name(&self) -> &str {
        "mock"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        self.queries.write().await.push(query.to_string());

        let current = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(current, Ordering::SeqCst);
        let delay = match self.query_delays.read().await.get(query) {
            Some(delay) => Some(*delay),
            None => *self.delay.read().await,
        };
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);

        if let Some(message) = self.fail_all.read().await.clone() {
            return Err(SearchError::ConnectionFailed(message));
        }
        if let Some(message) = self.errors.read().await.get(query).cloned() {
            return Err(SearchError::ConnectionFailed(message));
        }

        let found = match self.results.read().await.get(query) {
            Some(candidates) => candidates.clone(),
            None => self.fallback.read().await.clone(),
        };
        Ok(found.into_iter().take(limit).collect())
    }
}

/// Mock implementation of the Enricher trait.
///
/// Returns candidates unchanged unless a thumbnail or title has been
/// configured for their detail URL.
#[derive(Debug, Default)]
pub struct MockEnricher {
    thumbnails: Arc<RwLock<HashMap<String, String>>>,
    titles: Arc<RwLock<HashMap<String, String>>>,
    failing: Arc<RwLock<HashSet<String>>>,
    calls: Arc<RwLock<Vec<String>>>,
}

impl MockEnricher {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn set_thumbnail(&self, detail_url: &str, thumbnail_url: &str) {
        self.thumbnails
            .write()
            .await
            .insert(detail_url.to_string(), thumbnail_url.to_string());
    }

    pub async fn set_title(&self, detail_url: &str, title: &str) {
        self.titles
            .write()
            .await
            .insert(detail_url.to_string(), title.to_string());
    }

    /// Make enrichment of this detail URL fail.
    pub async fn fail_url(&self, detail_url: &str) {
        self.failing.write().await.insert(detail_url.to_string());
    }

    /// Detail URLs fetched so far, in order.
    pub async fn recorded_calls(&self) -> Vec<String> {
        self.calls.read().await.clone()
    }
}

#[async_trait]
impl Enricher for MockEnricher {
    async fn enrich(&self, candidate: &Candidate) -> Result<Candidate, SearchError> {
        self.calls
            .write()
            .await
            .push(candidate.detail_url.clone());

        if self.failing.read().await.contains(&candidate.detail_url) {
            return Err(SearchError::HttpStatus {
                status: 503,
                url: candidate.detail_url.clone(),
            });
        }

        let mut enriched = candidate.clone();
        if let Some(thumbnail) = self.thumbnails.read().await.get(&candidate.detail_url) {
            enriched.thumbnail_url = thumbnail.clone();
        }
        if let Some(title) = self.titles.read().await.get(&candidate.detail_url) {
            enriched.title = title.clone();
        }
        Ok(enriched)
    }
}
