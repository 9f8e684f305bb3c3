//! Search client and enrichment stage for the configured catalog site.

use async_trait::async_trait;
use tracing::{debug, info, warn};

use crate::config::SiteConfig;

use super::detail::extract_detail;
use super::fetch::{FetchKind, HttpFetcher};
use super::links::SiteProfile;
use super::parser::CandidateParser;
use super::{Candidate, Enricher, SearchError, Searcher};

/// Scrapes the catalog site's HTML search and detail pages.
#[derive(Debug)]
pub struct SiteScraper {
    site: SiteProfile,
    fetcher: HttpFetcher,
    parser: CandidateParser,
    search_endpoints: Vec<String>,
}

impl SiteScraper {
    pub fn new(config: &SiteConfig) -> Result<Self, SearchError> {
        Ok(Self {
            site: SiteProfile::new(config)?,
            fetcher: HttpFetcher::new(config)?,
            parser: CandidateParser::default(),
            search_endpoints: config.search_endpoints.clone(),
        })
    }

    /// Replace the default extraction strategies.
    pub fn with_parser(mut self, parser: CandidateParser) -> Self {
        self.parser = parser;
        self
    }

    pub fn site(&self) -> &SiteProfile {
        &self.site
    }

    /// One absolute search URL per configured endpoint.
    pub fn search_urls(&self, query: &str) -> Vec<String> {
        let encoded = urlencoding::encode(query.trim());
        self.search_endpoints
            .iter()
            .filter(|endpoint| endpoint.contains("{query}"))
            .map(|endpoint| self.site.absolute_url(&endpoint.replace("{query}", &encoded)))
            .filter(|url| !url.is_empty())
            .collect()
    }
}

#[async_trait]
impl Searcher for SiteScraper {
    fn name(&self) -> &str {
        "site"
    }

    async fn search(&self, query: &str, limit: usize) -> Result<Vec<Candidate>, SearchError> {
        let mut merged: Vec<Candidate> = Vec::new();
        let mut last_error = None;

        for url in self.search_urls(query) {
            if merged.len() >= limit {
                break;
            }
            let page = match self.fetcher.get(&url, FetchKind::Search).await {
                Ok(page) => page,
                Err(e) => {
                    warn!(url = %url, error = %e, "Search request failed");
                    last_error = Some(e);
                    continue;
                }
            };

            let parsed = self.parser.parse(&page.body, &self.site, limit);
            info!(
                url = %url,
                status = page.status,
                bytes = page.body.len(),
                candidates = parsed.len(),
                "Search page parsed"
            );

            for candidate in parsed {
                if merged.len() >= limit {
                    break;
                }
                if merged.iter().any(|c| c.detail_url == candidate.detail_url) {
                    continue;
                }
                merged.push(candidate);
            }
        }

        match last_error {
            Some(e) if merged.is_empty() => Err(e),
            _ => Ok(merged),
        }
    }
}

#[async_trait]
impl Enricher for SiteScraper {
    async fn enrich(&self, candidate: &Candidate) -> Result<Candidate, SearchError> {
        let url = self.site.canonical_url(&candidate.detail_url);
        if url.is_empty() {
            return Err(SearchError::InvalidUrl(candidate.detail_url.clone()));
        }

        let page = self.fetcher.get(&url, FetchKind::Detail).await?;
        let detail = extract_detail(&page.body, &self.site);

        let mut enriched = candidate.clone();
        if !detail.thumbnail_url.is_empty() {
            enriched.thumbnail_url = detail.thumbnail_url;
        }
        if !detail.title.is_empty() {
            enriched.title = detail.title;
        }
        debug!(
            url = %url,
            thumbnail = %enriched.thumbnail_url,
            "Candidate enriched"
        );
        Ok(enriched)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::searcher::StructuredDataStrategy;
    use wiremock::matchers::{method, path, query_param};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn config_for(server: &MockServer) -> SiteConfig {
        SiteConfig {
            base_url: server.uri(),
            max_retries: 0,
            timeout_secs: 5,
            ..SiteConfig::default()
        }
    }

    const RESULTS_PAGE: &str = r#"
<html><body>
  <a href="/video/alpha-clip_aaaaaaaaaaaaaaaaaaaaaaaa" title="Alpha Clip"></a>
  <a href="/video/beta-clip_bbbbbbbbbbbbbbbbbbbbbbbb" title="Beta Clip"></a>
</body></html>"#;

    #[test]
    fn test_search_urls_encode_query() {
        let scraper = SiteScraper::new(&SiteConfig {
            search_endpoints: vec![
                "/search?q={query}".to_string(),
                "https://api.pmvhaven.com/find/{query}".to_string(),
                "/no-placeholder".to_string(),
            ],
            ..SiteConfig::default()
        })
        .unwrap();

        let urls = scraper.search_urls("  my cool video ");
        assert_eq!(
            urls,
            vec![
                "https://pmvhaven.com/search?q=my%20cool%20video".to_string(),
                "https://api.pmvhaven.com/find/my%20cool%20video".to_string(),
            ]
        );
    }

    #[tokio::test]
    async fn test_search_parses_results() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .and(query_param("q", "alpha clip"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
            .mount(&server)
            .await;

        let scraper = SiteScraper::new(&config_for(&server)).unwrap();
        let candidates = scraper.search("alpha clip", 5).await.unwrap();

        assert_eq!(candidates.len(), 2);
        assert_eq!(candidates[0].title, "Alpha Clip");
        assert_eq!(candidates[0].id, "aaaaaaaaaaaaaaaaaaaaaaaa");
        assert!(candidates[0].detail_url.starts_with(&server.uri()));
    }

    #[tokio::test]
    async fn test_search_error_only_without_candidates() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(500))
            .mount(&server)
            .await;

        let scraper = SiteScraper::new(&config_for(&server)).unwrap();
        let err = scraper.search("anything", 5).await.unwrap_err();
        assert!(matches!(err, SearchError::HttpStatus { status: 500, .. }));
    }

    #[tokio::test]
    async fn test_search_merges_variants_and_tolerates_one_failure() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/broken"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
            .mount(&server)
            .await;

        let mut config = config_for(&server);
        config.search_endpoints = vec![
            "/broken?q={query}".to_string(),
            "/search?q={query}".to_string(),
            "/search?page=2&q={query}".to_string(),
        ];
        let scraper = SiteScraper::new(&config).unwrap();
        let candidates = scraper.search("clip", 5).await.unwrap();

        // Second and third endpoints return the same page; dedup keeps two.
        assert_eq!(candidates.len(), 2);
    }

    #[tokio::test]
    async fn test_search_empty_page_is_not_an_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let scraper = SiteScraper::new(&config_for(&server)).unwrap();
        assert!(scraper.search("nothing", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_custom_parser_replaces_default_strategies() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(ResponseTemplate::new(200).set_body_string(RESULTS_PAGE))
            .mount(&server)
            .await;

        let scraper = SiteScraper::new(&config_for(&server))
            .unwrap()
            .with_parser(CandidateParser::new(vec![Box::new(StructuredDataStrategy)]));
        assert_eq!(scraper.site().host(), "127.0.0.1");

        // plain anchors are only picked up by the direct-link strategy
        assert!(scraper.search("alpha clip", 5).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_enrich_replaces_thumbnail_and_title() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/video/alpha-clip_aaaaaaaaaaaaaaaaaaaaaaaa"))
            .respond_with(ResponseTemplate::new(200).set_body_string(
                r#"<html><head>
<meta property="og:image" content="/covers/alpha.jpg">
<meta property="og:title" content="Alpha Clip Remastered | PMVHaven">
</head></html>"#,
            ))
            .mount(&server)
            .await;

        let scraper = SiteScraper::new(&config_for(&server)).unwrap();
        let candidate = Candidate {
            id: "aaaaaaaaaaaaaaaaaaaaaaaa".to_string(),
            title: "Alpha Clip".to_string(),
            detail_url: format!("{}/video/alpha-clip_aaaaaaaaaaaaaaaaaaaaaaaa", server.uri()),
            thumbnail_url: String::new(),
        };

        let enriched = scraper.enrich(&candidate).await.unwrap();
        assert_eq!(enriched.thumbnail_url, format!("{}/covers/alpha.jpg", server.uri()));
        assert_eq!(enriched.title, "Alpha Clip Remastered");
        assert_eq!(enriched.id, candidate.id);
    }

    #[tokio::test]
    async fn test_enrich_keeps_existing_values_when_page_is_bare() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html></html>"))
            .mount(&server)
            .await;

        let scraper = SiteScraper::new(&config_for(&server)).unwrap();
        let candidate = Candidate {
            id: "x".to_string(),
            title: "Kept".to_string(),
            detail_url: format!("{}/video/kept", server.uri()),
            thumbnail_url: "https://cdn.example/kept.jpg".to_string(),
        };

        let enriched = scraper.enrich(&candidate).await.unwrap();
        assert_eq!(enriched, candidate);
    }

    #[tokio::test]
    async fn test_enrich_status_error() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .mount(&server)
            .await;

        let scraper = SiteScraper::new(&config_for(&server)).unwrap();
        let candidate = Candidate {
            id: "x".to_string(),
            title: "Gone".to_string(),
            detail_url: format!("{}/video/gone", server.uri()),
            thumbnail_url: String::new(),
        };
        let err = scraper.enrich(&candidate).await.unwrap_err();
        assert!(matches!(err, SearchError::HttpStatus { status: 404, .. }));
    }
}
