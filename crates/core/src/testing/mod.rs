//! Testing utilities and mock implementations.
//!
//! Mocks for every external seam of the matcher (catalog search, detail
//! enrichment, re-ranking, the library) so orchestration can be tested
//! without a network or a database.
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use reelmatch_core::testing::{fixtures, MockEnricher, MockLibrary, MockSearcher};
//!
//! let library = Arc::new(MockLibrary::new());
//! let file_id = library.add_file("Hot Mess PMV.mp4");
//! let searcher = Arc::new(MockSearcher::new());
//! searcher.set_fallback(vec![fixtures::candidate("hot-mess", "Hot Mess PMV")]).await;
//! ```

mod mock_library;
mod mock_reranker;
mod mock_searcher;

pub use mock_library::MockLibrary;
pub use mock_reranker::MockReranker;
pub use mock_searcher::{MockEnricher, MockSearcher};

/// Test fixtures and helper functions.
pub mod fixtures {
    use crate::config::MatcherConfig;
    use crate::matcher::ScoredCandidate;
    use crate::searcher::{candidate_id, Candidate};

    pub const BASE_URL: &str = "https://pmvhaven.com";

    /// Detail URL for a slug on the default site.
    pub fn detail_url(slug: &str) -> String {
        format!("{}/video/{}", BASE_URL, slug)
    }

    /// A candidate on the default site.
    pub fn candidate(slug: &str, title: &str) -> Candidate {
        let detail_url = detail_url(slug);
        Candidate {
            id: candidate_id(&detail_url),
            title: title.to_string(),
            detail_url,
            thumbnail_url: String::new(),
        }
    }

    /// A candidate with a thumbnail.
    pub fn candidate_with_thumbnail(slug: &str, title: &str, thumbnail_url: &str) -> Candidate {
        let mut c = candidate(slug, title);
        c.thumbnail_url = thumbnail_url.to_string();
        c
    }

    /// A scored candidate at `rank` (1-based).
    pub fn scored(slug: &str, title: &str, confidence: f64, rank: usize) -> ScoredCandidate {
        ScoredCandidate {
            candidate: candidate(slug, title),
            confidence,
            rank,
            reason: "baseline text similarity".to_string(),
        }
    }

    /// Matcher config that links any candidate.
    pub fn matcher_config() -> MatcherConfig {
        MatcherConfig::default()
    }

    /// A search results page with one article card per `(slug, title, thumbnail)`.
    pub fn search_page(cards: &[(&str, &str, &str)]) -> String {
        let body: String = cards
            .iter()
            .map(|(slug, title, thumbnail)| {
                format!(
                    r#"<article class="video-card"><a href="/video/{slug}"><img src="{thumbnail}" alt="{title}"></a><h3 class="title"><a href="/video/{slug}">{title}</a></h3></article>"#
                )
            })
            .collect();
        format!(
            "<html><head><title>Search</title></head><body><main>{}</main></body></html>",
            body
        )
    }

    /// A detail page carrying Open Graph title and image.
    pub fn detail_page(title: &str, image: &str) -> String {
        format!(
            r#"<html><head><meta property="og:title" content="{title}"><meta property="og:image" content="{image}"><title>{title} | PMVHaven</title></head><body></body></html>"#
        )
    }
}
