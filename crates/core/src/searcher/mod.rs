//! Catalog search and enrichment.
//!
//! This module provides the `Searcher` and `Enricher` traits and their
//! HTML-scraping implementation for the configured catalog site:
//!
//! - `links`: URL resolution, canonical form, detail-page acceptance, ids
//! - `parser`: search-results parsing through ordered extraction strategies
//! - `detail`: detail-page thumbnail/title extraction
//! - `fetch`: bounded-timeout, bounded-retry HTTP GET
//! - `site`: `SiteScraper`, tying the above together

mod detail;
mod fetch;
mod links;
mod parser;
mod site;
mod types;

pub use detail::{extract_detail, DetailPage};
pub use fetch::{FetchKind, FetchedPage, HttpFetcher};
pub use links::{candidate_id, first_srcset_entry, title_from_slug, SiteProfile};
pub use parser::{
    CandidateParser, CardStrategy, DirectLinkStrategy, ExtractionStrategy, StructuredDataStrategy,
    DEFAULT_MAX_CANDIDATES,
};
pub use site::SiteScraper;
pub use types::*;
