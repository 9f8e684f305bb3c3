//! Search-results page parsing.
//!
//! A [`CandidateParser`] runs an ordered list of [`ExtractionStrategy`]
//! implementations over one document. Each strategy is independent and
//! pure; the parser canonicalises what they return, drops anything that is
//! not a detail page of the site, deduplicates by canonical URL (first
//! occurrence wins) and stops once the requested count is reached.

use once_cell::sync::Lazy;
use scraper::{ElementRef, Html, Selector};
use serde_json::Value;
use std::collections::HashSet;
use tracing::debug;

use super::links::{candidate_id, collapse_whitespace, first_srcset_entry, title_from_slug, SiteProfile};
use super::{Candidate, RawCandidate};

/// Count used when a caller asks for zero candidates.
pub const DEFAULT_MAX_CANDIDATES: usize = 5;

pub(crate) fn selector(css: &str) -> Selector {
    Selector::parse(css).unwrap_or_else(|e| panic!("invalid built-in selector {css}: {e}"))
}

static ANCHOR: Lazy<Selector> = Lazy::new(|| selector("a[href]"));
static IMG: Lazy<Selector> = Lazy::new(|| selector("img"));
pub(crate) static JSON_LD: Lazy<Selector> =
    Lazy::new(|| selector(r#"script[type="application/ld+json"]"#));
/// Card containers, visited one pattern at a time in this order.
static CARDS: Lazy<Vec<Selector>> = Lazy::new(|| {
    ["article", ".post", ".entry", ".result-item", ".search-result", ".type-post"]
        .iter()
        .map(|css| selector(css))
        .collect()
});

const LAZY_IMAGE_ATTRS: [&str; 4] = ["data-src", "data-lazy-src", "data-original", "src"];

/// (selector, attributes checked in order) pairs.
type AttrChain = Vec<(Selector, &'static [&'static str])>;

static CARD_LINKS: Lazy<AttrChain> = Lazy::new(|| {
    [
        "a.entry-title[href]",
        "h1 a[href]",
        "h2 a[href]",
        "h3 a[href]",
        r#"a[rel="bookmark"][href]"#,
        "a[href]",
    ]
    .iter()
    .map(|css| (selector(css), &["href"][..]))
    .collect()
});

static CARD_TITLES: Lazy<Vec<Selector>> = Lazy::new(|| {
    [".entry-title", "h1", "h2", "h3", r#"a[rel="bookmark"]"#, "a"]
        .iter()
        .map(|css| selector(css))
        .collect()
});

static CARD_THUMBNAILS: Lazy<AttrChain> = Lazy::new(|| {
    vec![
        (selector("img[data-src]"), &["data-src"][..]),
        (selector("img[data-lazy-src]"), &["data-lazy-src"][..]),
        (selector("img[data-original]"), &["data-original"][..]),
        (selector("img[src]"), &["src"][..]),
        (selector("source[data-srcset]"), &["data-srcset", "srcset"][..]),
        (selector("source[srcset]"), &["data-srcset", "srcset"][..]),
    ]
});

/// One way of pulling candidates out of a search-results document.
pub trait ExtractionStrategy: Send + Sync {
    fn name(&self) -> &'static str;

    fn extract(&self, document: &Html, site: &SiteProfile) -> Vec<RawCandidate>;
}

/// Anchors whose target contains the site's detail path.
#[derive(Debug, Default)]
pub struct DirectLinkStrategy;

impl ExtractionStrategy for DirectLinkStrategy {
    fn name(&self) -> &'static str {
        "direct_link"
    }

    fn extract(&self, document: &Html, site: &SiteProfile) -> Vec<RawCandidate> {
        let mut out = Vec::new();
        for anchor in document.select(&ANCHOR) {
            let href = anchor.value().attr("href").unwrap_or("").trim();
            if !href.contains(site.detail_path()) || !site.is_detail_url(href) {
                continue;
            }

            let image = anchor.select(&IMG).next().or_else(|| {
                anchor
                    .parent()
                    .and_then(ElementRef::wrap)
                    .and_then(|parent| parent.select(&IMG).next())
            });

            let mut title = first_non_empty([
                anchor.value().attr("title").map(str::to_string),
                anchor.value().attr("aria-label").map(str::to_string),
                Some(element_text(anchor)),
                image.and_then(|img| img.value().attr("alt").map(str::to_string)),
                image.and_then(|img| img.value().attr("title").map(str::to_string)),
            ]);
            if title.is_empty() {
                title = title_from_slug(&site.canonical_url(href));
            }

            let thumbnail_url = image
                .map(|img| first_attr(img, &LAZY_IMAGE_ATTRS))
                .unwrap_or_default();

            out.push(RawCandidate {
                detail_url: href.to_string(),
                title,
                thumbnail_url,
            });
        }
        out
    }
}

/// Generic article/result cards as produced by common CMS themes.
#[derive(Debug, Default)]
pub struct CardStrategy;

impl ExtractionStrategy for CardStrategy {
    fn name(&self) -> &'static str {
        "card"
    }

    fn extract(&self, document: &Html, _site: &SiteProfile) -> Vec<RawCandidate> {
        CARDS
            .iter()
            .flat_map(|container| document.select(container))
            .map(|card| RawCandidate {
                detail_url: first_in_chain(card, &CARD_LINKS),
                title: CARD_TITLES
                    .iter()
                    .filter_map(|sel| card.select(sel).next())
                    .map(element_text)
                    .find(|t| !t.is_empty())
                    .unwrap_or_default(),
                thumbnail_url: card_thumbnail(card),
            })
            .filter(|raw| !raw.detail_url.is_empty())
            .collect()
    }
}

/// Embedded schema.org JSON-LD blocks, walked recursively.
#[derive(Debug, Default)]
pub struct StructuredDataStrategy;

impl ExtractionStrategy for StructuredDataStrategy {
    fn name(&self) -> &'static str {
        "structured_data"
    }

    fn extract(&self, document: &Html, site: &SiteProfile) -> Vec<RawCandidate> {
        let mut out = Vec::new();
        for script in document.select(&JSON_LD) {
            let text = script.text().collect::<String>();
            match serde_json::from_str::<Value>(&text) {
                Ok(value) => walk_structured(&value, &mut out),
                Err(e) => debug!(error = %e, "Skipping malformed JSON-LD block"),
            }
        }
        out.retain(|raw| site.is_detail_url(&raw.detail_url));
        out
    }
}

fn walk_structured(value: &Value, out: &mut Vec<RawCandidate>) {
    match value {
        Value::Object(map) => {
            let name = map.get("name").and_then(Value::as_str).unwrap_or("").trim();
            let url = map.get("url").and_then(Value::as_str).unwrap_or("").trim();
            if !name.is_empty() || !url.is_empty() {
                out.push(RawCandidate {
                    detail_url: url.to_string(),
                    title: if name.is_empty() {
                        title_from_slug(url)
                    } else {
                        name.to_string()
                    },
                    thumbnail_url: json_thumbnail(value).unwrap_or_default(),
                });
            }
            for child in map.values() {
                walk_structured(child, out);
            }
        }
        Value::Array(items) => {
            for item in items {
                walk_structured(item, out);
            }
        }
        _ => {}
    }
}

/// Thumbnail declared directly on a JSON-LD object.
pub(crate) fn json_thumbnail(value: &Value) -> Option<String> {
    let map = value.as_object()?;
    ["thumbnailUrl", "image"]
        .iter()
        .filter_map(|key| map.get(*key))
        .find_map(image_value)
}

fn image_value(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.trim().to_string()),
        Value::Object(map) => map.get("url").and_then(image_value),
        Value::Array(items) => items.iter().find_map(image_value),
        _ => None,
    }
}

/// Orders extraction strategies and merges their output.
pub struct CandidateParser {
    strategies: Vec<Box<dyn ExtractionStrategy>>,
}

impl std::fmt::Debug for CandidateParser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CandidateParser")
            .field(
                "strategies",
                &self.strategies.iter().map(|s| s.name()).collect::<Vec<_>>(),
            )
            .finish()
    }
}

impl Default for CandidateParser {
    fn default() -> Self {
        Self::new(vec![
            Box::new(DirectLinkStrategy),
            Box::new(CardStrategy),
            Box::new(StructuredDataStrategy),
        ])
    }
}

impl CandidateParser {
    pub fn new(strategies: Vec<Box<dyn ExtractionStrategy>>) -> Self {
        Self { strategies }
    }

    /// Parse one search-results document into at most `max_count`
    /// candidates. Malformed markup yields fewer candidates, never an error.
    pub fn parse(&self, html: &str, site: &SiteProfile, max_count: usize) -> Vec<Candidate> {
        let max_count = if max_count == 0 {
            DEFAULT_MAX_CANDIDATES
        } else {
            max_count
        };
        let document = Html::parse_document(html);
        let mut merged = MergedCandidates::new(max_count);

        for strategy in &self.strategies {
            let found = strategy.extract(&document, site);
            let before = merged.len();
            for raw in found {
                if merged.push(raw, site) {
                    break;
                }
            }
            debug!(
                strategy = strategy.name(),
                added = merged.len() - before,
                "Extraction strategy finished"
            );
            if merged.is_full() {
                break;
            }
        }

        merged.into_candidates()
    }
}

struct MergedCandidates {
    seen: HashSet<String>,
    out: Vec<Candidate>,
    limit: usize,
}

impl MergedCandidates {
    fn new(limit: usize) -> Self {
        Self {
            seen: HashSet::new(),
            out: Vec::new(),
            limit,
        }
    }

    /// Add a candidate if it is new and valid. Returns true once full.
    fn push(&mut self, raw: RawCandidate, site: &SiteProfile) -> bool {
        if self.is_full() {
            return true;
        }
        let detail_url = site.canonical_url(&raw.detail_url);
        let title = site.clean_title(&raw.title);
        if detail_url.is_empty()
            || title.is_empty()
            || !site.is_detail_url(&detail_url)
            || self.seen.contains(&detail_url)
        {
            return false;
        }

        let thumbnail_url = site.absolute_url(&raw.thumbnail_url);
        self.seen.insert(detail_url.clone());
        self.out.push(Candidate {
            id: candidate_id(&detail_url),
            title,
            detail_url,
            thumbnail_url,
        });
        self.is_full()
    }

    fn len(&self) -> usize {
        self.out.len()
    }

    fn is_full(&self) -> bool {
        self.out.len() >= self.limit
    }

    fn into_candidates(self) -> Vec<Candidate> {
        self.out
    }
}

fn element_text(element: ElementRef<'_>) -> String {
    collapse_whitespace(&element.text().collect::<Vec<_>>().join(" "))
}

fn first_attr(element: ElementRef<'_>, attrs: &[&str]) -> String {
    attrs
        .iter()
        .filter_map(|name| element.value().attr(name))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .unwrap_or("")
        .to_string()
}

fn first_in_chain(scope: ElementRef<'_>, chain: &AttrChain) -> String {
    chain
        .iter()
        .filter_map(|(sel, attrs)| scope.select(sel).next().map(|el| first_attr(el, attrs)))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}

/// First thumbnail in a card. Only source-set values are cut to their
/// first entry; plain URLs may legitimately contain commas.
fn card_thumbnail(card: ElementRef<'_>) -> String {
    CARD_THUMBNAILS
        .iter()
        .filter_map(|(sel, attrs)| card.select(sel).next().map(|el| (el, *attrs)))
        .find_map(|(el, attrs)| {
            attrs.iter().find_map(|name| {
                let value = el.value().attr(name)?.trim();
                let value = if name.ends_with("srcset") {
                    first_srcset_entry(value)
                } else {
                    value
                };
                (!value.is_empty()).then(|| value.to_string())
            })
        })
        .unwrap_or_default()
}

fn first_non_empty<const N: usize>(values: [Option<String>; N]) -> String {
    values
        .into_iter()
        .flatten()
        .map(|v| collapse_whitespace(&v))
        .find(|v| !v.is_empty())
        .unwrap_or_default()
}
