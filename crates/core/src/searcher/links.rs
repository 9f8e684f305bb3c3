//! URL handling for the catalog site: resolution, canonical form,
//! detail-page acceptance and candidate identifiers.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use scraper::Html;
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::SiteConfig;

use super::SearchError;

static NATIVE_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"_([a-f0-9]{24})$").unwrap());
static NON_SLUG: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\-_]+").unwrap());
static TRAILING_HEX_ID: Lazy<Regex> = Lazy::new(|| Regex::new(r"\s+[a-f0-9]{24}$").unwrap());

/// Static facts about the target site used while parsing its pages.
#[derive(Debug, Clone)]
pub struct SiteProfile {
    base: Url,
    host: String,
    detail_path: String,
    blocked_paths: Vec<String>,
    site_name: String,
}

impl SiteProfile {
    pub fn new(config: &SiteConfig) -> Result<Self, SearchError> {
        let base = Url::parse(&config.base_url)
            .map_err(|e| SearchError::InvalidUrl(format!("{}: {}", config.base_url, e)))?;
        let host = base
            .host_str()
            .ok_or_else(|| SearchError::InvalidUrl(format!("{}: missing host", config.base_url)))?
            .to_lowercase();

        Ok(Self {
            base,
            host,
            detail_path: config.detail_path.clone(),
            blocked_paths: config
                .blocked_paths
                .iter()
                .map(|p| p.to_lowercase())
                .collect(),
            site_name: config.site_name.clone(),
        })
    }

    pub fn base(&self) -> &Url {
        &self.base
    }

    pub fn host(&self) -> &str {
        &self.host
    }

    /// Path marker of detail pages, e.g. `/video/`.
    pub fn detail_path(&self) -> &str {
        &self.detail_path
    }

    /// Resolve `raw` against the site base. Returns an empty string when
    /// nothing usable is left.
    pub fn absolute_url(&self, raw: &str) -> String {
        let raw = raw.trim();
        if raw.is_empty() {
            return String::new();
        }
        if raw.starts_with("//") {
            return format!("https:{}", raw);
        }
        let lower = raw.to_ascii_lowercase();
        if lower.starts_with("http://") || lower.starts_with("https://") {
            return raw.to_string();
        }
        self.base
            .join(raw)
            .map(|u| u.to_string())
            .unwrap_or_default()
    }

    /// Absolute URL without fragment, query string or trailing slash.
    pub fn canonical_url(&self, raw: &str) -> String {
        let absolute = self.absolute_url(raw);
        if absolute.is_empty() {
            return String::new();
        }
        let Ok(mut url) = Url::parse(&absolute) else {
            return String::new();
        };
        url.set_fragment(None);
        url.set_query(None);
        let path = url.path().trim_end_matches('/').to_string();
        url.set_path(&path);

        let mut canonical = url.to_string();
        // A special-scheme URL always serialises an empty path as "/".
        if canonical.ends_with('/') {
            canonical.pop();
        }
        canonical
    }

    /// Whether `raw` points at a content page of this site.
    pub fn is_detail_url(&self, raw: &str) -> bool {
        let canonical = self.canonical_url(raw);
        if canonical.is_empty() {
            return false;
        }
        let Ok(url) = Url::parse(&canonical) else {
            return false;
        };
        if !self.host_matches(url.host_str().unwrap_or("")) {
            return false;
        }
        if url.path().trim_matches('/').is_empty() {
            return false;
        }

        let absolute = self.absolute_url(raw).to_lowercase();
        let canonical = canonical.to_lowercase();
        !self
            .blocked_paths
            .iter()
            .any(|blocked| absolute.contains(blocked) || canonical.contains(blocked))
    }

    /// Same host, a subdomain of it, or the same host with `www.` added
    /// or removed.
    fn host_matches(&self, host: &str) -> bool {
        let host = host.to_lowercase();
        let bare = |h: &str| h.strip_prefix("www.").unwrap_or(h).to_string();
        host == self.host
            || host.ends_with(&format!(".{}", self.host))
            || bare(&host) == bare(&self.host)
    }

    /// Unescape entities, trim, and strip a trailing ` | Site` / ` - Site`.
    pub fn clean_title(&self, raw: &str) -> String {
        let mut title = if raw.contains('&') {
            unescape_html(raw)
        } else {
            raw.to_string()
        };
        title = collapse_whitespace(&title);

        if !self.site_name.is_empty() {
            for separator in [" | ", " - "] {
                let suffix = format!("{}{}", separator, self.site_name);
                if let Some(stripped) = title.strip_suffix(&suffix) {
                    title = stripped.trim().to_string();
                }
            }
        }
        title
    }
}

/// Identifier derived from a canonical URL.
///
/// Prefers the site's native 24-hex id suffix, then the sanitised final
/// path segment, then a short hash of the whole URL.
pub fn candidate_id(canonical_url: &str) -> String {
    let base = last_path_segment(canonical_url).to_lowercase();

    if let Some(caps) = NATIVE_ID.captures(&base) {
        return caps[1].to_string();
    }

    let slug = NON_SLUG.replace_all(&base, "-");
    let slug = slug.trim_matches('-');
    if !slug.is_empty() {
        return slug.to_string();
    }

    let digest = Sha256::digest(canonical_url.as_bytes());
    digest
        .iter()
        .take(6)
        .map(|b| format!("{:02x}", b))
        .collect()
}

/// Human title synthesised from a URL slug, dropping a trailing hex id.
pub fn title_from_slug(url: &str) -> String {
    let segment = last_path_segment(url);
    let decoded = urlencoding::decode(segment)
        .map(|s| s.into_owned())
        .unwrap_or_else(|_| segment.to_string());
    let spaced = decoded.replace(['_', '-'], " ");
    let spaced = collapse_whitespace(&spaced);
    collapse_whitespace(&TRAILING_HEX_ID.replace(&spaced, ""))
}

/// First URL of a `srcset`-style value.
pub fn first_srcset_entry(value: &str) -> &str {
    let first = value.split(',').next().unwrap_or("").trim();
    first.split_whitespace().next().unwrap_or("")
}

pub fn collapse_whitespace(value: &str) -> String {
    value.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn last_path_segment(url: &str) -> &str {
    let without_query = url.split(['?', '#']).next().unwrap_or(url);
    let path = match without_query.split_once("://") {
        Some((_, rest)) => rest.split_once('/').map(|(_, path)| path).unwrap_or(""),
        None => without_query,
    };
    path.trim_end_matches('/').rsplit('/').next().unwrap_or("")
}

fn unescape_html(raw: &str) -> String {
    let fragment = Html::parse_fragment(raw);
    fragment.root_element().text().collect::<String>()
}
