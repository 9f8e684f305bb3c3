//! Detail-page extraction: thumbnail and title with ordered fallbacks.

use once_cell::sync::Lazy;
use scraper::{Html, Selector};
use serde_json::Value;

use super::links::SiteProfile;
use super::parser::{json_thumbnail, selector, JSON_LD};

static OG_IMAGE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:image"]"#));
static TWITTER_IMAGE: Lazy<Selector> = Lazy::new(|| {
    selector(r#"meta[name="twitter:image"], meta[property="twitter:image"]"#)
});
static VIDEO_POSTER: Lazy<Selector> = Lazy::new(|| selector("video[poster]"));
static OG_TITLE: Lazy<Selector> = Lazy::new(|| selector(r#"meta[property="og:title"]"#));
static TWITTER_TITLE: Lazy<Selector> = Lazy::new(|| {
    selector(r#"meta[name="twitter:title"], meta[property="twitter:title"]"#)
});
static TITLE: Lazy<Selector> = Lazy::new(|| selector("title"));

/// Values recovered from a detail page. Empty strings mean "not found".
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DetailPage {
    pub thumbnail_url: String,
    pub title: String,
}

pub fn extract_detail(html: &str, site: &SiteProfile) -> DetailPage {
    let document = Html::parse_document(html);
    DetailPage {
        thumbnail_url: site.absolute_url(&detail_thumbnail(&document)),
        title: site.clean_title(&detail_title(&document)),
    }
}

fn detail_thumbnail(document: &Html) -> String {
    let from_markup = [
        (&*OG_IMAGE, "content"),
        (&*TWITTER_IMAGE, "content"),
        (&*VIDEO_POSTER, "poster"),
    ]
    .into_iter()
    .find_map(|(sel, attr)| first_attr_value(document, sel, attr));

    from_markup
        .or_else(|| {
            document
                .select(&JSON_LD)
                .filter_map(|script| {
                    serde_json::from_str::<Value>(&script.text().collect::<String>()).ok()
                })
                .find_map(|value| find_json_thumbnail(&value))
        })
        .unwrap_or_default()
}

fn detail_title(document: &Html) -> String {
    first_attr_value(document, &OG_TITLE, "content")
        .or_else(|| first_attr_value(document, &TWITTER_TITLE, "content"))
        .or_else(|| {
            document
                .select(&TITLE)
                .map(|t| t.text().collect::<String>().trim().to_string())
                .find(|t| !t.is_empty())
        })
        .unwrap_or_default()
}

fn first_attr_value(document: &Html, selector: &Selector, attr: &str) -> Option<String> {
    document
        .select(selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::trim)
        .find(|v| !v.is_empty())
        .map(str::to_string)
}

/// Depth-first search for the first thumbnail-bearing object.
fn find_json_thumbnail(value: &Value) -> Option<String> {
    if let Some(found) = json_thumbnail(value) {
        return Some(found);
    }
    match value {
        Value::Object(map) => map.values().find_map(find_json_thumbnail),
        Value::Array(items) => items.iter().find_map(find_json_thumbnail),
        _ => None,
    }
}
