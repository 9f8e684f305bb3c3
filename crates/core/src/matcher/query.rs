//! Filename to search-query normalisation.
//!
//! [`normalize_query`] turns a noisy video filename into a short query;
//! [`expand_queries`] derives the ordered fallback variants tried when the
//! base query finds nothing.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::collections::HashSet;

static CAMEL_BOUNDARY: Lazy<Regex> = Lazy::new(|| Regex::new(r"([a-z])([A-Z])").unwrap());
static EXPORT_SUFFIX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[_\-\s]\d{10,}[_\-\s][a-z0-9]{6,}$").unwrap());
static DISALLOWED: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s']+").unwrap());

/// Delimiter between an uploader/channel tag and the title.
const CHANNEL_DELIMITER: &str = "_-_";
const DASH_DELIMITERS: [&str; 3] = [" - ", " – ", " — "];

/// Resolution, frame-rate, codec, container and stereo-layout tags.
const SKIP_TOKENS: &[&str] = &[
    "1080p", "1440p", "2160p", "4k", "5k", "6k", "8k", "fps", "60fps", "30fps", "4k60", "sbs",
    "tb", "lr", "vr", "mp4", "mkv", "avi", "mov", "wmv", "uhd", "hd", "fullhd", "hq", "h264",
    "h265", "x264", "x265", "264", "265", "2880p", "4320p", "upscale",
];

/// Broader set used by the second noise pass in [`expand_queries`].
const EXPANSION_NOISE: &[&str] = &[
    "1080p", "1440p", "2160p", "2880p", "4320p", "4k", "8k", "60fps", "30fps", "fps", "h264",
    "h265", "x264", "x265", "264", "265", "sbs", "tb", "lr", "vr", "upscale", "remaster",
];

/// Derive the base search query from a filename.
///
/// Returns an empty string only when the name carries no alphanumeric text.
pub fn normalize_query(filename: &str) -> String {
    let name = strip_extension(filename.trim());
    let name = CAMEL_BOUNDARY.replace_all(name, "$1 $2").to_lowercase();
    let mut name = EXPORT_SUFFIX.replace(&name, "").into_owned();

    if let Some(idx) = name.find(CHANNEL_DELIMITER) {
        let right = name[idx + CHANNEL_DELIMITER.len()..].trim();
        if !right.is_empty() {
            name = right.to_string();
        }
    } else {
        for delimiter in DASH_DELIMITERS {
            let Some(idx) = name.find(delimiter) else {
                continue;
            };
            if idx == 0 {
                continue;
            }
            let left = name[..idx].trim();
            let right = name[idx + delimiter.len()..].trim();
            if !right.is_empty() && left.split_whitespace().count() <= 2 {
                name = right.to_string();
                break;
            }
        }
    }

    let name = name.replace(['_', '.', '-', '(', ')'], " ");
    let name = DISALLOWED.replace_all(&name, " ");
    let fields: Vec<&str> = name.split_whitespace().collect();
    if !fields
        .iter()
        .any(|f| f.chars().any(|c| c.is_ascii_alphanumeric()))
    {
        return String::new();
    }

    let kept: Vec<&str> = fields
        .iter()
        .copied()
        .filter(|tok| !SKIP_TOKENS.contains(tok))
        .filter(|tok| !is_noise_token(tok))
        .collect();

    if kept.is_empty() {
        fields.join(" ")
    } else {
        kept.join(" ")
    }
}

/// Ordered, deduplicated query variants, `base` first.
pub fn expand_queries(filename: &str, base: &str) -> Vec<String> {
    let mut variants = QueryVariants::default();
    variants.add(base);

    let tokens: Vec<&str> = base.split_whitespace().collect();
    let n = tokens.len();
    if n >= 2 {
        variants.add(&tokens[1..].join(" "));
    }
    if n >= 3 {
        variants.add(&tokens[..n - 1].join(" "));
    }
    if n >= 4 {
        variants.add(&tokens[1..n - 1].join(" "));
    }

    let stripped: Vec<&str> = tokens
        .iter()
        .copied()
        .filter(|tok| !EXPANSION_NOISE.contains(tok))
        .collect();
    variants.add(&stripped.join(" "));
    if stripped.len() >= 2 {
        variants.add(&stripped[1..].join(" "));
    }

    let raw = strip_extension(filename.trim());
    for delimiter in std::iter::once(CHANNEL_DELIMITER).chain(DASH_DELIMITERS) {
        if !raw.contains(delimiter) {
            continue;
        }
        let parts: Vec<&str> = raw.split(delimiter).collect();
        if parts.len() >= 2 {
            variants.add(&normalize_query(&parts[1..].join(" ")));
        }
        if parts.len() >= 3 {
            variants.add(&normalize_query(&parts[2..].join(" ")));
        }
    }

    variants.into_vec()
}

/// Upload ids and random suffixes that survive the fixed skip list.
pub fn is_noise_token(token: &str) -> bool {
    let len = token.len();
    let digits = token.bytes().filter(u8::is_ascii_digit).count();
    let letters = token.bytes().filter(u8::is_ascii_alphabetic).count();
    let vowels = token
        .bytes()
        .filter(|b| matches!(b, b'a' | b'e' | b'i' | b'o' | b'u'))
        .count();

    if digits == len && len >= 4 {
        return true;
    }
    if len >= 10 && digits > 0 && letters > 0 {
        return true;
    }
    len >= 8
        && digits >= 3
        && letters >= 3
        && (vowels == 0 || digits as f64 / len as f64 >= 0.35)
}

fn strip_extension(name: &str) -> &str {
    match name.rfind('.') {
        Some(idx) if !name[idx..].contains(['/', '\\']) => &name[..idx],
        _ => name,
    }
}

#[derive(Default)]
struct QueryVariants {
    seen: HashSet<String>,
    ordered: Vec<String>,
}

impl QueryVariants {
    fn add(&mut self, query: &str) {
        let query = query.split_whitespace().collect::<Vec<_>>().join(" ");
        if query.is_empty() || self.seen.contains(&query) {
            return;
        }
        self.seen.insert(query.clone());
        self.ordered.push(query);
    }

    fn into_vec(self) -> Vec<String> {
        self.ordered
    }
}
