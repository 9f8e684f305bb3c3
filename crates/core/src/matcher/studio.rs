//! Studio inference for scenes created from a match.

const TITLE_DELIMITERS: [&str; 4] = [" - ", " – ", " — ", "|"];
const NAME_DELIMITERS: [&str; 3] = [" - ", " – ", " — "];
const MAX_STUDIO_LEN: usize = 64;

/// Best guess at the studio/channel, or `None` when nothing plausible exists.
///
/// Tried in order: the candidate title's prefix before a delimiter, the
/// channel part of a `channel_-_title` filename (preferring a part that
/// mentions "pmv"), the filename's prefix before a dash, the whole name.
pub fn infer_studio(filename: &str, candidate_title: &str) -> Option<String> {
    for delimiter in TITLE_DELIMITERS {
        if let Some(idx) = candidate_title.find(delimiter).filter(|&i| i > 0) {
            if let Some(studio) = clean_studio_token(&candidate_title[..idx]) {
                return Some(studio);
            }
        }
    }

    let raw = match filename.trim().rfind('.') {
        Some(idx) => filename.trim()[..idx].trim(),
        None => filename.trim(),
    };
    if raw.is_empty() {
        return None;
    }

    if raw.contains("_-_") {
        for (i, part) in raw.split("_-_").take(3).enumerate() {
            let Some(token) = clean_studio_token(part) else {
                continue;
            };
            if i == 0 || token.to_lowercase().contains("pmv") {
                return Some(token);
            }
        }
    }

    for delimiter in NAME_DELIMITERS {
        if let Some(idx) = raw.find(delimiter).filter(|&i| i > 0) {
            if let Some(studio) = clean_studio_token(&raw[..idx]) {
                return Some(studio);
            }
        }
    }

    clean_studio_token(raw)
}

fn clean_studio_token(raw: &str) -> Option<String> {
    let trimmed = raw.trim().trim_matches(|c: char| "[](){}-_.,:; ".contains(c));
    let cleaned = trimmed
        .replace(['_', '.'], " ")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ");

    if cleaned.is_empty() || cleaned.len() > MAX_STUDIO_LEN {
        return None;
    }
    if !cleaned.chars().any(|c| c.is_ascii_alphabetic()) {
        return None;
    }
    Some(cleaned)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_studio_from_candidate_title() {
        assert_eq!(
            infer_studio("whatever.mp4", "Arckom - Heaven PMV"),
            Some("Arckom".to_string())
        );
        assert_eq!(
            infer_studio("whatever.mp4", "[Studio X] | Night Drive"),
            Some("Studio X".to_string())
        );
    }

    #[test]
    fn test_studio_from_channel_filename() {
        assert_eq!(
            infer_studio("Digital_Fiend_-_Super_Smash_Hoes.mp4", "Super Smash Hoes"),
            Some("Digital Fiend".to_string())
        );
    }

    #[test]
    fn test_studio_first_part_wins_when_usable() {
        // The first usable part is returned before later "pmv" parts are seen.
        assert_eq!(
            infer_studio("uploader_-_CoolPMVs_-_Title.mp4", "Title"),
            Some("uploader".to_string())
        );
    }

    #[test]
    fn test_studio_skips_unusable_first_part() {
        assert_eq!(
            infer_studio("123_-_CoolPMVs_-_Title.mp4", "Title"),
            Some("CoolPMVs".to_string())
        );
    }

    #[test]
    fn test_studio_from_dash_filename() {
        assert_eq!(
            infer_studio("Neon Studio - Lights.mp4", "Lights"),
            Some("Neon Studio".to_string())
        );
    }

    #[test]
    fn test_studio_whole_name_fallback_and_rejections() {
        assert_eq!(infer_studio("solo_clip.mp4", "Solo"), Some("solo clip".to_string()));
        assert_eq!(infer_studio("2024.mp4", "2024"), None);
        assert_eq!(infer_studio("", ""), None);
        let long = format!("{}.mp4", "a".repeat(80));
        assert_eq!(infer_studio(&long, ""), None);
    }
}
