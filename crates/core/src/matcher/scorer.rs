//! Baseline token-overlap scoring and ranking.

use once_cell::sync::Lazy;
use regex_lite::Regex;
use std::cmp::Ordering;
use std::collections::HashSet;

use crate::searcher::Candidate;

use super::types::{RerankOverride, ScoredCandidate};

pub const BASELINE_REASON: &str = "baseline text similarity";

const BASE_CONFIDENCE: f64 = 0.15;
const OVERLAP_WEIGHT: f64 = 0.7;
const SUBSTRING_BONUS: f64 = 0.2;

static NON_TOKEN: Lazy<Regex> = Lazy::new(|| Regex::new(r"[^a-z0-9\s]+").unwrap());

/// Score and rank candidates against the query.
pub fn score_candidates(query: &str, candidates: Vec<Candidate>) -> Vec<ScoredCandidate> {
    let mut scored: Vec<ScoredCandidate> = candidates
        .into_iter()
        .map(|candidate| ScoredCandidate {
            confidence: confidence(query, &candidate.title),
            candidate,
            rank: 0,
            reason: BASELINE_REASON.to_string(),
        })
        .collect();
    sort_and_rank(&mut scored);
    scored
}

/// Confidence of `title` matching `query`, in [0, 1].
pub fn confidence(query: &str, title: &str) -> f64 {
    let query_tokens = tokens(query);
    let title_tokens = tokens(title);

    // Coverage of the query, not of the title.
    let overlap = if query_tokens.is_empty() || title_tokens.is_empty() {
        0.0
    } else {
        query_tokens.intersection(&title_tokens).count() as f64 / query_tokens.len() as f64
    };

    let query_lower = query.trim().to_lowercase();
    let bonus = if !query_lower.is_empty() && title.to_lowercase().contains(&query_lower) {
        SUBSTRING_BONUS
    } else {
        0.0
    };

    (BASE_CONFIDENCE + OVERLAP_WEIGHT * overlap + bonus).clamp(0.0, 1.0)
}

/// Higher confidence first, then lexically smaller title.
pub fn compare(a: &ScoredCandidate, b: &ScoredCandidate) -> Ordering {
    b.confidence
        .total_cmp(&a.confidence)
        .then_with(|| a.candidate.title.cmp(&b.candidate.title))
}

/// Stable sort with [`compare`], then assign 1-based ranks.
pub fn sort_and_rank(scored: &mut [ScoredCandidate]) {
    scored.sort_by(compare);
    for (i, item) in scored.iter_mut().enumerate() {
        item.rank = i + 1;
    }
}

/// Merge re-rank overrides into a ranked list and re-sort.
///
/// Overrides address positions in `ranked`; out-of-range indexes and
/// confidences that clamp to zero are ignored.
pub fn apply_overrides(
    mut ranked: Vec<ScoredCandidate>,
    overrides: &[RerankOverride],
) -> Vec<ScoredCandidate> {
    for o in overrides {
        let confidence = o.confidence.clamp(0.0, 1.0);
        if confidence == 0.0 || confidence.is_nan() {
            continue;
        }
        let Some(item) = ranked.get_mut(o.index) else {
            continue;
        };
        item.confidence = confidence;
        let reason = o.reason.trim();
        if !reason.is_empty() {
            item.reason = reason.to_string();
        }
    }
    sort_and_rank(&mut ranked);
    ranked
}

fn tokens(text: &str) -> HashSet<String> {
    NON_TOKEN
        .replace_all(&text.to_lowercase(), " ")
        .split_whitespace()
        .filter(|t| t.len() >= 2)
        .map(str::to_string)
        .collect()
}
