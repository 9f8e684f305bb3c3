//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Matching (per-file outcomes, best confidence, variants tried)
//! - Batch runs
//! - Remote fetches (search pages, detail pages, re-rank provider)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Matching Metrics
// =============================================================================

/// Per-file match outcomes.
pub static MATCH_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelmatch_match_outcomes_total", "Total per-file match outcomes"),
        // "linked", "dry_run", "below_threshold", "no_candidates",
        // "invalid_input", "not_found", "already_linked", "upstream", "persistence"
        &["outcome"],
    )
    .unwrap()
});

/// Best candidate confidence per matched file.
pub static MATCH_CONFIDENCE: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelmatch_match_confidence",
            "Distribution of best match confidence scores",
        )
        .buckets(vec![0.1, 0.2, 0.3, 0.4, 0.5, 0.6, 0.7, 0.8, 0.9, 0.95, 1.0]),
        &[],
    )
    .unwrap()
});

/// Query variants tried before a search produced candidates.
pub static QUERY_VARIANTS_TRIED: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelmatch_query_variants_tried",
            "Number of query variants searched per file",
        )
        .buckets(vec![1.0, 2.0, 3.0, 4.0, 6.0, 8.0]),
        &[],
    )
    .unwrap()
});

// =============================================================================
// Batch Metrics
// =============================================================================

/// Batch runs by result.
pub static BATCH_RUNS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new("reelmatch_batch_runs_total", "Total batch runs"),
        &["result"], // "completed", "already_running", "failed"
    )
    .unwrap()
});

// =============================================================================
// Remote Fetch Metrics
// =============================================================================

/// Remote request duration, including retries.
pub static FETCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "reelmatch_fetch_duration_seconds",
            "Duration of remote catalog requests",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["kind", "result"], // kind: "search", "detail", "rerank"; result: "ok", "error"
    )
    .unwrap()
});

// =============================================================================
// Helper functions
// =============================================================================

/// Get all core metrics for registration in a registry.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        Box::new(MATCH_OUTCOMES.clone()),
        Box::new(MATCH_CONFIDENCE.clone()),
        Box::new(QUERY_VARIANTS_TRIED.clone()),
        Box::new(BATCH_RUNS.clone()),
        Box::new(FETCH_DURATION.clone()),
    ]
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_metrics_register_once() {
        let registry = prometheus::Registry::new();
        for metric in all_metrics() {
            registry.register(metric).unwrap();
        }
        MATCH_OUTCOMES.with_label_values(&["linked"]).inc();
        let names: Vec<_> = registry
            .gather()
            .iter()
            .map(|f| f.get_name().to_string())
            .collect();
        assert!(names.contains(&"reelmatch_match_outcomes_total".to_string()));
    }
}
