//! Per-file match orchestrator.
//!
//! Drives one file through the match states:
//! validating -> normalizing -> searching -> enriching -> ranking ->
//! deciding -> persisting -> done. Any state may abort with a
//! [`MatchError`]; a run without usable candidates ends early with a
//! successful, unlinked result.

use std::collections::HashMap;
use std::sync::Arc;

use tracing::{debug, error, info, warn};

use crate::config::MatcherConfig;
use crate::library::{Library, LibraryError, LibraryFile, SceneLink};
use crate::matcher::{
    apply_overrides, expand_queries, infer_studio, normalize_query, score_candidates,
    NoopReranker, Reranker, ScoredCandidate,
};
use crate::metrics::{MATCH_CONFIDENCE, MATCH_OUTCOMES, QUERY_VARIANTS_TRIED};
use crate::searcher::{Candidate, Enricher, SearchError, Searcher};

use super::types::{MatchError, MatchResult, MatchStage};

const NO_CANDIDATES_MESSAGE: &str = "no catalog candidates found";
const DRY_RUN_MESSAGE: &str = "dry run: best candidate found, no database changes applied";
const LINKED_MESSAGE: &str = "file linked to catalog scene";

/// Detail pages already fetched during one file's run, keyed by canonical
/// detail URL. Holds the thumbnail that fetch produced.
#[derive(Debug, Default)]
pub struct EnrichmentCache {
    thumbnails: HashMap<String, String>,
}

impl EnrichmentCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, detail_url: &str) -> Option<&str> {
        self.thumbnails.get(detail_url).map(String::as_str)
    }

    pub fn record(&mut self, detail_url: &str, thumbnail_url: &str) {
        self.thumbnails
            .insert(detail_url.to_string(), thumbnail_url.to_string());
    }

    pub fn len(&self) -> usize {
        self.thumbnails.len()
    }

    pub fn is_empty(&self) -> bool {
        self.thumbnails.is_empty()
    }
}

/// Candidates found for a file, and the query variant that found them.
struct SearchOutcome {
    query: String,
    candidates: Vec<Candidate>,
}

/// Matches library files against the remote catalog.
pub struct MatchOrchestrator {
    searcher: Arc<dyn Searcher>,
    enricher: Arc<dyn Enricher>,
    library: Arc<dyn Library>,
    reranker: Arc<dyn Reranker>,
    config: MatcherConfig,
}

impl MatchOrchestrator {
    pub fn new(
        searcher: Arc<dyn Searcher>,
        enricher: Arc<dyn Enricher>,
        library: Arc<dyn Library>,
        config: MatcherConfig,
    ) -> Self {
        Self {
            searcher,
            enricher,
            library,
            reranker: Arc::new(NoopReranker),
            config,
        }
    }

    /// Consult `reranker` after baseline scoring instead of the no-op default.
    pub fn with_reranker(mut self, reranker: Arc<dyn Reranker>) -> Self {
        self.reranker = reranker;
        self
    }

    pub fn config(&self) -> &MatcherConfig {
        &self.config
    }

    pub fn library(&self) -> &Arc<dyn Library> {
        &self.library
    }

    /// Match a single file, persisting the best candidate unless `dry_run`.
    pub async fn match_file(&self, file_id: u64, dry_run: bool) -> Result<MatchResult, MatchError> {
        let result = self.run(file_id, dry_run).await;
        match &result {
            Ok(r) => {
                let outcome = if r.autolinked {
                    "linked"
                } else if r.candidates.is_empty() {
                    "no_candidates"
                } else if dry_run && r.matched_scene_id.is_some() {
                    "dry_run"
                } else {
                    "below_threshold"
                };
                MATCH_OUTCOMES.with_label_values(&[outcome]).inc();
            }
            Err(e) => {
                MATCH_OUTCOMES.with_label_values(&[e.outcome()]).inc();
                debug!("Match for file {} aborted in {}: {}", file_id, e.stage(), e);
            }
        }
        result
    }

    async fn run(&self, file_id: u64, dry_run: bool) -> Result<MatchResult, MatchError> {
        self.enter(file_id, MatchStage::Validating);
        let file = self.validate(file_id)?;

        self.enter(file_id, MatchStage::Normalizing);
        let base_query = normalize_query(&file.filename);
        if base_query.is_empty() {
            return Err(MatchError::EmptyQuery(file.filename));
        }

        self.enter(file_id, MatchStage::Searching);
        let outcome = self.search(&file.filename, &base_query).await?;
        if outcome.candidates.is_empty() {
            info!("No catalog candidates for file {} ({:?})", file.id, base_query);
            return Ok(MatchResult {
                status: "ok".to_string(),
                file_id: file.id,
                filename: file.filename,
                query: outcome.query,
                autolinked: false,
                matched_scene_id: None,
                candidates: Vec::new(),
                message: Some(NO_CANDIDATES_MESSAGE.to_string()),
            });
        }

        self.enter(file_id, MatchStage::Enriching);
        let mut cache = EnrichmentCache::new();
        let candidates = self.enrich(outcome.candidates, &mut cache).await;

        // Scored against the base query even when a fallback variant found them.
        self.enter(file_id, MatchStage::Ranking);
        let (ranked, rerank_note) = self.rank(&base_query, candidates).await;

        self.enter(file_id, MatchStage::Deciding);
        let mut result = MatchResult {
            status: "ok".to_string(),
            file_id: file.id,
            filename: file.filename.clone(),
            query: outcome.query,
            autolinked: false,
            matched_scene_id: None,
            candidates: ranked,
            message: None,
        };
        // ranked is non-empty here
        let best = result.candidates[0].clone();
        MATCH_CONFIDENCE
            .with_label_values(&[])
            .observe(best.confidence);

        if best.confidence < self.config.autolink_threshold {
            info!(
                "Best candidate for file {} below threshold ({:.2} < {:.2})",
                file.id, best.confidence, self.config.autolink_threshold
            );
            result.message = Some(with_note(
                format!(
                    "best candidate confidence {:.2} is below autolink threshold {:.2}",
                    best.confidence, self.config.autolink_threshold
                ),
                rerank_note.as_deref(),
            ));
            return Ok(result);
        }

        let scene_id = format!("{}{}", self.config.scene_id_prefix, file.id);
        result.matched_scene_id = Some(scene_id.clone());

        if dry_run {
            result.message = Some(with_note(
                DRY_RUN_MESSAGE.to_string(),
                rerank_note.as_deref(),
            ));
            return Ok(result);
        }

        self.enter(file_id, MatchStage::Persisting);
        self.persist(&file, &scene_id, &best)?;

        self.enter(file_id, MatchStage::Done);
        info!(
            "Linked file {} to scene {} ({:?}, confidence {:.2})",
            file.id, scene_id, best.candidate.title, best.confidence
        );
        result.autolinked = true;
        result.message = Some(with_note(LINKED_MESSAGE.to_string(), rerank_note.as_deref()));
        Ok(result)
    }

    fn enter(&self, file_id: u64, stage: MatchStage) {
        debug!("File {}: {}", file_id, stage);
    }

    fn validate(&self, file_id: u64) -> Result<LibraryFile, MatchError> {
        if file_id == 0 {
            return Err(MatchError::MissingFileId);
        }
        let file = self.library.get_file(file_id).map_err(|e| match e {
            LibraryError::NotFound(_) => MatchError::FileNotFound(file_id),
            other => MatchError::Internal(other.to_string()),
        })?;
        if let Some(scene_id) = file.scene_id.clone() {
            return Err(MatchError::AlreadyLinked { file_id, scene_id });
        }
        Ok(file)
    }

    /// Try query variants in order until one yields candidates.
    ///
    /// A failing variant does not stop the loop. The run aborts only when
    /// every variant failed.
    async fn search(&self, filename: &str, base_query: &str) -> Result<SearchOutcome, MatchError> {
        let variants = expand_queries(filename, base_query);
        let limit = self.config.candidate_limit.max(1);
        let mut last_error: Option<SearchError> = None;
        let mut failures = 0usize;
        let mut tried = 0usize;

        for variant in &variants {
            tried += 1;
            match self.searcher.search(variant, limit).await {
                Ok(candidates) if !candidates.is_empty() => {
                    debug!(
                        "Query {:?} returned {} candidates via {}",
                        variant,
                        candidates.len(),
                        self.searcher.name()
                    );
                    QUERY_VARIANTS_TRIED
                        .with_label_values(&[])
                        .observe(tried as f64);
                    return Ok(SearchOutcome {
                        query: variant.clone(),
                        candidates,
                    });
                }
                Ok(_) => debug!("Query {:?} returned no candidates", variant),
                Err(e) => {
                    warn!("Search for {:?} failed: {}", variant, e);
                    failures += 1;
                    last_error = Some(e);
                }
            }
        }

        QUERY_VARIANTS_TRIED
            .with_label_values(&[])
            .observe(tried as f64);
        match last_error {
            Some(e) if failures == variants.len() => Err(MatchError::Upstream(e)),
            _ => Ok(SearchOutcome {
                query: base_query.to_string(),
                candidates: Vec::new(),
            }),
        }
    }

    /// Fill in thumbnails and titles from detail pages. A failed fetch
    /// leaves the candidate as the search page described it.
    async fn enrich(
        &self,
        candidates: Vec<Candidate>,
        cache: &mut EnrichmentCache,
    ) -> Vec<Candidate> {
        let mut enriched = Vec::with_capacity(candidates.len());
        for mut candidate in candidates {
            if let Some(thumbnail) = cache.get(&candidate.detail_url) {
                if candidate.thumbnail_url.is_empty() {
                    candidate.thumbnail_url = thumbnail.to_string();
                }
                enriched.push(candidate);
                continue;
            }
            match self.enricher.enrich(&candidate).await {
                Ok(updated) => {
                    cache.record(&candidate.detail_url, &updated.thumbnail_url);
                    enriched.push(updated);
                }
                Err(e) => {
                    warn!("Failed to enrich {}: {}", candidate.detail_url, e);
                    cache.record(&candidate.detail_url, &candidate.thumbnail_url);
                    enriched.push(candidate);
                }
            }
        }
        enriched
    }

    /// Baseline scoring, then the re-rank pass. Returns the ranking and a
    /// note when the re-ranker failed.
    async fn rank(
        &self,
        query: &str,
        candidates: Vec<Candidate>,
    ) -> (Vec<ScoredCandidate>, Option<String>) {
        let ranked = score_candidates(query, candidates);
        let reranker = &self.reranker;

        match reranker.rerank(query, &ranked).await {
            Ok(overrides) => {
                debug!(
                    "Re-ranker {} returned {} overrides",
                    reranker.name(),
                    overrides.len()
                );
                (apply_overrides(ranked, &overrides), None)
            }
            Err(e) => {
                warn!("Re-ranker {} failed: {}", reranker.name(), e);
                (ranked, Some(format!("re-rank unavailable: {}", e)))
            }
        }
    }

    fn persist(
        &self,
        file: &LibraryFile,
        scene_id: &str,
        best: &ScoredCandidate,
    ) -> Result<(), MatchError> {
        let studio = infer_studio(&file.filename, &best.candidate.title)
            .unwrap_or_else(|| self.config.default_studio.clone());
        let link = SceneLink {
            file_id: file.id,
            filename: file.filename.clone(),
            scene_id: scene_id.to_string(),
            title: best.candidate.title.clone(),
            source_url: best.candidate.detail_url.clone(),
            cover_url: best.candidate.thumbnail_url.clone(),
            studio,
            site: self.config.site_label.clone(),
            scene_type: self.config.scene_type.clone(),
        };

        self.library.apply_match(&link).map_err(|e| match e {
            LibraryError::Conflict(_) => MatchError::AlreadyLinked {
                file_id: file.id,
                scene_id: scene_id.to_string(),
            },
            LibraryError::NotFound(_) => MatchError::FileNotFound(file.id),
            other => {
                error!("Failed to persist match for file {}: {}", file.id, other);
                MatchError::Persistence(other.to_string())
            }
        })?;

        if let Err(e) = self.library.reindex(&[scene_id.to_string()]) {
            warn!("Failed to reindex scene {}: {}", scene_id, e);
        }
        Ok(())
    }
}

fn with_note(message: String, note: Option<&str>) -> String {
    match note {
        Some(note) => format!("{}; {}", message, note),
        None => message,
    }
}
