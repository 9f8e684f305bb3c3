//! Types for the match orchestrator and batch scheduler.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::config::BatchConfig;
use crate::library::{FileFilter, LibraryError};
use crate::matcher::ScoredCandidate;
use crate::searcher::SearchError;

/// States of a single file's matching run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MatchStage {
    Validating,
    Normalizing,
    Searching,
    Enriching,
    Ranking,
    Deciding,
    Persisting,
    Done,
}

impl std::fmt::Display for MatchStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            MatchStage::Validating => "validating",
            MatchStage::Normalizing => "normalizing",
            MatchStage::Searching => "searching",
            MatchStage::Enriching => "enriching",
            MatchStage::Ranking => "ranking",
            MatchStage::Deciding => "deciding",
            MatchStage::Persisting => "persisting",
            MatchStage::Done => "done",
        };
        f.write_str(name)
    }
}

/// Errors that abort a single file's match.
#[derive(Debug, Error)]
pub enum MatchError {
    #[error("file_id is required")]
    MissingFileId,

    #[error("file not found: {0}")]
    FileNotFound(u64),

    #[error("file {file_id} is already linked to scene {scene_id}")]
    AlreadyLinked { file_id: u64, scene_id: String },

    #[error("could not derive a search query from filename {0:?}")]
    EmptyQuery(String),

    #[error("catalog search failed: {0}")]
    Upstream(#[from] SearchError),

    #[error("failed to persist match: {0}")]
    Persistence(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl MatchError {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> u16 {
        match self {
            MatchError::MissingFileId | MatchError::EmptyQuery(_) => 400,
            MatchError::FileNotFound(_) => 404,
            MatchError::AlreadyLinked { .. } => 409,
            MatchError::Upstream(_) => 424,
            MatchError::Persistence(_) | MatchError::Internal(_) => 500,
        }
    }

    /// Stage in which the run was aborted.
    pub fn stage(&self) -> MatchStage {
        match self {
            MatchError::MissingFileId
            | MatchError::FileNotFound(_)
            | MatchError::AlreadyLinked { .. }
            | MatchError::Internal(_) => MatchStage::Validating,
            MatchError::EmptyQuery(_) => MatchStage::Normalizing,
            MatchError::Upstream(_) => MatchStage::Searching,
            MatchError::Persistence(_) => MatchStage::Persisting,
        }
    }

    /// Metric label for this failure.
    pub fn outcome(&self) -> &'static str {
        match self {
            MatchError::MissingFileId | MatchError::EmptyQuery(_) => "invalid_input",
            MatchError::FileNotFound(_) => "not_found",
            MatchError::AlreadyLinked { .. } => "already_linked",
            MatchError::Upstream(_) => "upstream",
            MatchError::Persistence(_) => "persistence",
            MatchError::Internal(_) => "internal",
        }
    }
}

/// Request to match one file.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MatchRequest {
    #[serde(default)]
    pub file_id: u64,
    #[serde(default)]
    pub dry_run: bool,
}

/// Outcome of matching one file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MatchResult {
    pub status: String,
    pub file_id: u64,
    pub filename: String,
    /// Query variant that produced the candidates (the base query when none did).
    pub query: String,
    pub autolinked: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_scene_id: Option<String>,
    pub candidates: Vec<ScoredCandidate>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Request to match a batch of unlinked files.
///
/// `limit` and `concurrency` of zero or less mean "use the default";
/// larger values are clamped to the configured maximums.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BatchRequest {
    #[serde(default)]
    pub dry_run: bool,
    #[serde(default)]
    pub limit: i64,
    #[serde(default)]
    pub concurrency: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
}

impl BatchRequest {
    pub fn effective_limit(&self, config: &BatchConfig) -> usize {
        clamp_or_default(self.limit, config.default_limit, config.max_limit)
    }

    pub fn effective_concurrency(&self, config: &BatchConfig) -> usize {
        clamp_or_default(self.concurrency, config.default_concurrency, config.max_concurrency)
    }

    pub fn filter(&self) -> FileFilter {
        FileFilter {
            volume_id: self.volume_id,
            path_prefix: self
                .path_prefix
                .as_deref()
                .map(str::trim)
                .filter(|p| !p.is_empty())
                .map(str::to_string),
        }
    }
}

fn clamp_or_default(requested: i64, default: usize, max: usize) -> usize {
    if requested <= 0 {
        default
    } else {
        (requested as u64).min(max as u64) as usize
    }
}

/// One file's outcome inside a batch.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchItem {
    pub file_id: u64,
    pub filename: String,
    pub status_code: u16,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<MatchResult>,
}

/// Aggregate outcome of a batch run, items in selection order.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct BatchResult {
    pub run_id: String,
    pub scanned: usize,
    pub matched: usize,
    pub skipped_already_matched: usize,
    pub errors: usize,
    pub results: Vec<BatchItem>,
}

/// Errors that prevent a batch from running at all.
#[derive(Debug, Error)]
pub enum BatchError {
    #[error("batch run {0:?} already running")]
    AlreadyRunning(String),

    #[error("failed to select files: {0}")]
    Library(#[from] LibraryError),
}

impl BatchError {
    pub fn status_code(&self) -> u16 {
        match self {
            BatchError::AlreadyRunning(_) => 409,
            BatchError::Library(_) => 500,
        }
    }
}
