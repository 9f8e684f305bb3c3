//! Types for the file registry and scene store.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Media type of files eligible for matching.
pub const VIDEO_MEDIA_TYPE: &str = "video";

/// A file known to the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LibraryFile {
    pub id: u64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<i64>,
    pub path: String,
    pub filename: String,
    pub media_type: String,
    /// Linked scene, `None` while unmatched.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub scene_id: Option<String>,
    pub created_time: DateTime<Utc>,
}

/// A file to register, as produced by a library scan.
#[derive(Debug, Clone)]
pub struct NewFile {
    pub volume_id: Option<i64>,
    pub path: String,
    pub filename: String,
    pub media_type: String,
    pub created_time: DateTime<Utc>,
}

impl NewFile {
    /// A video file under `dir`, discovered now.
    pub fn video(dir: &str, filename: &str) -> Self {
        Self {
            volume_id: None,
            path: format!("{}/{}", dir.trim_end_matches('/'), filename),
            filename: filename.to_string(),
            media_type: VIDEO_MEDIA_TYPE.to_string(),
            created_time: Utc::now(),
        }
    }
}

/// A catalog scene stored locally.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Scene {
    pub scene_id: String,
    pub title: String,
    pub studio: String,
    pub site: String,
    pub scene_type: String,
    pub cover_url: String,
    /// Remote detail page the scene was matched from.
    pub source_url: String,
    /// Names of files known to belong to this scene.
    pub filenames: Vec<String>,
    pub file_count: u32,
    pub is_available: bool,
    pub created_at: DateTime<Utc>,
    pub added_date: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Filters for selecting files to match.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct FileFilter {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub volume_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub path_prefix: Option<String>,
}

/// Everything needed to persist a match in one step.
#[derive(Debug, Clone, PartialEq)]
pub struct SceneLink {
    pub file_id: u64,
    pub filename: String,
    pub scene_id: String,
    pub title: String,
    pub source_url: String,
    pub cover_url: String,
    pub studio: String,
    pub site: String,
    pub scene_type: String,
}

/// Errors from library operations.
#[derive(Debug, Error)]
pub enum LibraryError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_video_file_path() {
        let file = NewFile::video("/media/pmv/", "clip.mp4");
        assert_eq!(file.path, "/media/pmv/clip.mp4");
        assert_eq!(file.media_type, VIDEO_MEDIA_TYPE);
        assert!(file.volume_id.is_none());
    }

    #[test]
    fn test_file_filter_deserialize_empty() {
        let filter: FileFilter = serde_json::from_str("{}").unwrap();
        assert!(filter.volume_id.is_none());
        assert!(filter.path_prefix.is_none());
    }
}
