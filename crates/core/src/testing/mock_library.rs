//! In-memory library for testing.

use chrono::{Duration, Utc};
use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use crate::library::{
    FileFilter, Library, LibraryError, LibraryFile, Scene, SceneLink, VIDEO_MEDIA_TYPE,
};

#[derive(Debug, Default)]
struct State {
    files: Vec<LibraryFile>,
    scenes: HashMap<String, Scene>,
    applied: Vec<SceneLink>,
    reindexed: Vec<String>,
    apply_error: Option<String>,
    reindex_error: Option<String>,
    linked_on_read: HashMap<u64, String>,
    next_id: u64,
}

/// Mock implementation of the Library trait.
///
/// Files added later count as more recently discovered. Persistence
/// failures can be injected for `apply_match` and `reindex`, and a file can
/// be linked behind a batch's back between selection and matching.
#[derive(Debug, Default)]
pub struct MockLibrary {
    state: Mutex<State>,
}

impl MockLibrary {
    pub fn new() -> Self {
        Self::default()
    }

    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Register an unlinked video file and return its id.
    pub fn add_file(&self, filename: &str) -> u64 {
        self.add(filename, VIDEO_MEDIA_TYPE, None, None)
    }

    /// Register a file already linked to `scene_id`.
    pub fn add_linked_file(&self, filename: &str, scene_id: &str) -> u64 {
        self.add(filename, VIDEO_MEDIA_TYPE, None, Some(scene_id.to_string()))
    }

    /// Register a file with full control over its attributes.
    pub fn add(
        &self,
        filename: &str,
        media_type: &str,
        volume_id: Option<i64>,
        scene_id: Option<String>,
    ) -> u64 {
        let mut state = self.state();
        state.next_id += 1;
        let id = state.next_id;
        state.files.push(LibraryFile {
            id,
            volume_id,
            path: format!("/library/{}", filename),
            filename: filename.to_string(),
            media_type: media_type.to_string(),
            scene_id,
            created_time: Utc::now() + Duration::seconds(id as i64),
        });
        id
    }

    /// Make `apply_match` fail with a database error.
    pub fn set_apply_error(&self, message: &str) {
        self.state().apply_error = Some(message.to_string());
    }

    /// Make `reindex` fail with a database error.
    pub fn set_reindex_error(&self, message: &str) {
        self.state().reindex_error = Some(message.to_string());
    }

    /// Report `file_id` as linked to `scene_id` from `get_file` on, while
    /// still selecting it as eligible.
    pub fn link_on_read(&self, file_id: u64, scene_id: &str) {
        self.state()
            .linked_on_read
            .insert(file_id, scene_id.to_string());
    }

    /// Links persisted so far, in order.
    pub fn applied_links(&self) -> Vec<SceneLink> {
        self.state().applied.clone()
    }

    /// Scene ids passed to `reindex`, in order.
    pub fn reindexed(&self) -> Vec<String> {
        self.state().reindexed.clone()
    }

    pub fn scene_count(&self) -> usize {
        self.state().scenes.len()
    }
}

impl Library for MockLibrary {
    fn find_eligible_files(
        &self,
        filter: &FileFilter,
        limit: usize,
    ) -> Result<Vec<LibraryFile>, LibraryError> {
        let state = self.state();
        let mut files: Vec<LibraryFile> = state
            .files
            .iter()
            .filter(|f| f.scene_id.is_none() && f.media_type == VIDEO_MEDIA_TYPE)
            .filter(|f| filter.volume_id.map_or(true, |v| f.volume_id == Some(v)))
            .filter(|f| {
                filter
                    .path_prefix
                    .as_deref()
                    .map_or(true, |p| f.path.starts_with(p))
            })
            .cloned()
            .collect();
        files.sort_by(|a, b| {
            b.created_time
                .cmp(&a.created_time)
                .then_with(|| b.id.cmp(&a.id))
        });
        files.truncate(limit);
        Ok(files)
    }

    fn get_file(&self, id: u64) -> Result<LibraryFile, LibraryError> {
        let state = self.state();
        let mut file = state
            .files
            .iter()
            .find(|f| f.id == id)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(format!("file {}", id)))?;
        if let Some(scene_id) = state.linked_on_read.get(&id) {
            file.scene_id = Some(scene_id.clone());
        }
        Ok(file)
    }

    fn get_scene(&self, scene_id: &str) -> Result<Scene, LibraryError> {
        self.state()
            .scenes
            .get(scene_id)
            .cloned()
            .ok_or_else(|| LibraryError::NotFound(format!("scene {}", scene_id)))
    }

    fn apply_match(&self, link: &SceneLink) -> Result<Scene, LibraryError> {
        let mut state = self.state();
        if let Some(message) = state.apply_error.clone() {
            return Err(LibraryError::Database(message));
        }

        let file = state
            .files
            .iter_mut()
            .find(|f| f.id == link.file_id)
            .ok_or_else(|| LibraryError::NotFound(format!("file {}", link.file_id)))?;
        if let Some(existing) = &file.scene_id {
            return Err(LibraryError::Conflict(format!(
                "file {} already linked to scene {}",
                link.file_id, existing
            )));
        }
        file.scene_id = Some(link.scene_id.clone());

        let now = Utc::now();
        let scene = state
            .scenes
            .entry(link.scene_id.clone())
            .or_insert_with(|| Scene {
                scene_id: link.scene_id.clone(),
                title: String::new(),
                studio: String::new(),
                site: String::new(),
                scene_type: String::new(),
                cover_url: String::new(),
                source_url: String::new(),
                filenames: Vec::new(),
                file_count: 0,
                is_available: false,
                created_at: now,
                added_date: now,
                updated_at: now,
            });
        scene.title = link.title.clone();
        scene.studio = link.studio.clone();
        scene.site = link.site.clone();
        scene.scene_type = link.scene_type.clone();
        scene.cover_url = link.cover_url.clone();
        scene.source_url = link.source_url.clone();
        if !scene.filenames.contains(&link.filename) {
            scene.filenames.push(link.filename.clone());
        }
        scene.updated_at = now;
        let scene_id = scene.scene_id.clone();

        let file_count = state
            .files
            .iter()
            .filter(|f| f.scene_id.as_deref() == Some(scene_id.as_str()))
            .count() as u32;
        let scene = state
            .scenes
            .get_mut(&scene_id)
            .ok_or_else(|| LibraryError::Internal(format!("scene {} vanished", scene_id)))?;
        scene.file_count = file_count;
        scene.is_available = file_count > 0;
        let scene = scene.clone();

        state.applied.push(link.clone());
        Ok(scene)
    }

    fn reindex(&self, scene_ids: &[String]) -> Result<(), LibraryError> {
        let mut state = self.state();
        if let Some(message) = state.reindex_error.clone() {
            return Err(LibraryError::Database(message));
        }
        state.reindexed.extend(scene_ids.iter().cloned());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_library_eligible_order_and_linking() {
        let library = MockLibrary::new();
        let a = library.add_file("a.mp4");
        let b = library.add_file("b.mp4");
        library.add_linked_file("c.mp4", "scene-x");
        library.add("d.jpg", "image", None, None);

        let eligible = library
            .find_eligible_files(&FileFilter::default(), 10)
            .unwrap();
        let ids: Vec<u64> = eligible.iter().map(|f| f.id).collect();
        assert_eq!(ids, vec![b, a]);

        let link = SceneLink {
            file_id: a,
            filename: "a.mp4".to_string(),
            scene_id: "scene-a".to_string(),
            title: "A".to_string(),
            source_url: "https://x/video/a".to_string(),
            cover_url: String::new(),
            studio: "Custom".to_string(),
            site: "CustomVR".to_string(),
            scene_type: "VR".to_string(),
        };
        let scene = library.apply_match(&link).unwrap();
        assert_eq!(scene.file_count, 1);
        assert!(scene.is_available);
        assert!(matches!(
            library.apply_match(&link),
            Err(LibraryError::Conflict(_))
        ));
    }
}
