//! File registry and scene store.
//!
//! The matcher reads file identity from here and writes the outcome of a
//! match (scene, link, action record) through [`Library::apply_match`],
//! which must apply all of it or nothing.

mod sqlite;
mod types;

pub use sqlite::SqliteLibrary;
pub use types::*;

/// Trait for the local media library.
pub trait Library: Send + Sync {
    /// Unlinked video files, most recently discovered first.
    fn find_eligible_files(
        &self,
        filter: &FileFilter,
        limit: usize,
    ) -> Result<Vec<LibraryFile>, LibraryError>;

    /// Get a file by id.
    fn get_file(&self, id: u64) -> Result<LibraryFile, LibraryError>;

    /// Get a scene by its identifier.
    fn get_scene(&self, scene_id: &str) -> Result<Scene, LibraryError>;

    /// Create or update the scene, record the file name on it, link the
    /// file, log a match action and refresh the scene status, atomically.
    ///
    /// Fails with `Conflict` if the file is already linked.
    fn apply_match(&self, link: &SceneLink) -> Result<Scene, LibraryError>;

    /// Refresh search data for the given scenes.
    fn reindex(&self, scene_ids: &[String]) -> Result<(), LibraryError>;
}
