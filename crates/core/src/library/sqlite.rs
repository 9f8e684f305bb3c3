//! SQLite-backed library implementation.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use chrono::{DateTime, SecondsFormat, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Row};

use super::{FileFilter, Library, LibraryError, LibraryFile, NewFile, Scene, SceneLink, VIDEO_MEDIA_TYPE};

const MATCH_ACTION_KIND: &str = "match";
const MATCH_ACTION_FIELD: &str = "filenames_arr";

/// SQLite-backed library.
pub struct SqliteLibrary {
    conn: Mutex<Connection>,
}

impl SqliteLibrary {
    /// Open (or create) the database file and its tables.
    pub fn new(path: &Path) -> Result<Self, LibraryError> {
        let conn = Connection::open(path).map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Create an in-memory SQLite library (useful for testing).
    pub fn in_memory() -> Result<Self, LibraryError> {
        let conn = Connection::open_in_memory().map_err(db_err)?;
        Self::initialize_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn initialize_schema(conn: &Connection) -> Result<(), LibraryError> {
        conn.execute_batch(
            r#"
            -- Files discovered by library scans
            CREATE TABLE IF NOT EXISTS files (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                volume_id INTEGER,
                path TEXT NOT NULL,
                filename TEXT NOT NULL,
                media_type TEXT NOT NULL,
                scene_id TEXT REFERENCES scenes(scene_id),
                created_time TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_files_unlinked ON files(media_type, scene_id, created_time);

            -- Catalog scenes
            CREATE TABLE IF NOT EXISTS scenes (
                scene_id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                studio TEXT NOT NULL,
                site TEXT NOT NULL,
                scene_type TEXT NOT NULL,
                cover_url TEXT NOT NULL DEFAULT '',
                source_url TEXT NOT NULL DEFAULT '',
                filenames TEXT NOT NULL DEFAULT '[]',
                file_count INTEGER NOT NULL DEFAULT 0,
                is_available INTEGER NOT NULL DEFAULT 0,
                created_at TEXT NOT NULL,
                added_date TEXT NOT NULL,
                updated_at TEXT NOT NULL
            );

            -- Change log of scene edits
            CREATE TABLE IF NOT EXISTS actions (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                scene_id TEXT NOT NULL,
                kind TEXT NOT NULL,
                field TEXT NOT NULL,
                value TEXT NOT NULL,
                created_at TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_actions_scene ON actions(scene_id);

            -- Flattened text used for scene search
            CREATE TABLE IF NOT EXISTS scene_search (
                scene_id TEXT PRIMARY KEY,
                content TEXT NOT NULL,
                indexed_at TEXT NOT NULL
            );
            "#,
        )
        .map_err(db_err)?;

        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>, LibraryError> {
        self.conn
            .lock()
            .map_err(|_| LibraryError::Internal("library connection lock poisoned".to_string()))
    }

    /// Register a file, returning its id.
    pub fn insert_file(&self, file: &NewFile) -> Result<u64, LibraryError> {
        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO files (volume_id, path, filename, media_type, scene_id, created_time)
             VALUES (?, ?, ?, ?, NULL, ?)",
            params![
                file.volume_id,
                file.path,
                file.filename,
                file.media_type,
                timestamp(&file.created_time),
            ],
        )
        .map_err(db_err)?;
        Ok(conn.last_insert_rowid() as u64)
    }

    /// Number of match actions recorded for a scene.
    pub fn action_count(&self, scene_id: &str) -> Result<u32, LibraryError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT COUNT(*) FROM actions WHERE scene_id = ?",
            params![scene_id],
            |row| row.get(0),
        )
        .map_err(db_err)
    }

    /// Indexed search text for a scene, if it has been indexed.
    pub fn search_content(&self, scene_id: &str) -> Result<Option<String>, LibraryError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT content FROM scene_search WHERE scene_id = ?",
            params![scene_id],
            |row| row.get(0),
        )
        .optional()
        .map_err(db_err)
    }

    fn load_scene(conn: &Connection, scene_id: &str) -> Result<Scene, LibraryError> {
        conn.query_row(
            "SELECT scene_id, title, studio, site, scene_type, cover_url, source_url, filenames,
                    file_count, is_available, created_at, added_date, updated_at
             FROM scenes WHERE scene_id = ?",
            params![scene_id],
            row_to_scene,
        )
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| LibraryError::NotFound(format!("scene {}", scene_id)))
    }
}

impl Library for SqliteLibrary {
    fn find_eligible_files(
        &self,
        filter: &FileFilter,
        limit: usize,
    ) -> Result<Vec<LibraryFile>, LibraryError> {
        let mut sql = String::from(
            "SELECT id, volume_id, path, filename, media_type, scene_id, created_time
             FROM files WHERE media_type = ? AND scene_id IS NULL",
        );
        let mut values: Vec<Value> = vec![Value::Text(VIDEO_MEDIA_TYPE.to_string())];

        if let Some(volume_id) = filter.volume_id {
            sql.push_str(" AND volume_id = ?");
            values.push(Value::Integer(volume_id));
        }
        if let Some(prefix) = filter.path_prefix.as_deref().filter(|p| !p.is_empty()) {
            sql.push_str(r" AND path LIKE ? ESCAPE '\'");
            values.push(Value::Text(format!("{}%", escape_like(prefix))));
        }
        sql.push_str(" ORDER BY created_time DESC, id DESC LIMIT ?");
        values.push(Value::Integer(limit as i64));

        let conn = self.conn()?;
        let mut stmt = conn.prepare(&sql).map_err(db_err)?;
        let rows = stmt
            .query_map(params_from_iter(values), row_to_file)
            .map_err(db_err)?;

        let mut files = Vec::new();
        for row in rows {
            files.push(row.map_err(db_err)?);
        }
        Ok(files)
    }

    fn get_file(&self, id: u64) -> Result<LibraryFile, LibraryError> {
        let conn = self.conn()?;
        conn.query_row(
            "SELECT id, volume_id, path, filename, media_type, scene_id, created_time
             FROM files WHERE id = ?",
            params![id as i64],
            row_to_file,
        )
        .optional()
        .map_err(db_err)?
        .ok_or_else(|| LibraryError::NotFound(format!("file {}", id)))
    }

    fn get_scene(&self, scene_id: &str) -> Result<Scene, LibraryError> {
        let conn = self.conn()?;
        Self::load_scene(&conn, scene_id)
    }

    fn apply_match(&self, link: &SceneLink) -> Result<Scene, LibraryError> {
        let mut conn = self.conn()?;
        // Dropping the transaction without commit rolls everything back.
        let tx = conn.transaction().map_err(db_err)?;
        let now = timestamp(&Utc::now());

        let current: Option<Option<String>> = tx
            .query_row(
                "SELECT scene_id FROM files WHERE id = ?",
                params![link.file_id as i64],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;
        match current {
            None => return Err(LibraryError::NotFound(format!("file {}", link.file_id))),
            Some(Some(existing)) => {
                return Err(LibraryError::Conflict(format!(
                    "file {} already linked to scene {}",
                    link.file_id, existing
                )))
            }
            Some(None) => {}
        }

        let existing_filenames: Option<String> = tx
            .query_row(
                "SELECT filenames FROM scenes WHERE scene_id = ?",
                params![link.scene_id],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_err)?;

        let mut filenames: Vec<String> = match &existing_filenames {
            Some(json) => serde_json::from_str(json).unwrap_or_default(),
            None => Vec::new(),
        };
        if !filenames.iter().any(|f| f == &link.filename) {
            filenames.push(link.filename.clone());
        }
        let filenames_json = serde_json::to_string(&filenames)
            .map_err(|e| LibraryError::Internal(e.to_string()))?;

        if existing_filenames.is_some() {
            tx.execute(
                "UPDATE scenes SET title = ?, studio = ?, site = ?, scene_type = ?,
                        cover_url = ?, source_url = ?, filenames = ?, updated_at = ?
                 WHERE scene_id = ?",
                params![
                    link.title,
                    link.studio,
                    link.site,
                    link.scene_type,
                    link.cover_url,
                    link.source_url,
                    filenames_json,
                    now,
                    link.scene_id,
                ],
            )
            .map_err(db_err)?;
        } else {
            tx.execute(
                "INSERT INTO scenes (scene_id, title, studio, site, scene_type, cover_url,
                        source_url, filenames, created_at, added_date, updated_at)
                 VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?)",
                params![
                    link.scene_id,
                    link.title,
                    link.studio,
                    link.site,
                    link.scene_type,
                    link.cover_url,
                    link.source_url,
                    filenames_json,
                    now,
                    now,
                    now,
                ],
            )
            .map_err(db_err)?;
        }

        let linked = tx
            .execute(
                "UPDATE files SET scene_id = ? WHERE id = ? AND scene_id IS NULL",
                params![link.scene_id, link.file_id as i64],
            )
            .map_err(db_err)?;
        if linked != 1 {
            return Err(LibraryError::Conflict(format!(
                "file {} was linked concurrently",
                link.file_id
            )));
        }

        tx.execute(
            "INSERT INTO actions (scene_id, kind, field, value, created_at) VALUES (?, ?, ?, ?, ?)",
            params![
                link.scene_id,
                MATCH_ACTION_KIND,
                MATCH_ACTION_FIELD,
                filenames_json,
                now
            ],
        )
        .map_err(db_err)?;

        tx.execute(
            "UPDATE scenes SET
                file_count = (SELECT COUNT(*) FROM files WHERE scene_id = ?1),
                is_available = (SELECT COUNT(*) > 0 FROM files WHERE scene_id = ?1)
             WHERE scene_id = ?1",
            params![link.scene_id],
        )
        .map_err(db_err)?;

        let scene = Self::load_scene(&tx, &link.scene_id)?;
        tx.commit().map_err(db_err)?;
        Ok(scene)
    }

    fn reindex(&self, scene_ids: &[String]) -> Result<(), LibraryError> {
        let conn = self.conn()?;
        let now = timestamp(&Utc::now());
        for scene_id in scene_ids {
            let scene = Self::load_scene(&conn, scene_id)?;
            let content = [scene.title.as_str(), scene.studio.as_str()]
                .into_iter()
                .chain(scene.filenames.iter().map(String::as_str))
                .collect::<Vec<_>>()
                .join(" ");
            conn.execute(
                "INSERT INTO scene_search (scene_id, content, indexed_at) VALUES (?, ?, ?)
                 ON CONFLICT(scene_id) DO UPDATE SET content = excluded.content,
                                                     indexed_at = excluded.indexed_at",
                params![scene_id, content, now],
            )
            .map_err(db_err)?;
        }
        Ok(())
    }
}

fn db_err(e: rusqlite::Error) -> LibraryError {
    LibraryError::Database(e.to_string())
}

fn timestamp(at: &DateTime<Utc>) -> String {
    at.to_rfc3339_opts(SecondsFormat::Millis, true)
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

fn row_to_file(row: &Row<'_>) -> rusqlite::Result<LibraryFile> {
    let id: i64 = row.get(0)?;
    let created_time: String = row.get(6)?;
    Ok(LibraryFile {
        id: id as u64,
        volume_id: row.get(1)?,
        path: row.get(2)?,
        filename: row.get(3)?,
        media_type: row.get(4)?,
        scene_id: row.get(5)?,
        created_time: parse_timestamp(&created_time),
    })
}

fn row_to_scene(row: &Row<'_>) -> rusqlite::Result<Scene> {
    let filenames: String = row.get(7)?;
    let created_at: String = row.get(10)?;
    let added_date: String = row.get(11)?;
    let updated_at: String = row.get(12)?;
    Ok(Scene {
        scene_id: row.get(0)?,
        title: row.get(1)?,
        studio: row.get(2)?,
        site: row.get(3)?,
        scene_type: row.get(4)?,
        cover_url: row.get(5)?,
        source_url: row.get(6)?,
        filenames: serde_json::from_str(&filenames).unwrap_or_default(),
        file_count: row.get(8)?,
        is_available: row.get(9)?,
        created_at: parse_timestamp(&created_at),
        added_date: parse_timestamp(&added_date),
        updated_at: parse_timestamp(&updated_at),
    })
}
