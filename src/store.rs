//! SQLite persistence for track rows.
//!
//! The connection is exclusively owned by one store (and therefore one sync
//! instance) behind an `Arc<Mutex<..>>`; reconciliation work clones the handle
//! into blocking tasks. All multi-row mutations run inside transactions so a
//! crash mid-batch never leaves a partially applied batch.

use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};

use rusqlite::{params, Connection};

use crate::error::{Result, SyncError};
use crate::track::{Track, TrackMeta};

/// Maximum rows mutated per transaction.
pub const MAX_BATCH: usize = 25;

#[derive(Clone)]
pub struct TrackStore {
    conn: Arc<Mutex<Connection>>,
    table: String,
}

impl TrackStore {
    /// Open (or create) a database file, apply the connection pragmas, and
    /// ensure the schema exists.
    pub fn open(db_path: &Path, table: &str) -> Result<Self> {
        if let Some(dir) = db_path.parent() {
            if !dir.as_os_str().is_empty() {
                std::fs::create_dir_all(dir)?;
            }
        }
        let conn = Connection::open(db_path)?;
        conn.pragma_update(None, "journal_mode", WAL)?;
        conn.pragma_update(None, "foreign_keys", ON)?;
        conn.pragma_update(None, "synchronous", NORMAL)?;
        tracing::info!("[Store] Database opened at {}", db_path.display());
        Self::from_connection(conn, table)
    }

    /// Wrap an existing connection. The caller hands over exclusive ownership.
    pub fn from_connection(conn: Connection, table: &str) -> Result<Self> {
        validate_table_name(table)?;
        let store = Self {
            conn: Arc::new(Mutex::new(conn)),
            table: table.to_string(),
        };
        store.ensure_schema()?;
        Ok(store)
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| SyncError::State("Poisoned connection lock".into()))
    }

    fn ensure_schema(&self) -> Result<()> {
        let conn = self.lock()?;
        conn.execute_batch(&format!(
            r#"
            CREATE TABLE IF NOT EXISTS {t} (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                path TEXT NOT NULL UNIQUE,
                mtime INTEGER NOT NULL,
                title TEXT,
                artist TEXT,
                album TEXT,
                year INTEGER,
                duration INTEGER,
                track_no INTEGER,
                disk INTEGER DEFAULT 1,
                tags TEXT,
                is_vbr INTEGER,
                bitrate INTEGER,
                codec TEXT,
                container TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_{t}_artist ON {t}(artist);
            CREATE INDEX IF NOT EXISTS idx_{t}_title ON {t}(title);
            "#,
            t = self.table
        ))?;
        tracing::debug!("[Store] Ensured schema for table {}", self.table);
        Ok(())
    }

    /// Every stored (path, mtime) pair, in path order.
    pub fn all_mtimes(&self) -> Result<Vec<(String, i64)>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT path, mtime FROM {} ORDER BY path",
            self.table
        ))?;
        let rows = stmt.query_map([], |row| Ok((row.get(0)?, row.get(1)?)))?;
        let mut pairs = Vec::new();
        for row in rows {
            pairs.push(row?);
        }
        Ok(pairs)
    }

    pub fn get_track(&self, path: &str) -> Result<Option<Track>> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare(&format!(
            "SELECT path, mtime, title, artist, album, year, duration, track_no,
                    disk, tags, is_vbr, bitrate, codec, container
             FROM {} WHERE path = ?1",
            self.table
        ))?;
        let result = stmt.query_row(params![path], |row| {
            let tags_json: Option<String> = row.get(9)?;
            Ok(Track {
                path: row.get(0)?,
                mtime: row.get(1)?,
                meta: TrackMeta {
                    title: row.get(2)?,
                    artist: row.get(3)?,
                    album: row.get(4)?,
                    year: row.get(5)?,
                    duration: row.get(6)?,
                    track_no: row.get(7)?,
                    disk: row.get(8)?,
                    tags: tags_json
                        .as_deref()
                        .and_then(|j| serde_json::from_str(j).ok())
                        .unwrap_or_default(),
                    is_vbr: row.get(10)?,
                    bitrate: row.get(11)?,
                    codec: row.get(12)?,
                    container: row.get(13)?,
                },
            })
        });
        match result {
            Ok(track) => Ok(Some(track)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(SyncError::Database(e)),
        }
    }

    pub fn track_count(&self) -> Result<u64> {
        let conn = self.lock()?;
        let count =
            conn.query_row(&format!("SELECT COUNT(*) FROM {}", self.table), [], |row| {
                row.get::<_, u64>(0)
            })?;
        Ok(count)
    }

    /// Insert or overwrite rows, all inside one transaction.
    ///
    /// On a path conflict every column except `path` is overwritten with the
    /// new values.
    pub fn upsert_batch(&self, tracks: &[Track]) -> Result<()> {
        if tracks.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!(
                "INSERT INTO {} (path, mtime, title, artist, album, year, duration,
                                 track_no, disk, tags, is_vbr, bitrate, codec, container)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14)
                 ON CONFLICT(path) DO UPDATE SET
                     mtime = excluded.mtime,
                     title = excluded.title,
                     artist = excluded.artist,
                     album = excluded.album,
                     year = excluded.year,
                     duration = excluded.duration,
                     track_no = excluded.track_no,
                     disk = excluded.disk,
                     tags = excluded.tags,
                     is_vbr = excluded.is_vbr,
                     bitrate = excluded.bitrate,
                     codec = excluded.codec,
                     container = excluded.container",
                self.table
            ))?;
            for track in tracks {
                let meta = &track.meta;
                let tags_json = if meta.tags.is_empty() {
                    None
                } else {
                    Some(serde_json::to_string(&meta.tags)?)
                };
                stmt.execute(params![
                    track.path,
                    track.mtime,
                    meta.title,
                    meta.artist,
                    meta.album,
                    meta.year,
                    meta.duration,
                    meta.track_no,
                    meta.disk.unwrap_or(1),
                    tags_json,
                    meta.is_vbr,
                    meta.bitrate,
                    meta.codec,
                    meta.container,
                ])?;
                tracing::debug!("[Store] Upserted {}", track.path);
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete the given paths, all inside one transaction.
    pub fn delete_paths(&self, paths: &[String]) -> Result<()> {
        if paths.is_empty() {
            return Ok(());
        }
        let mut conn = self.lock()?;
        let tx = conn.transaction()?;
        {
            let mut stmt = tx.prepare(&format!("DELETE FROM {} WHERE path = ?1", self.table))?;
            for path in paths {
                stmt.execute(params![path])?;
                tracing::debug!("[Store] Deleted {}", path);
            }
        }
        tx.commit()?;
        Ok(())
    }

    /// Delete one row by path; true when a row actually existed.
    pub fn delete_path(&self, path: &str) -> Result<bool> {
        let conn = self.lock()?;
        let affected = conn.execute(
            &format!("DELETE FROM {} WHERE path = ?1", self.table),
            params![path],
        )?;
        Ok(affected > 0)
    }

    /// Delete every row whose path starts with `<dir><separator>`.
    ///
    /// This is a character-exact prefix match, not substring or LIKE matching,
    /// so removing `/music/sub` never touches `/music/subway.mp3`. Returns the
    /// number of rows dropped; zero matches is a no-op.
    pub fn delete_prefix(&self, dir: &str) -> Result<usize> {
        let prefix = format!("{}{}", dir, std::path::MAIN_SEPARATOR);
        let conn = self.lock()?;
        let affected = conn.execute(
            &format!(
                "DELETE FROM {} WHERE substr(path, 1, ?1) = ?2",
                self.table
            ),
            params![prefix.chars().count() as i64, prefix],
        )?;
        if affected > 0 {
            tracing::debug!("[Store] Deleted {} rows under {}", affected, dir);
        }
        Ok(affected)
    }
}

fn validate_table_name(table: &str) -> Result<()> {
    let valid = !table.is_empty()
        && table
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_');
    if valid {
        Ok(())
    } else {
        Err(SyncError::State(format!(
            "Invalid table name: {:?}",
            table
        )))
    }
}

// SQL pragma constants
const WAL: &str = "WAL";
const ON: &str = "ON";
const NORMAL: &str = "NORMAL";
