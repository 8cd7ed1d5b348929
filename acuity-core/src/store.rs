//! SQLite persistence layer for sessions, frames, and game results.
//!
//! Records are serialised to JSON and stored one row per record, with
//! the columns a query actually filters or orders on lifted out:
//!
//! ```sql
//! CREATE TABLE IF NOT EXISTS sessions (
//!     id         TEXT PRIMARY KEY,
//!     data       TEXT NOT NULL,
//!     created_at TEXT NOT NULL
//! );
//! CREATE TABLE IF NOT EXISTS frames (
//!     id         TEXT PRIMARY KEY,
//!     session_id TEXT NOT NULL REFERENCES sessions(id),
//!     data       TEXT NOT NULL,
//!     timestamp  TEXT NOT NULL
//! );
//! CREATE TABLE IF NOT EXISTS game_results (
//!     id         TEXT PRIMARY KEY,
//!     session_id TEXT NOT NULL REFERENCES sessions(id),
//!     game_type  TEXT NOT NULL,
//!     data       TEXT NOT NULL,
//!     timestamp  TEXT NOT NULL
//! );
//! ```
//!
//! - WAL mode for concurrent reads while captures append.
//! - JSON in a TEXT column keeps the schema stable as per-game metric
//!   payloads change shape.
//! - Timestamps are RFC 3339 in UTC, so lexicographic ORDER BY matches
//!   chronological order.
//! - Backup support via SQLite's online-backup API.

use std::path::{Path, PathBuf};
use std::time::Instant;

use rusqlite::{Connection, OpenFlags, params};
use tracing::{debug, info};

use crate::config::StoreConfig;
use crate::error::{AcuityError, Result};
use crate::types::{Frame, GameResult, Session, SessionId};

const SCHEMA: &str = "
    CREATE TABLE IF NOT EXISTS sessions (
        id         TEXT PRIMARY KEY,
        data       TEXT NOT NULL,
        created_at TEXT NOT NULL
    );
    CREATE TABLE IF NOT EXISTS frames (
        id         TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES sessions(id),
        data       TEXT NOT NULL,
        timestamp  TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_frames_session
        ON frames(session_id, timestamp DESC);
    CREATE TABLE IF NOT EXISTS game_results (
        id         TEXT PRIMARY KEY,
        session_id TEXT NOT NULL REFERENCES sessions(id),
        game_type  TEXT NOT NULL,
        data       TEXT NOT NULL,
        timestamp  TEXT NOT NULL
    );
    CREATE INDEX IF NOT EXISTS idx_results_session
        ON game_results(session_id, timestamp DESC);
";

// ---------------------------------------------------------------------------
// SessionStore
// ---------------------------------------------------------------------------

/// Handle to an open SQLite database holding assessment records.
///
/// # Usage
///
/// ```no_run
/// # use acuity_core::store::SessionStore;
/// # use acuity_core::config::StoreConfig;
/// # use acuity_core::types::Session;
/// let store = SessionStore::open("acuity.db", &StoreConfig::default())?;
/// let session = Session::new(None, "");
/// store.create_session(&session)?;
/// let loaded = store.get_session(&session.id)?;
/// # Ok::<(), acuity_core::AcuityError>(())
/// ```
pub struct SessionStore {
    conn: Connection,
    config: StoreConfig,
    db_path: PathBuf,
}

impl std::fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SessionStore")
            .field("db_path", &self.db_path)
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Open (or create) an SQLite database at `path`.
    ///
    /// The schema is created if it does not exist. WAL mode is enabled
    /// when `config.wal_mode` is `true`.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures.
    pub fn open<P: AsRef<Path>>(path: P, config: &StoreConfig) -> Result<Self> {
        let db_path = path.as_ref().to_path_buf();
        let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
            | OpenFlags::SQLITE_OPEN_CREATE
            | OpenFlags::SQLITE_OPEN_NO_MUTEX;

        let conn = Connection::open_with_flags(&db_path, flags)?;

        if config.wal_mode {
            conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        }
        conn.execute_batch("PRAGMA synchronous = NORMAL;")?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch("PRAGMA busy_timeout = 5000;")?;

        conn.execute_batch(SCHEMA)?;

        info!(
            path = %db_path.display(),
            wal = config.wal_mode,
            "session store opened"
        );

        Ok(Self {
            conn,
            config: config.clone(),
            db_path,
        })
    }

    /// Open an in-memory database (useful for tests).
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures.
    pub fn open_in_memory(config: &StoreConfig) -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch("PRAGMA foreign_keys = ON;")?;
        conn.execute_batch(SCHEMA)?;

        Ok(Self {
            conn,
            config: config.clone(),
            db_path: PathBuf::from(":memory:"),
        })
    }

    // ------------------------------------------------------------------
    // Sessions
    // ------------------------------------------------------------------

    /// Insert a new session.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures, including a
    /// duplicate session id.
    pub fn create_session(&self, session: &Session) -> Result<()> {
        let json = serde_json::to_string(session)?;
        self.conn.execute(
            "INSERT INTO sessions (id, data, created_at) VALUES (?1, ?2, ?3)",
            params![
                session.id.to_string(),
                json,
                session.created_at.to_rfc3339()
            ],
        )?;
        debug!(session = %session.id, "session created");
        Ok(())
    }

    /// Load a session by id, or `None` if no such row exists.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures, or
    /// [`AcuityError::Serialization`] if the stored JSON fails to decode.
    pub fn get_session(&self, id: &SessionId) -> Result<Option<Session>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data FROM sessions WHERE id = ?1")?;
        let json: Option<String> = stmt
            .query_row(params![id.to_string()], |row| row.get(0))
            .optional()?;
        match json {
            Some(json) => Ok(Some(serde_json::from_str(&json)?)),
            None => Ok(None),
        }
    }

    /// Whether a session row exists for `id`.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures.
    pub fn session_exists(&self, id: &SessionId) -> Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM sessions WHERE id = ?1")?;
        let row: Option<i64> = stmt
            .query_row(params![id.to_string()], |row| row.get(0))
            .optional()?;
        Ok(row.is_some())
    }

    /// Replace a session's notes, the only mutable field. Returns `true`
    /// if the session existed.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] or [`AcuityError::Serialization`]
    /// on failure.
    pub fn set_notes(&self, id: &SessionId, notes: &str) -> Result<bool> {
        let Some(mut session) = self.get_session(id)? else {
            return Ok(false);
        };
        session.notes = notes.to_string();
        let json = serde_json::to_string(&session)?;
        self.conn.execute(
            "UPDATE sessions SET data = ?2 WHERE id = ?1",
            params![id.to_string(), json],
        )?;
        Ok(true)
    }

    /// The most recently created sessions, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] or [`AcuityError::Serialization`]
    /// on failure.
    pub fn recent_sessions(&self, limit: usize) -> Result<Vec<Session>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT data FROM sessions ORDER BY created_at DESC LIMIT ?1")?;
        let rows = stmt.query_map(params![limit], |row| row.get::<_, String>(0))?;

        let mut sessions = Vec::new();
        for row in rows {
            sessions.push(serde_json::from_str(&row?)?);
        }
        Ok(sessions)
    }

    /// Total number of stored sessions.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures.
    pub fn session_count(&self) -> Result<usize> {
        let count: i64 = self
            .conn
            .query_row("SELECT COUNT(*) FROM sessions", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Frames
    // ------------------------------------------------------------------

    /// Append a captured frame to its session.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::SessionNotFound`] if the owning session does
    /// not exist, [`AcuityError::Database`] or [`AcuityError::Serialization`]
    /// otherwise.
    pub fn insert_frame(&self, frame: &Frame) -> Result<()> {
        if !self.session_exists(&frame.session_id)? {
            return Err(AcuityError::SessionNotFound(frame.session_id));
        }

        let start = Instant::now();
        let json = serde_json::to_string(frame)?;
        self.conn.execute(
            "INSERT INTO frames (id, session_id, data, timestamp) VALUES (?1, ?2, ?3, ?4)",
            params![
                frame.id.to_string(),
                frame.session_id.to_string(),
                json,
                frame.timestamp.to_rfc3339()
            ],
        )?;
        debug!(
            session = %frame.session_id,
            landmarks = frame.landmarks.len(),
            elapsed_us = start.elapsed().as_micros(),
            "frame stored"
        );
        Ok(())
    }

    /// The most recent frames for a session, newest first, capped at
    /// `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] or [`AcuityError::Serialization`]
    /// on failure.
    pub fn recent_frames(&self, session: &SessionId, limit: usize) -> Result<Vec<Frame>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT data FROM frames WHERE session_id = ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![session.to_string(), limit], |row| {
            row.get::<_, String>(0)
        })?;

        let mut frames = Vec::new();
        for row in rows {
            frames.push(serde_json::from_str(&row?)?);
        }
        Ok(frames)
    }

    /// Total number of frames stored for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures.
    pub fn frame_count(&self, session: &SessionId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM frames WHERE session_id = ?1",
            params![session.to_string()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Game results
    // ------------------------------------------------------------------

    /// Append a game result to its session.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::SessionNotFound`] if the owning session does
    /// not exist, [`AcuityError::Database`] or [`AcuityError::Serialization`]
    /// otherwise.
    pub fn insert_result(&self, result: &GameResult) -> Result<()> {
        if !self.session_exists(&result.session_id)? {
            return Err(AcuityError::SessionNotFound(result.session_id));
        }

        let json = serde_json::to_string(result)?;
        self.conn.execute(
            "INSERT INTO game_results (id, session_id, game_type, data, timestamp)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![
                result.id.to_string(),
                result.session_id.to_string(),
                result.game_type,
                json,
                result.timestamp.to_rfc3339()
            ],
        )?;
        debug!(
            session = %result.session_id,
            game_type = %result.game_type,
            "game result stored"
        );
        Ok(())
    }

    /// The most recent game results for a session, newest first, capped
    /// at `limit`.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] or [`AcuityError::Serialization`]
    /// on failure.
    pub fn recent_results(&self, session: &SessionId, limit: usize) -> Result<Vec<GameResult>> {
        let mut stmt = self.conn.prepare_cached(
            "SELECT data FROM game_results WHERE session_id = ?1
             ORDER BY timestamp DESC LIMIT ?2",
        )?;
        let rows = stmt.query_map(params![session.to_string(), limit], |row| {
            row.get::<_, String>(0)
        })?;

        let mut results = Vec::new();
        for row in rows {
            results.push(serde_json::from_str(&row?)?);
        }
        Ok(results)
    }

    /// Total number of results stored for a session.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures.
    pub fn result_count(&self, session: &SessionId) -> Result<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(*) FROM game_results WHERE session_id = ?1",
            params![session.to_string()],
            |row| row.get(0),
        )?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // ------------------------------------------------------------------
    // Backup
    // ------------------------------------------------------------------

    /// Create a backup of the database to `dest_path` using SQLite's
    /// online-backup API. Safe to call while the database is in use.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures, or
    /// [`AcuityError::Io`] if the destination is not writable.
    pub fn backup<P: AsRef<Path>>(&self, dest_path: P) -> Result<()> {
        let start = Instant::now();
        let mut dest = Connection::open(dest_path.as_ref())?;
        let backup = rusqlite::backup::Backup::new(&self.conn, &mut dest)?;

        // Step through 256 pages at a time, sleeping 50ms between steps.
        backup.run_to_completion(256, std::time::Duration::from_millis(50), None)?;

        info!(
            dest = %dest_path.as_ref().display(),
            elapsed_ms = start.elapsed().as_millis(),
            "database backup completed"
        );
        Ok(())
    }

    /// Create a numbered backup alongside the database file, rotating old
    /// backups so that at most `config.backup_count` are kept.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] or [`AcuityError::Io`] on failure.
    pub fn create_rotating_backup(&self) -> Result<()> {
        if self.db_path.as_os_str() == ":memory:" {
            return Ok(());
        }

        let max = self.config.backup_count;
        if max == 0 {
            return Ok(());
        }

        // Rotate existing backups (highest first so we don't overwrite).
        for i in (1..max).rev() {
            let src = self.backup_path(i);
            let dst = self.backup_path(i + 1);
            if src.exists() {
                std::fs::rename(&src, &dst)?;
            }
        }

        let oldest = self.backup_path(max + 1);
        if oldest.exists() {
            std::fs::remove_file(&oldest)?;
        }

        let dest = self.backup_path(1);
        self.backup(&dest)?;

        info!(max_backups = max, "rotating backup created");
        Ok(())
    }

    /// Path to a numbered backup file (e.g. `acuity.db.bak.1`).
    fn backup_path(&self, n: u32) -> PathBuf {
        let mut p = self.db_path.clone();
        let ext = format!(
            "{}.bak.{n}",
            p.extension()
                .map_or(String::new(), |e| e.to_string_lossy().into_owned())
        );
        p.set_extension(ext);
        p
    }

    // ------------------------------------------------------------------
    // Utility
    // ------------------------------------------------------------------

    /// Path to the database file (or `:memory:` for in-memory stores).
    #[must_use]
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Run an integrity check on the database.
    ///
    /// Returns `Ok(true)` if the database passes, `Ok(false)` if
    /// corruption is detected.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] if the check itself fails.
    pub fn integrity_check(&self) -> Result<bool> {
        let result: String = self
            .conn
            .query_row("PRAGMA integrity_check", [], |row| row.get(0))?;
        Ok(result == "ok")
    }

    /// Reclaim unused space by running `VACUUM`.
    ///
    /// # Errors
    ///
    /// Returns [`AcuityError::Database`] on SQLite failures.
    pub fn vacuum(&self) -> Result<()> {
        self.conn.execute_batch("VACUUM;")?;
        Ok(())
    }
}

/// Extension trait that adds an `.optional()` combinator to `rusqlite::Result`.
///
/// Converts `Err(QueryReturnedNoRows)` into `Ok(None)`.
trait OptionalExt<T> {
    /// Convert `QueryReturnedNoRows` into `Ok(None)`.
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> std::result::Result<Option<T>, rusqlite::Error> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use chrono::Utc;
    use serde_json::json;

    use crate::types::Landmark;

    fn test_store() -> SessionStore {
        SessionStore::open_in_memory(&StoreConfig::default()).expect("open")
    }

    fn frame_at(session: SessionId, secs: i64, landmarks: usize) -> Frame {
        let points = (0..landmarks)
            .map(|i| Landmark {
                x: i as f32,
                y: 0.0,
                z: 0.0,
            })
            .collect();
        let mut frame = Frame::with_landmarks(session, points);
        frame.timestamp = Utc.timestamp_opt(secs, 0).single().expect("timestamp");
        frame
    }

    #[test]
    fn session_round_trip() {
        let store = test_store();
        let session = Session::new(Some("subject-7".to_string()), "baseline visit");

        store.create_session(&session).expect("create");
        let loaded = store.get_session(&session.id).expect("get").expect("Some");
        assert_eq!(loaded, session);

        assert!(store.get_session(&SessionId::new()).expect("get").is_none());
    }

    #[test]
    fn notes_are_the_only_mutable_field() {
        let store = test_store();
        let session = Session::new(None, "");
        store.create_session(&session).expect("create");

        assert!(store.set_notes(&session.id, "left early").expect("set"));
        let loaded = store.get_session(&session.id).expect("get").expect("Some");
        assert_eq!(loaded.notes, "left early");
        assert_eq!(loaded.created_at, session.created_at);

        assert!(!store.set_notes(&SessionId::new(), "x").expect("set"));
    }

    #[test]
    fn frame_requires_an_existing_session() {
        let store = test_store();
        let orphan = frame_at(SessionId::new(), 0, 3);
        let err = store.insert_frame(&orphan);
        assert!(matches!(err, Err(AcuityError::SessionNotFound(_))));
    }

    #[test]
    fn recent_frames_are_newest_first_and_capped() {
        let store = test_store();
        let session = Session::new(None, "");
        store.create_session(&session).expect("create");

        for secs in 0..5 {
            store
                .insert_frame(&frame_at(session.id, secs, 2))
                .expect("insert");
        }

        let frames = store.recent_frames(&session.id, 3).expect("fetch");
        assert_eq!(frames.len(), 3);
        let times: Vec<i64> = frames.iter().map(|f| f.timestamp.timestamp()).collect();
        assert_eq!(times, vec![4, 3, 2]);
        assert_eq!(store.frame_count(&session.id).expect("count"), 5);
    }

    #[test]
    fn results_round_trip_with_payload_intact() {
        let store = test_store();
        let session = Session::new(None, "");
        store.create_session(&session).expect("create");

        let payload = json!({"reactionMs": 340.5, "total_score": 6595});
        let result = GameResult::new(session.id, "reaction", payload.clone());
        store.insert_result(&result).expect("insert");

        let results = store.recent_results(&session.id, 10).expect("fetch");
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].game_type, "reaction");
        assert_eq!(results[0].result, payload);
    }

    #[test]
    fn result_requires_an_existing_session() {
        let store = test_store();
        let orphan = GameResult::new(SessionId::new(), "stroop", json!({}));
        let err = store.insert_result(&orphan);
        assert!(matches!(err, Err(AcuityError::SessionNotFound(_))));
    }

    #[test]
    fn recent_results_are_scoped_to_their_session() {
        let store = test_store();
        let a = Session::new(None, "");
        let b = Session::new(None, "");
        store.create_session(&a).expect("create a");
        store.create_session(&b).expect("create b");

        for i in 0..3 {
            let mut result = GameResult::new(a.id, "stroop", json!({"n": i}));
            result.timestamp = Utc.timestamp_opt(i, 0).single().expect("timestamp");
            store.insert_result(&result).expect("insert");
        }
        store
            .insert_result(&GameResult::new(b.id, "sentence", json!({})))
            .expect("insert");

        let for_a = store.recent_results(&a.id, 10).expect("fetch");
        assert_eq!(for_a.len(), 3);
        assert_eq!(for_a[0].result["n"], 2);
        assert_eq!(store.result_count(&b.id).expect("count"), 1);
    }

    #[test]
    fn session_listing_and_count() {
        let store = test_store();
        for _ in 0..3 {
            store.create_session(&Session::new(None, "")).expect("create");
        }
        assert_eq!(store.session_count().expect("count"), 3);
        assert_eq!(store.recent_sessions(2).expect("list").len(), 2);
    }

    #[test]
    fn integrity_check_passes() {
        let store = test_store();
        assert!(store.integrity_check().expect("check"));
    }

    #[test]
    fn file_based_open_and_backup() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("acuity.db");
        let config = StoreConfig::default();

        let store = SessionStore::open(&db_path, &config).expect("open");
        let session = Session::new(None, "");
        store.create_session(&session).expect("create");

        let backup_path = dir.path().join("acuity_backup.db");
        store.backup(&backup_path).expect("backup");

        let restored = SessionStore::open(&backup_path, &config).expect("open backup");
        assert!(restored.get_session(&session.id).expect("get").is_some());
    }

    #[test]
    fn rotating_backup_keeps_at_most_the_configured_count() {
        let dir = tempfile::tempdir().expect("tempdir");
        let db_path = dir.path().join("visits.db");
        let config = StoreConfig {
            backup_count: 2,
            ..StoreConfig::default()
        };

        let store = SessionStore::open(&db_path, &config).expect("open");
        store.create_session(&Session::new(None, "")).expect("create");

        store.create_rotating_backup().expect("backup 1");
        store.create_rotating_backup().expect("backup 2");
        store.create_rotating_backup().expect("backup 3");

        assert!(dir.path().join("visits.db.bak.1").exists());
        assert!(dir.path().join("visits.db.bak.2").exists());
        assert!(!dir.path().join("visits.db.bak.3").exists());
    }
}
