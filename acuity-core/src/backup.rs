//! Local backup queue for game records that failed to reach the remote
//! store.
//!
//! A failed remote persist drops the record here instead of surfacing an
//! error; the queue is drained once per session bootstrap, never on a
//! schedule. Entries live in a JSON file on disk so queued records
//! survive a process restart, each carrying a `sync_attempted` flag that
//! marks records which already failed one drain.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::error::Result;
use crate::games::GameRunRecord;

/// One queued record awaiting a successful remote persist.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BackupEntry {
    /// The record that failed to persist.
    #[serde(flatten)]
    pub record: GameRunRecord,
    /// When the record was captured locally.
    pub backup_time: DateTime<Utc>,
    /// Whether a drain has already retried (and failed) this entry.
    pub sync_attempted: bool,
}

/// Counters describing queue traffic since the queue was opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BackupStats {
    /// Entries currently waiting.
    pub depth: usize,
    /// Records captured after a failed remote persist.
    pub total_captured: u64,
    /// Entries handed out to drains.
    pub total_drained: u64,
    /// Entries put back after a failed drain push.
    pub total_requeued: u64,
}

struct BackupQueueInner {
    entries: Vec<BackupEntry>,
    path: PathBuf,
    total_captured: u64,
    total_drained: u64,
    total_requeued: u64,
}

/// Thread-safe, file-backed queue of unsynced game records.
///
/// Clones share the same queue and backing file.
pub struct BackupQueue {
    inner: Arc<Mutex<BackupQueueInner>>,
}

impl std::fmt::Debug for BackupQueue {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.inner.lock();
        f.debug_struct("BackupQueue")
            .field("path", &inner.path)
            .field("depth", &inner.entries.len())
            .finish_non_exhaustive()
    }
}

impl BackupQueue {
    /// Open the queue backed by the JSON file at `path`, loading any
    /// entries a previous process left behind. A missing file starts an
    /// empty queue.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcuityError::Io`] if the file cannot be read, or
    /// [`crate::AcuityError::Serialization`] if its contents fail to
    /// decode.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        let entries: Vec<BackupEntry> = if path.exists() {
            let json = std::fs::read_to_string(&path)?;
            serde_json::from_str(&json)?
        } else {
            Vec::new()
        };

        if !entries.is_empty() {
            debug!(
                path = %path.display(),
                pending = entries.len(),
                "backup queue loaded pending records"
            );
        }

        Ok(Self {
            inner: Arc::new(Mutex::new(BackupQueueInner {
                entries,
                path,
                total_captured: 0,
                total_drained: 0,
                total_requeued: 0,
            })),
        })
    }

    /// Capture a record whose remote persist failed.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcuityError::Io`] or
    /// [`crate::AcuityError::Serialization`] if the file write fails.
    pub fn capture(&self, record: GameRunRecord, now: DateTime<Utc>) -> Result<()> {
        let mut inner = self.inner.lock();
        warn!(
            game = %record.game,
            session = %record.session_id,
            "remote persist failed, capturing record to local backup"
        );
        inner.entries.push(BackupEntry {
            record,
            backup_time: now,
            sync_attempted: false,
        });
        inner.total_captured += 1;
        persist(&inner)
    }

    /// Remove and return every queued entry, leaving the file empty.
    /// Entries that still fail go back via [`Self::requeue`].
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcuityError::Io`] or
    /// [`crate::AcuityError::Serialization`] if the file write fails.
    pub fn take_pending(&self) -> Result<Vec<BackupEntry>> {
        let mut inner = self.inner.lock();
        let entries = std::mem::take(&mut inner.entries);
        inner.total_drained += entries.len() as u64;
        persist(&inner)?;
        Ok(entries)
    }

    /// Put an entry back after a failed drain push, marking it as
    /// already attempted.
    ///
    /// # Errors
    ///
    /// Returns [`crate::AcuityError::Io`] or
    /// [`crate::AcuityError::Serialization`] if the file write fails.
    pub fn requeue(&self, mut entry: BackupEntry) -> Result<()> {
        let mut inner = self.inner.lock();
        entry.sync_attempted = true;
        inner.entries.push(entry);
        inner.total_requeued += 1;
        persist(&inner)
    }

    /// Number of entries currently waiting.
    #[must_use]
    pub fn len(&self) -> usize {
        self.inner.lock().entries.len()
    }

    /// Whether the queue holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.inner.lock().entries.is_empty()
    }

    /// Traffic counters since this queue handle family was opened.
    #[must_use]
    pub fn stats(&self) -> BackupStats {
        let inner = self.inner.lock();
        BackupStats {
            depth: inner.entries.len(),
            total_captured: inner.total_captured,
            total_drained: inner.total_drained,
            total_requeued: inner.total_requeued,
        }
    }

    /// Path of the backing file.
    #[must_use]
    pub fn path(&self) -> PathBuf {
        self.inner.lock().path.clone()
    }
}

impl Clone for BackupQueue {
    fn clone(&self) -> Self {
        Self {
            inner: Arc::clone(&self.inner),
        }
    }
}

/// Write the queue contents to disk, via a temp file so a crash mid-write
/// cannot truncate the real one.
fn persist(inner: &BackupQueueInner) -> Result<()> {
    let json = serde_json::to_string(&inner.entries)?;
    let tmp = inner.path.with_extension("json.tmp");
    std::fs::write(&tmp, json)?;
    std::fs::rename(&tmp, &inner.path)?;
    Ok(())
}
