//! Assessment pass orchestrator.
//!
//! Owns the ordered game list, the current-game pointer, and the result
//! records collected during one pass. Navigation is free: any game can
//! be selected or replayed, and a replay overwrites that game's slot in
//! the collection rather than appending a duplicate.
//!
//! Completed records are pushed to a remote [`ResultSink`]; a failed push
//! is captured to the local [`BackupQueue`] and never surfaced as an
//! error. The queue is drained exactly once per established session, at
//! [`AssessmentFlow::begin_pass`].

use std::collections::HashMap;
use std::future::Future;

use chrono::{DateTime, Utc};
use ordered_float::OrderedFloat;
use tracing::{debug, info, warn};

use crate::backup::BackupQueue;
use crate::error::Result;
use crate::games::{GameKind, GameMetrics, GameRunRecord};
use crate::types::{Session, SessionContext, UserId};

// ---------------------------------------------------------------------------
// Remote sink seam
// ---------------------------------------------------------------------------

/// Remote persistence for sessions and completed game records.
///
/// The HTTP client implements this against the assessment service; tests
/// substitute in-memory fakes.
pub trait ResultSink {
    /// Register a newly established session.
    fn register_session(&self, session: &Session) -> impl Future<Output = Result<()>> + Send;

    /// Persist one completed game record.
    fn push_record(&self, record: &GameRunRecord) -> impl Future<Output = Result<()>> + Send;
}

/// Where a completed record ended up.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    /// The remote store accepted the record.
    Stored,
    /// The remote push failed; the record sits in the local backup queue.
    BackedUp,
}

// ---------------------------------------------------------------------------
// Pass summary
// ---------------------------------------------------------------------------

/// Display-ready line for one completed game.
#[derive(Debug, Clone, PartialEq)]
pub struct SummaryEntry {
    /// Which game.
    pub game: GameKind,
    /// Total score for the run.
    pub score: f64,
    /// Percentage accuracy, for games that measure it.
    pub accuracy: Option<f64>,
    /// Mean reaction latency in milliseconds, for games that measure it.
    pub average_time_ms: Option<f64>,
    /// Highest level reached, for games with levels.
    pub max_level: Option<u32>,
}

impl SummaryEntry {
    /// Accuracy formatted for display, `"N/A"` when the game has none.
    #[must_use]
    pub fn accuracy_display(&self) -> String {
        self.accuracy
            .map_or_else(|| "N/A".to_string(), |a| format!("{a:.1}%"))
    }

    /// Average latency formatted for display, `"N/A"` when the game has
    /// none.
    #[must_use]
    pub fn average_time_display(&self) -> String {
        self.average_time_ms
            .map_or_else(|| "N/A".to_string(), |ms| format!("{ms:.0}ms"))
    }

    /// Max level formatted for display, `"N/A"` when the game has none.
    #[must_use]
    pub fn max_level_display(&self) -> String {
        self.max_level
            .map_or_else(|| "N/A".to_string(), |l| l.to_string())
    }
}

/// Aggregate view over the records collected in one pass.
#[derive(Debug, Clone, PartialEq)]
pub struct PassSummary {
    /// Distinct games completed so far.
    pub games_completed: usize,
    /// Mean of the completed games' total scores, 0 with no records.
    pub average_score: f64,
    /// The completed game with the highest total score.
    pub best_game: Option<GameKind>,
    /// Per-game lines in assessment order.
    pub entries: Vec<SummaryEntry>,
}

// ---------------------------------------------------------------------------
// AssessmentFlow
// ---------------------------------------------------------------------------

/// Orchestrates one subject's assessment passes.
#[derive(Debug)]
pub struct AssessmentFlow<S> {
    ctx: SessionContext,
    sink: S,
    backlog: BackupQueue,
    current: GameKind,
    completed: HashMap<GameKind, GameRunRecord>,
}

impl<S: ResultSink> AssessmentFlow<S> {
    /// Create a flow for `user_id`. No remote traffic happens until
    /// [`Self::begin_pass`].
    pub fn new(user_id: UserId, sink: S, backlog: BackupQueue) -> Self {
        Self {
            ctx: SessionContext::new(user_id),
            sink,
            backlog,
            current: GameKind::ASSESSMENT_ORDER[0],
            completed: HashMap::new(),
        }
    }

    /// Start a fresh pass: rotate to a new session, clear collected
    /// records, register the session with the remote store best-effort,
    /// and drain the backup queue once.
    ///
    /// Remote failures are logged and swallowed; the pass proceeds
    /// offline.
    pub async fn begin_pass(&mut self) -> Session {
        self.ctx.rotate_session();
        self.completed.clear();
        self.current = GameKind::ASSESSMENT_ORDER[0];

        let session = Session::with_id(self.ctx.session_id, None, "");
        if let Err(err) = self.sink.register_session(&session).await {
            warn!(
                session = %session.id,
                error = %err,
                "session registration failed, continuing offline"
            );
        } else {
            info!(session = %session.id, "assessment pass started");
        }

        self.drain_backlog().await;
        session
    }

    /// Record a completed game run, overwriting any prior record for the
    /// same game, and persist it. A failed remote push lands the record
    /// in the backup queue instead of surfacing an error.
    pub async fn complete_game(&mut self, metrics: GameMetrics, now: DateTime<Utc>) -> SyncStatus {
        let record = GameRunRecord::new(&self.ctx, metrics, now);
        let game = record.game;
        debug!(game = %game, session = %record.session_id, "game completed");
        self.completed.insert(game, record.clone());

        match self.sink.push_record(&record).await {
            Ok(()) => SyncStatus::Stored,
            Err(err) => {
                debug!(game = %game, error = %err, "remote persist failed");
                if let Err(err) = self.backlog.capture(record, now) {
                    warn!(game = %game, error = %err, "backup capture failed, record kept in memory only");
                }
                SyncStatus::BackedUp
            }
        }
    }

    /// Jump to any game, completed or not.
    pub fn select_game(&mut self, game: GameKind) {
        self.current = game;
    }

    /// Move the pointer to the next game in assessment order, or `None`
    /// when the current game is the last one.
    pub fn advance(&mut self) -> Option<GameKind> {
        let pos = GameKind::ASSESSMENT_ORDER.iter().position(|g| *g == self.current)?;
        let next = *GameKind::ASSESSMENT_ORDER.get(pos + 1)?;
        self.current = next;
        Some(next)
    }

    /// The first game in assessment order without a completed record.
    #[must_use]
    pub fn next_uncompleted(&self) -> Option<GameKind> {
        GameKind::ASSESSMENT_ORDER
            .iter()
            .copied()
            .find(|g| !self.completed.contains_key(g))
    }

    /// Forget all collected records and point back at the first game.
    /// The session is unchanged; the next [`Self::begin_pass`] rotates it.
    pub fn reset_all_progress(&mut self) {
        self.completed.clear();
        self.current = GameKind::ASSESSMENT_ORDER[0];
        info!(session = %self.ctx.session_id, "assessment progress reset");
    }

    /// The game the pointer is on.
    #[must_use]
    pub fn current_game(&self) -> GameKind {
        self.current
    }

    /// Identity for the in-progress pass.
    #[must_use]
    pub fn context(&self) -> &SessionContext {
        &self.ctx
    }

    /// Number of distinct games with a completed record.
    #[must_use]
    pub fn completed_count(&self) -> usize {
        self.completed.len()
    }

    /// Whether every game in the assessment has a record.
    #[must_use]
    pub fn is_pass_complete(&self) -> bool {
        self.completed.len() == GameKind::ASSESSMENT_ORDER.len()
    }

    /// The collected record for `game`, if it has been completed.
    #[must_use]
    pub fn record_for(&self, game: GameKind) -> Option<&GameRunRecord> {
        self.completed.get(&game)
    }

    /// Aggregate the collected records into a display-ready summary.
    /// Optional metrics a game does not produce stay absent rather than
    /// erroring.
    #[must_use]
    pub fn summary(&self) -> PassSummary {
        let entries: Vec<SummaryEntry> = GameKind::ASSESSMENT_ORDER
            .iter()
            .filter_map(|game| self.completed.get(game))
            .map(|record| SummaryEntry {
                game: record.game,
                score: record.metrics.total_score(),
                accuracy: record.metrics.accuracy(),
                average_time_ms: record.metrics.average_time_ms(),
                max_level: record.metrics.max_level(),
            })
            .collect();

        let average_score = if entries.is_empty() {
            0.0
        } else {
            #[allow(clippy::cast_precision_loss)]
            {
                entries.iter().map(|e| e.score).sum::<f64>() / entries.len() as f64
            }
        };

        let best_game = self
            .completed
            .values()
            .max_by_key(|r| OrderedFloat(r.metrics.total_score()))
            .map(|r| r.game);

        PassSummary {
            games_completed: entries.len(),
            average_score,
            best_game,
            entries,
        }
    }

    /// Push every queued backup record once, re-queueing the ones that
    /// still fail. File errors are logged, never surfaced.
    async fn drain_backlog(&self) {
        let entries = match self.backlog.take_pending() {
            Ok(entries) => entries,
            Err(err) => {
                warn!(error = %err, "backup queue unreadable, skipping drain");
                return;
            }
        };
        if entries.is_empty() {
            return;
        }

        info!(pending = entries.len(), "draining backup queue");
        let mut synced = 0_usize;
        for entry in entries {
            match self.sink.push_record(&entry.record).await {
                Ok(()) => synced += 1,
                Err(err) => {
                    debug!(
                        game = %entry.record.game,
                        error = %err,
                        "backup record still unsynced"
                    );
                    if let Err(err) = self.backlog.requeue(entry) {
                        warn!(error = %err, "failed to requeue backup record");
                    }
                }
            }
        }
        if synced > 0 {
            info!(synced, "backup records synced");
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
