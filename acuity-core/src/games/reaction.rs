//! Reaction time: press as fast as possible after the go signal.
//!
//! Five scored rounds. Each round waits a random 1000-4000ms before the
//! go signal. A press during the wait is TOO_SOON and retries the same
//! round after a 2000ms pause; a press after the go signal records the
//! latency in milliseconds, measured from the scheduled go deadline. A
//! 1500ms result interstitial follows each scored press; pressing during
//! it advances to the next round early. The final score rewards a low
//! average latency.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::GameMetrics;

/// Scored rounds per run.
pub const TOTAL_ROUNDS: u32 = 5;

/// Shortest wait before the go signal.
const MIN_WAIT_MS: i64 = 1000;

/// Random spread added to the minimum wait.
const WAIT_SPREAD_MS: i64 = 3000;

/// Pause before a TOO_SOON round restarts.
const TOO_SOON_PAUSE_MS: i64 = 2000;

/// Result interstitial after a scored press.
const RESULT_PAUSE_MS: i64 = 1500;

/// Final score for an average latency: `round(max(0, 1000 - avg) * 10)`.
#[must_use]
#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
pub fn final_score(average_ms: f64) -> u32 {
    ((1000.0 - average_ms).max(0.0) * 10.0).round() as u32
}

/// Aggregate metrics for a completed reaction run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReactionMetrics {
    /// Score derived from the average latency.
    pub total_score: u32,
    /// Mean latency across all scored rounds, in milliseconds.
    pub average_ms: f64,
    /// Fastest scored latency, in milliseconds.
    pub best_ms: u32,
    /// Per-round latencies in play order, in milliseconds.
    pub samples: Vec<u32>,
    /// Rounds scored in the run.
    pub rounds_completed: u32,
}

/// Outcome of one judged press.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReactionOutcome {
    /// Pressed before the go signal; the round restarts after a pause.
    TooSoon,
    /// Pressed after the go signal, with the measured latency.
    Scored {
        /// Milliseconds between the go deadline and the press.
        reaction_ms: u32,
    },
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum ReactionPhase {
    Idle,
    Waiting { go_at: DateTime<Utc> },
    Ready { go_at: DateTime<Utc> },
    TooSoon { retry_at: DateTime<Utc> },
    Result { next_at: DateTime<Utc> },
    Complete,
}

/// The reaction time engine state machine.
///
/// `IDLE -> WAITING -> READY -> RESULT -> WAITING -> ... -> COMPLETED`,
/// with a `TOO_SOON` detour when a press lands before the go signal.
#[derive(Debug)]
pub struct ReactionEngine {
    phase: ReactionPhase,
    round: u32,
    samples: Vec<u32>,
    metrics: Option<ReactionMetrics>,
    rng: StdRng,
}

impl ReactionEngine {
    /// Create an engine with an entropy-seeded RNG.
    #[must_use]
    pub fn new() -> Self {
        Self::with_rng(StdRng::from_entropy())
    }

    /// Create an engine with a fixed seed, for reproducible runs.
    #[must_use]
    pub fn with_seed(seed: u64) -> Self {
        Self::with_rng(StdRng::seed_from_u64(seed))
    }

    fn with_rng(rng: StdRng) -> Self {
        Self {
            phase: ReactionPhase::Idle,
            round: 0,
            samples: Vec::new(),
            metrics: None,
            rng,
        }
    }

    /// Begin a run, arming the first wait at `now`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.round = 1;
        self.samples.clear();
        self.metrics = None;
        self.arm_wait(now);
    }

    /// Advance scheduled transitions: the wait deadline raises the go
    /// signal, the TOO_SOON pause re-arms the round, the result
    /// interstitial starts the next round or completes the run.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        match self.phase {
            ReactionPhase::Waiting { go_at } if now >= go_at => {
                self.phase = ReactionPhase::Ready { go_at };
            }
            ReactionPhase::TooSoon { retry_at } if now >= retry_at => {
                self.arm_wait(now);
            }
            ReactionPhase::Result { next_at } if now >= next_at => {
                self.advance(now);
            }
            _ => {}
        }
    }

    /// Judge a press at `now`. Scheduled transitions due at `now` fire
    /// before the press is judged, so a press after an unticked go
    /// deadline is scored rather than penalized. A press during the
    /// result interstitial advances early and returns `None`; presses
    /// during the TOO_SOON pause or outside a run are ignored.
    pub fn press(&mut self, now: DateTime<Utc>) -> Option<ReactionOutcome> {
        self.tick(now);
        match self.phase {
            ReactionPhase::Waiting { .. } => {
                self.phase = ReactionPhase::TooSoon {
                    retry_at: now + Duration::milliseconds(TOO_SOON_PAUSE_MS),
                };
                Some(ReactionOutcome::TooSoon)
            }
            ReactionPhase::Ready { go_at } => {
                let elapsed = (now - go_at).num_milliseconds().max(0);
                let reaction_ms = u32::try_from(elapsed).unwrap_or(u32::MAX);
                self.samples.push(reaction_ms);
                self.phase = ReactionPhase::Result {
                    next_at: now + Duration::milliseconds(RESULT_PAUSE_MS),
                };
                Some(ReactionOutcome::Scored { reaction_ms })
            }
            ReactionPhase::Result { .. } => {
                if self.round < TOTAL_ROUNDS {
                    self.advance(now);
                }
                None
            }
            _ => None,
        }
    }

    /// Whether the go signal is currently showing.
    #[must_use]
    pub fn go_signal_on(&self) -> bool {
        matches!(self.phase, ReactionPhase::Ready { .. })
    }

    /// Current 1-based round.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Latencies scored so far, in play order.
    #[must_use]
    pub fn samples(&self) -> &[u32] {
        &self.samples
    }

    /// The most recent scored latency.
    #[must_use]
    pub fn last_reaction_ms(&self) -> Option<u32> {
        self.samples.last().copied()
    }

    /// Whether the run has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == ReactionPhase::Complete
    }

    /// Final metrics, present once the run has completed.
    #[must_use]
    pub fn metrics(&self) -> Option<&ReactionMetrics> {
        self.metrics.as_ref()
    }

    /// Final metrics as a tagged payload, present once complete.
    #[must_use]
    pub fn result(&self) -> Option<GameMetrics> {
        self.metrics.clone().map(GameMetrics::Reaction)
    }

    fn arm_wait(&mut self, now: DateTime<Utc>) {
        let wait = self.rng.gen_range(MIN_WAIT_MS..MIN_WAIT_MS + WAIT_SPREAD_MS);
        self.phase = ReactionPhase::Waiting {
            go_at: now + Duration::milliseconds(wait),
        };
    }

    fn advance(&mut self, now: DateTime<Utc>) {
        if self.round < TOTAL_ROUNDS {
            self.round += 1;
            self.arm_wait(now);
        } else {
            self.finish();
        }
    }

    fn finish(&mut self) {
        let total: f64 = self.samples.iter().map(|&ms| f64::from(ms)).sum();
        let average_ms = total / f64::from(TOTAL_ROUNDS);
        let best_ms = self.samples.iter().copied().min().unwrap_or(0);
        self.metrics = Some(ReactionMetrics {
            total_score: final_score(average_ms),
            average_ms,
            best_ms,
            samples: self.samples.clone(),
            rounds_completed: TOTAL_ROUNDS,
        });
        self.phase = ReactionPhase::Complete;
    }
}

impl Default for ReactionEngine {
    fn default() -> Self {
        Self::new()
    }
}
