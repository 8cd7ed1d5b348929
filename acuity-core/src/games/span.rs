//! Number span: recall a growing digit sequence in order.
//!
//! The level starts at 3 and sets the sequence length. Each round shows
//! the digits for a level-scaled memorize window, then the subject keys
//! them back. The entry is judged only once it reaches the sequence
//! length: an exact positional match pays `level * 10` after a verdict
//! pause and advances the level; a mismatch ends the run. The run also
//! ends after a success at the level cap.

use chrono::{DateTime, Duration, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};

use super::GameMetrics;

/// Sequence length for the first round.
pub const START_LEVEL: u32 = 3;

/// Highest playable level; a success here completes the run.
pub const LEVEL_CAP: u32 = 12;

/// Most rounds a run can score.
pub const MAX_ROUNDS: u32 = LEVEL_CAP - START_LEVEL + 1;

/// Pause between a full entry and its consequence.
const VERDICT_PAUSE_MS: i64 = 1000;

/// Memorize window for a level.
#[must_use]
pub fn memorize_duration_ms(level: u32) -> i64 {
    2000 + i64::from(level) * 500
}

/// Points for passing a round at `level`.
#[must_use]
pub fn level_points(level: u32) -> u32 {
    level * 10
}

/// Aggregate metrics for a completed span run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SpanMetrics {
    /// Sum of per-round points.
    pub total_score: u32,
    /// Highest level reached (the level after the last success).
    pub max_level: u32,
    /// Rounds recalled successfully.
    pub rounds_completed: u32,
}

/// Outcome of one accepted digit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpanOutcome {
    /// Digit accepted; the entry is not yet full.
    Pending,
    /// Full entry matched the sequence.
    Passed {
        /// Points banked for the round.
        points: u32,
    },
    /// Full entry mismatched; the run ends after the verdict pause.
    Failed,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SpanPhase {
    Idle,
    Memorize { until: DateTime<Utc> },
    Recall,
    Verdict { next_at: DateTime<Utc>, passed: bool },
    Complete,
}

/// The number span engine state machine.
///
/// `IDLE -> MEMORIZE -> RECALL -> VERDICT -> MEMORIZE -> ... -> COMPLETED`.
#[derive(Debug)]
pub struct SpanEngine {
    phase: SpanPhase,
    level: u32,
    max_level: u32,
    score: u32,
    rounds: u32,
    sequence: Vec<u8>,
    entered: Vec<u8>,
    metrics: Option<SpanMetrics>,
    rng: StdRng,
}

impl SpanEngine {
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
            phase: SpanPhase::Idle,
            level: 0,
            max_level: 0,
            score: 0,
            rounds: 0,
            sequence: Vec::new(),
            entered: Vec::new(),
            metrics: None,
            rng,
        }
    }

    /// Begin a run at the starting level, showing the first sequence at
    /// `now`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.level = START_LEVEL;
        self.max_level = START_LEVEL;
        self.score = 0;
        self.rounds = 0;
        self.metrics = None;
        self.begin_round(now);
    }

    /// Advance scheduled transitions: the memorize window opens recall,
    /// the verdict pause advances the level, completes a capped run, or
    /// ends a failed one.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        match self.phase {
            SpanPhase::Memorize { until } if now >= until => {
                self.phase = SpanPhase::Recall;
            }
            SpanPhase::Verdict { next_at, passed } if now >= next_at => {
                if passed && self.level < LEVEL_CAP {
                    self.level += 1;
                    self.begin_round(now);
                } else {
                    self.finish();
                }
            }
            _ => {}
        }
    }

    /// Accept a keypad digit (1 through 9) during recall. Returns `None`
    /// outside the recall phase or for a digit off the keypad.
    pub fn enter_digit(&mut self, digit: u8, now: DateTime<Utc>) -> Option<SpanOutcome> {
        if self.phase != SpanPhase::Recall || !(1..=9).contains(&digit) {
            return None;
        }

        self.entered.push(digit);
        if self.entered.len() < self.sequence.len() {
            return Some(SpanOutcome::Pending);
        }

        let passed = self.entered == self.sequence;
        self.phase = SpanPhase::Verdict {
            next_at: now + Duration::milliseconds(VERDICT_PAUSE_MS),
            passed,
        };
        if passed {
            let points = level_points(self.level);
            self.score += points;
            self.rounds += 1;
            self.max_level = self.max_level.max(self.level + 1);
            Some(SpanOutcome::Passed { points })
        } else {
            Some(SpanOutcome::Failed)
        }
    }

    /// The digit sequence for the current round.
    #[must_use]
    pub fn sequence(&self) -> &[u8] {
        &self.sequence
    }

    /// Digits entered so far this round.
    #[must_use]
    pub fn entered(&self) -> &[u8] {
        &self.entered
    }

    /// Current level (and sequence length).
    #[must_use]
    pub fn level(&self) -> u32 {
        self.level
    }

    /// Running score.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Whether keypad input is currently open.
    #[must_use]
    pub fn accepting_input(&self) -> bool {
        self.phase == SpanPhase::Recall
    }

    /// Whether the run has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SpanPhase::Complete
    }

    /// Final metrics, present once the run has completed.
    #[must_use]
    pub fn metrics(&self) -> Option<&SpanMetrics> {
        self.metrics.as_ref()
    }

    /// Final metrics as a tagged payload, present once complete.
    #[must_use]
    pub fn result(&self) -> Option<GameMetrics> {
        self.metrics.map(GameMetrics::NumberSpan)
    }

    fn begin_round(&mut self, now: DateTime<Utc>) {
        self.sequence = (0..self.level).map(|_| self.rng.gen_range(1..=9)).collect();
        self.entered.clear();
        self.phase = SpanPhase::Memorize {
            until: now + Duration::milliseconds(memorize_duration_ms(self.level)),
        };
    }

    fn finish(&mut self) {
        self.metrics = Some(SpanMetrics {
            total_score: self.score,
            max_level: self.max_level,
            rounds_completed: self.rounds,
        });
        self.phase = SpanPhase::Complete;
    }
}

impl Default for SpanEngine {
    fn default() -> Self {
        Self::new()
    }
}
