//! Memory matrix: recall which grid cells lit up.
//!
//! Eight rounds on a 4x4 grid. Each round lights a growing set of
//! distinct cells for a difficulty-scaled memorize window, then the
//! subject taps the cells back. Taps are judged by set membership;
//! duplicate taps on an already-selected cell are ignored. A round ends
//! on the first wrong tap or when the selection count reaches the
//! pattern size, paying 10 points per correct cell. The run always plays
//! all eight rounds.

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::index::sample;
use serde::{Deserialize, Serialize};

use super::GameMetrics;

/// Grid edge length.
pub const GRID_SIZE: usize = 4;

/// Rounds per run.
pub const TOTAL_ROUNDS: u32 = 8;

/// Points per correctly recalled cell.
const CELL_POINTS: u32 = 10;

/// Pause between a round verdict and the next memorize window.
const ROUND_BREAK_MS: i64 = 1000;

/// Lit cells for a 1-based round index, capped two below the grid size.
#[must_use]
pub fn cells_for_round(round: u32) -> usize {
    (round as usize + 1).min(GRID_SIZE * GRID_SIZE - 2)
}

/// Memorize window for a 1-based round index.
#[must_use]
pub fn memorize_duration_ms(round: u32) -> i64 {
    2000 + i64::from(round) * 500
}

/// Aggregate metrics for a completed matrix run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatrixMetrics {
    /// Sum of per-round points.
    pub total_score: u32,
    /// Rounds in the run.
    pub total_rounds: u32,
}

/// Outcome of one judged cell tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatrixOutcome {
    /// Whether the cell was part of the lit pattern.
    pub correct: bool,
    /// Whether this tap closed the round.
    pub round_over: bool,
    /// Points banked when the round closed (0 otherwise).
    pub round_score: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum MatrixPhase {
    Idle,
    Memorize { until: DateTime<Utc> },
    Recall,
    Break { next_at: DateTime<Utc> },
    Complete,
}

/// The memory matrix engine state machine.
///
/// `IDLE -> MEMORIZE -> RECALL -> BREAK -> MEMORIZE -> ... -> COMPLETED`.
#[derive(Debug)]
pub struct MatrixEngine {
    phase: MatrixPhase,
    round: u32,
    score: u32,
    pattern: Vec<usize>,
    selections: Vec<usize>,
    metrics: Option<MatrixMetrics>,
    rng: StdRng,
}

impl MatrixEngine {
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
            phase: MatrixPhase::Idle,
            round: 0,
            score: 0,
            pattern: Vec::new(),
            selections: Vec::new(),
            metrics: None,
            rng,
        }
    }

    /// Begin a run, lighting the first pattern at `now`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.round = 1;
        self.score = 0;
        self.metrics = None;
        self.begin_memorize(now);
    }

    /// Advance scheduled transitions: the memorize window opens recall,
    /// the round break starts the next round or completes the run.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        match self.phase {
            MatrixPhase::Memorize { until } if now >= until => {
                self.phase = MatrixPhase::Recall;
            }
            MatrixPhase::Break { next_at } if now >= next_at => {
                if self.round < TOTAL_ROUNDS {
                    self.round += 1;
                    self.begin_memorize(now);
                } else {
                    self.finish();
                }
            }
            _ => {}
        }
    }

    /// Judge a cell tap during recall. Returns `None` outside the recall
    /// phase, for an out-of-grid index, or for a repeated tap on an
    /// already-selected cell.
    pub fn tap_cell(&mut self, cell: usize, now: DateTime<Utc>) -> Option<MatrixOutcome> {
        if self.phase != MatrixPhase::Recall
            || cell >= GRID_SIZE * GRID_SIZE
            || self.selections.contains(&cell)
        {
            return None;
        }

        self.selections.push(cell);
        let correct = self.pattern.contains(&cell);
        let round_over = !correct || self.selections.len() == self.pattern.len();

        if round_over {
            let recalled = self
                .selections
                .iter()
                .filter(|c| self.pattern.contains(c))
                .count() as u32;
            let round_score = recalled * CELL_POINTS;
            self.score += round_score;
            self.phase = MatrixPhase::Break {
                next_at: now + Duration::milliseconds(ROUND_BREAK_MS),
            };
            return Some(MatrixOutcome {
                correct,
                round_over: true,
                round_score,
            });
        }

        Some(MatrixOutcome {
            correct,
            round_over: false,
            round_score: 0,
        })
    }

    /// The lit pattern for the current round.
    #[must_use]
    pub fn pattern(&self) -> &[usize] {
        &self.pattern
    }

    /// Cells selected so far this round.
    #[must_use]
    pub fn selections(&self) -> &[usize] {
        &self.selections
    }

    /// Current 1-based round.
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Running score.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Whether recall input is currently open.
    #[must_use]
    pub fn accepting_input(&self) -> bool {
        self.phase == MatrixPhase::Recall
    }

    /// Whether the run has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == MatrixPhase::Complete
    }

    /// Final metrics, present once the run has completed.
    #[must_use]
    pub fn metrics(&self) -> Option<&MatrixMetrics> {
        self.metrics.as_ref()
    }

    /// Final metrics as a tagged payload, present once complete.
    #[must_use]
    pub fn result(&self) -> Option<GameMetrics> {
        self.metrics.map(GameMetrics::MemoryMatrix)
    }

    fn begin_memorize(&mut self, now: DateTime<Utc>) {
        let count = cells_for_round(self.round);
        self.pattern = sample(&mut self.rng, GRID_SIZE * GRID_SIZE, count).into_vec();
        self.selections.clear();
        self.phase = MatrixPhase::Memorize {
            until: now + Duration::milliseconds(memorize_duration_ms(self.round)),
        };
    }

    fn finish(&mut self) {
        self.metrics = Some(MatrixMetrics {
            total_score: self.score,
            total_rounds: TOTAL_ROUNDS,
        });
        self.phase = MatrixPhase::Complete;
    }
}

impl Default for MatrixEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(ms: i64) -> DateTime<Utc> {
        DateTime::from_timestamp_millis(ms).expect("timestamp")
    }

    fn open_recall(engine: &mut MatrixEngine, clock: &mut i64) {
        *clock += memorize_duration_ms(engine.round());
        engine.tick(at(*clock));
        assert!(engine.accepting_input());
    }

    fn missing_cell(pattern: &[usize]) -> usize {
        (0..GRID_SIZE * GRID_SIZE)
            .find(|c| !pattern.contains(c))
            .expect("pattern never fills the grid")
    }

    #[test]
    fn cell_count_scales_and_caps() {
        assert_eq!(cells_for_round(1), 2);
        assert_eq!(cells_for_round(8), 9);
        assert_eq!(cells_for_round(13), 14);
        assert_eq!(cells_for_round(30), 14);
    }

    #[test]
    fn taps_ignored_while_memorizing() {
        let mut engine = MatrixEngine::with_seed(2);
        engine.start(at(0));
        assert!(engine.tap_cell(0, at(100)).is_none());
        engine.tick(at(memorize_duration_ms(1) - 1));
        assert!(!engine.accepting_input());
        engine.tick(at(memorize_duration_ms(1)));
        assert!(engine.accepting_input());
    }

    #[test]
    fn perfect_recall_banks_full_round_scores() {
        let mut engine = MatrixEngine::with_seed(4);
        let mut clock = 0;
        engine.start(at(clock));

        let mut expected = 0;
        for round in 1..=TOTAL_ROUNDS {
            open_recall(&mut engine, &mut clock);
            let pattern = engine.pattern().to_vec();
            assert_eq!(pattern.len(), cells_for_round(round));
            expected += pattern.len() as u32 * 10;

            for (i, cell) in pattern.iter().enumerate() {
                clock += 200;
                let outcome = engine.tap_cell(*cell, at(clock)).expect("judged");
                assert!(outcome.correct);
                assert_eq!(outcome.round_over, i + 1 == pattern.len());
            }
            clock += ROUND_BREAK_MS;
            engine.tick(at(clock));
        }

        assert!(engine.is_complete());
        let metrics = engine.metrics().expect("metrics");
        assert_eq!(metrics.total_score, expected);
        assert_eq!(metrics.total_rounds, TOTAL_ROUNDS);
    }

    #[test]
    fn wrong_tap_ends_round_keeping_correct_picks() {
        let mut engine = MatrixEngine::with_seed(6);
        let mut clock = 0;
        engine.start(at(clock));
        open_recall(&mut engine, &mut clock);

        let pattern = engine.pattern().to_vec();
        let first = pattern[0];
        engine.tap_cell(first, at(clock)).expect("correct pick");

        let wrong = missing_cell(&pattern);
        let outcome = engine.tap_cell(wrong, at(clock)).expect("judged");
        assert!(!outcome.correct);
        assert!(outcome.round_over);
        assert_eq!(outcome.round_score, 10);

        // The run moves on instead of terminating.
        clock += ROUND_BREAK_MS;
        engine.tick(at(clock));
        assert_eq!(engine.round(), 2);
        assert!(!engine.is_complete());
    }

    #[test]
    fn duplicate_taps_are_ignored() {
        let mut engine = MatrixEngine::with_seed(8);
        let mut clock = 0;
        engine.start(at(clock));
        open_recall(&mut engine, &mut clock);

        let first = engine.pattern()[0];
        engine.tap_cell(first, at(clock)).expect("first tap");
        assert!(engine.tap_cell(first, at(clock)).is_none());
        assert_eq!(engine.selections().len(), 1);
    }

    #[test]
    fn all_wrong_rounds_still_play_out_the_full_run() {
        let mut engine = MatrixEngine::with_seed(10);
        let mut clock = 0;
        engine.start(at(clock));

        for _ in 1..=TOTAL_ROUNDS {
            open_recall(&mut engine, &mut clock);
            let wrong = missing_cell(engine.pattern());
            let outcome = engine.tap_cell(wrong, at(clock)).expect("judged");
            assert!(outcome.round_over);
            assert_eq!(outcome.round_score, 0);
            clock += ROUND_BREAK_MS;
            engine.tick(at(clock));
        }

        assert!(engine.is_complete());
        assert_eq!(engine.metrics().expect("metrics").total_score, 0);
    }
}
