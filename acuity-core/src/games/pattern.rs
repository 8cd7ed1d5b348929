//! Pattern memory: recall a revealed symbol sequence in order.
//!
//! Up to ten rounds. The pattern grows with the round index and is
//! revealed one symbol at a time on a fixed cadence; input opens only
//! after the reveal finishes. Taps are judged positionally and the first
//! mismatch ends the run.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::GameMetrics;

/// Maximum number of rounds in a run.
pub const MAX_ROUNDS: u32 = 10;

/// How long each symbol stays highlighted during the reveal.
const REVEAL_MS: i64 = 500;

/// Gap between symbol highlights.
const PAUSE_MS: i64 = 200;

/// Pause between a round verdict and the next reveal (or the end).
const VERDICT_PAUSE_MS: i64 = 1000;

/// Points per recalled symbol of a fully matched pattern.
const POINTS_PER_SYMBOL: u32 = 5;

/// Pattern length for a 1-based round index.
#[must_use]
pub fn pattern_length(round: u32) -> usize {
    (round as usize + 2).min(8)
}

/// Total reveal time for a pattern of `len` symbols: the cadence fires
/// once per symbol plus a final clearing slot, then a short pause before
/// input opens.
#[must_use]
pub fn reveal_duration_ms(len: usize) -> i64 {
    (len as i64 + 1) * (REVEAL_MS + PAUSE_MS) + PAUSE_MS
}

// ---------------------------------------------------------------------------
// Symbols
// ---------------------------------------------------------------------------

/// The five recall symbols.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PatternSymbol {
    /// Blue token.
    Blue,
    /// Red token.
    Red,
    /// Green token.
    Green,
    /// Yellow token.
    Yellow,
    /// Purple token.
    Purple,
}

impl PatternSymbol {
    /// All symbols, in keypad order.
    pub const ALL: [Self; 5] = [
        Self::Blue,
        Self::Red,
        Self::Green,
        Self::Yellow,
        Self::Purple,
    ];

    /// Display glyph for the symbol.
    #[must_use]
    pub fn glyph(self) -> &'static str {
        match self {
            Self::Blue => "\u{1f535}",
            Self::Red => "\u{1f534}",
            Self::Green => "\u{1f7e2}",
            Self::Yellow => "\u{1f7e1}",
            Self::Purple => "\u{1f7e3}",
        }
    }
}

impl fmt::Display for PatternSymbol {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.glyph())
    }
}

// ---------------------------------------------------------------------------
// Metrics
// ---------------------------------------------------------------------------

/// Aggregate metrics for a completed pattern run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatternMetrics {
    /// Sum of per-round points.
    pub total_score: u32,
    /// The round the run ended on (the failed round, or the maximum).
    pub max_round: u32,
    /// Fully recalled rounds.
    pub rounds_completed: u32,
}

/// Outcome of one judged tap.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatternOutcome {
    /// Whether the tap matched the pattern position.
    pub correct: bool,
    /// Whether this tap closed the round (mismatch or full match).
    pub round_over: bool,
    /// Points awarded by this tap (non-zero only on a full match).
    pub points: u32,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum PatternPhase {
    Idle,
    Reveal {
        since: DateTime<Utc>,
        input_at: DateTime<Utc>,
    },
    Input,
    Verdict {
        next_at: DateTime<Utc>,
        passed: bool,
    },
    Complete,
}

/// The pattern memory engine state machine.
///
/// `IDLE -> REVEAL -> INPUT -> VERDICT -> REVEAL -> ... -> COMPLETED`.
#[derive(Debug)]
pub struct PatternEngine {
    phase: PatternPhase,
    round: u32,
    score: u32,
    pattern: Vec<PatternSymbol>,
    entered: usize,
    metrics: Option<PatternMetrics>,
    rng: StdRng,
}

impl PatternEngine {
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
            phase: PatternPhase::Idle,
            round: 0,
            score: 0,
            pattern: Vec::new(),
            entered: 0,
            metrics: None,
            rng,
        }
    }

    /// Begin a run, starting the first reveal at `now`.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.round = 1;
        self.score = 0;
        self.metrics = None;
        self.begin_reveal(now);
    }

    /// Advance scheduled transitions: reveal expiry opens input, a
    /// verdict pause leads to the next round or completion.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        match self.phase {
            PatternPhase::Reveal { input_at, .. } if now >= input_at => {
                self.phase = PatternPhase::Input;
            }
            PatternPhase::Verdict { next_at, passed } if now >= next_at => {
                if passed && self.round < MAX_ROUNDS {
                    self.round += 1;
                    self.begin_reveal(now);
                } else {
                    self.finish(passed);
                }
            }
            _ => {}
        }
    }

    /// Judge a symbol tap against the next pattern position. Returns
    /// `None` outside the input phase.
    pub fn tap(&mut self, symbol: PatternSymbol, now: DateTime<Utc>) -> Option<PatternOutcome> {
        if self.phase != PatternPhase::Input {
            return None;
        }

        let expected = self.pattern.get(self.entered).copied()?;
        self.entered += 1;

        if symbol != expected {
            self.phase = PatternPhase::Verdict {
                next_at: now + Duration::milliseconds(VERDICT_PAUSE_MS),
                passed: false,
            };
            return Some(PatternOutcome {
                correct: false,
                round_over: true,
                points: 0,
            });
        }

        if self.entered == self.pattern.len() {
            let points = self.pattern.len() as u32 * POINTS_PER_SYMBOL;
            self.score += points;
            self.phase = PatternPhase::Verdict {
                next_at: now + Duration::milliseconds(VERDICT_PAUSE_MS),
                passed: true,
            };
            return Some(PatternOutcome {
                correct: true,
                round_over: true,
                points,
            });
        }

        Some(PatternOutcome {
            correct: true,
            round_over: false,
            points: 0,
        })
    }

    /// Which pattern index is highlighted at `now` during the reveal.
    /// `None` between highlights, outside the reveal, or past its end.
    #[must_use]
    pub fn highlighted(&self, now: DateTime<Utc>) -> Option<usize> {
        let PatternPhase::Reveal { since, .. } = self.phase else {
            return None;
        };
        let elapsed = (now - since).num_milliseconds();
        let slot_len = REVEAL_MS + PAUSE_MS;
        if elapsed < slot_len {
            return None;
        }
        let slot = elapsed / slot_len;
        if slot as usize > self.pattern.len() {
            return None;
        }
        let offset = elapsed - slot * slot_len;
        (offset < REVEAL_MS).then(|| slot as usize - 1)
    }

    /// The pattern for the current round.
    #[must_use]
    pub fn pattern(&self) -> &[PatternSymbol] {
        &self.pattern
    }

    /// How many symbols have been entered this round.
    #[must_use]
    pub fn input_progress(&self) -> usize {
        self.entered
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

    /// Whether input is currently open.
    #[must_use]
    pub fn accepting_input(&self) -> bool {
        self.phase == PatternPhase::Input
    }

    /// Whether the run has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == PatternPhase::Complete
    }

    /// Final metrics, present once the run has completed.
    #[must_use]
    pub fn metrics(&self) -> Option<&PatternMetrics> {
        self.metrics.as_ref()
    }

    /// Final metrics as a tagged payload, present once complete.
    #[must_use]
    pub fn result(&self) -> Option<GameMetrics> {
        self.metrics.map(GameMetrics::PatternMemory)
    }

    fn begin_reveal(&mut self, now: DateTime<Utc>) {
        let len = pattern_length(self.round);
        self.pattern = (0..len)
            .map(|_| PatternSymbol::ALL[self.rng.gen_range(0..PatternSymbol::ALL.len())])
            .collect();
        self.entered = 0;
        self.phase = PatternPhase::Reveal {
            since: now,
            input_at: now + Duration::milliseconds(reveal_duration_ms(len)),
        };
    }

    fn finish(&mut self, success: bool) {
        self.metrics = Some(PatternMetrics {
            total_score: self.score,
            max_round: if success { MAX_ROUNDS } else { self.round },
            rounds_completed: if success { MAX_ROUNDS } else { self.round - 1 },
        });
        self.phase = PatternPhase::Complete;
    }
}

impl Default for PatternEngine {
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

    fn other_symbol(s: PatternSymbol) -> PatternSymbol {
        PatternSymbol::ALL
            .into_iter()
            .find(|&x| x != s)
            .expect("five symbols")
    }

    /// Drive the engine through the current round's reveal into input.
    fn open_input(engine: &mut PatternEngine, clock: &mut i64) {
        let len = engine.pattern().len();
        *clock += reveal_duration_ms(len);
        engine.tick(at(*clock));
        assert!(engine.accepting_input());
    }

    #[test]
    fn pattern_length_scales_and_caps() {
        assert_eq!(pattern_length(1), 3);
        assert_eq!(pattern_length(5), 7);
        assert_eq!(pattern_length(6), 8);
        assert_eq!(pattern_length(10), 8);
    }

    #[test]
    fn input_ignored_during_reveal() {
        let mut engine = PatternEngine::with_seed(2);
        engine.start(at(0));
        assert!(!engine.accepting_input());
        assert!(engine.tap(PatternSymbol::Blue, at(10)).is_none());

        // One tick short of the reveal deadline keeps input closed.
        let len = engine.pattern().len();
        engine.tick(at(reveal_duration_ms(len) - 1));
        assert!(!engine.accepting_input());
        engine.tick(at(reveal_duration_ms(len)));
        assert!(engine.accepting_input());
    }

    #[test]
    fn highlight_follows_reveal_cadence() {
        let mut engine = PatternEngine::with_seed(4);
        engine.start(at(0));
        assert_eq!(engine.highlighted(at(0)), None);
        assert_eq!(engine.highlighted(at(700)), Some(0));
        assert_eq!(engine.highlighted(at(1150)), Some(0));
        assert_eq!(engine.highlighted(at(1250)), None);
        assert_eq!(engine.highlighted(at(1400)), Some(1));
        // Past the last symbol slot nothing is lit.
        let len = engine.pattern().len() as i64;
        assert_eq!(engine.highlighted(at((len + 1) * 700 + 50)), None);
    }

    #[test]
    fn first_round_failure_completes_with_zero_rounds() {
        let mut engine = PatternEngine::with_seed(6);
        let mut clock = 0;
        engine.start(at(clock));
        open_input(&mut engine, &mut clock);

        let wrong = other_symbol(engine.pattern()[0]);
        let outcome = engine.tap(wrong, at(clock)).expect("judged");
        assert!(!outcome.correct);
        assert!(outcome.round_over);
        assert!(!engine.is_complete());

        clock += VERDICT_PAUSE_MS;
        engine.tick(at(clock));
        assert!(engine.is_complete());

        let metrics = engine.metrics().expect("metrics");
        assert_eq!(metrics.rounds_completed, 0);
        assert_eq!(metrics.max_round, 1);
        assert_eq!(metrics.total_score, 0);
        assert!(metrics.rounds_completed < MAX_ROUNDS);
    }

    #[test]
    fn mid_run_failure_keeps_earlier_points() {
        let mut engine = PatternEngine::with_seed(8);
        let mut clock = 0;
        engine.start(at(clock));

        let mut expected_score = 0;
        for _ in 0..3 {
            open_input(&mut engine, &mut clock);
            let pattern: Vec<_> = engine.pattern().to_vec();
            expected_score += pattern.len() as u32 * 5;
            for symbol in pattern {
                clock += 150;
                engine.tap(symbol, at(clock)).expect("judged");
            }
            clock += VERDICT_PAUSE_MS;
            engine.tick(at(clock));
        }
        assert_eq!(engine.round(), 4);

        open_input(&mut engine, &mut clock);
        let wrong = other_symbol(engine.pattern()[0]);
        engine.tap(wrong, at(clock)).expect("judged");
        clock += VERDICT_PAUSE_MS;
        engine.tick(at(clock));

        let metrics = engine.metrics().expect("metrics");
        assert_eq!(metrics.rounds_completed, 3);
        assert_eq!(metrics.max_round, 4);
        assert_eq!(metrics.total_score, expected_score);
    }

    #[test]
    fn surviving_all_rounds_completes_successfully() {
        let mut engine = PatternEngine::with_seed(10);
        let mut clock = 0;
        engine.start(at(clock));

        let mut expected_score = 0;
        for round in 1..=MAX_ROUNDS {
            assert_eq!(engine.round(), round);
            open_input(&mut engine, &mut clock);
            let pattern: Vec<_> = engine.pattern().to_vec();
            assert_eq!(pattern.len(), pattern_length(round));
            expected_score += pattern.len() as u32 * 5;
            for symbol in pattern {
                clock += 100;
                let outcome = engine.tap(symbol, at(clock)).expect("judged");
                assert!(outcome.correct);
            }
            clock += VERDICT_PAUSE_MS;
            engine.tick(at(clock));
        }

        assert!(engine.is_complete());
        let metrics = engine.metrics().expect("metrics");
        assert_eq!(metrics.rounds_completed, MAX_ROUNDS);
        assert_eq!(metrics.max_round, MAX_ROUNDS);
        assert_eq!(metrics.total_score, expected_score);
    }
}
