//! Stroop colour/word interference test.
//!
//! Twelve trials. Each trial shows a colour word rendered in an ink
//! colour; the subject must name the ink, not the word. Incongruent
//! trials (ink differs from word) pay double. Points reward speed with a
//! floor, so a correct answer is never worth less than its difficulty
//! multiplier.

use chrono::{DateTime, Duration, Utc};
use rand::Rng;
use rand::SeedableRng;
use rand::rngs::StdRng;
use serde::{Deserialize, Serialize};
use std::fmt;

use super::GameMetrics;

/// Number of trials in a run.
pub const TOTAL_ROUNDS: u32 = 12;

/// Probability that a trial is generated incongruent.
const INCONGRUENT_PROBABILITY: f64 = 0.7;

/// Feedback pause between a choice and the next trial.
const FEEDBACK_PAUSE_MS: i64 = 600;

/// Speed bonus baseline: a correct answer earns `8 - reaction_secs`
/// points before the difficulty multiplier, floored at 1.
const SPEED_BONUS_BASE_SECS: f64 = 8.0;

/// Points for one correct trial.
#[must_use]
pub fn trial_points(reaction_secs: f64, incongruent: bool) -> f64 {
    let speed_bonus = (SPEED_BONUS_BASE_SECS - reaction_secs).max(1.0);
    let difficulty_bonus = if incongruent { 2.0 } else { 1.0 };
    speed_bonus * difficulty_bonus
}

// ---------------------------------------------------------------------------
// Colours
// ---------------------------------------------------------------------------

/// The six colours used for both words and ink.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StroopColor {
    /// Red.
    Red,
    /// Blue.
    Blue,
    /// Green.
    Green,
    /// Yellow.
    Yellow,
    /// Purple.
    Purple,
    /// Orange.
    Orange,
}

impl StroopColor {
    /// All colours, in presentation order.
    pub const ALL: [Self; 6] = [
        Self::Red,
        Self::Blue,
        Self::Green,
        Self::Yellow,
        Self::Purple,
        Self::Orange,
    ];

    /// Lowercase colour name.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Red => "red",
            Self::Blue => "blue",
            Self::Green => "green",
            Self::Yellow => "yellow",
            Self::Purple => "purple",
            Self::Orange => "orange",
        }
    }
}

impl fmt::Display for StroopColor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

fn random_color(rng: &mut StdRng) -> StroopColor {
    StroopColor::ALL[rng.gen_range(0..StroopColor::ALL.len())]
}

// ---------------------------------------------------------------------------
// Trials
// ---------------------------------------------------------------------------

/// The trial currently on screen.
#[derive(Debug, Clone, Copy)]
pub struct StroopTrial {
    /// The colour word shown.
    pub word: StroopColor,
    /// The ink the word is rendered in; this is the correct answer.
    pub color: StroopColor,
    /// Whether this trial was generated incongruent. The flag drives the
    /// score multiplier even when a congruent draw happens to mismatch.
    pub incongruent: bool,
    shown_at: DateTime<Utc>,
}

/// One judged trial, kept for the run record.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct StroopTrialRecord {
    /// Trial index, 1-based.
    pub round: u32,
    /// The colour word shown.
    pub word: StroopColor,
    /// The ink it was rendered in.
    pub color: StroopColor,
    /// Incongruent generation flag.
    pub incongruent: bool,
    /// The subject's answer.
    pub choice: StroopColor,
    /// Whether the answer named the ink.
    pub correct: bool,
    /// Reaction time in seconds.
    pub reaction_secs: f64,
    /// Points awarded (0 when incorrect).
    pub points: f64,
}

/// Outcome of one judged trial, returned to the host for feedback.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct StroopOutcome {
    /// Whether the answer was correct.
    pub correct: bool,
    /// Points awarded for this trial.
    pub points: f64,
    /// Reaction time in seconds.
    pub reaction_secs: f64,
}

/// Aggregate metrics for a completed Stroop run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StroopMetrics {
    /// Sum of points over all trials.
    pub total_score: f64,
    /// Trials in the run.
    pub total_rounds: u32,
    /// Correctly answered trials.
    pub correct: u32,
    /// Percentage of correct trials.
    pub accuracy: f64,
    /// Mean reaction time over correct trials, seconds; 0 when none.
    pub average_reaction_secs: f64,
    /// Per-trial detail.
    pub trial_data: Vec<StroopTrialRecord>,
}

// ---------------------------------------------------------------------------
// Engine
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq)]
enum StroopPhase {
    Idle,
    Trial,
    Interlude { next_at: DateTime<Utc> },
    Complete,
}

/// The Stroop engine state machine.
///
/// `IDLE -> TRIAL -> INTERLUDE -> TRIAL -> ... -> COMPLETED`. A choice
/// during TRIAL is judged immediately; the feedback pause then separates
/// it from the next presentation so reaction time is measured from the
/// moment the trial actually appears.
#[derive(Debug)]
pub struct StroopEngine {
    phase: StroopPhase,
    round: u32,
    score: f64,
    trial: Option<StroopTrial>,
    trials: Vec<StroopTrialRecord>,
    metrics: Option<StroopMetrics>,
    rng: StdRng,
}

impl StroopEngine {
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
            phase: StroopPhase::Idle,
            round: 0,
            score: 0.0,
            trial: None,
            trials: Vec::new(),
            metrics: None,
            rng,
        }
    }

    /// Begin a run, presenting the first trial at `now`. Restarting
    /// mid-run discards all prior progress and pending deadlines.
    pub fn start(&mut self, now: DateTime<Utc>) {
        self.round = 0;
        self.score = 0.0;
        self.trials.clear();
        self.metrics = None;
        self.present_trial(now);
    }

    /// Advance scheduled transitions. Presents the next trial (or
    /// finalises the run after the last one) once the feedback pause has
    /// elapsed.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let StroopPhase::Interlude { next_at } = self.phase {
            if now >= next_at {
                if self.round < TOTAL_ROUNDS {
                    self.present_trial(now);
                } else {
                    self.finish(now);
                }
            }
        }
    }

    /// Judge a colour choice against the current trial. Returns `None`
    /// when no trial is accepting input (stray clicks are ignored).
    pub fn choose(&mut self, choice: StroopColor, now: DateTime<Utc>) -> Option<StroopOutcome> {
        if self.phase != StroopPhase::Trial {
            return None;
        }
        let trial = self.trial.take()?;

        let reaction_secs =
            (now - trial.shown_at).num_milliseconds().max(0) as f64 / 1000.0;
        let correct = choice == trial.color;
        let points = if correct {
            trial_points(reaction_secs, trial.incongruent)
        } else {
            0.0
        };
        self.score += points;

        self.trials.push(StroopTrialRecord {
            round: self.round,
            word: trial.word,
            color: trial.color,
            incongruent: trial.incongruent,
            choice,
            correct,
            reaction_secs,
            points,
        });

        self.phase = StroopPhase::Interlude {
            next_at: now + Duration::milliseconds(FEEDBACK_PAUSE_MS),
        };

        Some(StroopOutcome {
            correct,
            points,
            reaction_secs,
        })
    }

    /// The trial currently accepting input.
    #[must_use]
    pub fn trial(&self) -> Option<&StroopTrial> {
        self.trial.as_ref()
    }

    /// 1-based index of the current trial (0 before the run starts).
    #[must_use]
    pub fn round(&self) -> u32 {
        self.round
    }

    /// Running score.
    #[must_use]
    pub fn score(&self) -> f64 {
        self.score
    }

    /// Whether the run has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == StroopPhase::Complete
    }

    /// Final metrics, present once the run has completed.
    #[must_use]
    pub fn metrics(&self) -> Option<&StroopMetrics> {
        self.metrics.as_ref()
    }

    /// Final metrics as a tagged payload, present once complete.
    #[must_use]
    pub fn result(&self) -> Option<GameMetrics> {
        self.metrics.clone().map(GameMetrics::Stroop)
    }

    fn present_trial(&mut self, now: DateTime<Utc>) {
        let word = random_color(&mut self.rng);
        let mut color = random_color(&mut self.rng);
        let incongruent = self.rng.gen_bool(INCONGRUENT_PROBABILITY);
        if incongruent {
            while color == word {
                color = random_color(&mut self.rng);
            }
        }
        self.trial = Some(StroopTrial {
            word,
            color,
            incongruent,
            shown_at: now,
        });
        self.round += 1;
        self.phase = StroopPhase::Trial;
    }

    fn finish(&mut self, _now: DateTime<Utc>) {
        let correct = self.trials.iter().filter(|t| t.correct).count() as u32;
        let correct_reaction_sum: f64 = self
            .trials
            .iter()
            .filter(|t| t.correct)
            .map(|t| t.reaction_secs)
            .sum();
        let average_reaction_secs = correct_reaction_sum / f64::from(correct.max(1));

        self.metrics = Some(StroopMetrics {
            total_score: self.score,
            total_rounds: TOTAL_ROUNDS,
            correct,
            accuracy: f64::from(correct) / f64::from(TOTAL_ROUNDS) * 100.0,
            average_reaction_secs,
            trial_data: self.trials.clone(),
        });
        self.trial = None;
        self.phase = StroopPhase::Complete;
    }
}

impl Default for StroopEngine {
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

    fn other_color(c: StroopColor) -> StroopColor {
        StroopColor::ALL
            .into_iter()
            .find(|&x| x != c)
            .expect("six colours")
    }

    #[test]
    fn trial_points_formula() {
        assert!((trial_points(2.0, false) - 6.0).abs() < 1e-9);
        assert!((trial_points(2.0, true) - 12.0).abs() < 1e-9);
        // Floor clamp kicks in past the bonus baseline.
        assert!((trial_points(9.5, false) - 1.0).abs() < 1e-9);
        assert!((trial_points(9.5, true) - 2.0).abs() < 1e-9);
        // Fastest possible answer.
        assert!((trial_points(0.0, true) - 16.0).abs() < 1e-9);
    }

    #[test]
    fn perfect_run_scores_per_formula() {
        let mut engine = StroopEngine::with_seed(7);
        let mut clock = 0;
        engine.start(at(clock));

        let mut expected = 0.0;
        for _ in 0..TOTAL_ROUNDS {
            let trial = *engine.trial().expect("active trial");
            clock += 1500;
            let outcome = engine.choose(trial.color, at(clock)).expect("judged");
            assert!(outcome.correct);
            assert!(outcome.points >= 1.0 && outcome.points <= 16.0);
            expected += trial_points(1.5, trial.incongruent);
            clock += 600;
            engine.tick(at(clock));
        }

        assert!(engine.is_complete());
        let metrics = engine.metrics().expect("metrics");
        assert!((metrics.total_score - expected).abs() < 1e-9);
        assert_eq!(metrics.correct, TOTAL_ROUNDS);
        assert!((metrics.accuracy - 100.0).abs() < 1e-9);
        assert!((metrics.average_reaction_secs - 1.5).abs() < 1e-9);
        assert_eq!(metrics.trial_data.len(), TOTAL_ROUNDS as usize);
    }

    #[test]
    fn incorrect_answers_score_zero_and_continue() {
        let mut engine = StroopEngine::with_seed(11);
        let mut clock = 0;
        engine.start(at(clock));

        for _ in 0..TOTAL_ROUNDS {
            let answer = other_color(engine.trial().expect("trial").color);
            clock += 1000;
            let outcome = engine.choose(answer, at(clock)).expect("judged");
            assert!(!outcome.correct);
            assert!((outcome.points - 0.0).abs() < f64::EPSILON);
            clock += 600;
            engine.tick(at(clock));
        }

        assert!(engine.is_complete());
        let metrics = engine.metrics().expect("metrics");
        assert!((metrics.total_score - 0.0).abs() < f64::EPSILON);
        assert_eq!(metrics.correct, 0);
        assert!((metrics.accuracy - 0.0).abs() < f64::EPSILON);
        // No correct trials: the average falls back to 0.
        assert!((metrics.average_reaction_secs - 0.0).abs() < f64::EPSILON);
    }

    #[test]
    fn incongruent_trials_never_match_word_and_ink() {
        let mut engine = StroopEngine::with_seed(3);
        let mut clock = 0;
        engine.start(at(clock));
        for _ in 0..TOTAL_ROUNDS {
            let trial = *engine.trial().expect("trial");
            if trial.incongruent {
                assert_ne!(trial.word, trial.color);
            }
            clock += 500;
            engine.choose(trial.color, at(clock));
            clock += 600;
            engine.tick(at(clock));
        }
    }

    #[test]
    fn input_outside_trial_phase_is_ignored() {
        let mut engine = StroopEngine::with_seed(5);
        assert!(engine.choose(StroopColor::Red, at(0)).is_none());

        engine.start(at(0));
        let trial_color = engine.trial().expect("trial").color;
        engine.choose(trial_color, at(100)).expect("first judged");
        // Interlude: a second click changes nothing.
        assert!(engine.choose(trial_color, at(150)).is_none());
        assert_eq!(engine.round(), 1);

        // The pause has not elapsed yet, so the next trial is not up.
        engine.tick(at(300));
        assert!(engine.trial().is_none());
        engine.tick(at(701));
        assert!(engine.trial().is_some());
        assert_eq!(engine.round(), 2);
    }

    #[test]
    fn run_finalises_only_after_last_pause() {
        let mut engine = StroopEngine::with_seed(9);
        let mut clock = 0;
        engine.start(at(clock));
        for _ in 0..TOTAL_ROUNDS {
            let color = engine.trial().expect("trial").color;
            clock += 400;
            engine.choose(color, at(clock));
            if engine.round() < TOTAL_ROUNDS {
                clock += 600;
                engine.tick(at(clock));
            }
        }
        assert!(!engine.is_complete());
        clock += 600;
        engine.tick(at(clock));
        assert!(engine.is_complete());
        assert!(engine.result().is_some());
    }
}
