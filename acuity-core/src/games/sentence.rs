//! Sentence verification: judge statements as true or false.
//!
//! Each run shuffles a fixed bank of ten general-knowledge statements
//! and asks five. A correct judgment pays a flat 100 points; a wrong one
//! scores zero and play continues. A short feedback pause separates
//! questions and swallows double-clicks.

use chrono::{DateTime, Duration, Utc};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

use super::GameMetrics;

/// Questions asked per run.
pub const TOTAL_QUESTIONS: u32 = 5;

/// Points per correct judgment.
const POINTS_PER_CORRECT: u32 = 100;

/// Feedback pause between questions.
const FEEDBACK_PAUSE_MS: i64 = 800;

/// One bank statement with its truth value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Statement {
    /// The statement text.
    pub text: &'static str,
    /// Whether the statement is true.
    pub truth: bool,
}

/// The fixed statement bank.
pub const STATEMENT_BANK: [Statement; 10] = [
    Statement {
        text: "The Earth is flat.",
        truth: false,
    },
    Statement {
        text: "A decade is 10 years.",
        truth: true,
    },
    Statement {
        text: "A square has five sides.",
        truth: false,
    },
    Statement {
        text: "The boiling point of water is 100\u{b0}C.",
        truth: true,
    },
    Statement {
        text: "All birds can fly.",
        truth: false,
    },
    Statement {
        text: "Red and blue make purple.",
        truth: true,
    },
    Statement {
        text: "The currency of Japan is the Euro.",
        truth: false,
    },
    Statement {
        text: "Spiders are insects.",
        truth: false,
    },
    Statement {
        text: "Mount Everest is the tallest mountain in the world.",
        truth: true,
    },
    Statement {
        text: "Cold water freezes faster than hot water.",
        truth: false,
    },
];

/// Aggregate metrics for a completed sentence run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SentenceMetrics {
    /// Sum of points.
    pub total_score: u32,
    /// Questions asked.
    pub total_questions: u32,
    /// Correct judgments.
    pub correct: u32,
}

/// Outcome of one judged statement.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SentenceOutcome {
    /// Whether the judgment matched the statement's truth value.
    pub correct: bool,
    /// Points awarded.
    pub points: u32,
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum SentencePhase {
    Idle,
    Question,
    Feedback { next_at: DateTime<Utc> },
    Complete,
}

/// The sentence verification engine state machine.
///
/// `IDLE -> QUESTION -> FEEDBACK -> QUESTION -> ... -> COMPLETED`.
#[derive(Debug)]
pub struct SentenceEngine {
    phase: SentencePhase,
    deck: Vec<usize>,
    current: usize,
    score: u32,
    correct: u32,
    metrics: Option<SentenceMetrics>,
    rng: StdRng,
}

impl SentenceEngine {
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
            phase: SentencePhase::Idle,
            deck: Vec::new(),
            current: 0,
            score: 0,
            correct: 0,
            metrics: None,
            rng,
        }
    }

    /// Begin a run: shuffle the bank and present the first statement.
    pub fn start(&mut self, _now: DateTime<Utc>) {
        let mut indices: Vec<usize> = (0..STATEMENT_BANK.len()).collect();
        indices.shuffle(&mut self.rng);
        indices.truncate(TOTAL_QUESTIONS as usize);

        self.deck = indices;
        self.current = 0;
        self.score = 0;
        self.correct = 0;
        self.metrics = None;
        self.phase = SentencePhase::Question;
    }

    /// Advance past the feedback pause to the next statement, or finish
    /// after the last one.
    pub fn tick(&mut self, now: DateTime<Utc>) {
        if let SentencePhase::Feedback { next_at } = self.phase {
            if now >= next_at {
                if self.current + 1 < self.deck.len() {
                    self.current += 1;
                    self.phase = SentencePhase::Question;
                } else {
                    self.finish();
                }
            }
        }
    }

    /// Judge the current statement as true (`claim = true`) or false.
    /// Returns `None` outside the question phase, including during the
    /// feedback pause.
    pub fn answer(&mut self, claim: bool, now: DateTime<Utc>) -> Option<SentenceOutcome> {
        if self.phase != SentencePhase::Question {
            return None;
        }
        let statement = self.statement()?;
        let correct = claim == statement.truth;
        let points = if correct { POINTS_PER_CORRECT } else { 0 };

        if correct {
            self.score += points;
            self.correct += 1;
        }
        self.phase = SentencePhase::Feedback {
            next_at: now + Duration::milliseconds(FEEDBACK_PAUSE_MS),
        };
        Some(SentenceOutcome { correct, points })
    }

    /// The statement currently on screen.
    #[must_use]
    pub fn statement(&self) -> Option<&'static Statement> {
        self.deck.get(self.current).map(|&i| &STATEMENT_BANK[i])
    }

    /// 0-based index of the current question.
    #[must_use]
    pub fn question_index(&self) -> usize {
        self.current
    }

    /// Running score.
    #[must_use]
    pub fn score(&self) -> u32 {
        self.score
    }

    /// Whether the run has completed.
    #[must_use]
    pub fn is_complete(&self) -> bool {
        self.phase == SentencePhase::Complete
    }

    /// Final metrics, present once the run has completed.
    #[must_use]
    pub fn metrics(&self) -> Option<&SentenceMetrics> {
        self.metrics.as_ref()
    }

    /// Final metrics as a tagged payload, present once complete.
    #[must_use]
    pub fn result(&self) -> Option<GameMetrics> {
        self.metrics.map(GameMetrics::Sentence)
    }

    fn finish(&mut self) {
        self.metrics = Some(SentenceMetrics {
            total_score: self.score,
            total_questions: TOTAL_QUESTIONS,
            correct: self.correct,
        });
        self.phase = SentencePhase::Complete;
    }
}

impl Default for SentenceEngine {
    fn default() -> Self {
        Self::new()
    }
}
