//! The six mini-game engines and their shared result vocabulary.
//!
//! Every engine is a headless finite-state machine following the same
//! shape: `IDLE -> (optional REVEAL/MEMORIZE) -> INPUT/RECALL -> (repeat
//! per round) -> COMPLETED`. Engines never read the wall clock; each
//! mutating call takes an explicit `now`, and scheduled transitions fire
//! when the host calls `tick(now)` past the stored deadline. Dropping an
//! engine cancels everything it had pending.
//!
//! A completed run yields exactly one [`GameMetrics`] value; the
//! orchestrator wraps it into a [`GameRunRecord`] with session identity.

pub mod matrix;
pub mod pattern;
pub mod reaction;
pub mod sentence;
pub mod span;
pub mod stroop;

pub use matrix::MatrixEngine;
pub use pattern::PatternEngine;
pub use reaction::ReactionEngine;
pub use sentence::SentenceEngine;
pub use span::SpanEngine;
pub use stroop::StroopEngine;

use crate::types::{SessionContext, SessionId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Game identity
// ---------------------------------------------------------------------------

/// Identifies one of the six mini-games.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum GameKind {
    /// Colour/word interference test.
    Stroop,
    /// True-or-false statement verification.
    Sentence,
    /// Symbol sequence recall.
    PatternMemory,
    /// Grid cell recall.
    MemoryMatrix,
    /// Go-signal reaction latency.
    Reaction,
    /// Digit sequence recall with growing span.
    NumberSpan,
}

impl GameKind {
    /// The six games in default assessment order.
    pub const ASSESSMENT_ORDER: [Self; 6] = [
        Self::Stroop,
        Self::Sentence,
        Self::PatternMemory,
        Self::MemoryMatrix,
        Self::Reaction,
        Self::NumberSpan,
    ];

    /// Canonical wire tag for this game.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Stroop => "stroop",
            Self::Sentence => "sentence",
            Self::PatternMemory => "pattern_memory",
            Self::MemoryMatrix => "memory_matrix",
            Self::Reaction => "reaction",
            Self::NumberSpan => "number_span",
        }
    }

    /// Human-readable title, as shown on the assessment hub.
    #[must_use]
    pub fn game_name(self) -> &'static str {
        match self {
            Self::Stroop => "Stroop Test",
            Self::Sentence => "Truth or Lie",
            Self::PatternMemory => "Pattern Memory",
            Self::MemoryMatrix => "Memory Matrix",
            Self::Reaction => "Reaction Time",
            Self::NumberSpan => "Number Span",
        }
    }
}

impl fmt::Display for GameKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GameKind {
    type Err = crate::AcuityError;

    /// Parse a wire tag. Legacy short ids from the first hub build
    /// ("pattern", "memory", "numbers", "reaction_time") are accepted.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stroop" => Ok(Self::Stroop),
            "sentence" => Ok(Self::Sentence),
            "pattern" | "pattern_memory" => Ok(Self::PatternMemory),
            "memory" | "memory_matrix" => Ok(Self::MemoryMatrix),
            "reaction" | "reaction_time" => Ok(Self::Reaction),
            "numbers" | "number_span" => Ok(Self::NumberSpan),
            other => Err(crate::AcuityError::UnknownGameType(other.to_string())),
        }
    }
}

// ---------------------------------------------------------------------------
// Result metrics (tagged union)
// ---------------------------------------------------------------------------

/// Typed result payload, one variant per game.
///
/// Serialized with an internal `game_type` tag so a stored payload is
/// self-describing, matching the record shape the hub produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "game_type")]
pub enum GameMetrics {
    /// Stroop run aggregate plus per-trial detail.
    #[serde(rename = "stroop")]
    Stroop(stroop::StroopMetrics),
    /// Sentence verification aggregate.
    #[serde(rename = "sentence")]
    Sentence(sentence::SentenceMetrics),
    /// Pattern memory aggregate.
    #[serde(rename = "pattern_memory")]
    PatternMemory(pattern::PatternMetrics),
    /// Memory matrix aggregate.
    #[serde(rename = "memory_matrix")]
    MemoryMatrix(matrix::MatrixMetrics),
    /// Reaction time aggregate with per-round samples.
    #[serde(rename = "reaction")]
    Reaction(reaction::ReactionMetrics),
    /// Number span aggregate.
    #[serde(rename = "number_span")]
    NumberSpan(span::SpanMetrics),
}

impl GameMetrics {
    /// The game this payload belongs to.
    #[must_use]
    pub fn kind(&self) -> GameKind {
        match self {
            Self::Stroop(_) => GameKind::Stroop,
            Self::Sentence(_) => GameKind::Sentence,
            Self::PatternMemory(_) => GameKind::PatternMemory,
            Self::MemoryMatrix(_) => GameKind::MemoryMatrix,
            Self::Reaction(_) => GameKind::Reaction,
            Self::NumberSpan(_) => GameKind::NumberSpan,
        }
    }

    /// Total score of the run, on each game's own scale.
    #[must_use]
    pub fn total_score(&self) -> f64 {
        match self {
            Self::Stroop(m) => m.total_score,
            Self::Sentence(m) => f64::from(m.total_score),
            Self::PatternMemory(m) => f64::from(m.total_score),
            Self::MemoryMatrix(m) => f64::from(m.total_score),
            Self::Reaction(m) => f64::from(m.total_score),
            Self::NumberSpan(m) => f64::from(m.total_score),
        }
    }

    /// Percentage accuracy, for the games that measure one.
    #[must_use]
    pub fn accuracy(&self) -> Option<f64> {
        match self {
            Self::Stroop(m) => Some(m.accuracy),
            Self::Sentence(m) => {
                if m.total_questions == 0 {
                    None
                } else {
                    Some(f64::from(m.correct) / f64::from(m.total_questions) * 100.0)
                }
            }
            _ => None,
        }
    }

    /// Mean reaction latency in milliseconds, for the games that time input.
    #[must_use]
    pub fn average_time_ms(&self) -> Option<f64> {
        match self {
            Self::Stroop(m) => Some(m.average_reaction_secs * 1000.0),
            Self::Reaction(m) => Some(m.average_ms),
            _ => None,
        }
    }

    /// Highest level reached, for the span game.
    #[must_use]
    pub fn max_level(&self) -> Option<u32> {
        match self {
            Self::NumberSpan(m) => Some(m.max_level),
            _ => None,
        }
    }

    /// Rounds completed before the run ended, where the game counts them.
    #[must_use]
    pub fn rounds_completed(&self) -> Option<u32> {
        match self {
            Self::PatternMemory(m) => Some(m.rounds_completed),
            Self::Reaction(m) => Some(m.rounds_completed),
            Self::NumberSpan(m) => Some(m.rounds_completed),
            _ => None,
        }
    }

    /// Decode a payload whose game type arrived out-of-band (the wire
    /// carries `gameType` next to `result`). The declared type is
    /// authoritative: any `game_type` tag inside the payload is replaced.
    ///
    /// # Errors
    /// Returns `MalformedPayload` when the payload is not an object or
    /// does not match the declared game's field set.
    pub fn from_parts(kind: GameKind, payload: serde_json::Value) -> crate::Result<Self> {
        let mut object = match payload {
            serde_json::Value::Object(map) => map,
            other => {
                return Err(crate::AcuityError::MalformedPayload {
                    game_type: kind.as_str().to_string(),
                    reason: format!("expected an object, got {other}"),
                });
            }
        };
        object.insert(
            "game_type".to_string(),
            serde_json::Value::String(kind.as_str().to_string()),
        );
        serde_json::from_value(serde_json::Value::Object(object)).map_err(|e| {
            crate::AcuityError::MalformedPayload {
                game_type: kind.as_str().to_string(),
                reason: e.to_string(),
            }
        })
    }
}

// ---------------------------------------------------------------------------
// Run record
// ---------------------------------------------------------------------------

/// The record emitted when one game run completes, stamped with session
/// identity by the orchestrator. Serializes to the flat hub record shape
/// (`game_id`, `game_name`, identity fields, metrics fields inline,
/// `completed_at`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GameRunRecord {
    /// Which game produced this record.
    #[serde(rename = "game_id")]
    pub game: GameKind,
    /// Human-readable game title.
    pub game_name: String,
    /// Stable subject identity.
    pub user_id: UserId,
    /// Assessment visit this run belongs to.
    pub session_id: SessionId,
    /// Typed per-game metrics.
    #[serde(flatten)]
    pub metrics: GameMetrics,
    /// When the run completed.
    pub completed_at: DateTime<Utc>,
}

impl GameRunRecord {
    /// Stamp a completed run with the pass's session identity.
    #[must_use]
    pub fn new(ctx: &SessionContext, metrics: GameMetrics, completed_at: DateTime<Utc>) -> Self {
        let game = metrics.kind();
        Self {
            game,
            game_name: game.game_name().to_string(),
            user_id: ctx.user_id,
            session_id: ctx.session_id,
            metrics,
            completed_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn kind_round_trips_through_wire_tag() {
        for kind in GameKind::ASSESSMENT_ORDER {
            let parsed: GameKind = kind.as_str().parse().expect("canonical tag");
            assert_eq!(parsed, kind);
        }
    }

    #[test]
    fn legacy_hub_ids_parse() {
        assert_eq!("pattern".parse::<GameKind>().unwrap(), GameKind::PatternMemory);
        assert_eq!("memory".parse::<GameKind>().unwrap(), GameKind::MemoryMatrix);
        assert_eq!("numbers".parse::<GameKind>().unwrap(), GameKind::NumberSpan);
        assert_eq!("reaction_time".parse::<GameKind>().unwrap(), GameKind::Reaction);
        assert!("tetris".parse::<GameKind>().is_err());
    }

    #[test]
    fn metrics_carry_internal_tag() {
        let metrics = GameMetrics::NumberSpan(span::SpanMetrics {
            total_score: 30,
            max_level: 4,
            rounds_completed: 1,
        });
        let value = serde_json::to_value(&metrics).expect("serialize");
        assert_eq!(value["game_type"], "number_span");
        assert_eq!(value["max_level"], 4);
    }

    #[test]
    fn from_parts_overrides_inner_tag() {
        let payload = json!({
            "game_type": "stroop",
            "total_score": 30,
            "max_level": 4,
            "rounds_completed": 1,
        });
        let metrics = GameMetrics::from_parts(GameKind::NumberSpan, payload).expect("decode");
        assert_eq!(metrics.kind(), GameKind::NumberSpan);
    }

    #[test]
    fn from_parts_rejects_non_object() {
        let err = GameMetrics::from_parts(GameKind::Sentence, json!(42));
        assert!(err.is_err());
    }

    #[test]
    fn run_record_serializes_flat() {
        let ctx = SessionContext::new(UserId::new());
        let metrics = GameMetrics::Sentence(sentence::SentenceMetrics {
            total_score: 300,
            total_questions: 5,
            correct: 3,
        });
        let record = GameRunRecord::new(&ctx, metrics, Utc::now());
        let value = serde_json::to_value(&record).expect("serialize");
        assert_eq!(value["game_id"], "sentence");
        assert_eq!(value["game_name"], "Truth or Lie");
        assert_eq!(value["game_type"], "sentence");
        assert_eq!(value["total_score"], 300);
        assert!(value.get("completed_at").is_some());
    }
}
