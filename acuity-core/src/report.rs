//! Risk report heuristic over recent game results and captured frames.
//!
//! The score is a fixed-weight linear combination, a placeholder until a
//! proper model replaces it:
//!
//!   reaction = ((clamp(avg_ms, floor, ceiling) - floor) / (ceiling - floor)) * reaction_weight
//!   face     = 1 - (frames_with_landmarks / total_frames)   (0 when no frames)
//!   risk     = clamp(reaction + face * face_weight, 0, 1)
//!
//! With the default weights a slower average reaction maps 200-1200ms
//! onto 0-0.7, and absent face detections contribute up to 0.3. When no
//! reaction results exist the reaction term is omitted entirely, so the
//! risk is driven by the face term alone.

use serde::Serialize;

use crate::config::ReportConfig;
use crate::types::{Frame, GameResult};

/// Game type tag whose results carry reaction latencies.
const REACTION_TAG: &str = "reaction";

/// Assembled report for one session window.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RiskReport {
    /// Mean reaction latency over the window, absent without reaction
    /// results.
    #[serde(rename = "avgReaction")]
    pub avg_reaction_ms: Option<f64>,
    /// Fraction of the frame window without face landmarks.
    #[serde(rename = "faceScore")]
    pub face_score: f64,
    /// Combined risk in `[0, 1]`.
    pub risk: f64,
}

/// Mean reaction latency over `results`, reading the `reactionMs` field
/// of reaction-typed records (falling back to the `average_ms` field the
/// reaction engine emits). `None` when no record carries a latency.
#[must_use]
pub fn average_reaction_ms(results: &[GameResult]) -> Option<f64> {
    let latencies: Vec<f64> = results
        .iter()
        .filter(|r| r.game_type == REACTION_TAG)
        .filter_map(|r| {
            r.result
                .get("reactionMs")
                .or_else(|| r.result.get("average_ms"))
                .and_then(serde_json::Value::as_f64)
        })
        .collect();

    if latencies.is_empty() {
        return None;
    }
    #[allow(clippy::cast_precision_loss)]
    Some(latencies.iter().sum::<f64>() / latencies.len() as f64)
}

/// Fraction of `frames` lacking face landmarks, in `[0, 1]`.
///
/// Returns 0 when there are no frames at all: absence of capture is not
/// treated as absence of a face.
#[must_use]
pub fn face_presence_score(frames: &[Frame]) -> f64 {
    if frames.is_empty() {
        return 0.0;
    }
    let with_landmarks = frames.iter().filter(|f| f.has_landmarks()).count();
    #[allow(clippy::cast_precision_loss)]
    {
        1.0 - (with_landmarks as f64 / frames.len() as f64)
    }
}

/// Reaction-time term of the risk score: the latency clamped to the
/// configured band, normalised over the band, scaled by the reaction
/// weight.
#[must_use]
pub fn reaction_contribution(avg_ms: f64, config: &ReportConfig) -> f64 {
    let span = config.reaction_ceiling_ms - config.reaction_floor_ms;
    if span <= 0.0 {
        return 0.0;
    }
    let clamped = avg_ms.clamp(config.reaction_floor_ms, config.reaction_ceiling_ms);
    ((clamped - config.reaction_floor_ms) / span) * config.reaction_weight
}

/// Assemble the risk report for one session's recent results and frames.
///
/// Callers fetch the windows (`config.result_window` results,
/// `config.frame_window` frames, both newest first) before handing them
/// in; this function is pure.
#[must_use]
pub fn assess(results: &[GameResult], frames: &[Frame], config: &ReportConfig) -> RiskReport {
    let avg_reaction_ms = average_reaction_ms(results);
    let face_score = face_presence_score(frames);

    let mut risk = 0.0;
    if let Some(avg) = avg_reaction_ms {
        risk += reaction_contribution(avg, config);
    }
    risk += face_score * config.face_weight;

    RiskReport {
        avg_reaction_ms,
        face_score,
        risk: risk.clamp(0.0, 1.0),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    use crate::types::{Landmark, SessionId};

    fn reaction_result(session: SessionId, ms: f64) -> GameResult {
        GameResult::new(session, "reaction", json!({ "reactionMs": ms }))
    }

    fn frame(session: SessionId, landmarks: usize) -> Frame {
        let points = (0..landmarks)
            .map(|_| Landmark {
                x: 0.1,
                y: 0.2,
                z: 0.3,
            })
            .collect();
        Frame::with_landmarks(session, points)
    }

    #[test]
    fn reaction_contribution_hits_the_fixed_points() {
        let config = ReportConfig::default();
        assert!((reaction_contribution(200.0, &config)).abs() < 1e-9);
        assert!((reaction_contribution(1200.0, &config) - 0.7).abs() < 1e-9);
        assert!((reaction_contribution(700.0, &config) - 0.35).abs() < 1e-9);
    }

    #[test]
    fn reaction_contribution_clamps_outside_the_band() {
        let config = ReportConfig::default();
        assert!((reaction_contribution(50.0, &config)).abs() < 1e-9);
        assert!((reaction_contribution(5000.0, &config) - 0.7).abs() < 1e-9);
    }

    #[test]
    fn average_skips_non_reaction_results_and_missing_fields() {
        let session = SessionId::new();
        let results = vec![
            reaction_result(session, 400.0),
            GameResult::new(session, "stroop", json!({ "total_score": 90.0 })),
            GameResult::new(session, "reaction", json!({ "note": "no latency" })),
            reaction_result(session, 600.0),
        ];
        let avg = average_reaction_ms(&results).expect("present");
        assert!((avg - 500.0).abs() < 1e-9);

        assert_eq!(average_reaction_ms(&[]), None);
    }

    #[test]
    fn average_accepts_the_engine_field_name() {
        let session = SessionId::new();
        let results = vec![GameResult::new(
            session,
            "reaction",
            json!({ "game_type": "reaction", "average_ms": 320.0 }),
        )];
        let avg = average_reaction_ms(&results).expect("present");
        assert!((avg - 320.0).abs() < 1e-9);
    }

    #[test]
    fn face_score_measures_missing_detections() {
        let session = SessionId::new();
        assert!((face_presence_score(&[])).abs() < 1e-9);

        let all_present = vec![frame(session, 3), frame(session, 5)];
        assert!((face_presence_score(&all_present)).abs() < 1e-9);

        let half = vec![frame(session, 3), frame(session, 0)];
        assert!((face_presence_score(&half) - 0.5).abs() < 1e-9);

        let all_empty = vec![frame(session, 0), frame(session, 0)];
        assert!((face_presence_score(&all_empty) - 1.0).abs() < 1e-9);
    }

    #[test]
    fn no_reaction_results_leaves_risk_to_the_face_term() {
        let session = SessionId::new();
        let frames = vec![frame(session, 0), frame(session, 0)];
        let report = assess(&[], &frames, &ReportConfig::default());

        assert_eq!(report.avg_reaction_ms, None);
        assert!((report.risk - 0.3).abs() < 1e-9);
        assert!(report.risk <= 0.3);
    }

    #[test]
    fn combined_risk_is_clamped_to_one() {
        let session = SessionId::new();
        let results = vec![reaction_result(session, 2000.0)];
        let frames = vec![frame(session, 0)];
        let report = assess(&results, &frames, &ReportConfig::default());

        assert!((report.face_score - 1.0).abs() < 1e-9);
        assert!((report.risk - 1.0).abs() < 1e-9);
    }

    #[test]
    fn report_serializes_with_wire_field_names() {
        let report = RiskReport {
            avg_reaction_ms: Some(420.0),
            face_score: 0.25,
            risk: 0.229,
        };
        let value = serde_json::to_value(&report).expect("serialize");
        assert_eq!(value["avgReaction"], 420.0);
        assert_eq!(value["faceScore"], 0.25);
        assert_eq!(value["risk"], 0.229);
    }
}
