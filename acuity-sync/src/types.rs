//! Wire types returned by the assessment service.

use serde::Deserialize;

/// The risk report for one session, as served by
/// `GET /api/games/report/:sessionId`.
#[derive(Debug, Clone, Deserialize)]
pub struct SessionReport {
    /// Whether the service computed the report successfully.
    pub ok: bool,
    /// Mean reaction time across the recent reaction-game results,
    /// absent when the session has none.
    #[serde(rename = "avgReaction")]
    pub avg_reaction_ms: Option<f64>,
    /// Fraction of recent frames with no face landmarks, in `[0, 1]`.
    #[serde(rename = "faceScore")]
    pub face_score: f64,
    /// Combined risk score in `[0, 1]`.
    pub risk: f64,
    /// The recent game-result rows the report was computed over.
    #[serde(default)]
    pub games: Vec<serde_json::Value>,
    /// How many recent frames fed the face heuristic.
    #[serde(rename = "framesCount", default)]
    pub frames_count: usize,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn report_parses_service_shape() {
        let raw = r#"{
            "ok": true,
            "avgReaction": 412.5,
            "faceScore": 0.2,
            "risk": 0.208,
            "games": [{"gameType": "reaction"}],
            "framesCount": 50
        }"#;
        let report: SessionReport = serde_json::from_str(raw).expect("parse report");
        assert!(report.ok);
        assert_eq!(report.avg_reaction_ms, Some(412.5));
        assert!((report.risk - 0.208).abs() < 1e-9);
        assert_eq!(report.games.len(), 1);
        assert_eq!(report.frames_count, 50);
    }

    #[test]
    fn report_tolerates_missing_reaction_and_games() {
        let raw = r#"{"ok": true, "avgReaction": null, "faceScore": 1.0, "risk": 0.3}"#;
        let report: SessionReport = serde_json::from_str(raw).expect("parse report");
        assert_eq!(report.avg_reaction_ms, None);
        assert!(report.games.is_empty());
        assert_eq!(report.frames_count, 0);
    }
}
