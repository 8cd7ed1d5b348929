//! Core type definitions for the acuity assessment system.
//!
//! All types are serializable; wire-facing records use camelCase field
//! names to match the HTTP API, metric payloads keep snake_case.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

// ---------------------------------------------------------------------------
// Identity Types
// ---------------------------------------------------------------------------

/// Unique identifier for an assessment subject (the person being tested).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct UserId(pub Uuid);

impl UserId {
    /// Create a new random user ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for UserId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for one assessment visit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub Uuid);

impl SessionId {
    /// Create a new random session ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Parse a session ID from its canonical string form.
    ///
    /// # Errors
    /// Returns the underlying parse error when `s` is not a valid UUID.
    pub fn parse(s: &str) -> Result<Self, uuid::Error> {
        Ok(Self(Uuid::parse_str(s)?))
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a captured frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct FrameId(pub Uuid);

impl FrameId {
    /// Create a new random frame ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for FrameId {
    fn default() -> Self {
        Self::new()
    }
}

/// Unique identifier for a stored game result row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ResultId(pub Uuid);

impl ResultId {
    /// Create a new random result ID.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }
}

impl Default for ResultId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for UserId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for FrameId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl fmt::Display for ResultId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

// ---------------------------------------------------------------------------
// Session Context
// ---------------------------------------------------------------------------

/// Identity of the in-progress assessment pass, passed explicitly to the
/// orchestrator instead of living in ambient global state.
///
/// The user identifier is stable across passes; the session identifier is
/// rotated whenever a new pass starts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionContext {
    /// Stable subject identity.
    pub user_id: UserId,
    /// Identity of the current assessment visit.
    pub session_id: SessionId,
}

impl SessionContext {
    /// Create a context for `user_id` with a fresh session.
    #[must_use]
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            session_id: SessionId::new(),
        }
    }

    /// Rotate to a fresh session, keeping the user identity stable.
    pub fn rotate_session(&mut self) -> SessionId {
        self.session_id = SessionId::new();
        self.session_id
    }
}

// ---------------------------------------------------------------------------
// Face Landmarks
// ---------------------------------------------------------------------------

/// One 3D face-landmark point from the capture pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Landmark {
    /// X coordinate, normalised to the capture viewport.
    pub x: f32,
    /// Y coordinate, normalised to the capture viewport.
    pub y: f32,
    /// Depth relative to the face plane.
    pub z: f32,
}

impl Default for Landmark {
    fn default() -> Self {
        Self {
            x: 0.0,
            y: 0.0,
            z: 0.0,
        }
    }
}

impl fmt::Display for Landmark {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({:.3}, {:.3}, {:.3})", self.x, self.y, self.z)
    }
}

// ---------------------------------------------------------------------------
// Stored Records
// ---------------------------------------------------------------------------

/// A single assessment visit grouping game results and captured frames.
///
/// Immutable once created except for `notes`; never deleted
/// programmatically.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session identity.
    pub id: SessionId,
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Optional external subject reference.
    pub subject_id: Option<String>,
    /// Free-form operator notes.
    pub notes: String,
}

impl Session {
    /// Create a new session with a fresh ID at the current time.
    #[must_use]
    pub fn new(subject_id: Option<String>, notes: impl Into<String>) -> Self {
        Self {
            id: SessionId::new(),
            created_at: Utc::now(),
            subject_id,
            notes: notes.into(),
        }
    }

    /// Create a session with a caller-supplied ID (the orchestrator mints
    /// the ID before registering it remotely).
    #[must_use]
    pub fn with_id(id: SessionId, subject_id: Option<String>, notes: impl Into<String>) -> Self {
        Self {
            id,
            created_at: Utc::now(),
            subject_id,
            notes: notes.into(),
        }
    }
}

/// One captured snapshot during a session: a landmark set, an image path,
/// or both. Append-only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Frame {
    /// Frame identity.
    pub id: FrameId,
    /// Owning session.
    pub session_id: SessionId,
    /// Capture time.
    pub timestamp: DateTime<Utc>,
    /// Ordered landmark points; empty when detection found no face.
    #[serde(default)]
    pub landmarks: Vec<Landmark>,
    /// Path of an associated still image, when one was stored.
    pub image_path: Option<String>,
}

impl Frame {
    /// Create a frame carrying a landmark set.
    #[must_use]
    pub fn with_landmarks(session_id: SessionId, landmarks: Vec<Landmark>) -> Self {
        Self {
            id: FrameId::new(),
            session_id,
            timestamp: Utc::now(),
            landmarks,
            image_path: None,
        }
    }

    /// Create a frame referencing a stored image.
    #[must_use]
    pub fn with_image(session_id: SessionId, image_path: impl Into<String>) -> Self {
        Self {
            id: FrameId::new(),
            session_id,
            timestamp: Utc::now(),
            landmarks: Vec::new(),
            image_path: Some(image_path.into()),
        }
    }

    /// Whether detection produced at least one landmark point.
    #[must_use]
    pub fn has_landmarks(&self) -> bool {
        !self.landmarks.is_empty()
    }
}

/// The outcome payload recorded when one mini-game run completes, keyed
/// to its owning session. Append-only.
///
/// `game_type` carries the tag as reported over the wire; it is kept as
/// a plain string so records from older clients with unrecognised tags
/// are still stored and listed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameResult {
    /// Record identity.
    pub id: ResultId,
    /// Owning session.
    pub session_id: SessionId,
    /// Reported game type tag.
    pub game_type: String,
    /// Free-form per-game metrics payload.
    pub result: serde_json::Value,
    /// Completion time.
    pub timestamp: DateTime<Utc>,
}

impl GameResult {
    /// Create a result record for `session_id` at the current time.
    #[must_use]
    pub fn new(
        session_id: SessionId,
        game_type: impl Into<String>,
        result: serde_json::Value,
    ) -> Self {
        Self {
            id: ResultId::new(),
            session_id,
            game_type: game_type.into(),
            result,
            timestamp: Utc::now(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_are_unique() {
        assert_ne!(SessionId::new(), SessionId::new());
        assert_ne!(UserId::new(), UserId::new());
    }

    #[test]
    fn session_id_parses_canonical_form() {
        let id = SessionId::new();
        let parsed = SessionId::parse(&id.to_string()).expect("round-trip");
        assert_eq!(id, parsed);
    }

    #[test]
    fn rotate_session_keeps_user_stable() {
        let mut ctx = SessionContext::new(UserId::new());
        let user = ctx.user_id;
        let old = ctx.session_id;
        let fresh = ctx.rotate_session();
        assert_eq!(ctx.user_id, user);
        assert_ne!(old, fresh);
        assert_eq!(ctx.session_id, fresh);
    }

    #[test]
    fn frame_landmark_presence() {
        let session = SessionId::new();
        let empty = Frame::with_landmarks(session, Vec::new());
        assert!(!empty.has_landmarks());

        let full = Frame::with_landmarks(
            session,
            vec![Landmark {
                x: 0.1,
                y: 0.2,
                z: 0.0,
            }],
        );
        assert!(full.has_landmarks());
    }

    #[test]
    fn session_serde_uses_camel_case() {
        let session = Session::new(Some("subject-7".into()), "baseline");
        let json = serde_json::to_value(&session).expect("serialize");
        assert!(json.get("createdAt").is_some());
        assert!(json.get("subjectId").is_some());
    }
}
