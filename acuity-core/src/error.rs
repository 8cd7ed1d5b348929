//! Error types for the acuity core library.

use thiserror::Error;

/// Top-level error type for all acuity operations.
#[derive(Error, Debug)]
pub enum AcuityError {
    /// A session with the given ID was not found.
    #[error("Session not found: {0}")]
    SessionNotFound(crate::SessionId),

    /// A stored result payload did not match its declared game type.
    #[error("Malformed result payload for game type {game_type}: {reason}")]
    MalformedPayload {
        /// The declared game type.
        game_type: String,
        /// Why decoding failed.
        reason: String,
    },

    /// An unrecognised game-type tag on the wire or in storage.
    #[error("Unknown game type: {0}")]
    UnknownGameType(String),

    /// Serialization or deserialization failure.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// SQLite persistence error.
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Remote persistence failed and the record went to the backup queue.
    #[error("Remote sync failed: {reason}")]
    SyncFailed {
        /// Transport-level description of the failure.
        reason: String,
    },

    /// Generic I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Convenience Result type alias.
pub type Result<T> = std::result::Result<T, AcuityError>;
