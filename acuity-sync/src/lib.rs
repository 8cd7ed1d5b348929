//! # acuity-sync: Remote Persistence Client
//!
//! HTTP client for the acuity assessment service, covering the four
//! remote operations the assessment flow needs:
//!   - **Session registration**: `POST /api/sessions`
//!   - **Result push**: `POST /api/games/result`
//!   - **Frame push**: `POST /api/frames`
//!   - **Report fetch**: `GET /api/games/report/:sessionId`
//!
//! [`SyncClient`] implements `acuity_core`'s `ResultSink`, so it plugs
//! straight into the orchestrator; a push that fails here lands in the
//! orchestrator's local backup queue rather than surfacing to the
//! subject.
//!
//! Every request carries a hard timeout. There is no retry loop: the
//! one-shot drain at session bootstrap is the only re-delivery path.

pub mod client;
pub mod error;
pub mod types;

pub use client::SyncClient;
pub use error::SyncError;
pub use types::SessionReport;
