//! Sync client: remote persistence against the acuity HTTP service.

use std::time::Duration;

use reqwest::Client;
use serde_json::json;
use tracing::{debug, warn};

use acuity_core::config::SyncConfig;
use acuity_core::flow::ResultSink;
use acuity_core::{AcuityError, Frame, GameRunRecord, Session, SessionId};

use crate::error::SyncError;
use crate::types::SessionReport;

/// HTTP client for the assessment service.
///
/// Thin and stateless: every call is one request with a hard timeout, no
/// retries. Callers that need resilience layer it on top (the
/// orchestrator captures failed pushes to its backup queue).
pub struct SyncClient {
    http: Client,
    base_url: String,
    timeout: Duration,
    timeout_ms: u64,
}

impl SyncClient {
    /// Create a client for the service at `base_url`.
    #[must_use]
    pub fn new(base_url: impl Into<String>, request_timeout_ms: u64) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self {
            http: Client::new(),
            base_url,
            timeout: Duration::from_millis(request_timeout_ms),
            timeout_ms: request_timeout_ms,
        }
    }

    /// Create a client from the `[sync]` configuration section.
    #[must_use]
    pub fn from_config(config: &SyncConfig) -> Self {
        Self::new(config.base_url.clone(), config.request_timeout_ms)
    }

    /// The normalized service base URL.
    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Register a session with the service (`POST /api/sessions`).
    ///
    /// The session keeps its client-generated id, so records pushed later
    /// reference it without a round trip.
    pub async fn register_session(&self, session: &Session) -> Result<(), SyncError> {
        debug!(session = %session.id, "registering session");
        self.post("/api/sessions", &session_payload(session)).await?;
        Ok(())
    }

    /// Push one completed game record (`POST /api/games/result`).
    pub async fn push_record(&self, record: &GameRunRecord) -> Result<(), SyncError> {
        debug!(game = %record.game, session = %record.session_id, "pushing game result");
        self.post("/api/games/result", &record_payload(record)?).await?;
        Ok(())
    }

    /// Push one captured frame (`POST /api/frames`).
    pub async fn push_frame(&self, frame: &Frame) -> Result<(), SyncError> {
        debug!(session = %frame.session_id, "pushing frame");
        self.post("/api/frames", &frame_payload(frame)).await?;
        Ok(())
    }

    /// Fetch the risk report for a session
    /// (`GET /api/games/report/:sessionId`).
    pub async fn fetch_report(&self, session_id: SessionId) -> Result<SessionReport, SyncError> {
        debug!(session = %session_id, "fetching report");
        let url = format!("{}/api/games/report/{}", self.base_url, session_id);
        let response = self
            .http
            .get(&url)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), "report request rejected");
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| SyncError::ParseError(e.to_string()))
    }

    async fn post(
        &self,
        path: &str,
        body: &serde_json::Value,
    ) -> Result<serde_json::Value, SyncError> {
        let url = format!("{}{}", self.base_url, path);
        let response = self
            .http
            .post(&url)
            .json(body)
            .timeout(self.timeout)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(e, self.timeout_ms))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = status.as_u16(), path, "service rejected request");
            return Err(SyncError::Rejected {
                status: status.as_u16(),
                body,
            });
        }
        response
            .json()
            .await
            .map_err(|e| SyncError::ParseError(e.to_string()))
    }
}

impl ResultSink for SyncClient {
    async fn register_session(&self, session: &Session) -> acuity_core::Result<()> {
        SyncClient::register_session(self, session)
            .await
            .map_err(|e| AcuityError::SyncFailed {
                reason: e.to_string(),
            })
    }

    async fn push_record(&self, record: &GameRunRecord) -> acuity_core::Result<()> {
        SyncClient::push_record(self, record)
            .await
            .map_err(|e| AcuityError::SyncFailed {
                reason: e.to_string(),
            })
    }
}

// ---------------------------------------------------------------------------
// Request payloads
// ---------------------------------------------------------------------------

fn session_payload(session: &Session) -> serde_json::Value {
    json!({
        "id": session.id,
        "subjectId": session.subject_id,
        "notes": session.notes,
    })
}

fn record_payload(record: &GameRunRecord) -> Result<serde_json::Value, SyncError> {
    let result = serde_json::to_value(&record.metrics)
        .map_err(|e| SyncError::ParseError(e.to_string()))?;
    Ok(json!({
        "sessionId": record.session_id,
        "gameType": record.game.as_str(),
        "result": result,
    }))
}

fn frame_payload(frame: &Frame) -> serde_json::Value {
    json!({
        "sessionId": frame.session_id,
        "landmarks": frame.landmarks,
        "imagePath": frame.image_path,
    })
}
