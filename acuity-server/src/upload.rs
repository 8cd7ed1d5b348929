//! Multipart file upload, classified into image and video folders.
//!
//! The classifier is extension-based; an extension outside both lists is
//! rejected before anything touches disk. Stored names are fresh UUIDs
//! keeping the original extension, so uploads never collide and the
//! served path leaks nothing about the uploader.
//!
//! This route family answers `{message, filePath}` / `{error}`, not the
//! `{ok, ...}` envelope of `/api`.

use std::path::{Path, PathBuf};

use axum::extract::{Multipart, State};
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::{info, warn};
use uuid::Uuid;

use crate::state::SharedState;

const IMAGE_EXTENSIONS: [&str; 5] = ["jpg", "jpeg", "png", "gif", "bmp"];
const VIDEO_EXTENSIONS: [&str; 5] = ["mp4", "mov", "avi", "mkv", "webm"];

/// Which upload folder a file belongs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaKind {
    /// Still images.
    Image,
    /// Video clips.
    Video,
}

impl MediaKind {
    /// Folder name under the upload root.
    pub fn folder(self) -> &'static str {
        match self {
            Self::Image => "images",
            Self::Video => "videos",
        }
    }
}

/// Classify a filename by extension, case-insensitive. `None` means the
/// file type is not accepted.
pub fn classify(filename: &str) -> Option<MediaKind> {
    let ext = Path::new(filename).extension()?.to_str()?.to_lowercase();
    if IMAGE_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Image)
    } else if VIDEO_EXTENSIONS.contains(&ext.as_str()) {
        Some(MediaKind::Video)
    } else {
        None
    }
}

/// A collision-free stored name keeping the original extension.
fn unique_name(original: &str) -> String {
    match Path::new(original).extension().and_then(|e| e.to_str()) {
        Some(ext) => format!("{}.{}", Uuid::new_v4(), ext.to_lowercase()),
        None => Uuid::new_v4().to_string(),
    }
}

/// The upload routes. The legacy root path and the `/api` alias serve
/// the same handler.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/upload", post(upload_file))
        .route("/api/upload", post(upload_file))
}

fn upload_error(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "error": msg })))
}

async fn upload_file(
    State(state): State<SharedState>,
    mut multipart: Multipart,
) -> Result<Json<Value>, (StatusCode, Json<Value>)> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| upload_error(StatusCode::BAD_REQUEST, &e.to_string()))?
    {
        if field.name() != Some("file") {
            continue;
        }
        let Some(original) = field.file_name().map(ToString::to_string) else {
            continue;
        };
        let Some(kind) = classify(&original) else {
            warn!(file = %original, "upload rejected, unsupported file type");
            return Err(upload_error(
                StatusCode::BAD_REQUEST,
                "Unsupported file type",
            ));
        };

        let data = field
            .bytes()
            .await
            .map_err(|e| upload_error(StatusCode::BAD_REQUEST, &e.to_string()))?;

        let dir = PathBuf::from(&state.config.server.upload_dir).join(kind.folder());
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| upload_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?;

        let stored = unique_name(&original);
        let dest = dir.join(&stored);
        tokio::fs::write(&dest, &data)
            .await
            .map_err(|e| upload_error(StatusCode::INTERNAL_SERVER_ERROR, &e.to_string()))?;

        info!(file = %dest.display(), bytes = data.len(), "file uploaded");
        return Ok(Json(json!({
            "message": "File uploaded successfully",
            "filePath": format!("/uploads/{}/{}", kind.folder(), stored),
        })));
    }

    Err(upload_error(StatusCode::BAD_REQUEST, "No file uploaded"))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
