//! Acuity assessment service.
//!
//! One binary serving three route families behind permissive CORS:
//! `/api` (sessions, frames, game results, report), the upload routes
//! with static file serving under `/uploads`, and the auth routes at the
//! root. Configuration comes from `acuity.toml` (or the file named by
//! `ACUITY_CONFIG`); every setting has a default, so the server starts
//! with no file at all.

mod api;
mod auth;
mod state;
mod upload;

use std::path::Path;
use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::services::ServeDir;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use acuity_core::config::AcuityConfig;

use crate::state::{AppState, SharedState};

const DEFAULT_CONFIG_PATH: &str = "acuity.toml";

/// Matches the body limit the assessment hub posts landmark batches with.
const MAX_BODY_BYTES: usize = 10 * 1024 * 1024;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let (config, config_path) = load_config()?;
    init_tracing(&config.general.log_level);
    match config_path {
        Some(path) => info!(path = %path, "configuration loaded"),
        None => info!("no configuration file found, using defaults"),
    }

    let upload_root = Path::new(&config.server.upload_dir);
    std::fs::create_dir_all(upload_root.join("images"))?;
    std::fs::create_dir_all(upload_root.join("videos"))?;

    let bind_addr = config.server.bind_addr.clone();
    let state = Arc::new(AppState::new(config)?);
    let app = app_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_addr).await?;
    info!(addr = %bind_addr, "acuity server listening");
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;
    info!("server stopped");
    Ok(())
}

/// Load configuration from `ACUITY_CONFIG` or the default path. A missing
/// file yields defaults; a file that exists but fails to parse is fatal.
fn load_config() -> anyhow::Result<(AcuityConfig, Option<String>)> {
    let path = std::env::var("ACUITY_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
    if Path::new(&path).exists() {
        let config = AcuityConfig::from_file(Path::new(&path))?;
        Ok((config, Some(path)))
    } else {
        Ok((AcuityConfig::default(), None))
    }
}

fn init_tracing(level: &str) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    tracing_subscriber::fmt().with_env_filter(filter).init();
}

fn app_router(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);
    let uploads = ServeDir::new(&state.config.server.upload_dir);

    Router::new()
        .merge(api::router())
        .merge(upload::router())
        .merge(auth::router())
        .nest_service("/uploads", uploads)
        .layer(DefaultBodyLimit::max(MAX_BODY_BYTES))
        .layer(cors)
        .with_state(state)
}

async fn shutdown_signal() {
    if let Err(err) = tokio::signal::ctrl_c().await {
        warn!(error = %err, "failed to install shutdown handler");
        std::future::pending::<()>().await;
    }
    info!("shutdown signal received");
}
