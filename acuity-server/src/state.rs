//! Shared server state.
//!
//! Two stores sit behind the router: the assessment store (sessions,
//! frames, game results) and the users store for auth. They are separate
//! SQLite databases with independent paths, mirroring the split the
//! deployment runs with. Connections are not thread-safe, so each store
//! sits behind a mutex; cross-request concurrency comes from the
//! database file, not from shared connections.

use std::path::Path;
use std::sync::Arc;

use parking_lot::Mutex;

use acuity_core::config::AcuityConfig;
use acuity_core::store::SessionStore;

use crate::auth::UserStore;

/// Everything a request handler can reach.
pub struct AppState {
    /// Assessment store: sessions, frames, game results.
    pub store: Mutex<SessionStore>,
    /// Users store for the auth routes.
    pub users: Mutex<UserStore>,
    /// Full configuration, for report windows and auth cost.
    pub config: AcuityConfig,
}

/// The state handle handlers extract.
pub type SharedState = Arc<AppState>;

impl AppState {
    /// Open both stores at their configured paths.
    pub fn new(config: AcuityConfig) -> anyhow::Result<Self> {
        let store = SessionStore::open(Path::new(&config.store.db_path), &config.store)?;
        let users = UserStore::open(Path::new(&config.auth.users_db_path))?;
        Ok(Self {
            store: Mutex::new(store),
            users: Mutex::new(users),
            config,
        })
    }

    /// In-memory state for handler tests.
    #[cfg(test)]
    pub fn in_memory() -> anyhow::Result<Self> {
        let config = AcuityConfig::default();
        let store = SessionStore::open_in_memory(&config.store)?;
        let users = UserStore::open_in_memory()?;
        Ok(Self {
            store: Mutex::new(store),
            users: Mutex::new(users),
            config,
        })
    }
}
