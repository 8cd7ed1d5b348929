//! Auth routes: signup, login, password-reset stub.
//!
//! Users live in their own SQLite database, separate from the assessment
//! store. Passwords are bcrypt-hashed with the configured cost. The
//! returned token is an opaque random value and is not persisted; no
//! route checks it.
//!
//! Response shapes follow the `{message}` / `{success, token}` convention
//! of this route family, which differs from the `{ok, ...}` convention of
//! the `/api` family.

use std::path::Path;

use axum::extract::State;
use axum::http::StatusCode;
use axum::routing::post;
use axum::{Json, Router};
use rusqlite::{params, Connection};
use serde::Deserialize;
use serde_json::{json, Value};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::state::SharedState;

// ---------------------------------------------------------------------------
// User store
// ---------------------------------------------------------------------------

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS users (
    id            INTEGER PRIMARY KEY AUTOINCREMENT,
    email         TEXT NOT NULL UNIQUE,
    password_hash TEXT NOT NULL,
    created_at    TEXT NOT NULL
);
";

/// SQLite-backed user records for the auth routes.
pub struct UserStore {
    conn: Connection,
}

impl UserStore {
    /// Open (or create) the users database at `path`.
    pub fn open(path: &Path) -> rusqlite::Result<Self> {
        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode = WAL;")?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// In-memory store for tests.
    #[cfg(test)]
    pub fn open_in_memory() -> rusqlite::Result<Self> {
        let conn = Connection::open_in_memory()?;
        conn.execute_batch(SCHEMA)?;
        Ok(Self { conn })
    }

    /// Whether an account exists for `email`.
    pub fn email_exists(&self, email: &str) -> rusqlite::Result<bool> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT 1 FROM users WHERE email = ?1")?;
        stmt.exists(params![email])
    }

    /// Insert a new account. Fails with a constraint violation when the
    /// email is already registered.
    pub fn insert_user(&self, email: &str, password_hash: &str) -> rusqlite::Result<()> {
        self.conn.execute(
            "INSERT INTO users (email, password_hash, created_at) VALUES (?1, ?2, ?3)",
            params![email, password_hash, chrono::Utc::now().to_rfc3339()],
        )?;
        Ok(())
    }

    /// The stored bcrypt hash for `email`, if the account exists.
    pub fn password_hash(&self, email: &str) -> rusqlite::Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare_cached("SELECT password_hash FROM users WHERE email = ?1")?;
        match stmt.query_row(params![email], |row| row.get::<_, String>(0)) {
            Ok(hash) => Ok(Some(hash)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(err) => Err(err),
        }
    }
}

// ---------------------------------------------------------------------------
// Routes
// ---------------------------------------------------------------------------

/// The auth route family, mounted at the server root.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/signup", post(signup))
        .route("/login", post(login))
        .route("/forgot-password", post(forgot_password))
}

#[derive(Deserialize)]
struct AuthRequest {
    #[serde(default)]
    email: Option<String>,
    #[serde(default)]
    password: Option<String>,
}

type AuthResult = Result<Json<Value>, (StatusCode, Json<Value>)>;

fn message_response(status: StatusCode, msg: &str) -> (StatusCode, Json<Value>) {
    (status, Json(json!({ "message": msg })))
}

fn server_error(err: impl std::fmt::Display) -> (StatusCode, Json<Value>) {
    warn!(error = %err, "auth route failed");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        Json(json!({ "message": "Server error", "error": err.to_string() })),
    )
}

fn present(field: Option<String>) -> Option<String> {
    field.filter(|s| !s.is_empty())
}

async fn signup(State(state): State<SharedState>, Json(req): Json<AuthRequest>) -> AuthResult {
    let (Some(email), Some(password)) = (present(req.email), present(req.password)) else {
        return Err(message_response(
            StatusCode::BAD_REQUEST,
            "Email and password are required",
        ));
    };

    if state
        .users
        .lock()
        .email_exists(&email)
        .map_err(server_error)?
    {
        return Err(message_response(
            StatusCode::BAD_REQUEST,
            "Email already registered",
        ));
    }

    let cost = state.config.auth.bcrypt_cost;
    let hash = tokio::task::spawn_blocking(move || bcrypt::hash(&password, cost))
        .await
        .map_err(server_error)?
        .map_err(server_error)?;

    // Two racing signups can both pass the existence check; the UNIQUE
    // constraint settles it.
    if let Err(err) = state.users.lock().insert_user(&email, &hash) {
        if let rusqlite::Error::SqliteFailure(code, _) = &err {
            if code.code == rusqlite::ErrorCode::ConstraintViolation {
                return Err(message_response(
                    StatusCode::BAD_REQUEST,
                    "Email already registered",
                ));
            }
        }
        return Err(server_error(err));
    }

    debug!(%email, "user registered");
    Ok(Json(json!({ "success": true, "token": Uuid::new_v4().to_string() })))
}

async fn login(State(state): State<SharedState>, Json(req): Json<AuthRequest>) -> AuthResult {
    let email = req.email.unwrap_or_default();
    let password = req.password.unwrap_or_default();

    let Some(hash) = state
        .users
        .lock()
        .password_hash(&email)
        .map_err(server_error)?
    else {
        return Err(message_response(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials",
        ));
    };

    let matches = tokio::task::spawn_blocking(move || bcrypt::verify(&password, &hash))
        .await
        .map_err(server_error)?
        .map_err(server_error)?;

    if !matches {
        return Err(message_response(
            StatusCode::UNAUTHORIZED,
            "Invalid credentials",
        ));
    }

    debug!(%email, "user logged in");
    Ok(Json(json!({ "success": true, "token": Uuid::new_v4().to_string() })))
}

async fn forgot_password(
    State(state): State<SharedState>,
    Json(req): Json<AuthRequest>,
) -> AuthResult {
    let Some(email) = present(req.email) else {
        return Err(message_response(StatusCode::BAD_REQUEST, "Email is required"));
    };

    if !state
        .users
        .lock()
        .email_exists(&email)
        .map_err(server_error)?
    {
        return Err(message_response(
            StatusCode::NOT_FOUND,
            "No account found with this email!",
        ));
    }

    // No mail is sent; the route exists for frontend parity.
    Ok(Json(json!({
        "message": "Password reset link sent to your email (demo)."
    })))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use std::sync::Arc;

    fn test_state() -> SharedState {
        let mut state = AppState::in_memory().expect("state");
        // Minimum bcrypt cost keeps the test fast.
        state.config.auth.bcrypt_cost = 4;
        Arc::new(state)
    }

    fn request(email: &str, password: &str) -> Json<AuthRequest> {
        Json(AuthRequest {
            email: Some(email.to_string()),
            password: Some(password.to_string()),
        })
    }

    #[test]
    fn user_store_round_trip() {
        let store = UserStore::open_in_memory().expect("store");
        assert!(!store.email_exists("a@b.se").expect("exists"));

        store.insert_user("a@b.se", "hash").expect("insert");
        assert!(store.email_exists("a@b.se").expect("exists"));
        assert_eq!(
            store.password_hash("a@b.se").expect("hash").as_deref(),
            Some("hash")
        );
        assert_eq!(store.password_hash("other@b.se").expect("hash"), None);
    }

    #[test]
    fn duplicate_email_violates_constraint() {
        let store = UserStore::open_in_memory().expect("store");
        store.insert_user("a@b.se", "hash").expect("insert");
        let err = store.insert_user("a@b.se", "hash2").expect_err("duplicate");
        match err {
            rusqlite::Error::SqliteFailure(code, _) => {
                assert_eq!(code.code, rusqlite::ErrorCode::ConstraintViolation);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[tokio::test]
    async fn signup_then_login_verifies_password() {
        let state = test_state();

        let response = signup(State(state.clone()), request("subject@acuity.test", "hunter2"))
            .await
            .expect("signup");
        assert_eq!(response.0["success"], true);
        assert!(response.0["token"].is_string());

        let response = login(State(state.clone()), request("subject@acuity.test", "hunter2"))
            .await
            .expect("login");
        assert_eq!(response.0["success"], true);

        let (status, _) = login(State(state), request("subject@acuity.test", "wrong"))
            .await
            .expect_err("bad password");
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn duplicate_signup_is_rejected() {
        let state = test_state();
        signup(State(state.clone()), request("a@b.se", "pw"))
            .await
            .expect("first signup");
        let (status, body) = signup(State(state), request("a@b.se", "pw"))
            .await
            .expect_err("duplicate");
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body.0["message"], "Email already registered");
    }

    #[tokio::test]
    async fn forgot_password_paths() {
        let state = test_state();

        let (status, _) = forgot_password(
            State(state.clone()),
            Json(AuthRequest {
                email: None,
                password: None,
            }),
        )
        .await
        .expect_err("missing email");
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = forgot_password(State(state.clone()), request("ghost@acuity.test", ""))
            .await
            .expect_err("unknown email");
        assert_eq!(status, StatusCode::NOT_FOUND);

        signup(State(state.clone()), request("real@acuity.test", "pw"))
            .await
            .expect("signup");
        let response = forgot_password(State(state), request("real@acuity.test", ""))
            .await
            .expect("known email");
        assert!(response.0["message"]
            .as_str()
            .is_some_and(|m| m.contains("reset link")));
    }
}
