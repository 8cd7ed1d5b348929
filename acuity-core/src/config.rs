//! Configuration for the acuity assessment system.
//!
//! Maps directly to `acuity.toml`; every field has a default so a missing
//! file or partial file always yields a usable configuration.

use serde::{Deserialize, Serialize};

/// Top-level acuity configuration, loadable from TOML.
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AcuityConfig {
    /// General settings.
    #[serde(default)]
    pub general: GeneralConfig,
    /// Assessment store (sessions, frames, game results).
    #[serde(default)]
    pub store: StoreConfig,
    /// Report heuristic windows and weights.
    #[serde(default)]
    pub report: ReportConfig,
    /// Remote persistence client settings.
    #[serde(default)]
    pub sync: SyncConfig,
    /// HTTP service settings.
    #[serde(default)]
    pub server: ServerConfig,
    /// Auth store settings (separate database).
    #[serde(default)]
    pub auth: AuthConfig,
}

impl AcuityConfig {
    /// Load configuration from a TOML string.
    ///
    /// # Errors
    /// Returns `AcuityError::Config` if the TOML is invalid.
    pub fn from_toml(toml_str: &str) -> crate::error::Result<Self> {
        toml::from_str(toml_str).map_err(|e| crate::AcuityError::Config(e.to_string()))
    }

    /// Load configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn from_file(path: &std::path::Path) -> crate::error::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_toml(&content)
    }
}

// ---------------------------------------------------------------------------
// Sub-configs
// ---------------------------------------------------------------------------

/// General system settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Log level: trace, debug, info, warn, error.
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
        }
    }
}

/// Assessment store configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Path of the SQLite database file.
    #[serde(default = "default_store_path")]
    pub db_path: String,
    /// Use WAL mode for concurrent reads.
    #[serde(default = "default_true")]
    pub wal_mode: bool,
    /// Number of rotating backup files to keep.
    #[serde(default = "default_3")]
    pub backup_count: u32,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            db_path: "acuity.db".to_string(),
            wal_mode: true,
            backup_count: 3,
        }
    }
}

/// Report heuristic configuration. Defaults reproduce the fixed-weight
/// placeholder formula; the weights are tunable but not learned.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ReportConfig {
    /// How many recent game results feed the report.
    #[serde(default = "default_10_usize")]
    pub result_window: usize,
    /// How many recent frames feed the report.
    #[serde(default = "default_50_usize")]
    pub frame_window: usize,
    /// Weight of the reaction-time contribution.
    #[serde(default = "default_0_7")]
    pub reaction_weight: f64,
    /// Weight of the face-landmark contribution.
    #[serde(default = "default_0_3")]
    pub face_weight: f64,
    /// Reaction times at or below this many ms contribute zero risk.
    #[serde(default = "default_200_0")]
    pub reaction_floor_ms: f64,
    /// Reaction times at or above this many ms contribute full weight.
    #[serde(default = "default_1200_0")]
    pub reaction_ceiling_ms: f64,
}

impl Default for ReportConfig {
    fn default() -> Self {
        Self {
            result_window: 10,
            frame_window: 50,
            reaction_weight: 0.7,
            face_weight: 0.3,
            reaction_floor_ms: 200.0,
            reaction_ceiling_ms: 1200.0,
        }
    }
}

/// Remote persistence client configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncConfig {
    /// Base URL of the acuity HTTP service.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    /// Hard timeout for any remote call in milliseconds.
    #[serde(default = "default_5000")]
    pub request_timeout_ms: u64,
    /// Path of the local backup queue file.
    #[serde(default = "default_backup_path")]
    pub backup_path: String,
}

impl Default for SyncConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:5000".to_string(),
            request_timeout_ms: 5000,
            backup_path: "acuity_backup.json".to_string(),
        }
    }
}

/// HTTP service configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// Bind address for the HTTP listener.
    #[serde(default = "default_bind_addr")]
    pub bind_addr: String,
    /// Root directory for uploaded files (images/ and videos/ live under it).
    #[serde(default = "default_upload_dir")]
    pub upload_dir: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:5000".to_string(),
            upload_dir: "uploads".to_string(),
        }
    }
}

/// Auth store configuration. Users live in their own database, separate
/// from the assessment store.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// Path of the users SQLite database file.
    #[serde(default = "default_users_path")]
    pub users_db_path: String,
    /// bcrypt cost factor for password hashing.
    #[serde(default = "default_10")]
    pub bcrypt_cost: u32,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            users_db_path: "users.db".to_string(),
            bcrypt_cost: 10,
        }
    }
}

// ---------------------------------------------------------------------------
// Serde default helpers
// ---------------------------------------------------------------------------

fn default_true() -> bool { true }
fn default_log_level() -> String { "info".to_string() }
fn default_store_path() -> String { "acuity.db".to_string() }
fn default_base_url() -> String { "http://localhost:5000".to_string() }
fn default_backup_path() -> String { "acuity_backup.json".to_string() }
fn default_bind_addr() -> String { "0.0.0.0:5000".to_string() }
fn default_upload_dir() -> String { "uploads".to_string() }
fn default_users_path() -> String { "users.db".to_string() }
fn default_0_3() -> f64 { 0.3 }
fn default_0_7() -> f64 { 0.7 }
fn default_200_0() -> f64 { 200.0 }
fn default_1200_0() -> f64 { 1200.0 }
fn default_3() -> u32 { 3 }
fn default_10() -> u32 { 10 }
fn default_10_usize() -> usize { 10 }
fn default_50_usize() -> usize { 50 }
fn default_5000() -> u64 { 5000 }

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_toml_gives_defaults() {
        let config = AcuityConfig::from_toml("").expect("empty config");
        assert_eq!(config.report.result_window, 10);
        assert_eq!(config.report.frame_window, 50);
        assert!((config.report.reaction_weight - 0.7).abs() < f64::EPSILON);
        assert_eq!(config.auth.bcrypt_cost, 10);
        assert!(config.store.wal_mode);
    }

    #[test]
    fn partial_section_fills_missing_fields() {
        let toml = r#"
            [report]
            result_window = 25

            [server]
            bind_addr = "127.0.0.1:8080"
        "#;
        let config = AcuityConfig::from_toml(toml).expect("partial config");
        assert_eq!(config.report.result_window, 25);
        assert_eq!(config.report.frame_window, 50);
        assert_eq!(config.server.bind_addr, "127.0.0.1:8080");
        assert_eq!(config.server.upload_dir, "uploads");
    }

    #[test]
    fn invalid_toml_is_a_config_error() {
        let result = AcuityConfig::from_toml("[report\nresult_window = ");
        assert!(result.is_err());
    }
}
