//! services/widget/src/config.rs
//!
//! Defines the widget runtime's configuration structure and loading logic.
//!
//! All configuration is loaded from environment variables at startup. The `.env`
//! file is used for local development.

use std::path::PathBuf;
use std::time::Duration;
use tracing::Level;

/// A custom error type for configuration loading failures.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing the environment variable {0}")]
    MissingVar(String),
    #[error("Invalid value for the environment variable {0}: {1}")]
    InvalidValue(String, String),
}

/// Holds all configuration loaded from the environment at startup.
#[derive(Clone, Debug)]
pub struct Config {
    /// Base path of the widget backend surface, e.g.
    /// `http://localhost:8002/api/v1/widget`.
    pub api_base: String,
    /// Origin serving the embedded document route.
    pub frontend_base: String,
    /// When present, the harness binary self-initializes with this id.
    pub widget_id: Option<String>,
    /// Location of the durable visitor-identity database.
    pub state_db: PathBuf,
    /// Deadline applied to every backend call.
    pub request_timeout: Duration,
    pub log_level: Level,
}

impl Config {
    /// Loads configuration from environment variables.
    ///
    /// It will look for a `.env` file in the current directory for development,
    /// but this is skipped in test environments to ensure tests are hermetic.
    pub fn from_env() -> Result<Self, ConfigError> {
        // Only load from .env in non-test mode to avoid contamination.
        if !cfg!(test) {
            dotenvy::dotenv().ok();
        }

        let api_base = std::env::var("CHATLITE_API_BASE")
            .unwrap_or_else(|_| "http://localhost:8002/api/v1/widget".to_string());

        let frontend_base = std::env::var("CHATLITE_FRONTEND_BASE")
            .unwrap_or_else(|_| "http://localhost:5175".to_string());

        let widget_id = std::env::var("CHATLITE_WIDGET_ID").ok().filter(|v| !v.is_empty());

        let state_db = std::env::var("CHATLITE_STATE_DB")
            .map(PathBuf::from)
            .unwrap_or_else(|_| PathBuf::from("./chatlite-widget.db"));

        let timeout_str =
            std::env::var("CHATLITE_REQUEST_TIMEOUT_SECS").unwrap_or_else(|_| "10".to_string());
        let timeout_secs = timeout_str.parse::<u64>().map_err(|_| {
            ConfigError::InvalidValue(
                "CHATLITE_REQUEST_TIMEOUT_SECS".to_string(),
                format!("'{}' is not a number of seconds", timeout_str),
            )
        })?;

        let log_level_str = std::env::var("RUST_LOG").unwrap_or_else(|_| "INFO".to_string());
        let log_level = log_level_str.parse::<Level>().map_err(|_| {
            ConfigError::InvalidValue(
                "RUST_LOG".to_string(),
                format!("'{}' is not a valid log level", log_level_str),
            )
        })?;

        Ok(Self {
            api_base,
            frontend_base,
            widget_id,
            state_db,
            request_timeout: Duration::from_secs(timeout_secs),
            log_level,
        })
    }
}
