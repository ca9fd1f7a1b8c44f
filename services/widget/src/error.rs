//! services/widget/src/error.rs
//!
//! Defines the primary error type for the entire `widget` service.

use crate::config::ConfigError;
use chatlite_core::ports::PortError;

/// The primary error type for the `widget` service.
#[derive(Debug, thiserror::Error)]
pub enum WidgetError {
    /// Represents an error that occurred during configuration loading.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Represents an error that propagated up from one of the core service ports.
    #[error("Service Port Error: {0}")]
    Port(#[from] PortError),

    /// Represents a failure to encode or decode a channel payload.
    #[error("Serialization Error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Represents a standard Input/Output error (e.g., reading harness input).
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// A catch-all for any other unexpected errors.
    #[error("An unexpected internal error occurred: {0}")]
    Internal(String),
}
