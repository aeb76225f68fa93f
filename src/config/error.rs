//! Configuration error types

use thiserror::Error;

/// Errors that can occur during configuration loading
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Configuration loading failed: {0}")]
    LoadError(#[from] config::ConfigError),

    #[error("Validation failed: {0}")]
    ValidationFailed(#[from] ValidationError),
}

/// Errors that can occur during configuration validation
#[derive(Debug, Error)]
pub enum ValidationError {
    #[error("Required configuration missing: {0}")]
    MissingRequired(&'static str),

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Invalid socket address: {0}")]
    InvalidAddress(String),

    #[error("WebSocket path must start with '/'")]
    InvalidPath,

    #[error("Invalid database URL format")]
    InvalidDatabaseUrl,

    #[error("Invalid connect timeout")]
    InvalidTimeout,

    #[error("Keepalive interval must be between 1 and 3600 seconds")]
    InvalidKeepaliveInterval,

    #[error("Invalid channel name: {0:?}")]
    InvalidChannel(String),
}
