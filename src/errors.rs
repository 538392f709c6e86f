// src/errors.rs

//! Crate-wide error aliases and helpers.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DispatchError {
    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("TOML parsing error: {0}")]
    TomlError(#[from] toml::de::Error),

    #[error("{context}: {}", .errors.join("\n  - "))]
    Validation {
        context: String,
        errors: Vec<String>,
    },

    #[error("Transport error: {0}")]
    Transport(#[from] TransportError),

    #[error("Unable to decode job data: {0}")]
    Decode(String),

    #[error("Connection to '{0}' was already unbound")]
    ConnectionUnbound(String),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Failure of a single call across the process boundary.
///
/// Collaborators (binders, remote workers, result callbacks) return this so
/// that fakes can fail one call at a time.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TransportError {
    #[error("bind to '{0}' failed: {1}")]
    BindFailed(String, String),

    #[error("remote endpoint is gone")]
    ChannelClosed,

    #[error("remote call failed: {0}")]
    Remote(String),
}

pub use anyhow::Error;
pub type Result<T> = std::result::Result<T, DispatchError>;
