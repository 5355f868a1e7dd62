//! Error types for the overlay synchronization system.

use crate::overlay::OverlayId;
use thiserror::Error;

/// Failures reported by an overlay store.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// The request could not complete (connect, timeout, broken transport).
    #[error("Network failure: {0}")]
    Network(String),

    /// The store answered, but not with a usable success response.
    #[error("Store rejected request with status {status}: {message}")]
    RemoteRejected { status: u16, message: String },
}

impl StoreError {
    pub fn network(message: impl Into<String>) -> Self {
        StoreError::Network(message.into())
    }

    pub fn rejected(status: u16, message: impl Into<String>) -> Self {
        StoreError::RemoteRejected {
            status,
            message: message.into(),
        }
    }
}

/// Input rejected before any request is made.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Size must be positive, got {width}x{height}")]
    NonPositiveSize { width: i64, height: i64 },

    #[error("Overlay content cannot be empty")]
    EmptyContent,

    #[error("Stream id cannot be empty")]
    EmptyStreamId,
}

/// Crate-level error.
#[derive(Debug, Clone, Error)]
pub enum OverlayError {
    #[error("Validation failed: {0}")]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Overlay not found: {0}")]
    NotFound(OverlayId),

    #[error("Configuration error: {0}")]
    Config(String),

    /// A background persist task panicked or was aborted.
    #[error("Background task failed: {0}")]
    Task(String),
}

impl OverlayError {
    pub fn is_network(&self) -> bool {
        matches!(self, OverlayError::Store(StoreError::Network(_)))
    }

    pub fn is_validation(&self) -> bool {
        matches!(self, OverlayError::Validation(_))
    }
}

impl From<config::ConfigError> for OverlayError {
    fn from(err: config::ConfigError) -> Self {
        OverlayError::Config(err.to_string())
    }
}
