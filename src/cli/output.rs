//! CLI output: error mapping from domain errors to stable CLI surface.

use crate::error::{OverlayError, StoreError};

/// Map domain errors to a string for CLI output.
pub fn map_error(e: &OverlayError) -> String {
    match e {
        OverlayError::Store(StoreError::Network(msg)) => {
            format!("Could not reach the overlay store: {}", msg)
        }
        OverlayError::Store(StoreError::RemoteRejected { status, message }) => {
            format!("Overlay store refused the request ({}): {}", status, message)
        }
        other => other.to_string(),
    }
}
