//! Overlay Store
//!
//! Request/response contract to the overlay persistence service. The cache only
//! talks to `dyn OverlayStore`; `HttpOverlayStore` speaks the JSON wire format and
//! `InMemoryOverlayStore` runs in-process.

pub mod http;
pub mod memory;
mod wire;

pub use http::HttpOverlayStore;
pub use memory::{InMemoryOverlayStore, StoreCall, StoreOp};

use crate::error::StoreError;
use crate::overlay::{NewOverlay, Overlay, OverlayId, OverlayPatch, StreamId};
use async_trait::async_trait;

/// Remote overlay persistence.
///
/// Every call either completes or fails with `StoreError`; there is no retry at
/// this layer.
#[async_trait]
pub trait OverlayStore: Send + Sync {
    /// All overlays of a stream, in the order the store returns them.
    async fn list(&self, stream_id: &StreamId) -> Result<Vec<Overlay>, StoreError>;

    /// Create an overlay and return it with its store-assigned id.
    async fn create(&self, overlay: &NewOverlay) -> Result<Overlay, StoreError>;

    /// Apply a partial patch; omitted fields are left unchanged.
    async fn update(&self, id: &OverlayId, patch: &OverlayPatch) -> Result<(), StoreError>;

    async fn delete(&self, id: &OverlayId) -> Result<(), StoreError>;

    /// Human-readable location of the store, for logs.
    fn describe(&self) -> String;
}
