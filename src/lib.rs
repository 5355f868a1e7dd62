//! Layover: live-stream overlay synchronization
//!
//! Keeps a client-side view of the text and image overlays placed on a live
//! stream in step with a remote overlay store, and turns pointer gestures on
//! those overlays into persisted geometry changes.
//!
//! - [`overlay`]: the overlay entity and its patches
//! - [`store`]: the remote store contract, over HTTP or in memory
//! - [`cache`]: the authoritative overlay list for the active stream
//! - [`geometry`]: per-overlay drag, resize, hover and edit state
//! - [`compositor`]: ties the cache and controllers together and polls

pub mod cache;
pub mod cli;
pub mod compositor;
pub mod config;
pub mod error;
pub mod geometry;
pub mod logging;
pub mod overlay;
pub mod store;

pub use cache::{CacheStatus, ConsistencyPolicy, OverlayCache};
pub use compositor::{Compositor, CompositorOptions, RenderedOverlay, Surface};
pub use error::{OverlayError, StoreError, ValidationError};
pub use overlay::{
    NewOverlay, Overlay, OverlayId, OverlayKind, OverlayPatch, Position, Size, StreamId,
};
