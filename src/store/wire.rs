//! JSON shapes exchanged with the overlay service.

use crate::overlay::{NewOverlay, Overlay, OverlayId, OverlayKind, Position, Size, StreamId};
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Deserialize)]
pub(crate) struct WireOverlay {
    #[serde(rename = "_id")]
    id: OverlayId,
    #[serde(rename = "type")]
    kind: OverlayKind,
    #[serde(default)]
    content: String,
    /// The store accepts documents without geometry.
    #[serde(default)]
    position: Option<Position>,
    #[serde(default)]
    size: Option<Size>,
    #[serde(default)]
    stream_id: Option<StreamId>,
}

impl WireOverlay {
    /// Missing geometry takes the kind's defaults.
    pub(crate) fn into_overlay(self, fallback_stream: &StreamId) -> Overlay {
        let position = self.kind.default_position();
        let size = self.kind.default_size();
        self.into_overlay_or(fallback_stream, position, size)
    }

    /// Degenerate sizes coming back from the store are clamped rather than
    /// admitted into the cache.
    fn into_overlay_or(
        self,
        fallback_stream: &StreamId,
        position: Position,
        size: Size,
    ) -> Overlay {
        let size = self.size.unwrap_or(size);
        Overlay {
            id: self.id,
            kind: self.kind,
            content: self.content,
            position: self.position.unwrap_or(position),
            size: Size::clamped(size.width, size.height),
            stream_id: self.stream_id.unwrap_or_else(|| fallback_stream.clone()),
        }
    }
}

/// Decode a stream listing row by row. A row that is not an overlay is
/// skipped so the rest of the stream still loads.
pub(crate) fn decode_listing(rows: Vec<serde_json::Value>, stream_id: &StreamId) -> Vec<Overlay> {
    rows.into_iter()
        .filter_map(|row| match serde_json::from_value::<WireOverlay>(row) {
            Ok(entry) => Some(entry.into_overlay(stream_id)),
            Err(e) => {
                warn!(stream_id = %stream_id, error = %e, "Skipping undecodable overlay");
                None
            }
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub(crate) struct CreateRequest<'a> {
    #[serde(rename = "type")]
    kind: OverlayKind,
    content: &'a str,
    position: Position,
    size: Size,
    stream_id: &'a StreamId,
}

impl<'a> From<&'a NewOverlay> for CreateRequest<'a> {
    fn from(overlay: &'a NewOverlay) -> Self {
        Self {
            kind: overlay.kind,
            content: &overlay.content,
            position: overlay.position,
            size: overlay.size,
            stream_id: &overlay.stream_id,
        }
    }
}

/// Minimal acknowledgement of a create: `{"_id": "...", ...}`.
#[derive(Debug, Deserialize)]
pub(crate) struct CreateAck {
    #[serde(rename = "_id")]
    pub(crate) id: OverlayId,
}

/// `{"error": "..."}` bodies on rejected requests.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBody {
    pub(crate) error: String,
}

/// Resolve a create response: a full entity if the store sent one, otherwise
/// the request plus the acknowledged id.
pub(crate) fn created_overlay(
    body: serde_json::Value,
    request: &NewOverlay,
) -> Result<Overlay, serde_json::Error> {
    match serde_json::from_value::<WireOverlay>(body.clone()) {
        Ok(full) => Ok(full.into_overlay_or(&request.stream_id, request.position, request.size)),
        Err(_) => {
            let ack: CreateAck = serde_json::from_value(body)?;
            Ok(request.clone().into_overlay(ack.id))
        }
    }
}
