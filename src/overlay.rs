//! Overlay Entity Model
//!
//! A single persisted annotation composited over a stream: its identity, kind,
//! content and pixel geometry, plus the partial patches used to mutate it.

use crate::error::ValidationError;
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Default placement for new text overlays.
pub const DEFAULT_TEXT_POSITION: Position = Position { x: 50, y: 50 };
pub const DEFAULT_TEXT_SIZE: Size = Size {
    width: 200,
    height: 60,
};

/// Default placement for new image overlays.
pub const DEFAULT_IMAGE_POSITION: Position = Position { x: 100, y: 100 };
pub const DEFAULT_IMAGE_SIZE: Size = Size {
    width: 150,
    height: 150,
};

/// Store-assigned overlay identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OverlayId(String);

impl OverlayId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for OverlayId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for OverlayId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for OverlayId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// Identifier of the stream an overlay is attached to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn is_empty(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for StreamId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

/// What an overlay's `content` means.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverlayKind {
    /// `content` is displayed text.
    Text,
    /// `content` is an image URL.
    Image,
}

impl OverlayKind {
    pub fn as_str(self) -> &'static str {
        match self {
            OverlayKind::Text => "text",
            OverlayKind::Image => "image",
        }
    }

    pub fn default_position(self) -> Position {
        match self {
            OverlayKind::Text => DEFAULT_TEXT_POSITION,
            OverlayKind::Image => DEFAULT_IMAGE_POSITION,
        }
    }

    pub fn default_size(self) -> Size {
        match self {
            OverlayKind::Text => DEFAULT_TEXT_SIZE,
            OverlayKind::Image => DEFAULT_IMAGE_SIZE,
        }
    }
}

impl fmt::Display for OverlayKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Pixel offset from the compositing surface origin.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Position {
    #[serde(deserialize_with = "round_px")]
    pub x: i32,
    #[serde(deserialize_with = "round_px")]
    pub y: i32,
}

impl Position {
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }
}

/// Pixel dimensions. Both sides are positive for every value that reaches the
/// cache or the store; `Size::new` is the checked constructor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Size {
    #[serde(deserialize_with = "round_px")]
    pub width: i32,
    #[serde(deserialize_with = "round_px")]
    pub height: i32,
}

impl Size {
    pub fn new(width: i32, height: i32) -> Result<Self, ValidationError> {
        let size = Self { width, height };
        size.validate()?;
        Ok(size)
    }

    /// Force both sides to at least one pixel.
    pub fn clamped(width: i32, height: i32) -> Self {
        Self {
            width: width.max(1),
            height: height.max(1),
        }
    }

    pub fn is_positive(&self) -> bool {
        self.width > 0 && self.height > 0
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.is_positive() {
            Ok(())
        } else {
            Err(ValidationError::NonPositiveSize {
                width: self.width as i64,
                height: self.height as i64,
            })
        }
    }
}

/// Stores may hand back fractional pixels; the model is integral.
fn round_px<'de, D>(deserializer: D) -> Result<i32, D::Error>
where
    D: Deserializer<'de>,
{
    let value = f64::deserialize(deserializer)?;
    Ok(value.round().clamp(i32::MIN as f64, i32::MAX as f64) as i32)
}

/// A persisted overlay.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Overlay {
    pub id: OverlayId,
    pub kind: OverlayKind,
    pub content: String,
    pub position: Position,
    pub size: Size,
    pub stream_id: StreamId,
}

impl Overlay {
    /// Merge a patch into this overlay. Identity, kind and stream never change.
    pub fn apply(&mut self, patch: &OverlayPatch) {
        if let Some(content) = &patch.content {
            self.content = content.clone();
        }
        if let Some(position) = patch.position {
            self.position = position;
        }
        if let Some(size) = patch.size {
            self.size = size;
        }
    }

    pub fn is_text(&self) -> bool {
        self.kind == OverlayKind::Text
    }
}

/// Partial update: omitted fields are left unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OverlayPatch {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<Position>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub size: Option<Size>,
}

impl OverlayPatch {
    pub fn content(content: impl Into<String>) -> Self {
        Self {
            content: Some(content.into()),
            ..Self::default()
        }
    }

    pub fn position(x: i32, y: i32) -> Self {
        Self {
            position: Some(Position::new(x, y)),
            ..Self::default()
        }
    }

    /// Geometry commit of a resize: size and origin travel together.
    pub fn geometry(position: Position, size: Size) -> Self {
        Self {
            content: None,
            position: Some(position),
            size: Some(size),
        }
    }

    pub fn with_size(mut self, width: i32, height: i32) -> Self {
        self.size = Some(Size { width, height });
        self
    }

    pub fn is_empty(&self) -> bool {
        self.content.is_none() && self.position.is_none() && self.size.is_none()
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        match &self.size {
            Some(size) => size.validate(),
            None => Ok(()),
        }
    }

    /// Fold a later patch on top of this one; later fields win.
    pub fn merge(&mut self, later: &OverlayPatch) {
        if later.content.is_some() {
            self.content = later.content.clone();
        }
        if later.position.is_some() {
            self.position = later.position;
        }
        if later.size.is_some() {
            self.size = later.size;
        }
    }

    /// The values `overlay` currently holds for the fields this patch touches.
    pub fn inverse_for(&self, overlay: &Overlay) -> OverlayPatch {
        OverlayPatch {
            content: self.content.as_ref().map(|_| overlay.content.clone()),
            position: self.position.map(|_| overlay.position),
            size: self.size.map(|_| overlay.size),
        }
    }
}

/// Request to create an overlay; the store assigns the id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOverlay {
    pub stream_id: StreamId,
    pub kind: OverlayKind,
    pub content: String,
    pub position: Position,
    pub size: Size,
}

impl NewOverlay {
    pub fn text(stream_id: impl Into<StreamId>, text: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            kind: OverlayKind::Text,
            content: text.into(),
            position: DEFAULT_TEXT_POSITION,
            size: DEFAULT_TEXT_SIZE,
        }
    }

    pub fn image(stream_id: impl Into<StreamId>, url: impl Into<String>) -> Self {
        Self {
            stream_id: stream_id.into(),
            kind: OverlayKind::Image,
            content: url.into(),
            position: DEFAULT_IMAGE_POSITION,
            size: DEFAULT_IMAGE_SIZE,
        }
    }

    pub fn at(mut self, x: i32, y: i32) -> Self {
        self.position = Position::new(x, y);
        self
    }

    pub fn sized(mut self, width: i32, height: i32) -> Self {
        self.size = Size { width, height };
        self
    }

    /// Check and normalise (trim content) before sending to a store.
    pub fn validated(mut self) -> Result<Self, ValidationError> {
        if self.stream_id.is_empty() {
            return Err(ValidationError::EmptyStreamId);
        }
        let trimmed = self.content.trim();
        if trimmed.is_empty() {
            return Err(ValidationError::EmptyContent);
        }
        self.content = trimmed.to_string();
        self.size.validate()?;
        Ok(self)
    }

    /// The entity this request becomes once the store assigns `id`.
    pub fn into_overlay(self, id: OverlayId) -> Overlay {
        Overlay {
            id,
            kind: self.kind,
            content: self.content,
            position: self.position,
            size: self.size,
            stream_id: self.stream_id,
        }
    }
}
