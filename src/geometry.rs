//! Interactive Geometry Controller
//!
//! One controller per rendered overlay. Pointer input moves a transient
//! `InteractionFrame`; nothing leaves the controller until a gesture ends, at
//! which point a single patch is emitted for the cache to persist.
//!
//! Time never comes from a clock in here. Callers pass `Instant`s, which keeps
//! the hover grace period deterministic under test and independent of whichever
//! event loop drives the controller.

use crate::overlay::{Overlay, OverlayId, OverlayKind, OverlayPatch, Position, Size};
use std::time::{Duration, Instant};

pub const DEFAULT_HANDLE_HIDE_DELAY: Duration = Duration::from_millis(300);
pub const MIN_FONT_SIZE: f32 = 8.0;
pub const MAX_FONT_SIZE: f32 = 72.0;
const MIN_DIMENSION: f64 = 1.0;

/// Pointer location in surface pixels.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub const fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

/// Transient geometry while a gesture is in progress.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InteractionFrame {
    pub translate_x: f64,
    pub translate_y: f64,
    pub width: f64,
    pub height: f64,
}

impl InteractionFrame {
    pub fn from_overlay(overlay: &Overlay) -> Self {
        Self {
            translate_x: overlay.position.x as f64,
            translate_y: overlay.position.y as f64,
            width: overlay.size.width as f64,
            height: overlay.size.height as f64,
        }
    }

    pub fn position(&self) -> Position {
        Position::new(
            self.translate_x.round() as i32,
            self.translate_y.round() as i32,
        )
    }

    pub fn size(&self) -> Size {
        Size::clamped(self.width.round() as i32, self.height.round() as i32)
    }

    /// Derived text size: `min(width / 8, height / 3)` within the font bounds.
    pub fn font_size(&self) -> f32 {
        let fitted = (self.width / 8.0).min(self.height / 3.0) as f32;
        fitted.clamp(MIN_FONT_SIZE, MAX_FONT_SIZE)
    }
}

/// Corner resize handles; the opposite corner stays put.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Handle {
    NorthWest,
    NorthEast,
    SouthWest,
    SouthEast,
}

impl Handle {
    pub const ALL: [Handle; 4] = [
        Handle::NorthWest,
        Handle::NorthEast,
        Handle::SouthWest,
        Handle::SouthEast,
    ];

    fn moves_left_edge(self) -> bool {
        matches!(self, Handle::NorthWest | Handle::SouthWest)
    }

    fn moves_top_edge(self) -> bool {
        matches!(self, Handle::NorthWest | Handle::NorthEast)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Handle::NorthWest => "nw",
            Handle::NorthEast => "ne",
            Handle::SouthWest => "sw",
            Handle::SouthEast => "se",
        }
    }
}

/// Externally visible gesture state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GesturePhase {
    Idle,
    DragArmed,
    Dragging,
    ResizeArmed(Handle),
    Resizing(Handle),
}

#[derive(Debug, Clone, Copy)]
enum Gesture {
    Idle,
    Drag {
        start: Point,
        origin: InteractionFrame,
        moved: bool,
    },
    Resize {
        handle: Handle,
        start: Point,
        origin: InteractionFrame,
        moved: bool,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Hover {
    Outside,
    Inside,
    Leaving { hide_at: Instant },
}

/// A discrete change produced by the end of a gesture or an edit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Commit {
    pub id: OverlayId,
    pub patch: OverlayPatch,
}

pub struct GeometryController {
    overlay: Overlay,
    frame: InteractionFrame,
    gesture: Gesture,
    hover: Hover,
    hide_delay: Duration,
    editing: bool,
}

impl GeometryController {
    pub fn new(overlay: Overlay, hide_delay: Duration) -> Self {
        let frame = InteractionFrame::from_overlay(&overlay);
        Self {
            overlay,
            frame,
            gesture: Gesture::Idle,
            hover: Hover::Outside,
            hide_delay,
            editing: false,
        }
    }

    pub fn id(&self) -> &OverlayId {
        &self.overlay.id
    }

    /// Last known persisted state.
    pub fn overlay(&self) -> &Overlay {
        &self.overlay
    }

    pub fn frame(&self) -> InteractionFrame {
        self.frame
    }

    pub fn phase(&self) -> GesturePhase {
        match self.gesture {
            Gesture::Idle => GesturePhase::Idle,
            Gesture::Drag { moved: false, .. } => GesturePhase::DragArmed,
            Gesture::Drag { moved: true, .. } => GesturePhase::Dragging,
            Gesture::Resize {
                handle,
                moved: false,
                ..
            } => GesturePhase::ResizeArmed(handle),
            Gesture::Resize {
                handle, moved: true, ..
            } => GesturePhase::Resizing(handle),
        }
    }

    pub fn is_gesture_active(&self) -> bool {
        !matches!(self.gesture, Gesture::Idle)
    }

    pub fn is_editing(&self) -> bool {
        self.editing
    }

    /// Font size for text overlays, `None` for images.
    pub fn font_size(&self) -> Option<f32> {
        match self.overlay.kind {
            OverlayKind::Text => Some(self.frame.font_size()),
            OverlayKind::Image => None,
        }
    }

    /// Press on the overlay body. A gesture already in progress is abandoned
    /// and the drag starts from wherever the frame currently is.
    pub fn pointer_down(&mut self, at: Point) {
        self.gesture = Gesture::Drag {
            start: at,
            origin: self.frame,
            moved: false,
        };
    }

    /// Press on a resize handle.
    pub fn handle_down(&mut self, handle: Handle, at: Point) {
        self.gesture = Gesture::Resize {
            handle,
            start: at,
            origin: self.frame,
            moved: false,
        };
    }

    pub fn pointer_move(&mut self, at: Point) {
        match &mut self.gesture {
            Gesture::Idle => {}
            Gesture::Drag {
                start,
                origin,
                moved,
            } => {
                *moved = true;
                self.frame = InteractionFrame {
                    translate_x: origin.translate_x + (at.x - start.x),
                    translate_y: origin.translate_y + (at.y - start.y),
                    ..*origin
                };
            }
            Gesture::Resize {
                handle,
                start,
                origin,
                moved,
            } => {
                *moved = true;
                self.frame = resize_frame(origin, *handle, at.x - start.x, at.y - start.y);
            }
        }
    }

    /// Release. Emits at most one commit per gesture, and only when the
    /// committed geometry differs from what is persisted.
    pub fn pointer_up(&mut self) -> Option<Commit> {
        let gesture = std::mem::replace(&mut self.gesture, Gesture::Idle);
        let patch = match gesture {
            Gesture::Idle
            | Gesture::Drag { moved: false, .. }
            | Gesture::Resize { moved: false, .. } => return None,
            Gesture::Drag { .. } => {
                let position = self.frame.position();
                if position == self.overlay.position {
                    return None;
                }
                OverlayPatch {
                    position: Some(position),
                    ..OverlayPatch::default()
                }
            }
            Gesture::Resize { .. } => {
                let position = self.frame.position();
                let size = self.frame.size();
                if position == self.overlay.position && size == self.overlay.size {
                    return None;
                }
                OverlayPatch::geometry(position, size)
            }
        };
        self.overlay.apply(&patch);
        self.frame = InteractionFrame::from_overlay(&self.overlay);
        Some(Commit {
            id: self.overlay.id.clone(),
            patch,
        })
    }

    /// Abort the current gesture and snap back to the persisted geometry.
    pub fn cancel_gesture(&mut self) {
        if self.is_gesture_active() {
            self.gesture = Gesture::Idle;
            self.frame = InteractionFrame::from_overlay(&self.overlay);
        }
    }

    pub fn pointer_enter(&mut self, _now: Instant) {
        self.hover = Hover::Inside;
    }

    pub fn pointer_leave(&mut self, now: Instant) {
        if self.hover == Hover::Inside {
            self.hover = Hover::Leaving {
                hide_at: now + self.hide_delay,
            };
        }
    }

    /// Whether resize/drag affordances are shown at `now`.
    pub fn handles_visible(&self, now: Instant) -> bool {
        if self.is_gesture_active() {
            return true;
        }
        match self.hover {
            Hover::Inside => true,
            Hover::Leaving { hide_at } => now < hide_at,
            Hover::Outside => false,
        }
    }

    /// When a pending hide will take effect, if one is pending.
    pub fn hide_deadline(&self) -> Option<Instant> {
        match self.hover {
            Hover::Leaving { hide_at } => Some(hide_at),
            _ => None,
        }
    }

    /// Fold an expired grace period into the outside state.
    pub fn tick(&mut self, now: Instant) {
        if let Hover::Leaving { hide_at } = self.hover {
            if now >= hide_at {
                self.hover = Hover::Outside;
            }
        }
    }

    /// Start editing text content. Images have nothing to edit.
    pub fn begin_edit(&mut self) -> bool {
        self.editing = self.overlay.is_text();
        self.editing
    }

    /// Focus left the text region. Unchanged text produces nothing.
    pub fn finish_edit(&mut self, text: &str) -> Option<Commit> {
        let was_editing = std::mem::replace(&mut self.editing, false);
        if !was_editing || !self.overlay.is_text() || text == self.overlay.content {
            return None;
        }
        let patch = OverlayPatch::content(text);
        self.overlay.apply(&patch);
        Some(Commit {
            id: self.overlay.id.clone(),
            patch,
        })
    }

    /// Take in the persisted state. The frame is only reset when no gesture is
    /// running; returns whether it was.
    pub fn sync_from(&mut self, overlay: &Overlay) -> bool {
        if &self.overlay != overlay {
            self.overlay = overlay.clone();
        }
        if self.is_gesture_active() {
            return false;
        }
        let frame = InteractionFrame::from_overlay(&self.overlay);
        if frame == self.frame {
            return false;
        }
        self.frame = frame;
        true
    }
}

/// Resize `origin` by a pointer delta on `handle`, keeping the opposite corner
/// fixed and both sides at least one pixel.
fn resize_frame(origin: &InteractionFrame, handle: Handle, dx: f64, dy: f64) -> InteractionFrame {
    let right = origin.translate_x + origin.width;
    let bottom = origin.translate_y + origin.height;

    let width = if handle.moves_left_edge() {
        origin.width - dx
    } else {
        origin.width + dx
    }
    .max(MIN_DIMENSION);
    let height = if handle.moves_top_edge() {
        origin.height - dy
    } else {
        origin.height + dy
    }
    .max(MIN_DIMENSION);

    InteractionFrame {
        translate_x: if handle.moves_left_edge() {
            right - width
        } else {
            origin.translate_x
        },
        translate_y: if handle.moves_top_edge() {
            bottom - height
        } else {
            origin.translate_y
        },
        width,
        height,
    }
}
