//! Overlay Compositor
//!
//! Bridges the overlay cache to one `GeometryController` per overlay, routes
//! input to the right controller, turns finished gestures into persisted
//! updates, and keeps the cache fresh with a periodic reload while mounted.

use crate::cache::OverlayCache;
use crate::config::CompositorConfig;
use crate::error::OverlayError;
use crate::geometry::{
    Commit, GeometryController, GesturePhase, Handle, InteractionFrame, Point,
    DEFAULT_HANDLE_HIDE_DELAY,
};
use crate::overlay::{OverlayId, OverlayKind, StreamId};
use futures::future::join_all;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

/// Pixel box of the video element the overlays sit on.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Surface {
    pub width: u32,
    pub height: u32,
}

impl Surface {
    pub const fn new(width: u32, height: u32) -> Self {
        Self { width, height }
    }

    fn intersects(&self, frame: &InteractionFrame) -> bool {
        frame.translate_x < self.width as f64
            && frame.translate_y < self.height as f64
            && frame.translate_x + frame.width > 0.0
            && frame.translate_y + frame.height > 0.0
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CompositorOptions {
    pub poll_interval: Duration,
    pub handle_hide_delay: Duration,
}

impl Default for CompositorOptions {
    fn default() -> Self {
        Self {
            poll_interval: DEFAULT_POLL_INTERVAL,
            handle_hide_delay: DEFAULT_HANDLE_HIDE_DELAY,
        }
    }
}

impl From<&CompositorConfig> for CompositorOptions {
    fn from(config: &CompositorConfig) -> Self {
        Self {
            poll_interval: Duration::from_millis(config.poll_interval_ms),
            handle_hide_delay: Duration::from_millis(config.handle_hide_delay_ms),
        }
    }
}

/// One overlay as it should be drawn right now.
#[derive(Debug, Clone, PartialEq)]
pub struct RenderedOverlay {
    pub id: OverlayId,
    pub kind: OverlayKind,
    pub content: String,
    pub frame: InteractionFrame,
    pub font_size: Option<f32>,
    pub handles_visible: bool,
    pub phase: GesturePhase,
    pub editing: bool,
    /// Whether any part of the frame lies on the surface.
    pub on_surface: bool,
}

pub struct Compositor {
    cache: Arc<OverlayCache>,
    stream_id: StreamId,
    surface: Surface,
    options: CompositorOptions,
    controllers: HashMap<OverlayId, GeometryController>,
    seen_revision: Option<u64>,
    cancel: CancellationToken,
    poll_task: Option<JoinHandle<()>>,
    in_flight: Vec<JoinHandle<Result<(), OverlayError>>>,
}

impl Compositor {
    /// Load the stream's overlays and start the background poll.
    ///
    /// A failed initial load is not an error here: it is reflected in the
    /// cache status and the poll keeps trying.
    pub async fn mount(
        cache: Arc<OverlayCache>,
        stream_id: StreamId,
        surface: Surface,
        options: CompositorOptions,
    ) -> Self {
        info!(
            stream_id = %stream_id,
            poll_ms = options.poll_interval.as_millis() as u64,
            "Mounting overlay compositor"
        );
        if let Err(e) = cache.load(&stream_id).await {
            warn!(stream_id = %stream_id, error = %e, "Initial overlay load failed");
        }

        let cancel = CancellationToken::new();
        let poll_task = tokio::spawn(poll_loop(
            cache.clone(),
            stream_id.clone(),
            options.poll_interval,
            cancel.clone(),
        ));

        let mut compositor = Self {
            cache,
            stream_id,
            surface,
            options,
            controllers: HashMap::new(),
            seen_revision: None,
            cancel,
            poll_task: Some(poll_task),
            in_flight: Vec::new(),
        };
        compositor.reconcile();
        compositor
    }

    /// Stop polling. A poll that is waiting on the store is dropped and its
    /// response never reaches the cache.
    pub async fn unmount(mut self) {
        info!(stream_id = %self.stream_id, "Unmounting overlay compositor");
        self.cancel.cancel();
        if let Some(task) = self.poll_task.take() {
            let _ = task.await;
        }
    }

    pub fn cache(&self) -> &Arc<OverlayCache> {
        &self.cache
    }

    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    pub fn surface(&self) -> Surface {
        self.surface
    }

    pub fn set_surface(&mut self, surface: Surface) {
        self.surface = surface;
    }

    pub fn controller(&self, id: &OverlayId) -> Option<&GeometryController> {
        self.controllers.get(id)
    }

    /// Reload now, outside the poll schedule.
    pub async fn refresh(&mut self) -> Result<(), OverlayError> {
        let result = self.cache.load(&self.stream_id).await;
        self.reconcile();
        result
    }

    /// Bring controllers in line with the cache: new overlays get a controller,
    /// vanished ones lose theirs, the rest take in persisted state without
    /// disturbing a gesture in progress.
    pub fn reconcile(&mut self) {
        let revision = self.cache.revision();
        if self.seen_revision == Some(revision) {
            return;
        }
        self.seen_revision = Some(revision);

        let snapshot = self.cache.snapshot();
        self.controllers
            .retain(|id, _| snapshot.iter().any(|overlay| &overlay.id == id));
        for overlay in snapshot {
            match self.controllers.get_mut(&overlay.id) {
                Some(controller) => {
                    controller.sync_from(&overlay);
                }
                None => {
                    let controller =
                        GeometryController::new(overlay.clone(), self.options.handle_hide_delay);
                    self.controllers.insert(overlay.id, controller);
                }
            }
        }
    }

    /// The draw list, in cache order. Empty while the first load is running.
    pub fn render(&mut self, now: Instant) -> Vec<RenderedOverlay> {
        self.reconcile();
        if self.cache.is_loading() {
            return Vec::new();
        }
        let mut rendered = Vec::new();
        for overlay in self.cache.snapshot() {
            let Some(controller) = self.controllers.get_mut(&overlay.id) else {
                continue;
            };
            controller.tick(now);
            let frame = controller.frame();
            rendered.push(RenderedOverlay {
                id: overlay.id.clone(),
                kind: controller.overlay().kind,
                content: controller.overlay().content.clone(),
                frame,
                font_size: controller.font_size(),
                handles_visible: controller.handles_visible(now),
                phase: controller.phase(),
                editing: controller.is_editing(),
                on_surface: self.surface.intersects(&frame),
            });
        }
        rendered
    }

    pub fn pointer_down(&mut self, id: &OverlayId, at: Point) -> bool {
        self.with_controller(id, |c| c.pointer_down(at))
    }

    pub fn handle_down(&mut self, id: &OverlayId, handle: Handle, at: Point) -> bool {
        self.with_controller(id, |c| c.handle_down(handle, at))
    }

    pub fn pointer_move(&mut self, id: &OverlayId, at: Point) -> bool {
        self.with_controller(id, |c| c.pointer_move(at))
    }

    pub fn pointer_enter(&mut self, id: &OverlayId, now: Instant) -> bool {
        self.with_controller(id, |c| c.pointer_enter(now))
    }

    pub fn pointer_leave(&mut self, id: &OverlayId, now: Instant) -> bool {
        self.with_controller(id, |c| c.pointer_leave(now))
    }

    pub fn cancel_gesture(&mut self, id: &OverlayId) -> bool {
        let cancelled = self.with_controller(id, |c| c.cancel_gesture());
        // Whatever the cache moved to meanwhile applies now.
        if let (Some(controller), Some(overlay)) =
            (self.controllers.get_mut(id), self.cache.get(id))
        {
            controller.sync_from(&overlay);
        }
        cancelled
    }

    /// End a gesture; a resulting commit is applied to the cache immediately
    /// and persisted in the background.
    pub fn pointer_up(&mut self, id: &OverlayId) -> Option<Commit> {
        let commit = self.controllers.get_mut(id)?.pointer_up()?;
        self.dispatch(&commit);
        Some(commit)
    }

    pub fn begin_edit(&mut self, id: &OverlayId) -> bool {
        self.controllers
            .get_mut(id)
            .map(|c| c.begin_edit())
            .unwrap_or(false)
    }

    pub fn finish_edit(&mut self, id: &OverlayId, text: &str) -> Option<Commit> {
        let commit = self.controllers.get_mut(id)?.finish_edit(text)?;
        self.dispatch(&commit);
        Some(commit)
    }

    /// Delete an overlay. It disappears from the draw list at once under an
    /// optimistic policy.
    pub fn delete(&mut self, id: &OverlayId) -> Result<(), OverlayError> {
        self.in_flight.retain(|task| !task.is_finished());
        let pending = self.cache.stage_remove(id)?;
        let cache = self.cache.clone();
        self.in_flight
            .push(tokio::spawn(async move { cache.persist_remove(pending).await }));
        self.reconcile();
        Ok(())
    }

    /// Wait for every background persist issued so far and return the
    /// failures. Failures are also reflected in the cache status.
    pub async fn settle(&mut self) -> Vec<OverlayError> {
        let tasks = std::mem::take(&mut self.in_flight);
        let results = join_all(tasks).await;
        let failures = results
            .into_iter()
            .filter_map(|joined| match joined {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e),
                Err(join_err) => Some(OverlayError::Task(join_err.to_string())),
            })
            .collect();
        self.reconcile();
        failures
    }

    fn with_controller(
        &mut self,
        id: &OverlayId,
        f: impl FnOnce(&mut GeometryController),
    ) -> bool {
        match self.controllers.get_mut(id) {
            Some(controller) => {
                f(controller);
                true
            }
            None => false,
        }
    }

    fn dispatch(&mut self, commit: &Commit) {
        self.in_flight.retain(|task| !task.is_finished());
        match self.cache.stage_update(&commit.id, commit.patch.clone()) {
            Ok(pending) => {
                debug!(overlay_id = %commit.id, "Persisting overlay commit");
                let cache = self.cache.clone();
                self.in_flight
                    .push(tokio::spawn(async move { cache.persist(pending).await }));
            }
            Err(e) => {
                warn!(overlay_id = %commit.id, error = %e, "Overlay commit rejected locally");
            }
        }
    }
}

impl Drop for Compositor {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn poll_loop(
    cache: Arc<OverlayCache>,
    stream_id: StreamId,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval_at(tokio::time::Instant::now() + period, period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => break,
            _ = interval.tick() => {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    result = cache.load(&stream_id) => {
                        if let Err(e) = result {
                            debug!(stream_id = %stream_id, error = %e, "Overlay poll failed");
                        }
                    }
                }
            }
        }
    }
    debug!(stream_id = %stream_id, "Overlay poll stopped");
}
