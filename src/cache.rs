//! Overlay State Cache
//!
//! The in-memory source of truth for the overlays of the active stream. Local
//! edits are merged before the store is asked to persist them, so the view never
//! waits on the network; what happens when the store later refuses an edit is
//! decided by the configured `ConsistencyPolicy`.
//!
//! All state sits behind one lock that is only ever held for synchronous
//! sections. Store calls happen with the lock released.

use crate::error::OverlayError;
use crate::overlay::{NewOverlay, Overlay, OverlayId, OverlayPatch, StreamId};
use crate::store::OverlayStore;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tracing::{debug, warn};

pub const LOAD_FAILED: &str = "Failed to load overlays";
pub const ADD_FAILED: &str = "Failed to add overlay";
pub const UPDATE_FAILED: &str = "Failed to update overlay";
pub const DELETE_FAILED: &str = "Failed to delete overlay";

/// Loading/error state of the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CacheStatus {
    Idle,
    Loading,
    Ready,
    Error(String),
}

impl CacheStatus {
    pub fn error(&self) -> Option<&str> {
        match self {
            CacheStatus::Error(message) => Some(message),
            _ => None,
        }
    }
}

/// What to do with local state when the store refuses a mutation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConsistencyPolicy {
    /// Merge/remove locally first; keep the local result if the store fails.
    OptimisticNoRollback,
    /// Merge/remove locally first; undo it if the store fails and nothing newer
    /// has touched the overlay since.
    #[default]
    OptimisticWithRollback,
    /// Change local state only after the store confirms.
    Pessimistic,
}

impl ConsistencyPolicy {
    pub fn is_optimistic(self) -> bool {
        !matches!(self, ConsistencyPolicy::Pessimistic)
    }
}

#[derive(Debug, Clone)]
struct Entry {
    overlay: Overlay,
    /// Bumped on every local patch; a rollback only applies to the patch that
    /// produced the current value.
    local_rev: u64,
}

/// Keeps a local change visible to loads that may have been answered before
/// the store saw it.
#[derive(Debug, Default)]
struct LocalGuard {
    in_flight: usize,
    /// Loads issued up to this sequence number may predate the store's copy.
    fence: u64,
}

impl LocalGuard {
    fn covers(&self, seq: u64) -> bool {
        self.in_flight > 0 || seq <= self.fence
    }
}

#[derive(Debug, Default)]
struct LocalPatch {
    guard: LocalGuard,
    patch: OverlayPatch,
}

#[derive(Debug)]
struct CacheState {
    stream_id: Option<StreamId>,
    entries: Vec<Entry>,
    status: CacheStatus,
    has_loaded: bool,
    revision: u64,
    next_local_rev: u64,
    /// Bumped on stream switch; settles from an earlier session are ignored.
    session: u64,
    loads_issued: u64,
    load_applied: u64,
    local_patches: HashMap<OverlayId, LocalPatch>,
    local_deletes: HashMap<OverlayId, LocalGuard>,
    /// Acknowledged creates, fenced like settled patches.
    local_creates: HashMap<OverlayId, u64>,
}

impl CacheState {
    fn new() -> Self {
        Self {
            stream_id: None,
            entries: Vec::new(),
            status: CacheStatus::Idle,
            has_loaded: false,
            revision: 0,
            next_local_rev: 0,
            session: 0,
            loads_issued: 0,
            load_applied: 0,
            local_patches: HashMap::new(),
            local_deletes: HashMap::new(),
            local_creates: HashMap::new(),
        }
    }

    fn bump(&mut self) {
        self.revision += 1;
    }

    fn set_status(&mut self, status: CacheStatus) {
        if self.status != status {
            self.status = status;
            self.bump();
        }
    }

    fn settled_status(&self) -> CacheStatus {
        if self.has_loaded {
            CacheStatus::Ready
        } else {
            CacheStatus::Idle
        }
    }

    /// A new action starts with a clean slate for the inline error.
    fn clear_error(&mut self) {
        if matches!(self.status, CacheStatus::Error(_)) {
            let settled = self.settled_status();
            self.set_status(settled);
        }
    }

    fn position_of(&self, id: &OverlayId) -> Option<usize> {
        self.entries.iter().position(|e| &e.overlay.id == id)
    }

    fn entry_mut(&mut self, id: &OverlayId) -> Option<&mut Entry> {
        self.entries.iter_mut().find(|e| &e.overlay.id == id)
    }

    fn switch_stream(&mut self, stream_id: &StreamId) {
        if self.stream_id.as_ref() == Some(stream_id) {
            return;
        }
        debug!(stream_id = %stream_id, "Switching active stream");
        self.stream_id = Some(stream_id.clone());
        self.entries.clear();
        self.has_loaded = false;
        self.status = CacheStatus::Idle;
        self.session += 1;
        self.local_patches.clear();
        self.local_deletes.clear();
        self.local_creates.clear();
        self.bump();
    }

    /// A staged update or delete has resolved: loads issued from now on see
    /// the store's outcome.
    fn settle_patch(&mut self, id: &OverlayId, staged: bool) -> &mut LocalPatch {
        let fence = self.loads_issued;
        let local = self.local_patches.entry(id.clone()).or_default();
        if staged {
            local.guard.in_flight = local.guard.in_flight.saturating_sub(1);
        }
        local.guard.fence = fence;
        local
    }

    fn settle_delete(&mut self, id: &OverlayId, staged: bool) {
        let fence = self.loads_issued;
        let mark = self.local_deletes.entry(id.clone()).or_default();
        if staged {
            mark.in_flight = mark.in_flight.saturating_sub(1);
        }
        mark.fence = fence;
    }
}

/// Local rollback data captured when a patch is merged optimistically.
#[derive(Debug, Clone)]
struct Rollback {
    inverse: OverlayPatch,
    local_rev: u64,
}

/// An update whose local effect (if any) has been applied and whose store call
/// has not yet been made.
#[derive(Debug, Clone)]
#[must_use = "a staged update does nothing until persisted"]
pub struct PendingUpdate {
    id: OverlayId,
    patch: OverlayPatch,
    rollback: Option<Rollback>,
    session: u64,
}

impl PendingUpdate {
    pub fn id(&self) -> &OverlayId {
        &self.id
    }

    pub fn patch(&self) -> &OverlayPatch {
        &self.patch
    }
}

/// A delete whose local effect (if any) has been applied.
#[derive(Debug)]
#[must_use = "a staged delete does nothing until persisted"]
pub struct PendingRemoval {
    id: OverlayId,
    removed: Option<(usize, Entry)>,
    session: u64,
}

impl PendingRemoval {
    pub fn id(&self) -> &OverlayId {
        &self.id
    }
}

/// Authoritative overlay list for the active stream.
pub struct OverlayCache {
    store: Arc<dyn OverlayStore>,
    policy: ConsistencyPolicy,
    state: RwLock<CacheState>,
}

impl OverlayCache {
    pub fn new(store: Arc<dyn OverlayStore>, policy: ConsistencyPolicy) -> Self {
        Self {
            store,
            policy,
            state: RwLock::new(CacheState::new()),
        }
    }

    pub fn shared(store: Arc<dyn OverlayStore>, policy: ConsistencyPolicy) -> Arc<Self> {
        Arc::new(Self::new(store, policy))
    }

    pub fn status(&self) -> CacheStatus {
        self.state.read().status.clone()
    }

    pub fn is_loading(&self) -> bool {
        self.state.read().status == CacheStatus::Loading
    }

    /// Monotonic counter of visible changes (list contents or status).
    pub fn revision(&self) -> u64 {
        self.state.read().revision
    }

    pub fn stream_id(&self) -> Option<StreamId> {
        self.state.read().stream_id.clone()
    }

    /// Overlays in load order.
    pub fn snapshot(&self) -> Vec<Overlay> {
        self.state
            .read()
            .entries
            .iter()
            .map(|e| e.overlay.clone())
            .collect()
    }

    pub fn get(&self, id: &OverlayId) -> Option<Overlay> {
        self.state
            .read()
            .entries
            .iter()
            .find(|e| &e.overlay.id == id)
            .map(|e| e.overlay.clone())
    }

    pub fn len(&self) -> usize {
        self.state.read().entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.read().entries.is_empty()
    }

    pub fn dismiss_error(&self) {
        self.state.write().clear_error();
    }

    /// Replace the overlay list with the store's view of `stream_id`.
    ///
    /// `Loading` is only shown when there is nothing to display yet. On failure
    /// the previous list stays in place. Responses are applied in issue order
    /// and only while `stream_id` is still the active stream. Local changes the
    /// responding store may not have seen yet stay on top of its listing.
    pub async fn load(&self, stream_id: &StreamId) -> Result<(), OverlayError> {
        let seq = {
            let mut state = self.state.write();
            state.switch_stream(stream_id);
            state.clear_error();
            if state.entries.is_empty() {
                state.set_status(CacheStatus::Loading);
            }
            state.loads_issued += 1;
            state.loads_issued
        };

        let result = self.store.list(stream_id).await;

        let mut state = self.state.write();
        if state.stream_id.as_ref() != Some(stream_id) || seq <= state.load_applied {
            debug!(stream_id = %stream_id, seq, "Discarding superseded load response");
            return Ok(());
        }

        match result {
            Ok(listed) => {
                let mut seen = HashSet::new();
                let mut entries = Vec::with_capacity(listed.len());
                for mut overlay in listed {
                    if !seen.insert(overlay.id.clone()) {
                        warn!(overlay_id = %overlay.id, "Store returned duplicate overlay id");
                        continue;
                    }
                    if state
                        .local_deletes
                        .get(&overlay.id)
                        .is_some_and(|mark| mark.covers(seq))
                    {
                        continue;
                    }
                    if let Some(local) = state.local_patches.get(&overlay.id) {
                        if local.guard.covers(seq) {
                            overlay.apply(&local.patch);
                        }
                    }
                    let local_rev = state
                        .entries
                        .iter()
                        .find(|e| e.overlay.id == overlay.id)
                        .map_or(0, |e| e.local_rev);
                    entries.push(Entry { overlay, local_rev });
                }
                for entry in &state.entries {
                    let created_later = state
                        .local_creates
                        .get(&entry.overlay.id)
                        .is_some_and(|fence| seq <= *fence);
                    if created_later && seen.insert(entry.overlay.id.clone()) {
                        entries.push(entry.clone());
                    }
                }

                let changed = entries.len() != state.entries.len()
                    || entries
                        .iter()
                        .zip(state.entries.iter())
                        .any(|(a, b)| a.overlay != b.overlay);
                state.entries = entries;
                state.load_applied = seq;
                state.local_patches.retain(|_, local| local.guard.covers(seq));
                state.local_deletes.retain(|_, mark| mark.covers(seq));
                state.local_creates.retain(|_, fence| seq <= *fence);
                state.has_loaded = true;
                if changed {
                    state.bump();
                }
                state.set_status(CacheStatus::Ready);
                debug!(stream_id = %stream_id, count = state.entries.len(), "Overlays loaded");
                Ok(())
            }
            Err(err) => {
                warn!(stream_id = %stream_id, error = %err, "{}", LOAD_FAILED);
                if state.status == CacheStatus::Loading {
                    state.status = state.settled_status();
                }
                state.set_status(CacheStatus::Error(LOAD_FAILED.to_string()));
                Err(err.into())
            }
        }
    }

    /// Create an overlay. Nothing is shown until the store has acknowledged it;
    /// the acknowledged entity is appended unless a load already delivered it.
    pub async fn add(&self, overlay: NewOverlay) -> Result<Overlay, OverlayError> {
        let overlay = match overlay.validated() {
            Ok(overlay) => overlay,
            Err(err) => {
                self.record_failure(ADD_FAILED);
                return Err(err.into());
            }
        };
        self.state.write().clear_error();

        match self.store.create(&overlay).await {
            Ok(created) => {
                let mut state = self.state.write();
                let active = state.stream_id.as_ref() == Some(&created.stream_id);
                if active
                    && state.position_of(&created.id).is_none()
                    && !state.local_deletes.contains_key(&created.id)
                {
                    state.entries.push(Entry {
                        overlay: created.clone(),
                        local_rev: 0,
                    });
                    let fence = state.loads_issued;
                    state.local_creates.insert(created.id.clone(), fence);
                    state.bump();
                }
                debug!(overlay_id = %created.id, "Overlay created");
                Ok(created)
            }
            Err(err) => {
                warn!(stream_id = %overlay.stream_id, error = %err, "{}", ADD_FAILED);
                self.record_failure(ADD_FAILED);
                Err(err.into())
            }
        }
    }

    /// Merge `patch` locally and persist it.
    pub async fn update(&self, id: &OverlayId, patch: OverlayPatch) -> Result<(), OverlayError> {
        let pending = self.stage_update(id, patch)?;
        self.persist(pending).await
    }

    /// Apply the local half of an update synchronously. Under an optimistic
    /// policy the merged overlay is visible as soon as this returns.
    pub fn stage_update(
        &self,
        id: &OverlayId,
        patch: OverlayPatch,
    ) -> Result<PendingUpdate, OverlayError> {
        if let Err(err) = patch.validate() {
            self.record_failure(UPDATE_FAILED);
            return Err(err.into());
        }

        let mut state = self.state.write();
        state.clear_error();
        if state.position_of(id).is_none() {
            return Err(OverlayError::NotFound(id.clone()));
        }
        if patch.is_empty() || !self.policy.is_optimistic() {
            return Ok(PendingUpdate {
                id: id.clone(),
                patch,
                rollback: None,
                session: state.session,
            });
        }

        state.next_local_rev += 1;
        let local_rev = state.next_local_rev;
        let entry = state
            .entry_mut(id)
            .ok_or_else(|| OverlayError::NotFound(id.clone()))?;
        let inverse = patch.inverse_for(&entry.overlay);
        entry.overlay.apply(&patch);
        entry.local_rev = local_rev;

        let local = state.local_patches.entry(id.clone()).or_default();
        local.guard.in_flight += 1;
        local.patch.merge(&patch);
        state.bump();

        Ok(PendingUpdate {
            id: id.clone(),
            patch,
            rollback: Some(Rollback { inverse, local_rev }),
            session: state.session,
        })
    }

    /// Send a staged update to the store and settle local state with the
    /// outcome. A success never writes back over newer local edits.
    pub async fn persist(&self, pending: PendingUpdate) -> Result<(), OverlayError> {
        if pending.patch.is_empty() {
            return Ok(());
        }

        let result = self.store.update(&pending.id, &pending.patch).await;

        let mut state = self.state.write();
        let current = pending.session == state.session;
        let staged = pending.rollback.is_some();

        match result {
            Ok(()) => {
                if current && !self.policy.is_optimistic() {
                    if let Some(entry) = state.entry_mut(&pending.id) {
                        entry.overlay.apply(&pending.patch);
                        state.bump();
                    }
                    state
                        .settle_patch(&pending.id, false)
                        .patch
                        .merge(&pending.patch);
                } else if current {
                    state.settle_patch(&pending.id, staged);
                }
                Ok(())
            }
            Err(err) => {
                warn!(overlay_id = %pending.id, error = %err, "{}", UPDATE_FAILED);
                if current && staged {
                    state.settle_patch(&pending.id, true);
                }
                if current && self.policy == ConsistencyPolicy::OptimisticWithRollback {
                    if let Some(rollback) = &pending.rollback {
                        if Self::roll_back_update(&mut state, &pending.id, rollback) {
                            if let Some(local) = state.local_patches.get_mut(&pending.id) {
                                local.patch.merge(&rollback.inverse);
                            }
                        }
                    }
                }
                state.set_status(CacheStatus::Error(UPDATE_FAILED.to_string()));
                Err(err.into())
            }
        }
    }

    fn roll_back_update(state: &mut CacheState, id: &OverlayId, rollback: &Rollback) -> bool {
        let restored = match state.entry_mut(id) {
            Some(entry) if entry.local_rev == rollback.local_rev => {
                entry.overlay.apply(&rollback.inverse);
                true
            }
            _ => false,
        };
        if restored {
            debug!(overlay_id = %id, "Rolled back failed update");
            state.bump();
        }
        restored
    }

    /// Remove an overlay: locally first under an optimistic policy, then from
    /// the store.
    pub async fn remove(&self, id: &OverlayId) -> Result<(), OverlayError> {
        let pending = self.stage_remove(id)?;
        self.persist_remove(pending).await
    }

    /// Apply the local half of a delete synchronously.
    pub fn stage_remove(&self, id: &OverlayId) -> Result<PendingRemoval, OverlayError> {
        let mut state = self.state.write();
        state.clear_error();
        let index = state
            .position_of(id)
            .ok_or_else(|| OverlayError::NotFound(id.clone()))?;
        let removed = if self.policy.is_optimistic() {
            let entry = state.entries.remove(index);
            state.local_deletes.entry(id.clone()).or_default().in_flight += 1;
            state.bump();
            Some((index, entry))
        } else {
            None
        };
        Ok(PendingRemoval {
            id: id.clone(),
            removed,
            session: state.session,
        })
    }

    pub async fn persist_remove(&self, pending: PendingRemoval) -> Result<(), OverlayError> {
        let PendingRemoval {
            id,
            removed,
            session,
        } = pending;
        let result = self.store.delete(&id).await;

        let mut state = self.state.write();
        let current = session == state.session;
        if current && removed.is_some() {
            state.settle_delete(&id, true);
        }
        match result {
            Ok(()) => {
                if current {
                    if let Some(index) = state.position_of(&id) {
                        state.entries.remove(index);
                        state.bump();
                    }
                    state.settle_delete(&id, false);
                    state.local_patches.remove(&id);
                }
                debug!(overlay_id = %id, "Overlay deleted");
                Ok(())
            }
            Err(err) => {
                warn!(overlay_id = %id, error = %err, "{}", DELETE_FAILED);
                if current && self.policy == ConsistencyPolicy::OptimisticWithRollback {
                    if let Some((index, entry)) = removed {
                        if state.position_of(&id).is_none() {
                            let index = index.min(state.entries.len());
                            state.entries.insert(index, entry);
                            state.bump();
                        }
                        if state
                            .local_deletes
                            .get(&id)
                            .is_some_and(|mark| mark.in_flight == 0)
                        {
                            state.local_deletes.remove(&id);
                        }
                    }
                }
                state.set_status(CacheStatus::Error(DELETE_FAILED.to_string()));
                Err(err.into())
            }
        }
    }

    fn record_failure(&self, message: &str) {
        self.state
            .write()
            .set_status(CacheStatus::Error(message.to_string()));
    }
}
