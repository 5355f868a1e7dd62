//! In-process overlay store.
//!
//! Keeps overlays in memory with the same ordering and id semantics as the HTTP
//! service. Every call is journaled; failures can be queued per operation and an
//! operation can be held open until released, which is how the cache's ordering
//! guarantees are exercised without a server.

use super::OverlayStore;
use crate::error::StoreError;
use crate::overlay::{NewOverlay, Overlay, OverlayId, OverlayPatch, StreamId};
use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use tokio::sync::Semaphore;

/// Store operation kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    List,
    Create,
    Update,
    Delete,
}

/// A call as received by the store, before it resolves.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreCall {
    List(StreamId),
    Create(NewOverlay),
    Update(OverlayId, OverlayPatch),
    Delete(OverlayId),
}

impl StoreCall {
    pub fn op(&self) -> StoreOp {
        match self {
            StoreCall::List(_) => StoreOp::List,
            StoreCall::Create(_) => StoreOp::Create,
            StoreCall::Update(..) => StoreOp::Update,
            StoreCall::Delete(_) => StoreOp::Delete,
        }
    }
}

#[derive(Default)]
struct MemoryState {
    overlays: Vec<Overlay>,
    next_id: u64,
    journal: Vec<StoreCall>,
    failures: HashMap<StoreOp, VecDeque<StoreError>>,
    holds: HashMap<StoreOp, Arc<Semaphore>>,
}

#[derive(Default)]
pub struct InMemoryOverlayStore {
    state: Mutex<MemoryState>,
}

impl InMemoryOverlayStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store, as if another session had created these overlays.
    pub fn with_overlays(overlays: Vec<Overlay>) -> Self {
        let store = Self::new();
        for overlay in overlays {
            store.insert(overlay);
        }
        store
    }

    /// Insert or replace an overlay directly, bypassing the journal.
    pub fn insert(&self, overlay: Overlay) {
        let mut state = self.state.lock();
        match state.overlays.iter_mut().find(|o| o.id == overlay.id) {
            Some(existing) => *existing = overlay,
            None => state.overlays.push(overlay),
        }
    }

    /// Apply a patch directly, as a concurrent session would.
    pub fn patch(&self, id: &OverlayId, patch: &OverlayPatch) -> bool {
        let mut state = self.state.lock();
        match state.overlays.iter_mut().find(|o| &o.id == id) {
            Some(overlay) => {
                overlay.apply(patch);
                true
            }
            None => false,
        }
    }

    /// Current contents for a stream.
    pub fn overlays(&self, stream_id: &StreamId) -> Vec<Overlay> {
        self.state
            .lock()
            .overlays
            .iter()
            .filter(|o| &o.stream_id == stream_id)
            .cloned()
            .collect()
    }

    /// Every call received so far, in arrival order.
    pub fn calls(&self) -> Vec<StoreCall> {
        self.state.lock().journal.clone()
    }

    pub fn count(&self, op: StoreOp) -> usize {
        self.state
            .lock()
            .journal
            .iter()
            .filter(|call| call.op() == op)
            .count()
    }

    /// Make the next call of `op` fail with `error`. Queued failures are
    /// consumed in order.
    pub fn fail_next(&self, op: StoreOp, error: StoreError) {
        self.state
            .lock()
            .failures
            .entry(op)
            .or_default()
            .push_back(error);
    }

    /// Hold every call of `op` open (journaled but unresolved) until `release`.
    pub fn hold(&self, op: StoreOp) {
        self.state
            .lock()
            .holds
            .entry(op)
            .or_insert_with(|| Arc::new(Semaphore::new(0)));
    }

    /// Let held calls of `op` resolve, and stop holding new ones.
    pub fn release(&self, op: StoreOp) {
        if let Some(gate) = self.state.lock().holds.remove(&op) {
            gate.close();
        }
    }

    /// Journal the call, wait for any hold, then pop a queued failure.
    async fn admit(&self, call: StoreCall) -> Result<(), StoreError> {
        let op = call.op();
        let gate = {
            let mut state = self.state.lock();
            state.journal.push(call);
            state.holds.get(&op).cloned()
        };
        if let Some(gate) = gate {
            // Closed means released; no permits are ever handed out.
            let _ = gate.acquire().await;
        }
        match self.state.lock().failures.get_mut(&op) {
            Some(queue) => queue.pop_front().map_or(Ok(()), Err),
            None => Ok(()),
        }
    }
}

#[async_trait]
impl OverlayStore for InMemoryOverlayStore {
    async fn list(&self, stream_id: &StreamId) -> Result<Vec<Overlay>, StoreError> {
        self.admit(StoreCall::List(stream_id.clone())).await?;
        Ok(self.overlays(stream_id))
    }

    async fn create(&self, overlay: &NewOverlay) -> Result<Overlay, StoreError> {
        self.admit(StoreCall::Create(overlay.clone())).await?;
        let mut state = self.state.lock();
        state.next_id += 1;
        let id = OverlayId::new(format!("o{}", state.next_id));
        let created = overlay.clone().into_overlay(id);
        state.overlays.push(created.clone());
        Ok(created)
    }

    async fn update(&self, id: &OverlayId, patch: &OverlayPatch) -> Result<(), StoreError> {
        self.admit(StoreCall::Update(id.clone(), patch.clone())).await?;
        if self.patch(id, patch) {
            Ok(())
        } else {
            Err(StoreError::rejected(404, "Overlay not found"))
        }
    }

    async fn delete(&self, id: &OverlayId) -> Result<(), StoreError> {
        self.admit(StoreCall::Delete(id.clone())).await?;
        let mut state = self.state.lock();
        let before = state.overlays.len();
        state.overlays.retain(|o| &o.id != id);
        if state.overlays.len() == before {
            return Err(StoreError::rejected(404, "Overlay not found"));
        }
        Ok(())
    }

    fn describe(&self) -> String {
        "memory".to_string()
    }
}
