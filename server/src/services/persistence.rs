//! Persistence service: ordered background writes to the document store.
//!
//! DESIGN
//! ======
//! Room operations enqueue a `PersistJob` while still holding the room lock,
//! so queue order equals broadcast order. A single worker drains the bounded
//! queue and applies jobs one at a time, which keeps durable order identical
//! to server arrival order without any cross-job coordination.
//!
//! ERROR HANDLING
//! ==============
//! A failed write is logged and dropped. Nothing is retried and nothing
//! already broadcast is retracted. Each job carries its room's pending-write
//! counter, decremented after the attempt whatever the outcome, so the room
//! manager can tell when a room is safe to evict.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use frames::{ChatMessage, DrawItem};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::{error, info, warn};

use crate::state::{AppState, RoomState};
use crate::store::{DocumentStore, StoreError};

/// One durable write.
#[derive(Debug, Clone, PartialEq)]
pub enum PersistOp {
    AppendDraw(DrawItem),
    ReplaceDraw(Vec<DrawItem>),
    ClearDraw,
    AppendChat(ChatMessage),
}

impl PersistOp {
    fn label(&self) -> &'static str {
        match self {
            Self::AppendDraw(_) => "append_draw",
            Self::ReplaceDraw(_) => "replace_draw",
            Self::ClearDraw => "clear_draw",
            Self::AppendChat(_) => "append_chat",
        }
    }
}

#[derive(Debug)]
pub struct PersistJob {
    pub room_id: String,
    pub op: PersistOp,
    pending: Arc<AtomicUsize>,
}

/// Spawn the persistence worker and return its queue sender.
#[must_use]
pub fn spawn_persistence_worker(store: Arc<dyn DocumentStore>, capacity: usize) -> mpsc::Sender<PersistJob> {
    let (tx, mut rx) = mpsc::channel::<PersistJob>(capacity);
    info!(queue_capacity = capacity, "persistence worker configured");

    tokio::spawn(async move {
        while let Some(job) = rx.recv().await {
            if let Err(e) = apply(store.as_ref(), &job).await {
                error!(error = %e, room_id = %job.room_id, op = job.op.label(), "persist failed; write dropped");
            }
            job.pending.fetch_sub(1, Ordering::AcqRel);
        }
        info!("persistence worker stopped");
    });

    tx
}

/// Non-blocking enqueue. Call with the room lock held.
///
/// Uses `try_send` so a slow store never stalls the relay; when the queue is
/// full the write is dropped with a warning.
pub fn enqueue(state: &AppState, room: &RoomState, op: PersistOp) {
    room.pending_writes.fetch_add(1, Ordering::AcqRel);
    let job = PersistJob { room_id: room.room_id.clone(), op, pending: room.pending_writes.clone() };

    match state.persist_tx.try_send(job) {
        Ok(()) => {}
        Err(TrySendError::Full(job)) => {
            job.pending.fetch_sub(1, Ordering::AcqRel);
            warn!(room_id = %job.room_id, op = job.op.label(), "persist queue full; dropping write");
        }
        Err(TrySendError::Closed(job)) => {
            job.pending.fetch_sub(1, Ordering::AcqRel);
            warn!(room_id = %job.room_id, op = job.op.label(), "persist queue closed; dropping write");
        }
    }
}

async fn apply(store: &dyn DocumentStore, job: &PersistJob) -> Result<(), StoreError> {
    let room_id = job.room_id.as_str();
    match &job.op {
        PersistOp::AppendDraw(item) => store.append_draw(room_id, item).await,
        PersistOp::ReplaceDraw(items) => store.replace_draw(room_id, items).await,
        PersistOp::ClearDraw => store.clear_draw(room_id).await,
        PersistOp::AppendChat(message) => store.append_chat(room_id, message).await,
    }
}

#[cfg(test)]
#[path = "persistence_test.rs"]
mod tests;
