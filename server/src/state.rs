//! Shared application state.
//!
//! DESIGN
//! ======
//! `AppState` is injected into Axum handlers via the `State` extractor.
//! It holds the document store, the persistence queue, and a map of live
//! rooms. Each room sits behind its own mutex so operations on one room are
//! serialized while different rooms proceed independently.
//!
//! Lock order is always map then room. Eviction takes the map write lock,
//! so a room reached through the map stays reachable while its lock is held.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use frames::{ChatMessage, DrawItem};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{Mutex, RwLock, mpsc};
use tracing::warn;
use uuid::Uuid;

use crate::config::ServerConfig;
use crate::frame::Frame;
use crate::services::persistence::PersistJob;
use crate::store::{DocumentStore, RoomRecord};

// =============================================================================
// ROOM STATE
// =============================================================================

/// One connection joined to a room.
pub struct Member {
    pub name: String,
    /// Outbound channel drained by the connection's socket loop.
    pub tx: mpsc::Sender<Frame>,
}

/// Per-room live state. Authoritative while the room is in memory.
pub struct RoomState {
    pub room_id: String,
    pub draw_history: Vec<DrawItem>,
    pub chat_history: Vec<ChatMessage>,
    pub members: HashMap<Uuid, Member>,
    /// Persistence jobs enqueued for this room and not yet applied.
    pub pending_writes: Arc<AtomicUsize>,
}

pub type SharedRoom = Arc<Mutex<RoomState>>;

impl RoomState {
    #[must_use]
    pub fn new(room_id: &str) -> Self {
        Self::from_record(RoomRecord::empty(room_id))
    }

    #[must_use]
    pub fn from_record(record: RoomRecord) -> Self {
        Self {
            room_id: record.room_id,
            draw_history: record.draw_history,
            chat_history: record.chat_history,
            members: HashMap::new(),
            pending_writes: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn pending(&self) -> usize {
        self.pending_writes.load(Ordering::Acquire)
    }

    /// No members and nothing left to persist.
    pub fn is_idle(&self) -> bool {
        self.members.is_empty() && self.pending() == 0
    }

    /// Queue `frame` on every member's channel, optionally skipping one.
    ///
    /// Delivery is best-effort: a full channel drops the frame for that peer.
    pub fn fan_out(&self, frame: &Frame, exclude: Option<Uuid>) {
        for (connection_id, member) in &self.members {
            if exclude == Some(*connection_id) {
                continue;
            }
            deliver(&self.room_id, *connection_id, &member.tx, frame.clone());
        }
    }

    /// Queue `frame` on a single member's channel.
    pub fn send_to(&self, connection_id: Uuid, frame: Frame) {
        if let Some(member) = self.members.get(&connection_id) {
            deliver(&self.room_id, connection_id, &member.tx, frame);
        }
    }
}

fn deliver(room_id: &str, connection_id: Uuid, tx: &mpsc::Sender<Frame>, frame: Frame) {
    match tx.try_send(frame) {
        Ok(()) => {}
        Err(TrySendError::Full(frame)) => {
            warn!(%room_id, %connection_id, syscall = %frame.syscall, "outbound channel full; dropping frame");
        }
        Err(TrySendError::Closed(_)) => {}
    }
}

// =============================================================================
// APP STATE
// =============================================================================

/// Shared application state, injected into Axum handlers via State extractor.
/// Clone is required by Axum; all inner fields are Arc-wrapped or Clone.
#[derive(Clone)]
pub struct AppState {
    pub rooms: Arc<RwLock<HashMap<String, SharedRoom>>>,
    pub store: Arc<dyn DocumentStore>,
    pub persist_tx: mpsc::Sender<PersistJob>,
    pub config: Arc<ServerConfig>,
}

impl AppState {
    #[must_use]
    pub fn new(store: Arc<dyn DocumentStore>, persist_tx: mpsc::Sender<PersistJob>, config: ServerConfig) -> Self {
        Self { rooms: Arc::new(RwLock::new(HashMap::new())), store, persist_tx, config: Arc::new(config) }
    }

    /// Look up a live room without creating it.
    pub async fn room(&self, room_id: &str) -> Option<SharedRoom> {
        self.rooms.read().await.get(room_id).cloned()
    }
}

// =============================================================================
// TEST HELPERS
// =============================================================================


#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
