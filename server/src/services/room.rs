//! Room service: join/part, edit-log mutation, and fan-out.
//!
//! DESIGN
//! ======
//! Rooms are hydrated from the document store on first join and kept in
//! memory while any connection is joined. Every mutating operation runs
//! entirely under the room's mutex: mutate the history, queue the peer
//! frames, then enqueue the durable write. Peers therefore observe edits in
//! server arrival order, and the store applies them in that same order.
//!
//! The join snapshot is queued on the joiner's own outbound channel while
//! the lock is held, so any edit accepted after the snapshot reaches the
//! joiner after it and no edit is ever seen twice.
//!
//! ERROR HANDLING
//! ==============
//! Only hydration touches the store synchronously. Write failures surface in
//! the persistence worker's log and never roll back in-memory state.
//!
//! A room whose last member leaves while writes are still queued is kept in
//! memory until they drain, so a re-join never hydrates a stale record.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use frames::syscall::{self, field, reason};
use frames::{ChatMessage, DrawItem, history_to_value};
use serde_json::Value;
use tokio::sync::{Mutex, mpsc};
use tokio::time::{Duration, MissedTickBehavior};
use tracing::info;
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame};
use crate::services::persistence::{self, PersistOp};
use crate::state::{AppState, Member, RoomState};
use crate::store::StoreError;

const EVICTION_POLL_MS: u64 = 50;

#[derive(Debug, thiserror::Error)]
pub enum RoomError {
    #[error("not joined to room {0}")]
    NotJoined(String),
    #[error(transparent)]
    Store(#[from] StoreError),
}

impl ErrorCode for RoomError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::NotJoined(_) => "E_NOT_JOINED",
            Self::Store(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::NotJoined(_) => false,
            Self::Store(e) => e.retryable(),
        }
    }
}

// =============================================================================
// JOIN / PART
// =============================================================================

/// Join `room_id`, creating it on demand.
///
/// The `room:join` done frame carrying the snapshot is queued on `tx`.
///
/// # Errors
///
/// Returns [`RoomError::Store`] if hydration from the store fails.
pub async fn join(
    state: &AppState,
    req: &Frame,
    room_id: &str,
    connection_id: Uuid,
    name: &str,
    tx: mpsc::Sender<Frame>,
) -> Result<(), RoomError> {
    {
        let rooms = state.rooms.read().await;
        if let Some(room) = rooms.get(room_id) {
            let mut room = room.lock().await;
            admit(&mut room, req, connection_id, name, tx);
            return Ok(());
        }
    }

    // Hydrate outside the map lock; a concurrent joiner may win the insert.
    let record = state.store.get_or_create(room_id).await?;

    let mut rooms = state.rooms.write().await;
    let room = rooms
        .entry(room_id.to_owned())
        .or_insert_with(|| {
            info!(%room_id, items = record.draw_history.len(), messages = record.chat_history.len(), "hydrated room from store");
            Arc::new(Mutex::new(RoomState::from_record(record)))
        })
        .clone();
    let mut room = room.lock().await;
    admit(&mut room, req, connection_id, name, tx);
    Ok(())
}

fn admit(room: &mut RoomState, req: &Frame, connection_id: Uuid, name: &str, tx: mpsc::Sender<Frame>) {
    room.members.insert(connection_id, Member { name: name.to_owned(), tx });

    let mut data = Data::new();
    data.insert(field::ROOM_ID.into(), Value::String(room.room_id.clone()));
    data.insert(field::PEER_ID.into(), Value::String(connection_id.to_string()));
    data.insert(field::DRAW_HISTORY.into(), history_to_value(&room.draw_history));
    data.insert(
        field::CHAT_HISTORY.into(),
        Value::Array(room.chat_history.iter().map(ChatMessage::to_value).collect()),
    );
    let snapshot = req.done_with(data).with_room_id(room.room_id.clone());
    room.send_to(connection_id, snapshot);

    info!(room_id = %room.room_id, %connection_id, members = room.members.len(), "connection joined room");
}

/// Leave `room_id`. Remaining members receive `room:part`.
///
/// The room is evicted when it has no members and no queued writes; with
/// writes queued, eviction waits until they drain.
pub async fn part(state: &AppState, room_id: &str, connection_id: Uuid) {
    let mut rooms = state.rooms.write().await;
    let Some(shared) = rooms.get(room_id).cloned() else {
        return;
    };
    let mut room = shared.lock().await;
    if room.members.remove(&connection_id).is_none() {
        return;
    }

    room.fan_out(&peer_notice(syscall::ROOM_PART, room_id, connection_id), None);
    info!(%room_id, %connection_id, remaining = room.members.len(), "connection left room");

    if !room.members.is_empty() {
        return;
    }
    if room.is_idle() {
        drop(room);
        rooms.remove(room_id);
        info!(%room_id, "evicted room from memory");
    } else {
        info!(%room_id, pending = room.pending(), "retaining empty room until writes drain");
        let pending = room.pending_writes.clone();
        tokio::spawn(evict_when_drained(state.clone(), room_id.to_owned(), pending));
    }
}

async fn evict_when_drained(state: AppState, room_id: String, pending: Arc<AtomicUsize>) {
    let mut ticker = tokio::time::interval(Duration::from_millis(EVICTION_POLL_MS));
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);
    while pending.load(Ordering::Acquire) > 0 {
        ticker.tick().await;
    }

    let mut rooms = state.rooms.write().await;
    let Some(shared) = rooms.get(&room_id).cloned() else {
        return;
    };
    // EDGE: someone may have re-joined, or written and left again, meanwhile.
    if shared.lock().await.is_idle() {
        rooms.remove(&room_id);
        info!(%room_id, "evicted drained room from memory");
    }
}

// =============================================================================
// EDIT LOG
// =============================================================================

/// Append one item; peers receive `draw:append`.
///
/// # Errors
///
/// Returns [`RoomError::NotJoined`] if the connection is not a member.
pub async fn append_draw(state: &AppState, room_id: &str, connection_id: Uuid, item: DrawItem) -> Result<(), RoomError> {
    with_member_room(state, room_id, connection_id, |room| {
        let frame = peer_notice(syscall::DRAW_APPEND, room_id, connection_id).with_data(field::ITEM, item.to_value());
        room.draw_history.push(item.clone());
        room.fan_out(&frame, Some(connection_id));
        persistence::enqueue(state, room, PersistOp::AppendDraw(item));
    })
    .await
}

/// Overwrite the whole history, last writer wins; peers receive `draw:replace`.
///
/// # Errors
///
/// Returns [`RoomError::NotJoined`] if the connection is not a member.
pub async fn replace_history(
    state: &AppState,
    room_id: &str,
    connection_id: Uuid,
    items: Vec<DrawItem>,
) -> Result<(), RoomError> {
    with_member_room(state, room_id, connection_id, |room| {
        let frame = peer_notice(syscall::DRAW_REPLACE, room_id, connection_id)
            .with_data(field::HISTORY, history_to_value(&items));
        room.draw_history.clone_from(&items);
        room.fan_out(&frame, Some(connection_id));
        persistence::enqueue(state, room, PersistOp::ReplaceDraw(items));
    })
    .await
}

/// Pop the most recent item whoever drew it. Every member, the invoker
/// included, receives the resulting history as `draw:sync`.
///
/// Returns `false` when the history was already empty; nothing is sent or
/// written in that case.
///
/// # Errors
///
/// Returns [`RoomError::NotJoined`] if the connection is not a member.
pub async fn undo(state: &AppState, room_id: &str, connection_id: Uuid) -> Result<bool, RoomError> {
    with_member_room(state, room_id, connection_id, |room| {
        if room.draw_history.pop().is_none() {
            return false;
        }
        let frame = sync_frame(room_id, connection_id, &room.draw_history, reason::UNDO);
        room.fan_out(&frame, None);
        let remaining = room.draw_history.clone();
        persistence::enqueue(state, room, PersistOp::ReplaceDraw(remaining));
        true
    })
    .await
}

/// Reset the history; every member receives an empty `draw:sync`.
///
/// # Errors
///
/// Returns [`RoomError::NotJoined`] if the connection is not a member.
pub async fn clear(state: &AppState, room_id: &str, connection_id: Uuid) -> Result<(), RoomError> {
    with_member_room(state, room_id, connection_id, |room| {
        room.draw_history.clear();
        let frame = sync_frame(room_id, connection_id, &[], reason::CLEAR);
        room.fan_out(&frame, None);
        persistence::enqueue(state, room, PersistOp::ClearDraw);
    })
    .await
}

/// Append a chat message; peers receive `chat:message`.
///
/// # Errors
///
/// Returns [`RoomError::NotJoined`] if the connection is not a member.
pub async fn append_chat(
    state: &AppState,
    room_id: &str,
    connection_id: Uuid,
    message: ChatMessage,
) -> Result<(), RoomError> {
    with_member_room(state, room_id, connection_id, |room| {
        let frame = peer_notice(syscall::CHAT_MESSAGE, room_id, connection_id)
            .with_data(field::MESSAGE, message.to_value());
        room.chat_history.push(message.clone());
        room.fan_out(&frame, Some(connection_id));
        persistence::enqueue(state, room, PersistOp::AppendChat(message));
    })
    .await
}

// =============================================================================
// HELPERS
// =============================================================================

/// Run `f` under the room lock after checking membership.
async fn with_member_room<T>(
    state: &AppState,
    room_id: &str,
    connection_id: Uuid,
    f: impl FnOnce(&mut RoomState) -> T,
) -> Result<T, RoomError> {
    let Some(shared) = state.room(room_id).await else {
        return Err(RoomError::NotJoined(room_id.to_owned()));
    };
    let mut room = shared.lock().await;
    if !room.members.contains_key(&connection_id) {
        return Err(RoomError::NotJoined(room_id.to_owned()));
    }
    Ok(f(&mut room))
}

/// Server-originated notice attributed to `connection_id`.
pub(crate) fn peer_notice(syscall: &str, room_id: &str, connection_id: Uuid) -> Frame {
    Frame::request(syscall, Data::new())
        .with_room_id(room_id)
        .with_from(connection_id.to_string())
        .with_data(field::PEER_ID, connection_id.to_string())
}

fn sync_frame(room_id: &str, connection_id: Uuid, history: &[DrawItem], why: &str) -> Frame {
    peer_notice(syscall::DRAW_SYNC, room_id, connection_id)
        .with_data(field::HISTORY, history_to_value(history))
        .with_data(field::REASON, why)
}

#[cfg(test)]
#[path = "room_test.rs"]
mod tests;
