//! Cursor service: ephemeral presence relay.
//!
//! Cursor positions are fanned out to the sender's peers and forgotten. They
//! are never stored, never persisted, and never logged per frame.

use frames::syscall::{self, field};
use uuid::Uuid;

use crate::services::room::peer_notice;
use crate::state::AppState;

/// Relay a cursor position to every other member of `room_id`.
///
/// `name` falls back to the display name given at join. Silently ignored
/// when the connection is not a member.
pub async fn relay(state: &AppState, room_id: &str, connection_id: Uuid, x: f64, y: f64, name: Option<&str>) {
    let Some(shared) = state.room(room_id).await else {
        return;
    };
    let room = shared.lock().await;
    let Some(member) = room.members.get(&connection_id) else {
        return;
    };
    let name = name.unwrap_or(&member.name).to_owned();

    let frame = peer_notice(syscall::CURSOR_MOVE, room_id, connection_id)
        .with_data(field::NAME, name)
        .with_data(field::X, x)
        .with_data(field::Y, y);
    room.fan_out(&frame, Some(connection_id));
}

#[cfg(test)]
#[path = "cursor_test.rs"]
mod tests;
