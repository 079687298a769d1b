//! Syscall names and payload field keys shared by server and clients.
//!
//! Requests are routed on the prefix before the first `:`; the relay never
//! inspects anything but the prefix and the fields listed in [`field`].

// ── Session ─────────────────────────────────────────────────────

/// Server → client greeting carrying the connection's `peer_id`.
pub const SESSION_CONNECTED: &str = "session:connected";
/// Server → client error for frames that could not be decoded at all.
pub const GATEWAY_ERROR: &str = "gateway:error";

// ── Room ────────────────────────────────────────────────────────

/// Join a room; the reply carries the full snapshot.
pub const ROOM_JOIN: &str = "room:join";
/// Peer-left notice fanned out when a connection leaves its room.
pub const ROOM_PART: &str = "room:part";

// ── Draw ────────────────────────────────────────────────────────

/// Append one item. Relayed to peers under the same name.
pub const DRAW_APPEND: &str = "draw:append";
/// Overwrite the whole history. Relayed to peers under the same name.
pub const DRAW_REPLACE: &str = "draw:replace";
/// Pop the most recently appended item.
pub const DRAW_UNDO: &str = "draw:undo";
/// Reset the history to empty.
pub const DRAW_CLEAR: &str = "draw:clear";
/// Authoritative full history after undo or clear, sent to every member.
pub const DRAW_SYNC: &str = "draw:sync";

// ── Chat ────────────────────────────────────────────────────────

/// Client request to post a chat message.
pub const CHAT_SEND: &str = "chat:send";
/// Relayed chat message.
pub const CHAT_MESSAGE: &str = "chat:message";

// ── Presence ────────────────────────────────────────────────────

/// Cursor position, relayed to peers and never persisted.
pub const CURSOR_MOVE: &str = "cursor:move";

/// Keys used inside `Frame::data`.
pub mod field {
    pub const ROOM_ID: &str = "room_id";
    pub const NAME: &str = "name";
    pub const PEER_ID: &str = "peer_id";
    pub const ITEM: &str = "item";
    pub const HISTORY: &str = "history";
    pub const DRAW_HISTORY: &str = "draw_history";
    pub const CHAT_HISTORY: &str = "chat_history";
    pub const MESSAGE: &str = "message";
    pub const REASON: &str = "reason";
    pub const CODE: &str = "code";
    pub const RETRYABLE: &str = "retryable";
    pub const X: &str = "x";
    pub const Y: &str = "y";
}

/// Why a `draw:sync` was sent.
pub mod reason {
    pub const UNDO: &str = "undo";
    pub const CLEAR: &str = "clear";
}
