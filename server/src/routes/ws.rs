//! WebSocket handler: bidirectional frame relay.
//!
//! DESIGN
//! ======
//! On upgrade, generates a connection id and enters a `select!` loop:
//! - Incoming client frames → decode + dispatch by syscall prefix
//! - Frames queued by room operations → forward to client
//!
//! Each connection carries an explicit `Session` value naming the room it
//! has joined. Handlers validate the payload, call into the room service,
//! and return an `Outcome`; everything a room operation sends to members,
//! including the join snapshot and the invoker's own `draw:sync`, travels
//! through the member's single outbound channel so a client observes room
//! state in server order. Only acks and errors are written directly.
//!
//! LIFECYCLE
//! =========
//! 1. Upgrade → send `session:connected` with `peer_id`
//! 2. Client sends frames → dispatch → handler returns Outcome
//! 3. Dispatch writes the ack or error to the sender
//! 4. Close → peers receive `room:part` → room cleanup
//!
//! WIRE FORMAT
//! ===========
//! Binary protobuf by default; `?format=json` switches outbound frames to
//! JSON text. Inbound text frames are always accepted as JSON.

use std::collections::HashMap;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::Response;
use frames::syscall::{self, field};
use frames::{ChatMessage, DrawItem, ItemError};
use serde_json::Value;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::frame::{Data, ErrorCode, Frame, Status, now_ms};
use crate::services::room::RoomError;
use crate::services::{cursor, room};
use crate::state::AppState;

const DEFAULT_NAME: &str = "anonymous";

// =============================================================================
// SESSION
// =============================================================================

/// Per-connection state owned by the socket loop.
#[derive(Debug)]
struct Session {
    connection_id: Uuid,
    room_id: Option<String>,
}

impl Session {
    fn new() -> Self {
        Self { connection_id: Uuid::new_v4(), room_id: None }
    }

    /// The connection id doubles as the peer id seen by other clients.
    fn peer_id(&self) -> String {
        self.connection_id.to_string()
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum WireFormat {
    Binary,
    Json,
}

impl WireFormat {
    fn from_query(params: &HashMap<String, String>) -> Self {
        match params.get("format").map(String::as_str) {
            Some("json") => Self::Json,
            _ => Self::Binary,
        }
    }
}

// =============================================================================
// ERRORS
// =============================================================================

#[derive(Debug, thiserror::Error)]
enum RelayError {
    #[error("invalid frame: {0}")]
    InvalidFrame(String),
    #[error("invalid payload: {0}")]
    InvalidPayload(String),
    #[error("invalid payload: {0}")]
    Item(#[from] ItemError),
    #[error("join a room first")]
    NotJoined,
    #[error("request targets room {requested} but this connection is in {joined}")]
    WrongRoom { requested: String, joined: String },
    #[error("unknown syscall: {0}")]
    UnknownSyscall(String),
    #[error(transparent)]
    Room(#[from] RoomError),
}

impl ErrorCode for RelayError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidFrame(_) => "E_INVALID_FRAME",
            Self::InvalidPayload(_) | Self::Item(_) => "E_INVALID_PAYLOAD",
            Self::NotJoined | Self::WrongRoom { .. } => "E_NOT_JOINED",
            Self::UnknownSyscall(_) => "E_UNKNOWN_SYSCALL",
            Self::Room(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Room(e) => e.retryable(),
            _ => false,
        }
    }
}

// =============================================================================
// OUTCOME
// =============================================================================

/// What the dispatch layer writes back to the sender.
#[derive(Debug)]
enum Outcome {
    /// Plain terminal `done`.
    Done,
    /// Nothing: high-rate relays, and joins whose reply is already queued.
    Silent,
}

// =============================================================================
// UPGRADE
// =============================================================================

pub async fn handle_ws(
    State(state): State<AppState>,
    Query(params): Query<HashMap<String, String>>,
    ws: WebSocketUpgrade,
) -> Response {
    let format = WireFormat::from_query(&params);
    let limit = state.config.ws_max_message_bytes;
    ws.max_message_size(limit)
        .max_frame_size(limit)
        .on_upgrade(move |socket| run_ws(socket, state, format))
}

// =============================================================================
// CONNECTION
// =============================================================================

async fn run_ws(mut socket: WebSocket, state: AppState, format: WireFormat) {
    let mut session = Session::new();
    let (client_tx, mut client_rx) = mpsc::channel::<Frame>(state.config.client_channel_capacity);

    let welcome = Frame::request(syscall::SESSION_CONNECTED, Data::new()).with_data(field::PEER_ID, session.peer_id());
    if send_frame(&mut socket, format, &welcome).await.is_err() {
        return;
    }
    info!(connection_id = %session.connection_id, ?format, "ws: client connected");

    loop {
        tokio::select! {
            msg = socket.recv() => {
                let Some(Ok(msg)) = msg else { break };
                let replies = match msg {
                    Message::Binary(bytes) => process_inbound_binary(&state, &mut session, &client_tx, &bytes).await,
                    Message::Text(text) => process_inbound_text(&state, &mut session, &client_tx, text.as_str()).await,
                    Message::Close(_) => break,
                    Message::Ping(_) | Message::Pong(_) => continue,
                };
                if send_all(&mut socket, format, &replies).await.is_err() {
                    break;
                }
            }
            Some(frame) = client_rx.recv() => {
                if send_frame(&mut socket, format, &frame).await.is_err() {
                    break;
                }
            }
        }
    }

    finish_session(&state, &mut session).await;
    info!(connection_id = %session.connection_id, "ws: client disconnected");
}

/// Leave the session's room, if any. Peers receive `room:part`.
async fn finish_session(state: &AppState, session: &mut Session) {
    if let Some(room_id) = session.room_id.take() {
        room::part(state, &room_id, session.connection_id).await;
    }
}

// =============================================================================
// FRAME DISPATCH
// =============================================================================

/// Decode one binary protobuf frame and return frames for the sender.
async fn process_inbound_binary(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<Frame>,
    bytes: &[u8],
) -> Vec<Frame> {
    let decoded = frames::decode_frame(bytes)
        .map_err(|e| e.to_string())
        .and_then(|wire| Frame::try_from(wire).map_err(|e| e.to_string()));
    match decoded {
        Ok(req) => process_frame(state, session, client_tx, req).await,
        Err(e) => {
            warn!(connection_id = %session.connection_id, error = %e, "ws: undecodable binary frame");
            vec![gateway_error(&RelayError::InvalidFrame(e))]
        }
    }
}

/// Decode one JSON text frame and return frames for the sender.
async fn process_inbound_text(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<Frame>,
    text: &str,
) -> Vec<Frame> {
    match serde_json::from_str::<Frame>(text) {
        Ok(req) => process_frame(state, session, client_tx, req).await,
        Err(e) => {
            warn!(connection_id = %session.connection_id, error = %e, "ws: invalid json frame");
            vec![gateway_error(&RelayError::InvalidFrame(e.to_string()))]
        }
    }
}

async fn process_frame(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<Frame>,
    mut req: Frame,
) -> Vec<Frame> {
    if req.status != Status::Request {
        return Vec::new();
    }
    // The relay, not the client, decides who a frame is from.
    req.from = Some(session.peer_id());

    if req.syscall != syscall::CURSOR_MOVE {
        debug!(connection_id = %session.connection_id, id = %req.id, syscall = %req.syscall, "ws: recv frame");
    }

    let result = match req.prefix() {
        "room" => handle_room(state, session, client_tx, &req).await,
        "draw" => handle_draw(state, session, &req).await,
        "chat" => handle_chat(state, session, &req).await,
        "cursor" => handle_cursor(state, session, &req).await,
        _ => Err(RelayError::UnknownSyscall(req.syscall.clone())),
    };

    match result {
        Ok(Outcome::Done) => vec![req.done()],
        Ok(Outcome::Silent) => Vec::new(),
        Err(e) => vec![req.error_from(&e)],
    }
}

// =============================================================================
// ROOM HANDLERS
// =============================================================================

async fn handle_room(
    state: &AppState,
    session: &mut Session,
    client_tx: &mpsc::Sender<Frame>,
    req: &Frame,
) -> Result<Outcome, RelayError> {
    if req.op() != "join" {
        return Err(RelayError::UnknownSyscall(req.syscall.clone()));
    }

    let room_id = req
        .data
        .get(field::ROOM_ID)
        .and_then(Value::as_str)
        .or(req.room_id.as_deref())
        .map(str::trim)
        .unwrap_or_default()
        .to_owned();
    if room_id.is_empty() {
        return Err(RelayError::InvalidPayload("room_id required".into()));
    }
    if room_id.chars().count() > state.config.max_room_id_len {
        return Err(RelayError::InvalidPayload(format!(
            "room_id longer than {} characters",
            state.config.max_room_id_len
        )));
    }
    let name = req
        .data
        .get(field::NAME)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|n| !n.is_empty())
        .unwrap_or(DEFAULT_NAME);

    // Joining supersedes any prior room.
    finish_session(state, session).await;

    room::join(state, req, &room_id, session.connection_id, name, client_tx.clone()).await?;
    session.room_id = Some(room_id);
    Ok(Outcome::Silent)
}

// =============================================================================
// DRAW HANDLERS
// =============================================================================

async fn handle_draw(state: &AppState, session: &Session, req: &Frame) -> Result<Outcome, RelayError> {
    let room_id = joined_room(session, req)?;
    let connection_id = session.connection_id;

    match req.op() {
        "append" => {
            let item = DrawItem::from_value(payload(req, field::ITEM)?)?;
            room::append_draw(state, room_id, connection_id, item).await?;
            Ok(Outcome::Silent)
        }
        "replace" => {
            let items = DrawItem::parse_history(payload(req, field::HISTORY)?)?;
            room::replace_history(state, room_id, connection_id, items).await?;
            Ok(Outcome::Done)
        }
        "undo" => {
            room::undo(state, room_id, connection_id).await?;
            Ok(Outcome::Done)
        }
        "clear" => {
            room::clear(state, room_id, connection_id).await?;
            Ok(Outcome::Done)
        }
        _ => Err(RelayError::UnknownSyscall(req.syscall.clone())),
    }
}

// =============================================================================
// CHAT HANDLER
// =============================================================================

async fn handle_chat(state: &AppState, session: &Session, req: &Frame) -> Result<Outcome, RelayError> {
    let room_id = joined_room(session, req)?;
    if req.op() != "send" {
        return Err(RelayError::UnknownSyscall(req.syscall.clone()));
    }

    let message = ChatMessage::from_request(payload(req, field::MESSAGE)?, now_ms())?;
    room::append_chat(state, room_id, session.connection_id, message).await?;
    Ok(Outcome::Done)
}

// =============================================================================
// CURSOR HANDLER
// =============================================================================

async fn handle_cursor(state: &AppState, session: &Session, req: &Frame) -> Result<Outcome, RelayError> {
    if req.op() != "move" {
        return Err(RelayError::UnknownSyscall(req.syscall.clone()));
    }
    // Silently ignore cursor moves outside the joined room.
    let Ok(room_id) = joined_room(session, req) else {
        return Ok(Outcome::Silent);
    };

    let coord = |key: &str| {
        req.data
            .get(key)
            .and_then(Value::as_f64)
            .filter(|v| v.is_finite())
            .ok_or_else(|| RelayError::InvalidPayload(format!("{key} must be a finite number")))
    };
    let x = coord(field::X)?;
    let y = coord(field::Y)?;
    let name = req
        .data
        .get(field::NAME)
        .and_then(Value::as_str)
        .filter(|n| !n.trim().is_empty());

    cursor::relay(state, room_id, session.connection_id, x, y, name).await;
    Ok(Outcome::Silent)
}

// =============================================================================
// HELPERS
// =============================================================================

/// The session's room, checked against the room the request names.
fn joined_room<'a>(session: &'a Session, req: &Frame) -> Result<&'a str, RelayError> {
    let Some(joined) = session.room_id.as_deref() else {
        return Err(RelayError::NotJoined);
    };
    match req.room_id.as_deref() {
        Some(requested) if requested != joined => Err(RelayError::WrongRoom {
            requested: requested.to_owned(),
            joined: joined.to_owned(),
        }),
        _ => Ok(joined),
    }
}

fn payload<'a>(req: &'a Frame, key: &str) -> Result<&'a Value, RelayError> {
    req.data
        .get(key)
        .ok_or_else(|| RelayError::InvalidPayload(format!("{key} required")))
}

/// Error frame for input that never became a request.
fn gateway_error(err: &RelayError) -> Frame {
    let mut frame = Frame::request(syscall::GATEWAY_ERROR, Data::new()).error_from(err);
    frame.parent_id = None;
    frame
}

async fn send_all(socket: &mut WebSocket, format: WireFormat, frames: &[Frame]) -> Result<(), axum::Error> {
    for frame in frames {
        send_frame(socket, format, frame).await?;
    }
    Ok(())
}

async fn send_frame(socket: &mut WebSocket, format: WireFormat, frame: &Frame) -> Result<(), axum::Error> {
    let msg = match format {
        WireFormat::Binary => Message::Binary(frames::encode_frame(&frames::Frame::from(frame)).into()),
        WireFormat::Json => match serde_json::to_string(frame) {
            Ok(json) => Message::Text(json.into()),
            Err(e) => {
                warn!(error = %e, "ws: failed to serialize frame");
                return Ok(());
            }
        },
    };

    if frame.syscall != syscall::CURSOR_MOVE {
        if frame.status == Status::Error {
            let code = frame.data.get(field::CODE).and_then(Value::as_str).unwrap_or("-");
            let message = frame.data.get(field::MESSAGE).and_then(Value::as_str).unwrap_or("-");
            warn!(id = %frame.id, syscall = %frame.syscall, code, message, "ws: send frame status=Error");
        } else {
            debug!(id = %frame.id, syscall = %frame.syscall, status = ?frame.status, "ws: send frame");
        }
    }

    socket.send(msg).await
}

#[cfg(test)]
#[path = "ws_test.rs"]
mod tests;
