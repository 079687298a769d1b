//! Inbound relay frames decoded into typed events.
//!
//! DESIGN
//! ======
//! The relay speaks in generic [`frames::Frame`]s. This module is the one
//! place that knows which syscall and status carry which payload, so the
//! engine only ever matches on [`RelayEvent`]. A frame that fails to decode
//! is reported as an [`EventError`] and leaves the mirror untouched.

#[cfg(test)]
#[path = "events_test.rs"]
mod events_test;

use frames::syscall::{self, field};
use frames::{ChatMessage, DrawItem, Frame, ItemError, Status};
use serde::Deserialize;
use serde_json::Value;

#[derive(Debug, thiserror::Error)]
pub enum EventError {
    #[error("codec: {0}")]
    Codec(#[from] frames::CodecError),
    #[error("invalid item: {0}")]
    Item(#[from] ItemError),
    #[error("{syscall}: missing field {field}")]
    MissingField { syscall: String, field: &'static str },
    #[error("unexpected frame {syscall} ({status:?})")]
    Unexpected { syscall: String, status: Status },
}

/// Everything the relay can tell a client.
#[derive(Debug, Clone, PartialEq)]
pub enum RelayEvent {
    /// Greeting with this connection's peer id.
    Connected { peer_id: String },
    /// Join snapshot.
    Joined { room_id: String, history: Vec<DrawItem>, chat: Vec<ChatMessage> },
    /// A peer appended one item.
    Appended { peer_id: String, item: DrawItem },
    /// A peer overwrote the whole history.
    Replaced { peer_id: String, history: Vec<DrawItem> },
    /// Authoritative history after undo or clear.
    Synced { history: Vec<DrawItem>, reason: String },
    Chat(ChatMessage),
    Cursor { peer_id: String, name: String, x: f64, y: f64 },
    PeerLeft { peer_id: String },
    /// Terminal `done` for one of this client's requests.
    Ack { syscall: String },
    /// Structured error for one of this client's requests, or a gateway error.
    Failed { syscall: String, code: String, message: String },
}

impl RelayEvent {
    /// Decode protobuf bytes straight into an event.
    ///
    /// # Errors
    ///
    /// Returns [`EventError::Codec`] for undecodable bytes, otherwise as
    /// [`RelayEvent::from_frame`].
    pub fn decode(bytes: &[u8]) -> Result<Self, EventError> {
        Self::from_frame(&frames::decode_frame(bytes)?)
    }

    /// Classify one inbound frame.
    ///
    /// # Errors
    ///
    /// Returns [`EventError`] when a known frame lacks a required field or
    /// carries an invalid item, or the frame is not one clients receive.
    pub fn from_frame(frame: &Frame) -> Result<Self, EventError> {
        match frame.status {
            Status::Error => {
                return Ok(Self::Failed {
                    syscall: frame.syscall.clone(),
                    code: frame.error_code().unwrap_or("E_UNKNOWN").to_owned(),
                    message: frame.error_message().unwrap_or_default().to_owned(),
                });
            }
            Status::Done if frame.syscall != syscall::ROOM_JOIN => {
                return Ok(Self::Ack { syscall: frame.syscall.clone() });
            }
            _ => {}
        }

        match (frame.syscall.as_str(), frame.status) {
            (syscall::SESSION_CONNECTED, Status::Request) => Ok(Self::Connected {
                peer_id: required_text(frame, field::PEER_ID)?.to_owned(),
            }),
            (syscall::ROOM_JOIN, Status::Done) => {
                let history = DrawItem::parse_history(required(frame, field::DRAW_HISTORY)?)?;
                let chat = match frame.data.get(field::CHAT_HISTORY) {
                    Some(Value::Array(values)) => values.iter().map(chat_message).collect::<Result<Vec<_>, _>>()?,
                    _ => Vec::new(),
                };
                Ok(Self::Joined {
                    room_id: required_text(frame, field::ROOM_ID)?.to_owned(),
                    history,
                    chat,
                })
            }
            (syscall::DRAW_APPEND, Status::Request) => Ok(Self::Appended {
                peer_id: peer_id(frame),
                item: DrawItem::from_value(required(frame, field::ITEM)?)?,
            }),
            (syscall::DRAW_REPLACE, Status::Request) => Ok(Self::Replaced {
                peer_id: peer_id(frame),
                history: DrawItem::parse_history(required(frame, field::HISTORY)?)?,
            }),
            (syscall::DRAW_SYNC, Status::Request) => Ok(Self::Synced {
                history: DrawItem::parse_history(required(frame, field::HISTORY)?)?,
                reason: text(frame, field::REASON).unwrap_or_default().to_owned(),
            }),
            (syscall::CHAT_MESSAGE, Status::Request) => {
                Ok(Self::Chat(chat_message(required(frame, field::MESSAGE)?)?))
            }
            (syscall::CURSOR_MOVE, Status::Request) => Ok(Self::Cursor {
                peer_id: required_text(frame, field::PEER_ID)?.to_owned(),
                name: text(frame, field::NAME).unwrap_or_default().to_owned(),
                x: number(frame, field::X)?,
                y: number(frame, field::Y)?,
            }),
            (syscall::ROOM_PART, Status::Request) => Ok(Self::PeerLeft {
                peer_id: required_text(frame, field::PEER_ID)?.to_owned(),
            }),
            _ => Err(EventError::Unexpected { syscall: frame.syscall.clone(), status: frame.status }),
        }
    }
}

fn chat_message(value: &Value) -> Result<ChatMessage, EventError> {
    let message = ChatMessage::deserialize(value).map_err(ItemError::from)?;
    message.validate()?;
    Ok(message)
}

fn required<'a>(frame: &'a Frame, key: &'static str) -> Result<&'a Value, EventError> {
    frame.data.get(key).ok_or_else(|| EventError::MissingField { syscall: frame.syscall.clone(), field: key })
}

fn text<'a>(frame: &'a Frame, key: &str) -> Option<&'a str> {
    frame.data.get(key).and_then(Value::as_str)
}

fn required_text<'a>(frame: &'a Frame, key: &'static str) -> Result<&'a str, EventError> {
    required(frame, key)?
        .as_str()
        .ok_or_else(|| EventError::MissingField { syscall: frame.syscall.clone(), field: key })
}

fn number(frame: &Frame, key: &'static str) -> Result<f64, EventError> {
    required(frame, key)?
        .as_f64()
        .filter(|v| v.is_finite())
        .ok_or_else(|| EventError::MissingField { syscall: frame.syscall.clone(), field: key })
}

/// Originating peer: the `peer_id` field, else the envelope `from`.
fn peer_id(frame: &Frame) -> String {
    text(frame, field::PEER_ID)
        .or(frame.from.as_deref())
        .unwrap_or_default()
        .to_owned()
}
