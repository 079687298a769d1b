//! Wire model shared by the LiveBoard relay and its clients.
//!
//! DESIGN
//! ======
//! Everything on the socket is a [`Frame`]: an envelope naming a syscall, a
//! lifecycle [`Status`], an optional room, and a free-form JSON `data` map.
//! Replies point back at their request through `parent_id`. The envelope is
//! protobuf on the binary wire and plain serde JSON on the text wire.
//!
//! Payloads stay untyped in the envelope. The typed whiteboard values
//! ([`DrawItem`], [`ChatMessage`]) are parsed out of `data` at the edges, and
//! [`syscall`] names the operations and payload keys both sides agree on.

pub mod item;
pub mod syscall;
mod wire;

pub use item::{ChatMessage, DrawItem, ItemError, Tool, history_to_value};

use prost::Message;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::wire::{WireFrame, WireStatus};

#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("failed to decode protobuf frame: {0}")]
    Decode(#[from] prost::DecodeError),
    #[error("invalid frame status: {0}")]
    InvalidStatus(i32),
}

/// Where a frame sits in a request/reply exchange.
///
/// Relay notices (`draw:append` to peers, `cursor:move`, `room:part`) travel
/// as `Request`; replies to a client's own request are `Done` or `Error`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Status {
    Request,
    Item,
    Bulk,
    Done,
    Error,
    Cancel,
}

impl Status {
    #[must_use]
    pub fn as_i32(self) -> i32 {
        WireStatus::from(self) as i32
    }

    fn from_i32(value: i32) -> Result<Self, CodecError> {
        WireStatus::try_from(value)
            .map(Self::from)
            .map_err(|_| CodecError::InvalidStatus(value))
    }

    /// `Done`, `Error` and `Cancel` end an exchange.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Done | Self::Error | Self::Cancel)
    }
}

/// One message on the relay socket.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Frame {
    /// UUID string chosen by the sender.
    pub id: String,
    /// The request this frame answers.
    pub parent_id: Option<String>,
    /// Milliseconds since the Unix epoch.
    pub ts: i64,
    pub room_id: Option<String>,
    /// Peer id of the originating connection, stamped by the relay.
    pub from: Option<String>,
    /// `prefix:op`, e.g. `"draw:append"`.
    pub syscall: String,
    pub status: Status,
    pub data: Value,
}

impl Frame {
    /// Whether this frame is a reply to the request with id `request_id`.
    #[must_use]
    pub fn answers(&self, request_id: &str) -> bool {
        self.parent_id.as_deref() == Some(request_id)
    }

    /// `data.code` of an error reply.
    #[must_use]
    pub fn error_code(&self) -> Option<&str> {
        self.error_field(syscall::field::CODE)
    }

    /// `data.message` of an error reply.
    #[must_use]
    pub fn error_message(&self) -> Option<&str> {
        self.error_field(syscall::field::MESSAGE)
    }

    fn error_field(&self, key: &str) -> Option<&str> {
        if self.status != Status::Error {
            return None;
        }
        self.data.get(key).and_then(Value::as_str)
    }
}

/// Encode a frame as protobuf bytes.
#[must_use]
pub fn encode_frame(frame: &Frame) -> Vec<u8> {
    WireFrame::from(frame).encode_to_vec()
}

/// Decode protobuf bytes into a frame.
///
/// # Errors
///
/// [`CodecError::Decode`] for malformed bytes, [`CodecError::InvalidStatus`]
/// for a status number outside the wire enum.
pub fn decode_frame(bytes: &[u8]) -> Result<Frame, CodecError> {
    Frame::try_from(WireFrame::decode(bytes)?)
}

#[cfg(test)]
#[path = "lib_test.rs"]
mod tests;
