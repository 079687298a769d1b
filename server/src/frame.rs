//! Frame: the server-side view of the wire envelope.
//!
//! ARCHITECTURE
//! ============
//! Clients send request frames over WebSocket, the relay dispatches by
//! syscall prefix, and responses flow back as done/error frames. Peer
//! notifications are fresh request frames stamped with the room and the
//! originating peer.
//!
//! DESIGN
//! ======
//! - Flat data: payload is a `HashMap<String, Value>` at the top level.
//! - Responses correlate to requests via `parent_id`.
//! - Conversion to and from `frames::Frame` happens only at the socket edge.

use std::collections::HashMap;
use std::time::{SystemTime, UNIX_EPOCH};

use frames::syscall::field;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub use frames::Status;

/// Flat key-value payload. Alias to reduce noise in signatures.
pub type Data = HashMap<String, serde_json::Value>;

/// The universal message type.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Frame {
    pub id: Uuid,
    pub parent_id: Option<Uuid>,
    /// Milliseconds since Unix epoch. Set automatically at construction.
    pub ts: i64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub room_id: Option<String>,
    #[serde(default)]
    pub from: Option<String>,
    pub syscall: String,
    pub status: Status,
    #[serde(default)]
    pub data: Data,
}

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured error frames.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// CONSTRUCTORS
// =============================================================================

/// Current time as milliseconds since Unix epoch.
pub fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Frame {
    /// Create a request frame. Also used for server-originated notices.
    pub fn request(syscall: impl Into<String>, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: None,
            ts: now_ms(),
            room_id: None,
            from: None,
            syscall: syscall.into(),
            status: Status::Request,
            data,
        }
    }

    /// Create a done response. Terminal, carries no data.
    #[must_use]
    pub fn done(&self) -> Self {
        self.reply(Status::Done, Data::new())
    }

    /// Create a done response carrying a payload. Terminal.
    #[must_use]
    pub fn done_with(&self, data: Data) -> Self {
        self.reply(Status::Done, data)
    }

    /// Create a structured error response from a typed error. Terminal.
    #[must_use]
    pub fn error_from(&self, err: &(impl ErrorCode + ?Sized)) -> Self {
        let mut data = Data::new();
        data.insert(field::CODE.into(), serde_json::Value::String(err.error_code().to_string()));
        data.insert(field::MESSAGE.into(), serde_json::Value::String(err.to_string()));
        data.insert(field::RETRYABLE.into(), serde_json::Value::Bool(err.retryable()));
        self.reply(Status::Error, data)
    }

    /// Build a reply frame. Inherits `parent_id`, `room_id`, and `syscall`.
    fn reply(&self, status: Status, data: Data) -> Self {
        Self {
            id: Uuid::new_v4(),
            parent_id: Some(self.id),
            ts: now_ms(),
            room_id: self.room_id.clone(),
            from: None,
            syscall: self.syscall.clone(),
            status,
            data,
        }
    }
}

// =============================================================================
// BUILDERS
// =============================================================================

impl Frame {
    #[must_use]
    pub fn with_room_id(mut self, room_id: impl Into<String>) -> Self {
        self.room_id = Some(room_id.into());
        self
    }

    #[must_use]
    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = Some(from.into());
        self
    }

    #[must_use]
    pub fn with_data(mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) -> Self {
        self.data.insert(key.into(), value.into());
        self
    }
}

// =============================================================================
// ROUTING
// =============================================================================

impl Frame {
    /// Extract the syscall prefix (everything before the first ':').
    #[must_use]
    pub fn prefix(&self) -> &str {
        let Some((prefix, _)) = self.syscall.split_once(':') else {
            return &self.syscall;
        };
        prefix
    }

    /// Extract the operation (everything after the first ':').
    #[must_use]
    pub fn op(&self) -> &str {
        self.syscall.split_once(':').map_or("", |(_, op)| op)
    }
}

// =============================================================================
// WIRE CONVERSION
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum WireError {
    #[error("frame id is not a uuid: {0}")]
    InvalidId(String),
    #[error("frame parent_id is not a uuid: {0}")]
    InvalidParentId(String),
    #[error("frame data must be an object")]
    DataNotObject,
}

impl From<&Frame> for frames::Frame {
    fn from(frame: &Frame) -> Self {
        Self {
            id: frame.id.to_string(),
            parent_id: frame.parent_id.map(|id| id.to_string()),
            ts: frame.ts,
            room_id: frame.room_id.clone(),
            from: frame.from.clone(),
            syscall: frame.syscall.clone(),
            status: frame.status,
            data: serde_json::Value::Object(frame.data.clone().into_iter().collect()),
        }
    }
}

impl TryFrom<frames::Frame> for Frame {
    type Error = WireError;

    fn try_from(wire: frames::Frame) -> Result<Self, Self::Error> {
        let id = Uuid::parse_str(&wire.id).map_err(|_| WireError::InvalidId(wire.id.clone()))?;
        let parent_id = match wire.parent_id {
            Some(p) if !p.is_empty() => {
                Some(Uuid::parse_str(&p).map_err(|_| WireError::InvalidParentId(p.clone()))?)
            }
            _ => None,
        };
        let data = match wire.data {
            serde_json::Value::Object(map) => map.into_iter().collect(),
            serde_json::Value::Null => Data::new(),
            _ => return Err(WireError::DataNotObject),
        };

        Ok(Self {
            id,
            parent_id,
            ts: wire.ts,
            room_id: wire.room_id.filter(|r| !r.is_empty()),
            from: wire.from,
            syscall: wire.syscall,
            status: wire.status,
            data,
        })
    }
}

#[cfg(test)]
#[path = "frame_test.rs"]
mod tests;
