//! Outbound relay frames.
//!
//! [`Outbound`] knows the joined room and the display name and turns engine
//! [`Action`]s and toolbar commands into request frames. Timestamps come
//! from the caller so this module never touches a clock.

#[cfg(test)]
#[path = "net_test.rs"]
mod net_test;

use frames::syscall::{self, field};
use frames::{DrawItem, Frame, Status, history_to_value};
use serde_json::{Map, Value, json};
use uuid::Uuid;

use crate::engine::Action;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Outbound {
    pub room_id: String,
    pub name: String,
}

impl Outbound {
    #[must_use]
    pub fn new(room_id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { room_id: room_id.into(), name: name.into() }
    }

    #[must_use]
    pub fn join(&self, ts: i64) -> Frame {
        self.request(
            syscall::ROOM_JOIN,
            ts,
            json!({ field::ROOM_ID: self.room_id, field::NAME: self.name }),
        )
    }

    #[must_use]
    pub fn append(&self, item: &DrawItem, ts: i64) -> Frame {
        self.request(syscall::DRAW_APPEND, ts, json!({ field::ITEM: item.to_value() }))
    }

    #[must_use]
    pub fn replace(&self, history: &[DrawItem], ts: i64) -> Frame {
        self.request(syscall::DRAW_REPLACE, ts, json!({ field::HISTORY: history_to_value(history) }))
    }

    #[must_use]
    pub fn undo(&self, ts: i64) -> Frame {
        self.request(syscall::DRAW_UNDO, ts, Value::Object(Map::new()))
    }

    #[must_use]
    pub fn clear(&self, ts: i64) -> Frame {
        self.request(syscall::DRAW_CLEAR, ts, Value::Object(Map::new()))
    }

    /// Chat message without a timestamp; the relay stamps arrival time.
    #[must_use]
    pub fn chat(&self, text: &str, ts: i64) -> Frame {
        self.request(
            syscall::CHAT_SEND,
            ts,
            json!({ field::MESSAGE: { "author": self.name, "text": text } }),
        )
    }

    #[must_use]
    pub fn cursor(&self, x: f64, y: f64, ts: i64) -> Frame {
        self.request(
            syscall::CURSOR_MOVE,
            ts,
            json!({ field::X: x, field::Y: y, field::NAME: self.name }),
        )
    }

    /// Frame for an engine action, if the action goes to the relay.
    #[must_use]
    pub fn for_action(&self, action: &Action, ts: i64) -> Option<Frame> {
        match action {
            Action::Append(item) => Some(self.append(item, ts)),
            Action::Replace(history) => Some(self.replace(history, ts)),
            Action::Cursor(pt) => Some(self.cursor(pt.x, pt.y, ts)),
            Action::PromptText(_) | Action::LoadImage(_) | Action::PresenceChanged => None,
        }
    }

    fn request(&self, syscall: &str, ts: i64, data: Value) -> Frame {
        Frame {
            id: Uuid::new_v4().to_string(),
            parent_id: None,
            ts,
            room_id: Some(self.room_id.clone()),
            from: None,
            syscall: syscall.to_owned(),
            status: Status::Request,
            data,
        }
    }
}
