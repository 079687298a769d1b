//! Presence: outbound cursor throttling and the map of peer cursors.
//!
//! Cursor positions are stored in world space so they stay attached to the
//! drawing when the local camera moves; the overlay maps them to screen
//! space at display time. Nothing here is persisted.

#[cfg(test)]
#[path = "presence_test.rs"]
mod presence_test;

use std::collections::HashMap;

use crate::camera::{Camera, Point};
use crate::consts::CURSOR_THROTTLE_MS;

/// Rate limiter for outbound `cursor:move` events.
#[derive(Debug, Clone, Default)]
pub struct CursorThrottle {
    last_sent_ms: Option<f64>,
}

impl CursorThrottle {
    /// Returns `true` and records `now_ms` when more than the throttle
    /// interval has passed since the last accepted event.
    pub fn allow(&mut self, now_ms: f64) -> bool {
        if let Some(last) = self.last_sent_ms {
            if now_ms - last <= CURSOR_THROTTLE_MS {
                return false;
            }
        }
        self.last_sent_ms = Some(now_ms);
        true
    }
}

/// Last known position of one remote peer, in world space.
#[derive(Debug, Clone, PartialEq)]
pub struct PeerCursor {
    pub name: String,
    pub world: Point,
}

/// A peer cursor mapped to screen space for the overlay.
#[derive(Debug, Clone, PartialEq)]
pub struct ScreenCursor {
    pub peer_id: String,
    pub name: String,
    pub screen: Point,
}

#[derive(Debug, Clone, Default)]
pub struct Presence {
    cursors: HashMap<String, PeerCursor>,
}

impl Presence {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    pub fn upsert(&mut self, peer_id: &str, name: &str, world: Point) {
        self.cursors
            .insert(peer_id.to_owned(), PeerCursor { name: name.to_owned(), world });
    }

    /// Drop a departed peer. Returns `true` if it had a cursor.
    pub fn remove(&mut self, peer_id: &str) -> bool {
        self.cursors.remove(peer_id).is_some()
    }

    pub fn clear(&mut self) {
        self.cursors.clear();
    }

    #[must_use]
    pub fn get(&self, peer_id: &str) -> Option<&PeerCursor> {
        self.cursors.get(peer_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.cursors.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.cursors.is_empty()
    }

    /// Every cursor in screen space under `camera`, ordered by peer id.
    #[must_use]
    pub fn screen_positions(&self, camera: &Camera) -> Vec<ScreenCursor> {
        let mut out: Vec<ScreenCursor> = self
            .cursors
            .iter()
            .map(|(peer_id, cursor)| ScreenCursor {
                peer_id: peer_id.clone(),
                name: cursor.name.clone(),
                screen: camera.world_to_screen(cursor.world),
            })
            .collect();
        out.sort_by(|a, b| a.peer_id.cmp(&b.peer_id));
        out
    }
}
