//! Domain services used by the websocket relay.
//!
//! ARCHITECTURE
//! ============
//! Service modules own room state and persistence concerns so the route
//! handler can stay focused on protocol translation and session plumbing.

pub mod cursor;
pub mod persistence;
pub mod room;
