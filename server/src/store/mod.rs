//! Document Store: durable per-room records.
//!
//! DESIGN
//! ======
//! The relay treats the store as an opaque record store keyed by room id.
//! Rooms are hydrated with `get_or_create` on first join; every later write
//! arrives through the persistence worker in server arrival order, so
//! implementations only need per-call atomicity.
//!
//! Two implementations ship: `MemoryStore` (no `DATABASE_URL`, tests) and
//! `PgStore` (JSONB columns in one `rooms` table).

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use frames::{ChatMessage, DrawItem};

pub use memory::MemoryStore;
pub use postgres::PgStore;

/// Durable contents of one room.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RoomRecord {
    pub room_id: String,
    pub draw_history: Vec<DrawItem>,
    pub chat_history: Vec<ChatMessage>,
}

impl RoomRecord {
    #[must_use]
    pub fn empty(room_id: &str) -> Self {
        Self { room_id: room_id.to_owned(), ..Self::default() }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
    #[error("room {room_id} has an unreadable {column} column: {source}")]
    Corrupt {
        room_id: String,
        column: &'static str,
        #[source]
        source: serde_json::Error,
    },
}

impl crate::frame::ErrorCode for StoreError {
    fn error_code(&self) -> &'static str {
        "E_STORE"
    }

    fn retryable(&self) -> bool {
        matches!(self, Self::Database(_))
    }
}

/// Async record store behind the room manager.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch a room's record, creating an empty one if none exists.
    async fn get_or_create(&self, room_id: &str) -> Result<RoomRecord, StoreError>;

    async fn append_draw(&self, room_id: &str, item: &DrawItem) -> Result<(), StoreError>;

    /// Overwrite the draw history.
    async fn replace_draw(&self, room_id: &str, items: &[DrawItem]) -> Result<(), StoreError>;

    async fn clear_draw(&self, room_id: &str) -> Result<(), StoreError>;

    async fn append_chat(&self, room_id: &str, message: &ChatMessage) -> Result<(), StoreError>;
}
