//! In-memory document store. Contents are lost on restart.

use std::collections::HashMap;

use async_trait::async_trait;
use frames::{ChatMessage, DrawItem};
use tokio::sync::RwLock;

use super::{DocumentStore, RoomRecord, StoreError};

#[derive(Default)]
pub struct MemoryStore {
    rooms: RwLock<HashMap<String, RoomRecord>>,
}

impl MemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    async fn get_or_create(&self, room_id: &str) -> Result<RoomRecord, StoreError> {
        let mut rooms = self.rooms.write().await;
        let record = rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomRecord::empty(room_id));
        Ok(record.clone())
    }

    async fn append_draw(&self, room_id: &str, item: &DrawItem) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomRecord::empty(room_id))
            .draw_history
            .push(item.clone());
        Ok(())
    }

    async fn replace_draw(&self, room_id: &str, items: &[DrawItem]) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomRecord::empty(room_id))
            .draw_history = items.to_vec();
        Ok(())
    }

    async fn clear_draw(&self, room_id: &str) -> Result<(), StoreError> {
        self.replace_draw(room_id, &[]).await
    }

    async fn append_chat(&self, room_id: &str, message: &ChatMessage) -> Result<(), StoreError> {
        let mut rooms = self.rooms.write().await;
        rooms
            .entry(room_id.to_owned())
            .or_insert_with(|| RoomRecord::empty(room_id))
            .chat_history
            .push(message.clone());
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod tests;
