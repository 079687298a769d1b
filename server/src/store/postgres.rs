//! Postgres document store.
//!
//! One row per room; both histories are JSONB arrays. Appends concatenate
//! server-side so a write never needs the previous contents, and every
//! write upserts so the worker can run ahead of a room's first hydration.

use async_trait::async_trait;
use frames::{ChatMessage, DrawItem, history_to_value};
use serde_json::Value;
use sqlx::PgPool;

use super::{DocumentStore, RoomRecord, StoreError};

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn decode_column<T>(room_id: &str, column: &'static str, value: Value) -> Result<Vec<T>, StoreError>
where
    T: serde::de::DeserializeOwned,
{
    serde_json::from_value(value).map_err(|source| StoreError::Corrupt {
        room_id: room_id.to_owned(),
        column,
        source,
    })
}

#[async_trait]
impl DocumentStore for PgStore {
    async fn get_or_create(&self, room_id: &str) -> Result<RoomRecord, StoreError> {
        sqlx::query("INSERT INTO rooms (room_id) VALUES ($1) ON CONFLICT (room_id) DO NOTHING")
            .bind(room_id)
            .execute(&self.pool)
            .await?;

        let (draw, chat) = sqlx::query_as::<_, (Value, Value)>(
            "SELECT draw_history, chat_history FROM rooms WHERE room_id = $1",
        )
        .bind(room_id)
        .fetch_one(&self.pool)
        .await?;

        Ok(RoomRecord {
            room_id: room_id.to_owned(),
            draw_history: decode_column(room_id, "draw_history", draw)?,
            chat_history: decode_column(room_id, "chat_history", chat)?,
        })
    }

    async fn append_draw(&self, room_id: &str, item: &DrawItem) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO rooms (room_id, draw_history) VALUES ($1, jsonb_build_array($2::jsonb))
             ON CONFLICT (room_id) DO UPDATE
             SET draw_history = rooms.draw_history || jsonb_build_array($2::jsonb), updated_at = now()",
        )
        .bind(room_id)
        .bind(item.to_value())
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn replace_draw(&self, room_id: &str, items: &[DrawItem]) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO rooms (room_id, draw_history) VALUES ($1, $2)
             ON CONFLICT (room_id) DO UPDATE
             SET draw_history = EXCLUDED.draw_history, updated_at = now()",
        )
        .bind(room_id)
        .bind(history_to_value(items))
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn clear_draw(&self, room_id: &str) -> Result<(), StoreError> {
        self.replace_draw(room_id, &[]).await
    }

    async fn append_chat(&self, room_id: &str, message: &ChatMessage) -> Result<(), StoreError> {
        sqlx::query(
            "INSERT INTO rooms (room_id, chat_history) VALUES ($1, jsonb_build_array($2::jsonb))
             ON CONFLICT (room_id) DO UPDATE
             SET chat_history = rooms.chat_history || jsonb_build_array($2::jsonb), updated_at = now()",
        )
        .bind(room_id)
        .bind(message.to_value())
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}

#[cfg(all(test, feature = "live-db-tests"))]
#[path = "postgres_test.rs"]
mod tests;
