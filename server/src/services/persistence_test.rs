use super::*;
use crate::config::ServerConfig;
use crate::state::test_helpers::{self, stroke, text_item};
use crate::store::{MemoryStore, RoomRecord};
use async_trait::async_trait;
use tokio::time::{Duration, timeout};

/// Store double whose writes always fail.
struct FailingStore;

#[async_trait]
impl DocumentStore for FailingStore {
    async fn get_or_create(&self, room_id: &str) -> Result<RoomRecord, StoreError> {
        Ok(RoomRecord::empty(room_id))
    }

    async fn append_draw(&self, _room_id: &str, _item: &DrawItem) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn replace_draw(&self, _room_id: &str, _items: &[DrawItem]) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn clear_draw(&self, _room_id: &str) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }

    async fn append_chat(&self, _room_id: &str, _message: &ChatMessage) -> Result<(), StoreError> {
        Err(StoreError::Database(sqlx::Error::PoolTimedOut))
    }
}

async fn wait_drained(room: &RoomState) {
    timeout(Duration::from_secs(2), async {
        while room.pending() > 0 {
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
    })
    .await
    .expect("worker did not drain");
}

#[tokio::test]
async fn worker_applies_jobs_in_enqueue_order() {
    let state = test_helpers::test_app_state();
    let room = RoomState::new("ordered");

    enqueue(&state, &room, PersistOp::AppendDraw(stroke(1.0, 1.0)));
    enqueue(&state, &room, PersistOp::AppendDraw(stroke(2.0, 2.0)));
    enqueue(&state, &room, PersistOp::ReplaceDraw(vec![text_item("only")]));
    enqueue(&state, &room, PersistOp::AppendDraw(stroke(3.0, 3.0)));
    wait_drained(&room).await;

    let record = state.store.get_or_create("ordered").await.expect("record");
    assert_eq!(record.draw_history, vec![text_item("only"), stroke(3.0, 3.0)]);
}

#[tokio::test]
async fn clear_and_chat_jobs_reach_store() {
    let state = test_helpers::test_app_state();
    let room = RoomState::new("mixed");
    let msg = ChatMessage { author: "ann".into(), text: "hi".into(), timestamp: 9 };

    enqueue(&state, &room, PersistOp::AppendDraw(stroke(1.0, 1.0)));
    enqueue(&state, &room, PersistOp::ClearDraw);
    enqueue(&state, &room, PersistOp::AppendChat(msg.clone()));
    wait_drained(&room).await;

    let record = state.store.get_or_create("mixed").await.expect("record");
    assert!(record.draw_history.is_empty());
    assert_eq!(record.chat_history, vec![msg]);
}

#[tokio::test]
async fn failed_write_still_releases_pending_counter() {
    let state = test_helpers::test_app_state_with_store(Arc::new(FailingStore));
    let room = RoomState::new("doomed");

    enqueue(&state, &room, PersistOp::AppendDraw(stroke(1.0, 1.0)));
    enqueue(&state, &room, PersistOp::ClearDraw);
    wait_drained(&room).await;

    assert_eq!(room.pending(), 0);
}

#[tokio::test]
async fn full_queue_drops_write_and_restores_counter() {
    let (tx, mut rx) = mpsc::channel::<PersistJob>(1);
    let state = AppState::new(Arc::new(MemoryStore::new()), tx, ServerConfig::default());
    let room = RoomState::new("busy");

    enqueue(&state, &room, PersistOp::ClearDraw);
    enqueue(&state, &room, PersistOp::AppendDraw(stroke(1.0, 1.0)));

    assert_eq!(room.pending(), 1, "only the queued job counts as pending");
    let queued = rx.try_recv().expect("first job queued");
    assert_eq!(queued.op, PersistOp::ClearDraw);
    assert!(rx.try_recv().is_err());
}

#[tokio::test]
async fn closed_queue_drops_write_and_restores_counter() {
    let (tx, rx) = mpsc::channel::<PersistJob>(4);
    drop(rx);
    let state = AppState::new(Arc::new(MemoryStore::new()), tx, ServerConfig::default());
    let room = RoomState::new("closed");

    enqueue(&state, &room, PersistOp::ClearDraw);
    assert_eq!(room.pending(), 0);
}
