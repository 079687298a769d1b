//! Runtime configuration loaded from environment variables.
//!
//! SYSTEM CONTEXT
//! ==============
//! `main` calls `dotenvy::dotenv()` first, so every knob below can also be
//! set from a local `.env` file. Unparseable values fall back to defaults.

const DEFAULT_PORT: u16 = 3001;
const DEFAULT_DB_MAX_CONNECTIONS: u32 = 5;
const DEFAULT_PERSIST_QUEUE_CAPACITY: usize = 8192;
const DEFAULT_CLIENT_CHANNEL_CAPACITY: usize = 256;
const DEFAULT_MAX_ROOM_ID_LEN: usize = 128;
const DEFAULT_WS_MAX_MESSAGE_BYTES: usize = 16 * 1024 * 1024;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub port: u16,
    /// Postgres URL. `None` selects the in-memory store.
    pub database_url: Option<String>,
    pub db_max_connections: u32,
    /// Bound of the persistence worker queue.
    pub persist_queue_capacity: usize,
    /// Bound of each connection's outbound frame channel.
    pub client_channel_capacity: usize,
    pub max_room_id_len: usize,
    /// Largest accepted websocket message. Images travel inline as data URLs.
    pub ws_max_message_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            database_url: None,
            db_max_connections: DEFAULT_DB_MAX_CONNECTIONS,
            persist_queue_capacity: DEFAULT_PERSIST_QUEUE_CAPACITY,
            client_channel_capacity: DEFAULT_CLIENT_CHANNEL_CAPACITY,
            max_room_id_len: DEFAULT_MAX_ROOM_ID_LEN,
            ws_max_message_bytes: DEFAULT_WS_MAX_MESSAGE_BYTES,
        }
    }
}

impl ServerConfig {
    #[must_use]
    pub fn from_env() -> Self {
        Self {
            port: env_parse("PORT", DEFAULT_PORT),
            database_url: std::env::var("DATABASE_URL")
                .ok()
                .filter(|v| !v.trim().is_empty()),
            db_max_connections: env_parse("DB_MAX_CONNECTIONS", DEFAULT_DB_MAX_CONNECTIONS),
            persist_queue_capacity: env_parse("PERSIST_QUEUE_CAPACITY", DEFAULT_PERSIST_QUEUE_CAPACITY).max(1),
            client_channel_capacity: env_parse("CLIENT_CHANNEL_CAPACITY", DEFAULT_CLIENT_CHANNEL_CAPACITY).max(1),
            max_room_id_len: env_parse("MAX_ROOM_ID_LEN", DEFAULT_MAX_ROOM_ID_LEN),
            ws_max_message_bytes: env_parse("WS_MAX_MESSAGE_BYTES", DEFAULT_WS_MAX_MESSAGE_BYTES),
        }
    }
}

pub(crate) fn env_parse<T>(key: &str, default: T) -> T
where
    T: std::str::FromStr + Copy,
{
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

#[cfg(test)]
#[path = "config_test.rs"]
mod tests;
