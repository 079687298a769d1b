mod config;
mod db;
mod frame;
mod routes;
mod services;
mod state;
mod store;

use std::sync::Arc;

use tracing_subscriber::EnvFilter;

use crate::config::ServerConfig;
use crate::store::{DocumentStore, MemoryStore, PgStore};

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let config = ServerConfig::from_env();

    let store: Arc<dyn DocumentStore> = if let Some(url) = &config.database_url {
        let pool = db::init_pool(url, config.db_max_connections)
            .await
            .expect("database init failed");
        tracing::info!(max_connections = config.db_max_connections, "postgres document store ready");
        Arc::new(PgStore::new(pool))
    } else {
        tracing::warn!("DATABASE_URL not set; using in-memory store, rooms will not survive a restart");
        Arc::new(MemoryStore::new())
    };

    let persist_tx = services::persistence::spawn_persistence_worker(store.clone(), config.persist_queue_capacity);

    let port = config.port;
    let state = state::AppState::new(store, persist_tx, config);

    let app = routes::app(state);
    let listener = tokio::net::TcpListener::bind(format!("0.0.0.0:{port}"))
        .await
        .expect("failed to bind");

    tracing::info!(%port, "liveboard relay listening");
    axum::serve(listener, app).await.expect("server failed");
}
