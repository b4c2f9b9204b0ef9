#![deny(warnings)]

//! HTTP server for the Runic Index market and the Pearly Gates judgment game.

mod app;
mod config;
mod error;
mod routes;
mod state;

use anyhow::Result;
use config::ServerConfig;
use kv_store::KvStore;
use llm_client::{ChatClient, LlmError};
use state::AppState;
use std::sync::Arc;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let config = ServerConfig::from_env();
    let store = KvStore::from_env().await;
    let llm = match ChatClient::from_env() {
        Ok(client) => {
            info!(model = %client.model, "chat client configured");
            Some(client)
        }
        Err(LlmError::MissingApiKey) => {
            warn!("OPENAI_API_KEY not set; market runs on the seed board only");
            None
        }
        Err(e) => return Err(e.into()),
    };

    info!(
        backend = store.backend_name(),
        mode = ?config.gen.mode,
        addr = %config.bind_addr(),
        "starting server"
    );

    let state = Arc::new(AppState {
        store,
        llm,
        gen: config.gen.clone(),
    });
    let app = app::create_app(state);

    let listener = tokio::net::TcpListener::bind(config.bind_addr()).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
