//! Shared application state.

use kv_store::KvStore;
use llm_client::ChatClient;
use market_gen::GenConfig;
use std::sync::Arc;

pub struct AppState {
    pub store: KvStore,
    /// Absent when no API key is configured; the market then serves only the
    /// seed board and dossier generation fails cleanly.
    pub llm: Option<ChatClient>,
    pub gen: GenConfig,
}

pub type SharedState = Arc<AppState>;

impl AppState {
    pub fn llm(&self) -> Option<&ChatClient> {
        self.llm.as_ref()
    }
}
