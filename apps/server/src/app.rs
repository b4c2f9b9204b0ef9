//! Router assembly.

use crate::routes::{account, debug, game, health, market, trade};
use crate::state::SharedState;
use axum::routing::{get, post};
use axum::Router;
use std::time::Duration;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// Create the Axum application with all routes.
pub fn create_app(state: SharedState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any)
        .max_age(Duration::from_secs(3600));

    Router::new()
        .route("/health", get(health::health))
        // Runic Index
        .route("/api/market/state", post(market::market_state))
        .route("/api/trade/execute", post(trade::execute))
        .route("/api/account/get", post(account::get))
        .route("/api/account/reset", post(account::reset))
        // Pearly Gates
        .route("/api/game/start", post(game::start))
        .route("/api/game/ask", post(game::ask))
        .route("/api/game/judge", post(game::judge))
        // Diagnostics
        .route("/api/debug/storage", get(debug::storage))
        .route("/api/debug/kv-test", get(debug::kv_test))
        .layer(TraceLayer::new_for_http())
        .layer(cors)
        .with_state(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::state::AppState;
    use kv_store::KvStore;
    use market_gen::GenConfig;
    use std::sync::Arc;

    #[test]
    fn app_builds_with_memory_state() {
        let state = Arc::new(AppState {
            store: KvStore::memory(),
            llm: None,
            gen: GenConfig::default(),
        });
        let _app = create_app(state);
    }
}
