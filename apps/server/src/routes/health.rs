//! Liveness probe.

use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use market_core::HourKey;
use serde::Serialize;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: &'static str,
    pub backend: &'static str,
    pub hour_key: HourKey,
}

/// `GET /health`: 200 whenever the server is up.
pub async fn health(State(state): State<SharedState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy",
        backend: state.store.backend_name(),
        hour_key: HourKey::now(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn response_shape() {
        let r = HealthResponse {
            status: "healthy",
            backend: "memory",
            hour_key: HourKey::parse("2026-02-02T18").unwrap(),
        };
        let json = serde_json::to_string(&r).unwrap();
        assert!(json.contains("\"status\":\"healthy\""));
        assert!(json.contains("\"hourKey\":\"2026-02-02T18\""));
    }
}
