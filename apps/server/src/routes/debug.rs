//! Storage diagnostics. Secrets are redacted, never echoed.

use crate::error::{AppError, AppResult};
use crate::state::SharedState;
use axum::extract::State;
use axum::Json;
use kv_store::ProbeReport;
use market_core::HourKey;
use market_gen::keys::{kv_probe_key, market_hour_key};
use serde_json::{json, Value};

fn redact(value: Option<String>) -> Value {
    match value {
        None => Value::Null,
        Some(v) if v.chars().count() <= 12 => json!("[set]"),
        Some(v) => {
            let head: String = v.chars().take(6).collect();
            let tail: String = v.chars().skip(v.chars().count() - 4).collect();
            json!(format!("{head}...{tail}"))
        }
    }
}

fn env(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

/// `GET /api/debug/storage`: which backend is live and which env vars fed it.
pub async fn storage(State(state): State<SharedState>) -> Json<Value> {
    let hour = HourKey::now();
    Json(json!({
        "ok": true,
        "now": chrono::Utc::now().to_rfc3339(),
        "hourKey": hour,
        "marketKey": market_hour_key(&hour),
        "backend": state.store.backend_name(),
        "modelConfigured": state.llm.is_some(),
        "env": {
            "hasKvRest": env("KV_REST_API_URL").is_some() && env("KV_REST_API_TOKEN").is_some(),
            "hasRedisUrl": env("REDIS_URL").is_some(),
            "KV_REST_API_URL": redact(env("KV_REST_API_URL")),
            "KV_REST_API_TOKEN": redact(env("KV_REST_API_TOKEN")),
            "REDIS_URL": redact(env("REDIS_URL")),
        },
    }))
}

/// `GET /api/debug/kv-test`: write-then-read probe against the live backend.
pub async fn kv_test(State(state): State<SharedState>) -> AppResult<Json<ProbeReport>> {
    let hour = HourKey::now();
    let report = state
        .store
        .probe(&kv_probe_key(&hour))
        .await
        .map_err(|e| AppError::Internal {
            message: e.to_string(),
            raw: None,
        })?;
    Ok(Json(report))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn redaction_never_leaks_short_or_long_values() {
        assert_eq!(redact(None), Value::Null);
        assert_eq!(redact(Some("secret".into())), json!("[set]"));
        let long = redact(Some("https://kv.example.upstash.io".into()));
        let s = long.as_str().unwrap();
        assert!(s.starts_with("https:"));
        assert!(!s.contains("example.upstash"));
    }
}
