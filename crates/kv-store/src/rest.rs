//! Upstash-style REST backend.
//!
//! The managed service speaks single Redis commands as JSON arrays POSTed to
//! the base URL with a bearer token; replies are `{"result": ...}` where a
//! null result means miss (GET) or not-set (SET NX).

use crate::KvError;
use serde::Deserialize;
use serde_json::{json, Value};
use std::time::Duration;

#[derive(Debug, Deserialize)]
struct RestReply {
    #[serde(default)]
    result: Value,
    #[serde(default)]
    error: Option<String>,
}

pub(crate) struct RestKv {
    http: reqwest::Client,
    base_url: String,
    token: String,
}

impl RestKv {
    pub(crate) fn new(base_url: String, token: String) -> Self {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .unwrap_or_default();
        RestKv {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
        }
    }

    async fn command(&self, command: Value) -> Result<Value, KvError> {
        let response = self
            .http
            .post(&self.base_url)
            .bearer_auth(&self.token)
            .json(&command)
            .send()
            .await
            .map_err(|e| KvError::Rest(e.to_string()))?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| KvError::Rest(e.to_string()))?;
        if !status.is_success() {
            return Err(KvError::Rest(format!("http {status}: {body}")));
        }

        let reply: RestReply =
            serde_json::from_str(&body).map_err(|e| KvError::Rest(e.to_string()))?;
        if let Some(err) = reply.error {
            return Err(KvError::Rest(err));
        }
        Ok(reply.result)
    }

    pub(crate) async fn get(&self, key: &str) -> Result<Option<String>, KvError> {
        let result = self.command(json!(["GET", key])).await?;
        match result {
            Value::Null => Ok(None),
            Value::String(s) => Ok(Some(s)),
            other => Ok(Some(other.to_string())),
        }
    }

    pub(crate) async fn set(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: Option<u64>,
    ) -> Result<(), KvError> {
        let command = match ttl_seconds {
            Some(ttl) => json!(["SET", key, value, "EX", ttl]),
            None => json!(["SET", key, value]),
        };
        self.command(command).await?;
        Ok(())
    }

    pub(crate) async fn set_nx(
        &self,
        key: &str,
        value: &str,
        ttl_seconds: u64,
    ) -> Result<bool, KvError> {
        let result = self
            .command(json!(["SET", key, value, "NX", "EX", ttl_seconds]))
            .await?;
        // "OK" on success, null when the key already exists.
        Ok(!result.is_null())
    }
}
