//! Lazy hourly generation behind a best-effort lock.
//!
//! The first request inside a new UTC hour pays the generation cost; everyone
//! else reads the cached state. Exactly one caller may generate: losers of the
//! lock race poll the cache briefly and then bail with a retryable error
//! rather than generating unlocked.

use crate::keys::{market_hour_key, market_hour_lock_key, LOCK_TTL_SECONDS, MARKET_TTL_SECONDS};
use crate::prompt::{build_delta_prompt, build_full_prompt, MARKET_MAX_TOKENS};
use crate::{parse_delta_response, parse_full_response, MarketGenError};
use kv_store::KvStore;
use llm_client::{ChatClient, ChatRequest};
use market_core::{seed_market, HourKey, MarketHourState};
use std::str::FromStr;
use std::time::Duration;

/// How a new hour is derived from the previous one.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum GenMode {
    /// The model re-emits the whole 25-company board.
    Full,
    /// The model emits one price update per ticker plus an optional
    /// delist/replacement pair. Cheaper and harder to get wrong.
    Delta,
}

impl FromStr for GenMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "full" => Ok(GenMode::Full),
            "delta" => Ok(GenMode::Delta),
            other => Err(format!("unknown generation mode {other:?}")),
        }
    }
}

/// Tunables for the generation pipeline.
#[derive(Clone, Debug)]
pub struct GenConfig {
    pub mode: GenMode,
    /// TTL on the per-hour generation lock. Shorter than an hour so a crashed
    /// holder cannot wedge the bucket.
    pub lock_ttl_seconds: u64,
    /// How many times a lock loser re-checks the cache before giving up.
    pub poll_attempts: u32,
    /// First poll delay; doubles on each subsequent attempt.
    pub poll_initial_ms: u64,
}

impl Default for GenConfig {
    fn default() -> Self {
        GenConfig {
            mode: GenMode::Delta,
            lock_ttl_seconds: LOCK_TTL_SECONDS,
            poll_attempts: 5,
            poll_initial_ms: 300,
        }
    }
}

/// Return the market state for `hour_key`, generating and caching it if this
/// caller wins the generation lock.
///
/// The first hour ever (no previous state in the cache) is served from the
/// built-in seed board without touching the model, so the system boots with
/// no API key configured.
pub async fn get_or_create_market_hour(
    store: &KvStore,
    llm: Option<&ChatClient>,
    hour_key: &HourKey,
    cfg: &GenConfig,
) -> Result<MarketHourState, MarketGenError> {
    let state_key = market_hour_key(hour_key);
    if let Some(state) = load_cached(store, &state_key, hour_key).await {
        return Ok(state);
    }

    let lock_key = market_hour_lock_key(hour_key);
    if store
        .try_acquire_lock(&lock_key, cfg.lock_ttl_seconds)
        .await
        .is_none()
    {
        return poll_for_published(store, &state_key, hour_key, cfg).await;
    }

    // Re-check under the lock; the previous holder may have published
    // between our cache miss and the acquire.
    if let Some(state) = load_cached(store, &state_key, hour_key).await {
        return Ok(state);
    }

    let prev_key = market_hour_key(&hour_key.prev());
    let prev: Option<MarketHourState> = store
        .get_json::<MarketHourState>(&prev_key)
        .await
        .filter(|s| !s.companies.is_empty());

    let state = match &prev {
        None => {
            tracing::info!(%hour_key, "no previous hour in cache; publishing seed board");
            seed_market(hour_key)
        }
        Some(prev) => {
            let llm = llm.ok_or(MarketGenError::LlmUnavailable)?;
            let prompt = match cfg.mode {
                GenMode::Full => build_full_prompt(hour_key, Some(prev)),
                GenMode::Delta => build_delta_prompt(hour_key, prev),
            };
            let raw = llm
                .complete(&ChatRequest {
                    system: &prompt,
                    max_tokens: MARKET_MAX_TOKENS,
                    json_object: true,
                })
                .await?;
            let parsed = match cfg.mode {
                GenMode::Full => parse_full_response(hour_key, Some(prev), &raw),
                GenMode::Delta => parse_delta_response(hour_key, prev, &raw),
            };
            match parsed {
                Ok(state) => state,
                Err(e) => {
                    tracing::warn!(%hour_key, error = %e, "model output rejected");
                    return Err(e);
                }
            }
        }
    };

    store
        .set_json(&state_key, &state, Some(MARKET_TTL_SECONDS))
        .await;
    tracing::info!(
        %hour_key,
        companies = state.companies.len(),
        delisted = state.delisted.len(),
        "published market hour"
    );
    Ok(state)
}

async fn load_cached(
    store: &KvStore,
    state_key: &str,
    hour_key: &HourKey,
) -> Option<MarketHourState> {
    store
        .get_json::<MarketHourState>(state_key)
        .await
        .filter(|s| s.hour_key == *hour_key && !s.companies.is_empty())
}

/// Lock losers wait for the winner to publish, with doubling delays. If the
/// state never appears the caller gets a retryable error instead of a second,
/// racing generation.
async fn poll_for_published(
    store: &KvStore,
    state_key: &str,
    hour_key: &HourKey,
    cfg: &GenConfig,
) -> Result<MarketHourState, MarketGenError> {
    let mut delay = Duration::from_millis(cfg.poll_initial_ms);
    for _ in 0..cfg.poll_attempts {
        tokio::time::sleep(delay).await;
        if let Some(state) = load_cached(store, state_key, hour_key).await {
            return Ok(state);
        }
        delay *= 2;
    }
    tracing::warn!(%hour_key, "generation lock held elsewhere and no state appeared");
    Err(MarketGenError::GenerationInFlight)
}
