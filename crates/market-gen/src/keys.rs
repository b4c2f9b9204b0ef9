//! KV key namespace and TTLs for the market game.
//!
//! Keys are versioned so a wire-format change never gets stuck on stale
//! cached payloads.

use market_core::HourKey;

/// Market state lives two weeks; long enough to chart, short enough to reap.
pub const MARKET_TTL_SECONDS: u64 = 60 * 60 * 24 * 14;

/// Accounts expire 30 days after the last write.
pub const ACCOUNT_TTL_SECONDS: u64 = 60 * 60 * 24 * 30;

/// Generation lock TTL: under the hour, above worst-case model latency.
pub const LOCK_TTL_SECONDS: u64 = 55;

pub fn market_hour_key(hour_key: &HourKey) -> String {
    format!("fx:market:v2:hour:{hour_key}")
}

pub fn market_hour_lock_key(hour_key: &HourKey) -> String {
    format!("fx:lock:market:v2:hour:{hour_key}")
}

pub fn player_account_key(player_id: &str) -> String {
    format!("fx:acct:{player_id}")
}

pub fn kv_probe_key(hour_key: &HourKey) -> String {
    format!("fx:debug:kv-test:{hour_key}")
}
