//! Account persistence over the KV store.
//!
//! Accounts are plain JSON blobs under `fx:acct:<playerId>` with a sliding
//! 30-day TTL: every save refreshes the expiry, so only abandoned accounts
//! age out.

use crate::keys::{player_account_key, ACCOUNT_TTL_SECONDS};
use kv_store::KvStore;
use ledger::{settle_delistings, PlayerAccount};
use market_core::MarketHourState;

/// Load a player's account, creating and persisting a fresh one on first
/// sight.
pub async fn get_or_create_account(store: &KvStore, player_id: &str) -> PlayerAccount {
    let key = player_account_key(player_id);
    if let Some(account) = store.get_json::<PlayerAccount>(&key).await {
        return account;
    }
    let account = PlayerAccount::new(player_id);
    tracing::info!(player = player_id, "created new account");
    save_account(store, &account).await;
    account
}

/// Persist an account, refreshing its sliding TTL.
pub async fn save_account(store: &KvStore, account: &PlayerAccount) {
    let key = player_account_key(&account.player_id);
    store
        .set_json(&key, account, Some(ACCOUNT_TTL_SECONDS))
        .await;
}

/// Wipe a player's account back to the starting balance.
pub async fn reset_account(store: &KvStore, player_id: &str) -> PlayerAccount {
    let account = PlayerAccount::new(player_id);
    save_account(store, &account).await;
    tracing::info!(player = player_id, "account reset");
    account
}

/// Load an account and settle any positions in this hour's delisted tickers,
/// persisting only when settlement changed something.
pub async fn load_settled_account(
    store: &KvStore,
    market: &MarketHourState,
    player_id: &str,
) -> PlayerAccount {
    let mut account = get_or_create_account(store, player_id).await;
    if settle_delistings(&mut account, market) {
        save_account(store, &account).await;
    }
    account
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{seed_market, starting_cash, HourKey, Ticker};
    use rust_decimal::Decimal;

    fn market() -> MarketHourState {
        seed_market(&HourKey::parse("2026-02-02T18").unwrap())
    }

    #[tokio::test]
    async fn first_load_creates_and_persists() {
        let store = KvStore::memory();
        let account = get_or_create_account(&store, "p1").await;
        assert_eq!(account.cash, starting_cash());
        let again = get_or_create_account(&store, "p1").await;
        assert_eq!(again, account);
    }

    #[tokio::test]
    async fn reset_discards_positions() {
        let store = KvStore::memory();
        let mut account = get_or_create_account(&store, "p1").await;
        account
            .positions
            .insert(Ticker::parse("FIRE").unwrap(), 10);
        account.cash = Decimal::ZERO;
        save_account(&store, &account).await;

        let fresh = reset_account(&store, "p1").await;
        assert_eq!(fresh.cash, starting_cash());
        assert!(fresh.positions.is_empty());
        let reloaded = get_or_create_account(&store, "p1").await;
        assert_eq!(reloaded.cash, starting_cash());
    }

    #[tokio::test]
    async fn settlement_runs_on_load_and_persists() {
        let store = KvStore::memory();
        let mut market = market();
        let gone = market.companies.pop().unwrap();
        market.delisted.push(market_core::DelistedCompany {
            id: gone.id.clone(),
            delisted_at_hour_key: market.hour_key.clone(),
            delist_price: gone.price,
            reason: "test".into(),
        });

        let mut account = get_or_create_account(&store, "p1").await;
        account.positions.insert(gone.id.clone(), 4);
        save_account(&store, &account).await;

        let settled = load_settled_account(&store, &market, "p1").await;
        assert!(!settled.positions.contains_key(&gone.id));
        assert_eq!(
            settled.cash,
            market_core::round2(starting_cash() + Decimal::from(4) * gone.price)
        );
        // Persisted: a plain reload sees the settled balance.
        let reloaded = get_or_create_account(&store, "p1").await;
        assert_eq!(reloaded.cash, settled.cash);
    }
}
