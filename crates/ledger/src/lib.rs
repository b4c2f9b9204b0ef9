#![deny(warnings)]

//! Player account ledger: trade parsing, execution, and delist settlement.
//!
//! Everything here is pure arithmetic over an account snapshot and a market
//! hour; persistence and request handling live elsewhere. Trades apply
//! atomically per call with no cross-request transaction guarantee.

use chrono::Utc;
use market_core::{round2, starting_cash, HourKey, MarketHourState, Ticker, MAX_COMMAND_CHARS};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;

/// Wire format version for cached accounts.
pub const ACCOUNT_VERSION: u32 = 1;

/// Largest share quantity a single command may move.
pub const MAX_TRADE_QTY: i64 = 1_000_000;

/// A player's cash/positions ledger. Positions are signed share counts
/// (negative = short). Invariant: a zeroed position is removed, never stored.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlayerAccount {
    pub version: u32,
    pub player_id: String,
    pub created_at: i64,
    pub updated_at: i64,
    pub cash: Decimal,
    #[serde(default)]
    pub positions: BTreeMap<Ticker, i64>,
}

impl PlayerAccount {
    /// Fresh account with the starting cash balance.
    pub fn new(player_id: &str) -> Self {
        let now = Utc::now().timestamp_millis();
        PlayerAccount {
            version: ACCOUNT_VERSION,
            player_id: player_id.to_string(),
            created_at: now,
            updated_at: now,
            cash: starting_cash(),
            positions: BTreeMap::new(),
        }
    }

    fn set_position(&mut self, ticker: &Ticker, shares: i64) {
        if shares == 0 {
            self.positions.remove(ticker);
        } else {
            self.positions.insert(ticker.clone(), shares);
        }
    }
}

/// Direction of a trade command.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TradeSide {
    #[serde(rename = "BUY")]
    Buy,
    #[serde(rename = "SELL")]
    Sell,
    #[serde(rename = "SHORT")]
    Short,
}

/// A parsed `Buy|Sell|Short <qty> <ticker>` command.
#[derive(Clone, Debug, PartialEq)]
pub struct TradeCommand {
    pub side: TradeSide,
    pub qty: i64,
    pub ticker: Ticker,
}

/// Receipt returned to the client after a successful trade.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TradeReceipt {
    pub ok: bool,
    pub hour_key: HourKey,
    pub side: TradeSide,
    pub qty: i64,
    pub company_id: Ticker,
    pub price: Decimal,
    pub cash_delta: Decimal,
    pub position_delta: i64,
    pub account: AccountSnapshot,
}

/// Account plus mark-to-market derived fields.
#[derive(Clone, Debug, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AccountSnapshot {
    #[serde(flatten)]
    pub account: PlayerAccount,
    pub net_worth: Decimal,
    pub bankrupt: bool,
}

/// Reasons a trade is rejected.
#[derive(Debug, Error, PartialEq)]
pub enum TradeError {
    #[error("Invalid command. Use: Buy/Sell/Short [number] [stock ID]")]
    BadCommand,
    #[error("Unknown stock ID: {0}")]
    UnknownTicker(String),
    #[error("Not enough shares to sell. You have {held}.")]
    InsufficientShares { held: i64 },
}

/// Parse a trade command. Case-insensitive, whitespace-tolerant; quantity is
/// clamped to `[1, MAX_TRADE_QTY]`. Commands longer than `MAX_COMMAND_CHARS`
/// are rejected outright.
pub fn parse_command(raw: &str) -> Result<TradeCommand, TradeError> {
    let raw = raw.trim();
    if raw.is_empty() || raw.len() > MAX_COMMAND_CHARS {
        return Err(TradeError::BadCommand);
    }

    let mut words = raw.split_whitespace();
    let side = match words.next().map(str::to_ascii_lowercase).as_deref() {
        Some("buy") => TradeSide::Buy,
        Some("sell") => TradeSide::Sell,
        Some("short") => TradeSide::Short,
        _ => return Err(TradeError::BadCommand),
    };
    let qty: i64 = words
        .next()
        .and_then(|w| w.parse().ok())
        .filter(|q| *q > 0)
        .ok_or(TradeError::BadCommand)?;
    let ticker = words
        .next()
        .and_then(|w| Ticker::parse(w).ok())
        .ok_or(TradeError::BadCommand)?;
    if words.next().is_some() {
        return Err(TradeError::BadCommand);
    }

    Ok(TradeCommand {
        side,
        qty: qty.min(MAX_TRADE_QTY),
        ticker,
    })
}

/// Apply a trade against this hour's board, mutating the account and
/// returning a receipt. BUY debits cash and credits shares; SELL requires the
/// shares to be held; SHORT credits cash and drives the position negative.
pub fn apply_trade(
    account: &mut PlayerAccount,
    market: &MarketHourState,
    command: &TradeCommand,
) -> Result<TradeReceipt, TradeError> {
    let company = market
        .companies
        .iter()
        .find(|c| c.id == command.ticker)
        .ok_or_else(|| TradeError::UnknownTicker(command.ticker.to_string()))?;
    let price = company.price;
    let held = account.positions.get(&command.ticker).copied().unwrap_or(0);
    let qty = command.qty;

    let (cash_delta, position_delta) = match command.side {
        TradeSide::Buy => (-price * Decimal::from(qty), qty),
        TradeSide::Sell => {
            if held < qty {
                return Err(TradeError::InsufficientShares { held });
            }
            (price * Decimal::from(qty), -qty)
        }
        TradeSide::Short => (price * Decimal::from(qty), -qty),
    };

    account.cash = round2(account.cash + cash_delta);
    account.set_position(&command.ticker, held + position_delta);
    account.updated_at = Utc::now().timestamp_millis();

    Ok(TradeReceipt {
        ok: true,
        hour_key: market.hour_key.clone(),
        side: command.side,
        qty,
        company_id: command.ticker.clone(),
        price,
        cash_delta: round2(cash_delta),
        position_delta,
        account: snapshot(account, market),
    })
}

/// Settle open positions in delisted tickers: `cash += shares * delist_price`
/// (shares may be negative), then the position is removed. Returns whether
/// the account changed, so callers persist only when needed.
pub fn settle_delistings(account: &mut PlayerAccount, market: &MarketHourState) -> bool {
    let mut changed = false;
    for d in &market.delisted {
        let Some(shares) = account.positions.remove(&d.id) else {
            continue;
        };
        if shares != 0 {
            account.cash = round2(account.cash + Decimal::from(shares) * d.delist_price);
            tracing::info!(
                player = %account.player_id,
                ticker = %d.id,
                shares,
                delist_price = %d.delist_price,
                "settled delisted position"
            );
        }
        changed = true;
    }
    if changed {
        account.updated_at = Utc::now().timestamp_millis();
    }
    changed
}

/// Mark the account to this hour's prices. Positions in tickers missing from
/// the board value at zero until the next settlement pass.
pub fn snapshot(account: &PlayerAccount, market: &MarketHourState) -> AccountSnapshot {
    let mut positions_value = Decimal::ZERO;
    for (ticker, shares) in &account.positions {
        if let Some(c) = market.companies.iter().find(|c| &c.id == ticker) {
            positions_value += Decimal::from(*shares) * c.price;
        }
    }
    let net_worth = round2(account.cash + positions_value);
    AccountSnapshot {
        account: account.clone(),
        net_worth,
        bankrupt: net_worth <= Decimal::ZERO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::seed_market;
    use proptest::prelude::*;

    fn market() -> MarketHourState {
        seed_market(&HourKey::parse("2026-02-02T18").unwrap())
    }

    fn price_of(market: &MarketHourState, id: &str) -> Decimal {
        market
            .companies
            .iter()
            .find(|c| c.id.as_str() == id)
            .unwrap()
            .price
    }

    #[test]
    fn parse_accepts_fixed_grammar() {
        let cmd = parse_command("Buy 10 fire").unwrap();
        assert_eq!(cmd.side, TradeSide::Buy);
        assert_eq!(cmd.qty, 10);
        assert_eq!(cmd.ticker.as_str(), "FIRE");

        assert_eq!(
            parse_command("  short   3   MITH  ").unwrap().side,
            TradeSide::Short
        );
    }

    #[test]
    fn parse_rejects_malformed_commands() {
        for bad in [
            "",
            "Buy FIRE",
            "Buy ten FIRE",
            "Buy 10",
            "Buy 0 FIRE",
            "Buy -5 FIRE",
            "Lend 10 FIRE",
            "Buy 10 FI",
            "Buy 10 FIRE extra",
        ] {
            assert_eq!(parse_command(bad), Err(TradeError::BadCommand), "{bad:?}");
        }
        let long = format!("Buy 10 {}", "A".repeat(80));
        assert_eq!(parse_command(&long), Err(TradeError::BadCommand));
    }

    #[test]
    fn parse_clamps_quantity() {
        assert_eq!(parse_command("Buy 99999999 FIRE").unwrap().qty, MAX_TRADE_QTY);
    }

    #[test]
    fn buy_debits_cash_and_credits_shares() {
        let market = market();
        let mut acct = PlayerAccount::new("p1");
        let px = price_of(&market, "FIRE");

        let receipt =
            apply_trade(&mut acct, &market, &parse_command("Buy 3 FIRE").unwrap()).unwrap();
        assert_eq!(receipt.cash_delta, round2(-px * Decimal::from(3)));
        assert_eq!(receipt.position_delta, 3);
        assert_eq!(acct.cash, round2(starting_cash() - px * Decimal::from(3)));
        assert_eq!(acct.positions[&Ticker::parse("FIRE").unwrap()], 3);
    }

    #[test]
    fn sell_beyond_holdings_rejected() {
        let market = market();
        let mut acct = PlayerAccount::new("p1");
        apply_trade(&mut acct, &market, &parse_command("Buy 2 FIRE").unwrap()).unwrap();
        assert_eq!(
            apply_trade(&mut acct, &market, &parse_command("Sell 3 FIRE").unwrap()),
            Err(TradeError::InsufficientShares { held: 2 })
        );
    }

    #[test]
    fn sell_to_zero_removes_position() {
        let market = market();
        let mut acct = PlayerAccount::new("p1");
        apply_trade(&mut acct, &market, &parse_command("Buy 2 FIRE").unwrap()).unwrap();
        apply_trade(&mut acct, &market, &parse_command("Sell 2 FIRE").unwrap()).unwrap();
        assert!(acct.positions.is_empty());
        assert_eq!(acct.cash, starting_cash());
    }

    #[test]
    fn short_credits_cash_and_goes_negative() {
        let market = market();
        let mut acct = PlayerAccount::new("p1");
        let px = price_of(&market, "NECRO");
        apply_trade(&mut acct, &market, &parse_command("Short 5 NECRO").unwrap()).unwrap();
        assert_eq!(acct.cash, round2(starting_cash() + px * Decimal::from(5)));
        assert_eq!(acct.positions[&Ticker::parse("NECRO").unwrap()], -5);
    }

    #[test]
    fn unknown_ticker_rejected() {
        let market = market();
        let mut acct = PlayerAccount::new("p1");
        assert_eq!(
            apply_trade(&mut acct, &market, &parse_command("Buy 1 ZZZZ").unwrap()),
            Err(TradeError::UnknownTicker("ZZZZ".into()))
        );
    }

    #[test]
    fn settlement_pays_out_long_and_short() {
        let mut market = market();
        let fire = Ticker::parse("FIRE").unwrap();
        let necro = Ticker::parse("NECRO").unwrap();
        market.delisted = vec![
            delisted(&market.hour_key, &fire, Decimal::new(1000, 2)),
            delisted(&market.hour_key, &necro, Decimal::new(400, 2)),
        ];

        let mut acct = PlayerAccount::new("p1");
        acct.positions.insert(fire.clone(), 4); // long 4 @ 10.00 -> +40
        acct.positions.insert(necro.clone(), -2); // short 2 @ 4.00 -> -8

        let changed = settle_delistings(&mut acct, &market);
        assert!(changed);
        assert!(acct.positions.is_empty());
        assert_eq!(
            acct.cash,
            round2(starting_cash() + Decimal::new(4000, 2) - Decimal::new(800, 2))
        );

        // Second pass is a no-op.
        assert!(!settle_delistings(&mut acct, &market));
    }

    fn delisted(hour: &HourKey, id: &Ticker, price: Decimal) -> market_core::DelistedCompany {
        market_core::DelistedCompany {
            id: id.clone(),
            delisted_at_hour_key: hour.clone(),
            delist_price: price,
            reason: "test".into(),
        }
    }

    #[test]
    fn snapshot_marks_to_market() {
        let market = market();
        let mut acct = PlayerAccount::new("p1");
        apply_trade(&mut acct, &market, &parse_command("Buy 3 FIRE").unwrap()).unwrap();
        let snap = snapshot(&acct, &market);
        // Buy at the snapped price values back to starting cash exactly.
        assert_eq!(snap.net_worth, starting_cash());
        assert!(!snap.bankrupt);
    }

    #[test]
    fn snapshot_values_missing_ticker_at_zero() {
        let market = market();
        let mut acct = PlayerAccount::new("p1");
        acct.positions.insert(Ticker::parse("GONE").unwrap(), 10);
        let snap = snapshot(&acct, &market);
        assert_eq!(snap.net_worth, acct.cash);
    }

    #[test]
    fn snapshot_serializes_flat() {
        let market = market();
        let acct = PlayerAccount::new("p1");
        let json = serde_json::to_value(snapshot(&acct, &market)).unwrap();
        assert_eq!(json["playerId"], "p1");
        assert!(json["netWorth"].is_number());
        assert_eq!(json["bankrupt"], false);
    }

    proptest! {
        #[test]
        fn buy_then_sell_everything_restores_cash(qty in 1i64..100) {
            let market = market();
            let mut acct = PlayerAccount::new("p1");
            let buy = TradeCommand {
                side: TradeSide::Buy,
                qty,
                ticker: Ticker::parse("RUNE").unwrap(),
            };
            let sell = TradeCommand { side: TradeSide::Sell, ..buy.clone() };
            apply_trade(&mut acct, &market, &buy).unwrap();
            apply_trade(&mut acct, &market, &sell).unwrap();
            prop_assert_eq!(acct.cash, starting_cash());
            prop_assert!(acct.positions.is_empty());
        }

        #[test]
        fn short_then_buy_back_restores_cash(qty in 1i64..100) {
            let market = market();
            let mut acct = PlayerAccount::new("p1");
            let short = TradeCommand {
                side: TradeSide::Short,
                qty,
                ticker: Ticker::parse("ALCH").unwrap(),
            };
            let cover = TradeCommand { side: TradeSide::Buy, ..short.clone() };
            apply_trade(&mut acct, &market, &short).unwrap();
            apply_trade(&mut acct, &market, &cover).unwrap();
            prop_assert_eq!(acct.cash, starting_cash());
            prop_assert!(acct.positions.is_empty());
        }
    }
}
