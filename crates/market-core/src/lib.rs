#![deny(warnings)]

//! Core domain models and invariants for the Runic Index market.
//!
//! This crate defines the serializable market types shared across the
//! workspace, with validation helpers that guarantee the board invariants:
//! a fixed company count, unique tickers, positive prices, and the starting
//! price band for new listings.

mod hour;
mod seed;

pub use hour::{DateKey, HourKey};
pub use seed::seed_market;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

/// Number of listed companies the board must hold after every update.
pub const MARKET_COMPANY_COUNT: usize = 25;

/// Maximum delistings allowed in a single hour.
pub const MAX_DELISTINGS_PER_HOUR: usize = 1;

/// Minimum distinct prices an hour must contain. Guards against the model
/// flattening the whole board to near-identical values.
pub const MIN_DISTINCT_PRICES: usize = 6;

/// Maximum trade command length accepted from clients.
pub const MAX_COMMAND_CHARS: usize = 64;

/// Wire format version for cached market state.
pub const MARKET_STATE_VERSION: u32 = 1;

/// Lower bound of the starting price band for new listings.
pub fn listing_start_price_min() -> Decimal {
    Decimal::new(25, 2) // 0.25
}

/// Upper bound of the starting price band for new listings.
pub fn listing_start_price_max() -> Decimal {
    Decimal::new(2500, 2) // 25.00
}

/// Cash every fresh player account starts with.
pub fn starting_cash() -> Decimal {
    Decimal::new(100, 0)
}

/// Round a monetary value to cents. Applied at every mutation point.
pub fn round2(value: Decimal) -> Decimal {
    value.round_dp(2)
}

/// A stock ticker: 3-6 uppercase ASCII letters.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct Ticker(String);

impl Ticker {
    /// Normalize (trim + uppercase) and validate a candidate ticker.
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        let s = raw.trim().to_ascii_uppercase();
        if (3..=6).contains(&s.len()) && s.bytes().all(|b| b.is_ascii_uppercase()) {
            Ok(Ticker(s))
        } else {
            Err(MarketError::BadTicker(raw.trim().to_string()))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Ticker {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl FromStr for Ticker {
    type Err = MarketError;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ticker::parse(s)
    }
}

impl TryFrom<String> for Ticker {
    type Error = MarketError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        Ticker::parse(&s)
    }
}

impl From<Ticker> for String {
    fn from(t: Ticker) -> String {
        t.0
    }
}

/// Listing status. Delisted companies leave `companies[]` entirely, so the
/// only status a board entry carries is `LISTED`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum CompanyStatus {
    #[serde(rename = "LISTED")]
    Listed,
}

/// A listed fantasy concept with its snapped hourly price.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Company {
    pub id: Ticker,
    pub name: String,
    /// One-line explanation of what the concept represents in-world.
    pub concept: String,
    /// Snapped price for this hour. Invariant: > 0, rounded to cents.
    pub price: Decimal,
    /// Previous hour's price (equals `price` for new listings).
    pub prev_price: Decimal,
    pub change: Decimal,
    pub change_pct: Decimal,
    pub status: CompanyStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub logo_prompt: Option<String>,
}

impl Company {
    /// Build a listed company from this hour's price and the previous price,
    /// deriving the change fields. Prices are rounded to cents.
    pub fn listed(
        id: Ticker,
        name: String,
        concept: String,
        price: Decimal,
        prev_price: Decimal,
        logo_prompt: Option<String>,
    ) -> Self {
        let price = round2(price);
        let prev_price = round2(prev_price);
        let change = price - prev_price;
        let change_pct = if prev_price > Decimal::ZERO {
            round2(change / prev_price * Decimal::new(100, 0))
        } else {
            Decimal::ZERO
        };
        Company {
            id,
            name,
            concept,
            price,
            prev_price,
            change: round2(change),
            change_pct,
            status: CompanyStatus::Listed,
            logo_prompt,
        }
    }
}

/// Kind of news story attached to an hour.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum NewsKind {
    #[serde(rename = "BIG")]
    Big,
    #[serde(rename = "COMPANY")]
    Company,
}

/// A world or company news story for one hour.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewsItem {
    pub id: String,
    pub kind: NewsKind,
    pub hour_key: HourKey,
    pub title: String,
    pub body: String,
    pub impact: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_ids: Option<Vec<Ticker>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image_prompt: Option<String>,
}

/// Record of a company removed from the board this hour. Settlement against
/// open positions happens when accounts are next loaded or traded.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelistedCompany {
    pub id: Ticker,
    pub delisted_at_hour_key: HourKey,
    /// Settlement price applied to any open position in this ticker.
    pub delist_price: Decimal,
    pub reason: String,
}

/// The complete snapped market state for one UTC hour bucket. Immutable once
/// published to the cache.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MarketHourState {
    pub version: u32,
    pub hour_key: HourKey,
    /// Milliseconds since the Unix epoch at generation time.
    pub generated_at: i64,
    pub companies: Vec<Company>,
    pub delisted: Vec<DelistedCompany>,
    pub news: Vec<NewsItem>,
}

/// Violations of the market invariants.
#[derive(Debug, Error, PartialEq)]
pub enum MarketError {
    #[error("ticker {0:?} is not 3-6 uppercase A-Z letters")]
    BadTicker(String),
    #[error("board has {got} companies; expected {MARKET_COMPANY_COUNT}")]
    CompanyCount { got: usize },
    #[error("duplicate ticker {0}")]
    DuplicateTicker(String),
    #[error("non-positive price for {0}")]
    NonPositivePrice(String),
    #[error("new listing {id} priced {price} outside the starting band")]
    StartPriceOutOfBand { id: String, price: Decimal },
    #[error("{got} delistings; at most {MAX_DELISTINGS_PER_HOUR} allowed per hour")]
    TooManyDelistings { got: usize },
    #[error("only {distinct} distinct prices; the board lacks variation")]
    PriceVariation { distinct: usize },
    #[error("no BIG news item for the hour")]
    MissingBigNews,
    #[error("delisted ticker {0} still appears on the board")]
    DelistedStillListed(String),
    #[error("bad hour key {0:?}")]
    BadHourKey(String),
    #[error("bad date key {0:?}")]
    BadDateKey(String),
}

/// Validate a market hour against all board invariants, relative to an
/// optional previous hour. A company absent from `prev` counts as a new
/// listing and must start inside the price band; with no previous hour the
/// whole board must sit inside the band.
pub fn validate_state(
    state: &MarketHourState,
    prev: Option<&MarketHourState>,
) -> Result<(), MarketError> {
    if state.companies.len() != MARKET_COMPANY_COUNT {
        return Err(MarketError::CompanyCount {
            got: state.companies.len(),
        });
    }

    let prev_ids: BTreeSet<&Ticker> = prev
        .map(|p| p.companies.iter().map(|c| &c.id).collect())
        .unwrap_or_default();

    let mut seen: BTreeSet<&Ticker> = BTreeSet::new();
    for c in &state.companies {
        if !seen.insert(&c.id) {
            return Err(MarketError::DuplicateTicker(c.id.to_string()));
        }
        if c.price <= Decimal::ZERO {
            return Err(MarketError::NonPositivePrice(c.id.to_string()));
        }
        let is_new = !prev_ids.contains(&c.id);
        if is_new && !price_in_listing_band(c.price) {
            return Err(MarketError::StartPriceOutOfBand {
                id: c.id.to_string(),
                price: c.price,
            });
        }
    }

    if state.delisted.len() > MAX_DELISTINGS_PER_HOUR {
        return Err(MarketError::TooManyDelistings {
            got: state.delisted.len(),
        });
    }
    for d in &state.delisted {
        if seen.contains(&d.id) {
            return Err(MarketError::DelistedStillListed(d.id.to_string()));
        }
    }

    let distinct: BTreeSet<String> = state
        .companies
        .iter()
        .map(|c| c.price.round_dp(2).to_string())
        .collect();
    if distinct.len() < MIN_DISTINCT_PRICES {
        return Err(MarketError::PriceVariation {
            distinct: distinct.len(),
        });
    }

    if !state.news.iter().any(|n| n.kind == NewsKind::Big) {
        return Err(MarketError::MissingBigNews);
    }

    Ok(())
}

/// Whether a price lies inside the starting band for new listings.
pub fn price_in_listing_band(price: Decimal) -> bool {
    price >= listing_start_price_min() && price <= listing_start_price_max()
}
