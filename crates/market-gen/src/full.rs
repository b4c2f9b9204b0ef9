//! Full-board response parsing: the model re-emits all 25 companies.
//!
//! Parsing is lenient per entry (a malformed company is dropped, prices are
//! coerced from numbers or numeric strings) but strict per board: the
//! surviving set must satisfy every invariant or the whole hour is rejected
//! with the raw model text attached.

use crate::MarketGenError;
use llm_client::extract_json;
use market_core::{
    validate_state, Company, DelistedCompany, HourKey, MarketHourState, NewsItem, NewsKind,
    Ticker, MARKET_COMPANY_COUNT, MARKET_STATE_VERSION, MAX_DELISTINGS_PER_HOUR,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};
use std::str::FromStr;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FullWire {
    big_news: Vec<BigNewsWire>,
    companies: Vec<FullCompanyWire>,
    delist: Vec<FullDelistWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub(crate) struct BigNewsWire {
    pub id: String,
    pub title: String,
    pub body: String,
    pub impact: String,
    pub image_prompt: Option<String>,
    pub company_ids: Option<Vec<String>>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FullCompanyWire {
    id: String,
    name: String,
    concept: String,
    price: Value,
    company_news_title: String,
    company_news_body: String,
    company_news_impact: String,
    logo_prompt: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct FullDelistWire {
    id: String,
    reason: String,
}

/// Coerce a wire price into a Decimal. Models occasionally emit prices as
/// strings; both forms are accepted. Anything else is `None`.
pub(crate) fn coerce_price(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => Decimal::from_str(&n.to_string()).ok(),
        Value::String(s) => Decimal::from_str(s.trim()).ok(),
        _ => None,
    }
}

/// Cap on big news items retained per hour.
const MAX_BIG_NEWS: usize = 6;

pub(crate) fn big_news_items(wire: Vec<BigNewsWire>, hour_key: &HourKey) -> Vec<NewsItem> {
    wire
        .into_iter()
        .take(MAX_BIG_NEWS)
        .enumerate()
        .filter(|(_, n)| !n.title.trim().is_empty())
        .map(|(i, n)| {
            let company_ids = n.company_ids.map(|ids| {
                ids.iter()
                    .filter_map(|s| Ticker::parse(s).ok())
                    .collect::<Vec<_>>()
            });
            NewsItem {
                id: if n.id.trim().is_empty() {
                    format!("{hour_key}-big-{i}")
                } else {
                    n.id
                },
                kind: NewsKind::Big,
                hour_key: hour_key.clone(),
                title: n.title,
                body: n.body,
                impact: n.impact,
                company_ids: company_ids.filter(|v| !v.is_empty()),
                image_url: None,
                image_prompt: n.image_prompt.filter(|p| !p.trim().is_empty()),
            }
        })
        .collect()
}

/// Parse and validate a full-board model response for `hour_key`.
///
/// Individual companies with an unusable ticker or price are dropped, and
/// duplicate tickers keep their first occurrence. Board-level failures are
/// hard errors: wrong final count, a delist entry naming a ticker that was
/// not on the previous board or that is still listed, a previous-hour ticker
/// vanishing without a delist entry, or any invariant violation.
pub fn parse_full_response(
    hour_key: &HourKey,
    prev: Option<&MarketHourState>,
    raw: &str,
) -> Result<MarketHourState, MarketGenError> {
    let json = extract_json(raw).ok_or_else(|| MarketGenError::Unparseable {
        raw: raw.to_string(),
    })?;
    let wire: FullWire =
        serde_json::from_str(&json).map_err(|_| MarketGenError::Unparseable {
            raw: raw.to_string(),
        })?;

    let prev_prices: BTreeMap<&Ticker, Decimal> = prev
        .map(|p| p.companies.iter().map(|c| (&c.id, c.price)).collect())
        .unwrap_or_default();

    let mut companies: Vec<Company> = Vec::with_capacity(MARKET_COMPANY_COUNT);
    let mut news: Vec<NewsItem> = Vec::new();
    let mut seen: BTreeSet<Ticker> = BTreeSet::new();

    for entry in wire.companies {
        let Ok(id) = Ticker::parse(&entry.id) else {
            tracing::debug!(id = %entry.id, "full parse: dropping company with bad ticker");
            continue;
        };
        let Some(price) = coerce_price(&entry.price).filter(|p| *p > Decimal::ZERO) else {
            tracing::debug!(id = %id, "full parse: dropping company with unusable price");
            continue;
        };
        if !seen.insert(id.clone()) {
            continue;
        }
        let prev_price = prev_prices.get(&id).copied().unwrap_or(price);
        if !entry.company_news_title.trim().is_empty() {
            news.push(NewsItem {
                id: format!("{hour_key}-{id}"),
                kind: NewsKind::Company,
                hour_key: hour_key.clone(),
                title: entry.company_news_title,
                body: entry.company_news_body,
                impact: entry.company_news_impact,
                company_ids: Some(vec![id.clone()]),
                image_url: None,
                image_prompt: None,
            });
        }
        companies.push(Company::listed(
            id,
            entry.name,
            entry.concept,
            price,
            prev_price,
            entry.logo_prompt.filter(|p| !p.trim().is_empty()),
        ));
    }

    if companies.len() != MARKET_COMPANY_COUNT {
        return Err(MarketGenError::WrongCompanyCount {
            got: companies.len(),
            expected: MARKET_COMPANY_COUNT,
            raw: raw.to_string(),
        });
    }

    if wire.delist.len() > MAX_DELISTINGS_PER_HOUR {
        return Err(MarketGenError::TooManyDelistings {
            got: wire.delist.len(),
            max: MAX_DELISTINGS_PER_HOUR,
            raw: raw.to_string(),
        });
    }

    let mut delisted: Vec<DelistedCompany> = Vec::new();
    let mut delisted_ids: BTreeSet<Ticker> = BTreeSet::new();
    for d in wire.delist {
        let Ok(id) = Ticker::parse(&d.id) else {
            return Err(MarketGenError::InvalidDelist {
                id: d.id,
                reason: "not a valid ticker",
                raw: raw.to_string(),
            });
        };
        let Some(prev_price) = prev_prices.get(&id).copied() else {
            return Err(MarketGenError::InvalidDelist {
                id: id.to_string(),
                reason: "not on the previous board",
                raw: raw.to_string(),
            });
        };
        if seen.contains(&id) {
            return Err(MarketGenError::InvalidDelist {
                id: id.to_string(),
                reason: "still listed this hour",
                raw: raw.to_string(),
            });
        }
        delisted_ids.insert(id.clone());
        delisted.push(DelistedCompany {
            id,
            delisted_at_hour_key: hour_key.clone(),
            delist_price: prev_price,
            reason: d.reason,
        });
    }

    // Every previous ticker must either survive or be explicitly delisted.
    for id in prev_prices.keys() {
        if !seen.contains(*id) && !delisted_ids.contains(*id) {
            return Err(MarketGenError::UndeclaredDelisting {
                id: id.to_string(),
                raw: raw.to_string(),
            });
        }
    }

    let mut big = big_news_items(wire.big_news, hour_key);
    if big.is_empty() {
        return Err(MarketGenError::MissingBigNews {
            raw: raw.to_string(),
        });
    }
    big.extend(news);

    let state = MarketHourState {
        version: MARKET_STATE_VERSION,
        hour_key: hour_key.clone(),
        generated_at: chrono::Utc::now().timestamp_millis(),
        companies,
        delisted,
        news: big,
    };

    validate_state(&state, prev).map_err(|source| MarketGenError::Invariant {
        source,
        raw: raw.to_string(),
    })?;
    Ok(state)
}

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::{seed_market, MarketError};
    use serde_json::json;

    fn hour() -> HourKey {
        HourKey::parse("2026-02-02T18").unwrap()
    }

    fn prev() -> MarketHourState {
        seed_market(&hour().prev())
    }

    /// A well-formed full response echoing the previous board.
    fn wire(prev: &MarketHourState) -> Value {
        json!({
            "bigNews": [{
                "title": "Dragon sighted over the Ember Peaks",
                "body": "Trade caravans rerouted; fire insurance scrolls in demand.",
                "impact": "Fire-adjacent tickers bid up.",
            }],
            "companies": prev.companies.iter().map(|c| json!({
                "id": c.id.as_str(),
                "name": c.name,
                "concept": c.concept,
                "price": c.price,
                "companyNewsTitle": format!("{} holds steady", c.id),
                "companyNewsBody": "Quiet hour on the exchange floor.",
                "companyNewsImpact": "Neutral.",
            })).collect::<Vec<_>>(),
            "delist": [],
        })
    }

    #[test]
    fn well_formed_board_is_accepted() {
        let prev = prev();
        let state = parse_full_response(&hour(), Some(&prev), &wire(&prev).to_string()).unwrap();
        assert_eq!(state.companies.len(), MARKET_COMPANY_COUNT);
        assert_eq!(state.hour_key, hour());
        // One BIG plus one COMPANY story per company.
        assert_eq!(
            state.news.iter().filter(|n| n.kind == NewsKind::Big).count(),
            1
        );
        assert_eq!(
            state
                .news
                .iter()
                .filter(|n| n.kind == NewsKind::Company)
                .count(),
            MARKET_COMPANY_COUNT
        );
        // Prices unchanged, so derived change fields are zero.
        assert!(state.companies.iter().all(|c| c.change == Decimal::ZERO));
    }

    #[test]
    fn fenced_output_and_string_prices_are_tolerated() {
        let prev = prev();
        let mut w = wire(&prev);
        w["companies"][0]["price"] = json!("14.75");
        let raw = format!("```json\n{w}\n```");
        let state = parse_full_response(&hour(), Some(&prev), &raw).unwrap();
        assert_eq!(state.companies[0].price, Decimal::new(1475, 2));
        assert_eq!(state.companies[0].prev_price, prev.companies[0].price);
    }

    #[test]
    fn garbage_is_unparseable() {
        let err = parse_full_response(&hour(), Some(&prev()), "sorry, no").unwrap_err();
        assert!(matches!(err, MarketGenError::Unparseable { .. }));
    }

    #[test]
    fn dropped_companies_fail_the_count() {
        let prev = prev();
        let mut w = wire(&prev);
        w["companies"][3]["id"] = json!("not a ticker");
        let err = parse_full_response(&hour(), Some(&prev), &w.to_string()).unwrap_err();
        assert!(
            matches!(err, MarketGenError::WrongCompanyCount { got: 24, .. }),
            "{err}"
        );
    }

    #[test]
    fn vanished_ticker_needs_a_delist_entry() {
        let prev = prev();
        let mut w = wire(&prev);
        let gone = prev.companies[5].id.to_string();
        w["companies"][5] = json!({
            "id": "ZZYX",
            "name": "Mystery Listing",
            "concept": "Appeared from nowhere",
            "price": 3.10,
            "companyNewsTitle": "New on the board",
            "companyNewsBody": "",
            "companyNewsImpact": "",
        });
        let err = parse_full_response(&hour(), Some(&prev), &w.to_string()).unwrap_err();
        match err {
            MarketGenError::UndeclaredDelisting { id, .. } => assert_eq!(id, gone),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn delist_with_replacement_is_accepted() {
        let prev = prev();
        let mut w = wire(&prev);
        let gone = prev.companies[5].clone();
        w["companies"][5] = json!({
            "id": "ZZYX",
            "name": "Zephyr Yoke Exchange",
            "concept": "Wind-harness futures",
            "price": 3.10,
            "companyNewsTitle": "Fresh listing",
            "companyNewsBody": "",
            "companyNewsImpact": "",
        });
        w["delist"] = json!([{ "id": gone.id.as_str(), "reason": "guild audit" }]);
        let state = parse_full_response(&hour(), Some(&prev), &w.to_string()).unwrap();
        assert_eq!(state.delisted.len(), 1);
        assert_eq!(state.delisted[0].delist_price, gone.price);
        assert_eq!(state.delisted[0].delisted_at_hour_key, hour());
    }

    #[test]
    fn delist_of_unknown_or_still_listed_ticker_is_rejected() {
        let prev = prev();
        let mut w = wire(&prev);
        w["delist"] = json!([{ "id": "NOPEX", "reason": "?" }]);
        let err = parse_full_response(&hour(), Some(&prev), &w.to_string()).unwrap_err();
        assert!(matches!(err, MarketGenError::InvalidDelist { .. }));

        let mut w = wire(&prev);
        w["delist"] = json!([{ "id": prev.companies[0].id.as_str(), "reason": "?" }]);
        let err = parse_full_response(&hour(), Some(&prev), &w.to_string()).unwrap_err();
        match err {
            MarketGenError::InvalidDelist { reason, .. } => {
                assert_eq!(reason, "still listed this hour")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn missing_big_news_is_rejected() {
        let prev = prev();
        let mut w = wire(&prev);
        w["bigNews"] = json!([]);
        let err = parse_full_response(&hour(), Some(&prev), &w.to_string()).unwrap_err();
        assert!(matches!(err, MarketGenError::MissingBigNews { .. }));
    }

    #[test]
    fn out_of_band_new_listing_breaks_the_invariant() {
        let prev = prev();
        let mut w = wire(&prev);
        let gone = prev.companies[5].id.to_string();
        w["companies"][5] = json!({
            "id": "ZZYX",
            "name": "Overpriced Debut",
            "concept": "Starts far above the band",
            "price": 480.00,
            "companyNewsTitle": "",
            "companyNewsBody": "",
            "companyNewsImpact": "",
        });
        w["delist"] = json!([{ "id": gone, "reason": "audit" }]);
        let err = parse_full_response(&hour(), Some(&prev), &w.to_string()).unwrap_err();
        assert!(matches!(
            err,
            MarketGenError::Invariant {
                source: MarketError::StartPriceOutOfBand { .. },
                ..
            }
        ));
    }

    #[test]
    fn error_carries_the_raw_text() {
        let err = parse_full_response(&hour(), Some(&prev()), "nonsense output").unwrap_err();
        assert_eq!(err.raw(), Some("nonsense output"));
    }
}
