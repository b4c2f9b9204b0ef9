//! Delta response parsing: one price update per existing ticker, plus an
//! optional delist with a 1:1 replacement listing.
//!
//! Unlike full mode there is no per-entry leniency to hide behind: the update
//! set must cover the previous board exactly once, so every defect in the
//! model output is a hard error carrying the raw text.

use crate::full::{big_news_items, coerce_price};
use crate::MarketGenError;
use llm_client::extract_json;
use market_core::{
    price_in_listing_band, validate_state, Company, DelistedCompany, HourKey, MarketHourState,
    NewsItem, NewsKind, Ticker, MARKET_STATE_VERSION, MAX_DELISTINGS_PER_HOUR,
};
use rust_decimal::Decimal;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DeltaWire {
    big_news: Vec<crate::full::BigNewsWire>,
    updates: Vec<UpdateWire>,
    delist: Vec<DeltaDelistWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct UpdateWire {
    id: String,
    price: Value,
    news_title: String,
    news_body: String,
    news_impact: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct DeltaDelistWire {
    id: String,
    reason: String,
    replacement: Option<ReplacementWire>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct ReplacementWire {
    id: String,
    name: String,
    concept: String,
    price: Value,
    logo_prompt: Option<String>,
}

struct Update {
    price: Decimal,
    news_title: String,
    news_body: String,
    news_impact: String,
}

/// Parse and validate a delta model response against the previous hour.
///
/// Every previous ticker must receive exactly one update, except a delisted
/// one, which instead gets a replacement listing priced inside the starting
/// band. The replacement takes the delisted company's board slot.
pub fn parse_delta_response(
    hour_key: &HourKey,
    prev: &MarketHourState,
    raw: &str,
) -> Result<MarketHourState, MarketGenError> {
    let json = extract_json(raw).ok_or_else(|| MarketGenError::Unparseable {
        raw: raw.to_string(),
    })?;
    let wire: DeltaWire = serde_json::from_str(&json).map_err(|_| MarketGenError::Unparseable {
        raw: raw.to_string(),
    })?;

    if wire.delist.len() > MAX_DELISTINGS_PER_HOUR {
        return Err(MarketGenError::TooManyDelistings {
            got: wire.delist.len(),
            max: MAX_DELISTINGS_PER_HOUR,
            raw: raw.to_string(),
        });
    }

    let prev_ids: BTreeMap<&Ticker, Decimal> =
        prev.companies.iter().map(|c| (&c.id, c.price)).collect();

    // Resolve the delist first so updates can be checked against it.
    let mut delisted: Vec<DelistedCompany> = Vec::new();
    let mut replacement: Option<(Ticker, Company)> = None;
    for d in wire.delist {
        let Ok(id) = Ticker::parse(&d.id) else {
            return Err(MarketGenError::InvalidDelist {
                id: d.id,
                reason: "not a valid ticker",
                raw: raw.to_string(),
            });
        };
        let Some(prev_price) = prev_ids.get(&id).copied() else {
            return Err(MarketGenError::InvalidDelist {
                id: id.to_string(),
                reason: "not on the previous board",
                raw: raw.to_string(),
            });
        };
        let Some(rep) = d.replacement else {
            return Err(MarketGenError::InvalidDelist {
                id: id.to_string(),
                reason: "missing a replacement listing",
                raw: raw.to_string(),
            });
        };
        let Ok(rep_id) = Ticker::parse(&rep.id) else {
            return Err(MarketGenError::InvalidDelist {
                id: id.to_string(),
                reason: "replacement ticker is invalid",
                raw: raw.to_string(),
            });
        };
        if prev_ids.contains_key(&rep_id) {
            return Err(MarketGenError::InvalidDelist {
                id: id.to_string(),
                reason: "replacement ticker is already on the board",
                raw: raw.to_string(),
            });
        }
        let Some(rep_price) = coerce_price(&rep.price).filter(|p| *p > Decimal::ZERO) else {
            return Err(MarketGenError::InvalidDelist {
                id: id.to_string(),
                reason: "replacement price is unusable",
                raw: raw.to_string(),
            });
        };
        if !price_in_listing_band(rep_price) {
            return Err(MarketGenError::InvalidDelist {
                id: id.to_string(),
                reason: "replacement priced outside the starting band",
                raw: raw.to_string(),
            });
        }
        delisted.push(DelistedCompany {
            id: id.clone(),
            delisted_at_hour_key: hour_key.clone(),
            delist_price: prev_price,
            reason: d.reason,
        });
        replacement = Some((
            id,
            Company::listed(
                rep_id,
                rep.name,
                rep.concept,
                rep_price,
                rep_price,
                rep.logo_prompt.filter(|p| !p.trim().is_empty()),
            ),
        ));
    }

    // Exactly one update per surviving previous ticker.
    let mut updates: BTreeMap<Ticker, Update> = BTreeMap::new();
    for u in wire.updates {
        let Ok(id) = Ticker::parse(&u.id) else {
            return Err(MarketGenError::BadUpdate {
                id: u.id,
                reason: "not a valid ticker",
                raw: raw.to_string(),
            });
        };
        if !prev_ids.contains_key(&id) {
            return Err(MarketGenError::BadUpdate {
                id: id.to_string(),
                reason: "not on the previous board",
                raw: raw.to_string(),
            });
        }
        if delisted.iter().any(|d| d.id == id) {
            return Err(MarketGenError::BadUpdate {
                id: id.to_string(),
                reason: "ticker is delisted this hour",
                raw: raw.to_string(),
            });
        }
        let Some(price) = coerce_price(&u.price).filter(|p| *p > Decimal::ZERO) else {
            return Err(MarketGenError::BadUpdate {
                id: id.to_string(),
                reason: "unusable price",
                raw: raw.to_string(),
            });
        };
        if updates
            .insert(
                id.clone(),
                Update {
                    price,
                    news_title: u.news_title,
                    news_body: u.news_body,
                    news_impact: u.news_impact,
                },
            )
            .is_some()
        {
            return Err(MarketGenError::DuplicateUpdate {
                id: id.to_string(),
                raw: raw.to_string(),
            });
        }
    }

    let missing: Vec<String> = prev
        .companies
        .iter()
        .filter(|c| !updates.contains_key(&c.id) && !delisted.iter().any(|d| d.id == c.id))
        .map(|c| c.id.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(MarketGenError::MissingUpdates {
            missing,
            raw: raw.to_string(),
        });
    }

    let big = big_news_items(wire.big_news, hour_key);
    if big.is_empty() {
        return Err(MarketGenError::MissingBigNews {
            raw: raw.to_string(),
        });
    }
    let mut news = big;

    // Rebuild the board in previous-hour order, swapping in the replacement
    // at the delisted company's slot.
    let mut companies: Vec<Company> = Vec::with_capacity(prev.companies.len());
    for c in &prev.companies {
        if let Some((delisted_id, rep)) = &replacement {
            if *delisted_id == c.id {
                companies.push(rep.clone());
                continue;
            }
        }
        // Covered by the MissingUpdates check above.
        let Some(u) = updates.get(&c.id) else { continue };
        if !u.news_title.trim().is_empty() {
            news.push(NewsItem {
                id: format!("{hour_key}-{}", c.id),
                kind: NewsKind::Company,
                hour_key: hour_key.clone(),
                title: u.news_title.clone(),
                body: u.news_body.clone(),
                impact: u.news_impact.clone(),
                company_ids: Some(vec![c.id.clone()]),
                image_url: None,
                image_prompt: None,
            });
        }
        companies.push(Company::listed(
            c.id.clone(),
            c.name.clone(),
            c.concept.clone(),
            u.price,
            c.price,
            c.logo_prompt.clone(),
        ));
    }

    let state = MarketHourState {
        version: MARKET_STATE_VERSION,
        hour_key: hour_key.clone(),
        generated_at: chrono::Utc::now().timestamp_millis(),
        companies,
        delisted,
        news,
    };

    validate_state(&state, Some(prev)).map_err(|source| MarketGenError::Invariant {
        source,
        raw: raw.to_string(),
    })?;
    Ok(state)
}
