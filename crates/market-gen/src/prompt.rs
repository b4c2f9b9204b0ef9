//! Prompt assembly for the market simulator.
//!
//! Prompts describe the previous hour compactly (ids, names, prices, recent
//! headlines) and pin down the JSON output contract plus the board rules the
//! validator will enforce. The narrative flavor text is deliberately short;
//! length limits keep the 25-company response inside the token budget.

use market_core::{
    listing_start_price_max, listing_start_price_min, HourKey, MarketHourState,
    MARKET_COMPANY_COUNT, MAX_DELISTINGS_PER_HOUR,
};
use serde_json::json;

/// Prompt for full-board regeneration: the model outputs all 25 companies.
pub fn build_full_prompt(hour_key: &HourKey, prev: Option<&MarketHourState>) -> String {
    let rules = shared_rules();
    let context = prev_context(prev);
    format!(
        "You are the MARKET SIMULATOR for a fictional fantasy-themed stock market.\n\
         Every hour you output the next snapped market state; players trade at this \
         hour's prices. Keep the world coherent: clear cause -> effect between news \
         and prices, with rumors, guild edicts, dragon attacks and plagues.\n\n\
         {rules}\n\
         OUTPUT FORMAT (MANDATORY): respond with STRICT JSON only, no markdown \
         fences, no commentary, exactly this shape:\n\
         {{\n\
           \"bigNews\": [{{\"id\": \"string\", \"title\": \"string\", \"body\": \"string\", \
         \"impact\": \"string\", \"imagePrompt\": \"string\"}}],\n\
           \"companies\": [{{\"id\": \"string\", \"name\": \"string\", \"concept\": \"string\", \
         \"price\": number, \"companyNewsTitle\": \"string\", \"companyNewsBody\": \"string\", \
         \"companyNewsImpact\": \"string\", \"logoPrompt\": \"string\"}}],\n\
           \"delist\": [{{\"id\": \"string\", \"reason\": \"string\"}}]\n\
         }}\n\
         - bigNews: 2-4 items, title <= 72 chars, body <= 240, impact <= 120.\n\
         - one company news story per company, title <= 72, body <= 180, impact <= 120.\n\
         - If there is a previous hour, keep the same listed companies unless you \
         delist one; every delisted company must be replaced 1:1 by a new listing.\n\n\
         PREVIOUS HOUR (if any): {context}\n\
         CURRENT HOURKEY (UTC): {hour_key}\n"
    )
}

/// Prompt for delta mode: the model returns one price update per existing
/// ticker plus an optional delist/replacement.
pub fn build_delta_prompt(hour_key: &HourKey, prev: &MarketHourState) -> String {
    let rules = shared_rules();
    let context = prev_context(Some(prev));
    format!(
        "You are the MARKET SIMULATOR for a fictional fantasy-themed stock market.\n\
         Every hour you output a price update for EVERY currently listed ticker, \
         moving prices on the narrative of the world.\n\n\
         {rules}\n\
         OUTPUT FORMAT (MANDATORY): respond with STRICT JSON only, no markdown \
         fences, no commentary, exactly this shape:\n\
         {{\n\
           \"bigNews\": [{{\"id\": \"string\", \"title\": \"string\", \"body\": \"string\", \
         \"impact\": \"string\"}}],\n\
           \"updates\": [{{\"id\": \"string\", \"price\": number, \"newsTitle\": \"string\", \
         \"newsBody\": \"string\", \"newsImpact\": \"string\"}}],\n\
           \"delist\": [{{\"id\": \"string\", \"reason\": \"string\", \"replacement\": \
         {{\"id\": \"string\", \"name\": \"string\", \"concept\": \"string\", \"price\": number, \
         \"logoPrompt\": \"string\"}}}}]\n\
         }}\n\
         - updates MUST contain exactly one entry for every currently listed ticker \
         (a delisted ticker gets no update; its replacement appears only in delist[]).\n\
         - bigNews: 2-4 items with the same length limits as ever (title <= 72, \
         body <= 240, impact <= 120).\n\n\
         PREVIOUS HOUR: {context}\n\
         CURRENT HOURKEY (UTC): {hour_key}\n"
    )
}

fn shared_rules() -> String {
    format!(
        "MARKET RULES:\n\
         - Exactly {count} LISTED companies must exist after your update.\n\
         - Each company represents a fantasy concept; ids are mnemonic tickers of \
         3-6 uppercase A-Z letters, unique, never placeholders like AAA/ABC.\n\
         - Max delistings this hour: {max_delist}. A delisted company disappears \
         from the board and must be replaced by a new concept.\n\
         - Prices must be positive and believable; most hourly moves within \
         -12%..+12%, a few bigger on major events.\n\
         - Any NEW listing must be priced between {band_min} and {band_max}. \
         Existing tickers may drift beyond that band over time.\n\
         - Provide realistic price variety; never output near-identical prices.\n",
        count = MARKET_COMPANY_COUNT,
        max_delist = MAX_DELISTINGS_PER_HOUR,
        band_min = listing_start_price_min(),
        band_max = listing_start_price_max(),
    )
}

fn prev_context(prev: Option<&MarketHourState>) -> String {
    let Some(prev) = prev else {
        return "null".to_string();
    };
    let companies: Vec<_> = prev
        .companies
        .iter()
        .map(|c| {
            json!({
                "id": c.id.as_str(),
                "name": c.name,
                "concept": c.concept,
                "price": c.price,
            })
        })
        .collect();
    let headlines: Vec<_> = prev
        .news
        .iter()
        .take(8)
        .map(|n| json!({ "kind": n.kind, "title": n.title }))
        .collect();
    json!({
        "hourKey": prev.hour_key,
        "companies": companies,
        "newsHeadlines": headlines,
    })
    .to_string()
}

/// Token budget for the 25-company response; generous to avoid truncation.
pub const MARKET_MAX_TOKENS: u32 = 5200;

#[cfg(test)]
mod tests {
    use super::*;
    use market_core::seed_market;

    #[test]
    fn full_prompt_names_the_contract() {
        let hour = HourKey::parse("2026-02-02T18").unwrap();
        let prev = seed_market(&hour.prev());
        let prompt = build_full_prompt(&hour, Some(&prev));
        assert!(prompt.contains("Exactly 25 LISTED companies"));
        assert!(prompt.contains("\"bigNews\""));
        assert!(prompt.contains("2026-02-02T18"));
        assert!(prompt.contains("\"FIRE\""));
        // First hour has no context block.
        let first = build_full_prompt(&hour, None);
        assert!(first.contains("PREVIOUS HOUR (if any): null"));
    }

    #[test]
    fn delta_prompt_demands_full_coverage() {
        let hour = HourKey::parse("2026-02-02T18").unwrap();
        let prev = seed_market(&hour.prev());
        let prompt = build_delta_prompt(&hour, &prev);
        assert!(prompt.contains("exactly one entry for every currently listed ticker"));
        assert!(prompt.contains("\"updates\""));
    }
}
