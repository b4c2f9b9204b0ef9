//! Baked-in initial market: the first hour's listing and headlines.
//!
//! Published whenever no previous hour exists in the cache, so booting the
//! game never requires a model call. All seed prices sit inside the starting
//! band by construction.

use crate::{
    Company, CompanyStatus, DelistedCompany, HourKey, MarketHourState, NewsItem, NewsKind, Ticker,
    MARKET_STATE_VERSION,
};
use chrono::Utc;
use rust_decimal::Decimal;

const SEED_COMPANIES: &[(&str, &str, i64)] = &[
    ("FIRE", "Fireball", 1460),
    ("ORC", "Orc Mercenaries", 935),
    ("PATRN", "Dark Patrons", 680),
    ("SNEAK", "Sneak Attack", 1120),
    ("HEAL", "Sanctified Healing", 1890),
    ("PLAG", "Plague Wards", 1240),
    ("MITH", "Mithril", 2230),
    ("DRAGN", "Dragonfire Insurance", 875),
    ("CARVN", "Caravan Guilds", 1610),
    ("PORTL", "Portal Networks", 1940),
    ("DIVIN", "Divination", 1530),
    ("RELIC", "Relic Trade", 560),
    ("DWARF", "Dwarven Forges", 1720),
    ("ELIX", "Elixirs", 1090),
    ("GRIFF", "Griffon Riders", 1370),
    ("RUNE", "Runesmiths", 2160),
    ("NECRO", "Necromancy", 410),
    ("FAE", "Fey Courts", 790),
    ("BARD", "Bardic Colleges", 630),
    ("GOLEM", "Golemworks", 2020),
    ("SHIP", "Spelljammers", 1280),
    ("CROWN", "Crown Tax Levies", 990),
    ("BEAST", "Beast Taming", 820),
    ("ALCH", "Alchemist Guild", 2370),
    ("WARD", "Ancient Wards", 1410),
];

/// Build the seed market for the given hour bucket.
pub fn seed_market(hour_key: &HourKey) -> MarketHourState {
    let companies: Vec<Company> = SEED_COMPANIES
        .iter()
        .map(|&(id, name, cents)| {
            let price = Decimal::new(cents, 2);
            Company {
                // Seed ids are static and known-valid.
                id: Ticker::parse(id).expect("seed ticker"),
                name: name.to_string(),
                concept: name.to_string(),
                price,
                prev_price: price,
                change: Decimal::ZERO,
                change_pct: Decimal::ZERO,
                status: CompanyStatus::Listed,
                logo_prompt: None,
            }
        })
        .collect();

    let news = vec![
        seed_big(
            "seed-big-1",
            hour_key,
            "Sky-Scar Comet Spurs Prophecy Rush",
            "A green-tailed comet carved a glowing wake over the Free Cities. Seers sell \
             readings, star-mages buy reagents, and nervous caravans pay extra for wards \
             against 'falling fire'.",
            "Boosts divination, wards, and astral reagents; pressures caravan security \
             costs; mild demand for fire mitigation.",
        ),
        seed_big(
            "seed-big-2",
            hour_key,
            "Saltmarsh Plague Fever Hits Dock Wards",
            "Dockside healers report a fever spreading through Saltmarsh wharves. \
             Apothecaries raise prices, clerics are overwhelmed, and quarantine seals slow \
             imports of herbs and reagents.",
            "Healers and potions up; trade and smuggling volatility; herb supply tightens.",
        ),
        seed_big(
            "seed-big-3",
            hour_key,
            "Ironhold Issues Anti-Necromancy Edict",
            "The Ironhold Synod bans corpse-labor within its walls after a crypt incident. \
             Enforcement squads seize grimoires and sanctify old tunnels; legitimate \
             funerary guilds gain contracts.",
            "Necromancy down; sanctified wards and funerary services up; black-market bone \
             trade spikes.",
        ),
    ];

    MarketHourState {
        version: MARKET_STATE_VERSION,
        hour_key: hour_key.clone(),
        generated_at: Utc::now().timestamp_millis(),
        companies,
        delisted: Vec::<DelistedCompany>::new(),
        news,
    }
}

fn seed_big(id: &str, hour_key: &HourKey, title: &str, body: &str, impact: &str) -> NewsItem {
    NewsItem {
        id: id.to_string(),
        kind: NewsKind::Big,
        hour_key: hour_key.clone(),
        title: title.to_string(),
        body: body.to_string(),
        impact: impact.to_string(),
        company_ids: None,
        image_url: None,
        image_prompt: None,
    }
}
