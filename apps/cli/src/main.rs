#![deny(warnings)]

//! Headless CLI for inspecting an hour bucket and validating the seed board.

use anyhow::Result;
use market_core::{seed_market, validate_state, HourKey};
use market_gen::keys::{market_hour_key, market_hour_lock_key};
use tracing::info;
use tracing_subscriber::EnvFilter;

fn parse_args() -> (Option<String>, bool) {
    let mut hour: Option<String> = None;
    let mut json = false;
    let mut it = std::env::args().skip(1);
    while let Some(arg) = it.next() {
        match arg.as_str() {
            "--hour" => hour = it.next(),
            "--json" => json = true,
            _ => {}
        }
    }
    (hour, json)
}

fn main() -> Result<()> {
    // Logging setup
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    let (hour, json) = parse_args();
    let hour_key = match hour {
        Some(raw) => HourKey::parse(&raw)?,
        None => HourKey::now(),
    };
    info!(
        %hour_key,
        build = env!("GIT_SHA"),
        built = env!("BUILD_DATE"),
        "inspecting hour bucket"
    );

    let board = seed_market(&hour_key);
    validate_state(&board, None)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&board)?);
        return Ok(());
    }

    println!(
        "Seed board OK | hour: {} | companies: {} | news: {}",
        hour_key,
        board.companies.len(),
        board.news.len()
    );
    println!("Keys | state: {}", market_hour_key(&hour_key));
    println!("     | lock:  {}", market_hour_lock_key(&hour_key));
    println!("     | prev:  {}", market_hour_key(&hour_key.prev()));
    for c in &board.companies {
        println!("{:<6} {:>8}  {}", c.id.as_str(), c.price.to_string(), c.name);
    }

    Ok(())
}
