//! Key namespace and TTLs for cached dossiers.

use crate::GameMode;
use market_core::DateKey;

/// Daily dossiers outlive their date by a day so late-night players finish.
pub const DAILY_PROFILE_TTL_SECONDS: u64 = 60 * 60 * 48;

/// Random dossiers are throwaway.
pub const RANDOM_PROFILE_TTL_SECONDS: u64 = 60 * 60 * 24;

pub fn daily_profile_key(date_key: &DateKey) -> String {
    format!("pg:profile:daily:{date_key}")
}

pub fn random_profile_key(game_id: &str) -> String {
    format!("pg:profile:rand:{game_id}")
}

/// Resolve the cache key for a game.
pub fn profile_key_for(mode: GameMode, game_id: &str, date_key: Option<&DateKey>) -> String {
    match (mode, date_key) {
        (GameMode::Daily, Some(dk)) => daily_profile_key(dk),
        _ => random_profile_key(game_id),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_shapes() {
        let dk = DateKey::parse("2026-02-02").unwrap();
        assert_eq!(daily_profile_key(&dk), "pg:profile:daily:2026-02-02");
        assert_eq!(random_profile_key("abc"), "pg:profile:rand:abc");
        assert_eq!(
            profile_key_for(GameMode::Daily, "2026-02-02", Some(&dk)),
            "pg:profile:daily:2026-02-02"
        );
        assert_eq!(
            profile_key_for(GameMode::DebugRandom, "abc", None),
            "pg:profile:rand:abc"
        );
    }
}
