//! UTC time-bucket keys.
//!
//! Market state snaps to `YYYY-MM-DDTHH` hour buckets; the daily judgment
//! game snaps to `YYYY-MM-DD` date keys. Both are plain strings on the wire.

use crate::MarketError;
use chrono::{DateTime, Duration, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// A UTC hour bucket key, e.g. `2026-02-02T18`.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct HourKey(String);

impl HourKey {
    /// The bucket containing the current wall-clock instant.
    pub fn now() -> Self {
        Self::from_datetime(Utc::now())
    }

    pub fn from_datetime(dt: DateTime<Utc>) -> Self {
        HourKey(dt.format("%Y-%m-%dT%H").to_string())
    }

    /// Parse and validate a bucket key.
    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        let dt = NaiveDateTime::parse_from_str(&format!("{raw}:00:00"), "%Y-%m-%dT%H:%M:%S")
            .map_err(|_| MarketError::BadHourKey(raw.to_string()))?;
        Ok(HourKey(dt.format("%Y-%m-%dT%H").to_string()))
    }

    /// The immediately preceding hour bucket.
    pub fn prev(&self) -> Self {
        // Self-inflicted keys always parse; fall back to identity if not.
        match NaiveDateTime::parse_from_str(&format!("{}:00:00", self.0), "%Y-%m-%dT%H:%M:%S") {
            Ok(dt) => HourKey((dt - Duration::hours(1)).format("%Y-%m-%dT%H").to_string()),
            Err(_) => self.clone(),
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for HourKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for HourKey {
    type Error = MarketError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        HourKey::parse(&s)
    }
}

impl From<HourKey> for String {
    fn from(k: HourKey) -> String {
        k.0
    }
}

/// A UTC date key, e.g. `2026-02-02`. Used by the daily judgment game.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct DateKey(String);

impl DateKey {
    pub fn today() -> Self {
        DateKey(Utc::now().format("%Y-%m-%d").to_string())
    }

    pub fn parse(raw: &str) -> Result<Self, MarketError> {
        let d = NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .map_err(|_| MarketError::BadDateKey(raw.to_string()))?;
        Ok(DateKey(d.format("%Y-%m-%d").to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for DateKey {
    type Error = MarketError;
    fn try_from(s: String) -> Result<Self, Self::Error> {
        DateKey::parse(&s)
    }
}

impl From<DateKey> for String {
    fn from(k: DateKey) -> String {
        k.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn format_and_parse() {
        let dt = Utc.with_ymd_and_hms(2026, 2, 2, 18, 41, 5).unwrap();
        let key = HourKey::from_datetime(dt);
        assert_eq!(key.as_str(), "2026-02-02T18");
        assert_eq!(HourKey::parse("2026-02-02T18").unwrap(), key);
        assert!(HourKey::parse("2026-02-02").is_err());
        assert!(HourKey::parse("2026-13-02T18").is_err());
        assert!(HourKey::parse("garbage").is_err());
    }

    #[test]
    fn prev_within_a_day() {
        let key = HourKey::parse("2026-02-02T18").unwrap();
        assert_eq!(key.prev().as_str(), "2026-02-02T17");
    }

    #[test]
    fn prev_across_day_and_month_boundaries() {
        let midnight = HourKey::parse("2026-03-01T00").unwrap();
        assert_eq!(midnight.prev().as_str(), "2026-02-28T23");
        let new_year = HourKey::parse("2026-01-01T00").unwrap();
        assert_eq!(new_year.prev().as_str(), "2025-12-31T23");
    }

    #[test]
    fn hour_key_serde_is_a_plain_string() {
        let key = HourKey::parse("2026-02-02T18").unwrap();
        assert_eq!(serde_json::to_string(&key).unwrap(), "\"2026-02-02T18\"");
        assert!(serde_json::from_str::<HourKey>("\"not-a-key\"").is_err());
    }

    #[test]
    fn date_key_parse() {
        assert!(DateKey::parse("2026-02-02").is_ok());
        assert!(DateKey::parse("2026-02-31").is_err());
        assert!(DateKey::parse("02-02-2026").is_err());
    }
}
