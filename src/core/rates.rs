//! Exchange rate snapshots and the values derived from them

use crate::core::error::RateError;
use anyhow::{Result, anyhow};
use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Display;

pub const DATE_FORMAT: &str = "%Y-%m-%d";
const DATE_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// One dated set of exchange rates expressed against a single base currency.
///
/// A rate is the number of units of the quoted currency per one unit of
/// `base`. A snapshot without any rates carries no usable content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RateSnapshot {
    #[serde(with = "snapshot_date")]
    pub date: NaiveDate,
    pub base: String,
    pub rates: BTreeMap<String, f64>,
}

impl RateSnapshot {
    pub fn new(date: NaiveDate, base: impl Into<String>, rates: BTreeMap<String, f64>) -> Self {
        Self {
            date,
            base: base.into(),
            rates,
        }
    }

    pub fn empty(date: NaiveDate, base: impl Into<String>) -> Self {
        Self::new(date, base, BTreeMap::new())
    }

    pub fn is_empty(&self) -> bool {
        self.rates.is_empty()
    }

    pub fn rate(&self, currency: &str) -> Option<f64> {
        self.rates.get(currency).copied()
    }

    /// Cross rate for `pair`: units of `pair.to` per one unit of `pair.from`.
    ///
    /// Both legs must be present and the `from` leg must be non-zero.
    pub fn cross_rate(&self, pair: &CurrencyPair) -> Result<f64, RateError> {
        let unusable = |currency: &str| RateError::UnusableRate {
            currency: currency.to_string(),
            date: self.date,
        };

        let from = self
            .rate(&pair.from)
            .filter(|r| *r != 0.0)
            .ok_or_else(|| unusable(&pair.from))?;
        let to = self.rate(&pair.to).ok_or_else(|| unusable(&pair.to))?;

        Ok(to / from)
    }
}

/// An ordered pair of currency codes, e.g. `USD-UAH` (1 USD = x UAH).
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CurrencyPair {
    pub from: String,
    pub to: String,
}

impl CurrencyPair {
    pub fn new(from: impl Into<String>, to: impl Into<String>) -> Self {
        Self {
            from: from.into(),
            to: to.into(),
        }
    }
}

impl Display for CurrencyPair {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}-{}", self.from, self.to)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairQuote {
    pub date: String,
    pub pair: String,
    pub rate: f64,
}

impl PairQuote {
    pub fn from_snapshot(snapshot: &RateSnapshot, pair: &CurrencyPair) -> Result<Self, RateError> {
        Ok(Self {
            date: snapshot.date.format(DATE_FORMAT).to_string(),
            pair: pair.to_string(),
            rate: snapshot.cross_rate(pair)?,
        })
    }
}

/// How rate values that fail to parse as numbers are treated.
///
/// `Lenient` turns them into `0.0` and keeps the rest of the snapshot. This
/// silently hides upstream garbage, so `Strict` is available to reject the
/// whole response instead.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RateParsing {
    #[default]
    Lenient,
    Strict,
}

/// Parses a raw upstream rate value. Upstream sends rates as JSON strings, but
/// plain numbers are accepted too.
pub fn parse_rate(currency: &str, raw: &serde_json::Value, policy: RateParsing) -> Result<f64> {
    let parsed = match raw {
        serde_json::Value::String(s) => s.trim().parse::<f64>().ok(),
        serde_json::Value::Number(n) => n.as_f64(),
        _ => None,
    };

    match (parsed, policy) {
        (Some(rate), _) => Ok(rate),
        (None, RateParsing::Lenient) => Ok(0.0),
        (None, RateParsing::Strict) => Err(anyhow!("Invalid rate for {currency}: {raw}")),
    }
}

/// Parses upstream dates such as `2024-04-29 12:34:56+00`. The trailing UTC
/// offset marker is dropped and the time of day ignored.
pub fn parse_upstream_date(raw: &str) -> Option<NaiveDate> {
    let trimmed = raw.split('+').next().unwrap_or_default().trim();

    NaiveDateTime::parse_from_str(trimmed, DATE_TIME_FORMAT)
        .map(|dt| dt.date())
        .or_else(|_| NaiveDate::parse_from_str(trimmed, DATE_FORMAT))
        .ok()
}

mod snapshot_date {
    use super::parse_upstream_date;
    use chrono::NaiveDate;
    use serde::{Deserialize, Deserializer, Serializer, de::Error};

    pub fn serialize<S: Serializer>(date: &NaiveDate, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&date.format("%Y-%m-%d 00:00:00").to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<NaiveDate, D::Error> {
        let raw = String::deserialize(deserializer)?;
        parse_upstream_date(&raw).ok_or_else(|| D::Error::custom(format!("invalid date: {raw}")))
    }
}
