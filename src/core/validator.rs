//! Input validation for rate and pair requests

use crate::core::rates::{CurrencyPair, DATE_FORMAT};
use chrono::NaiveDate;
use serde::Serialize;
use std::collections::BTreeMap;

pub const DATE_FIELD: &str = "date";
pub const PAIR_FIELD: &str = "pair";

/// Collects field-level validation errors.
///
/// Several failed checks on the same field are joined into one message.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Validator {
    errors: BTreeMap<String, String>,
}

impl Validator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn add_error(&mut self, key: &str, message: &str) {
        self.errors
            .entry(key.to_string())
            .and_modify(|existing| {
                existing.push_str("; ");
                existing.push_str(message);
            })
            .or_insert_with(|| message.to_string());
    }

    pub fn check(&mut self, ok: bool, key: &str, message: &str) {
        if !ok {
            self.add_error(key, message);
        }
    }

    pub fn errors(&self) -> &BTreeMap<String, String> {
        &self.errors
    }
}

pub fn permitted_value(value: &str, permitted: &[String]) -> bool {
    permitted.iter().any(|p| p == value)
}

/// Checks an optional `YYYY-MM-DD` date. Empty input is valid and means today.
pub fn check_date(v: &mut Validator, raw: &str) -> Option<NaiveDate> {
    if raw.is_empty() {
        return None;
    }

    // chrono accepts unpadded fields and a signed year, so the round trip
    // must reproduce the input exactly.
    let parsed = NaiveDate::parse_from_str(raw, DATE_FORMAT)
        .ok()
        .filter(|d| d.format(DATE_FORMAT).to_string() == raw);
    v.check(
        parsed.is_some(),
        DATE_FIELD,
        "invalid date format, use YYYY-MM-DD",
    );
    parsed
}

/// Checks a `FROM-TO` pair for shape and for membership in `permitted`.
///
/// Both checks always run. The pair is returned only when both pass.
pub fn check_pair(v: &mut Validator, raw: &str, permitted: &[String]) -> Option<CurrencyPair> {
    let tokens: Vec<&str> = raw.split('-').collect();

    let well_formed = tokens.len() == 2
        && tokens
            .iter()
            .all(|t| t.len() == 3 && t.chars().all(|c| c.is_ascii_alphabetic()));
    v.check(well_formed, PAIR_FIELD, "invalid pair format, use USD-UAH");

    let supported = tokens.iter().all(|t| permitted_value(t, permitted));
    v.check(
        supported,
        PAIR_FIELD,
        &format!("invalid currency, use these: {}", permitted.join(",")),
    );

    if well_formed && supported {
        Some(CurrencyPair::new(tokens[0], tokens[1]))
    } else {
        None
    }
}
