use chrono::NaiveDate;
use thiserror::Error;

/// Outcome of a rate resolution that did not produce a snapshot.
///
/// `NoContent` and `UnusableRate` are expected outcomes reported to the
/// caller. `Provider` and `Store` are operational faults.
#[derive(Debug, Error)]
pub enum RateError {
    #[error("no rates available")]
    NoContent,
    #[error("no usable rate for {currency} on {date}")]
    UnusableRate { currency: String, date: NaiveDate },
    #[error("failed to fetch rates: {0:#}")]
    Provider(anyhow::Error),
    #[error("failed to read rates: {0:#}")]
    Store(anyhow::Error),
}

impl RateError {
    pub fn is_not_available(&self) -> bool {
        matches!(self, Self::NoContent | Self::UnusableRate { .. })
    }
}
