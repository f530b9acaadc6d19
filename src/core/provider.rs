//! Remote rate provider abstraction

use crate::core::rates::RateSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use chrono::NaiveDate;

#[async_trait]
pub trait RateProvider: Send + Sync {
    /// Current rates for `currencies` against the provider's base.
    async fn fetch_latest(&self, currencies: &[String]) -> Result<RateSnapshot>;

    /// Rates for a past `date`. An empty snapshot means the provider has no
    /// content for that date, which is not an error.
    async fn fetch_for_date(&self, currencies: &[String], date: NaiveDate) -> Result<RateSnapshot>;
}
