//! Rate resolution over the local store and the remote provider

use crate::core::error::RateError;
use crate::core::provider::RateProvider;
use crate::core::rates::{CurrencyPair, PairQuote, RateSnapshot};
use crate::core::store::RateStore;
use chrono::{Duration, NaiveDate, Utc};
use std::sync::Arc;
use tracing::{debug, error, info, instrument};

/// How far back a request falls when the requested day has no content.
pub const FALLBACK_WINDOW_DAYS: i64 = 1;

pub trait Clock: Send + Sync {
    fn today(&self) -> NaiveDate;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn today(&self) -> NaiveDate {
        Utc::now().date_naive()
    }
}

pub struct RateResolver {
    store: Arc<dyn RateStore>,
    provider: Arc<dyn RateProvider>,
    currencies: Vec<String>,
    clock: Arc<dyn Clock>,
}

impl RateResolver {
    pub fn new(
        store: Arc<dyn RateStore>,
        provider: Arc<dyn RateProvider>,
        currencies: Vec<String>,
    ) -> Self {
        Self {
            store,
            provider,
            currencies,
            clock: Arc::new(SystemClock),
        }
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn currencies(&self) -> &[String] {
        &self.currencies
    }

    /// Resolves the snapshot for `date`, `None` meaning today.
    ///
    /// When the day has no content the lookup is retried exactly once for the
    /// day before today. Hard errors are returned without falling back.
    #[instrument(name = "ResolveRates", skip(self))]
    pub async fn resolve(&self, date: Option<NaiveDate>) -> Result<RateSnapshot, RateError> {
        if let Some(snapshot) = self.lookup(date).await? {
            return Ok(snapshot);
        }

        let fallback = self.clock.today() - Duration::days(FALLBACK_WINDOW_DAYS);
        info!(requested = ?date, %fallback, "No rates for requested date, falling back");

        self.lookup(Some(fallback))
            .await?
            .ok_or(RateError::NoContent)
    }

    /// Resolves today's snapshot and derives the cross rate for `pair`.
    #[instrument(name = "ResolvePair", skip(self, pair), fields(pair = %pair))]
    pub async fn resolve_pair(&self, pair: &CurrencyPair) -> Result<PairQuote, RateError> {
        let snapshot = self.resolve(None).await?;
        PairQuote::from_snapshot(&snapshot, pair)
    }

    /// Fetches the latest rates regardless of what is stored and writes them
    /// through to the store.
    #[instrument(name = "RefreshLatest", skip(self))]
    pub async fn refresh_latest(&self) -> Result<RateSnapshot, RateError> {
        let snapshot = self
            .provider
            .fetch_latest(&self.currencies)
            .await
            .map_err(RateError::Provider)?;

        if snapshot.is_empty() {
            return Err(RateError::NoContent);
        }
        self.write_through(&snapshot).await;
        Ok(snapshot)
    }

    /// A single store-then-provider pass. `Ok(None)` is "no content".
    async fn lookup(&self, date: Option<NaiveDate>) -> Result<Option<RateSnapshot>, RateError> {
        let target = date.unwrap_or_else(|| self.clock.today());

        match self.store.read(target).await {
            Ok(Some(snapshot)) if !snapshot.is_empty() => {
                debug!(%target, "Serving rates from store");
                return Ok(Some(snapshot));
            }
            Ok(Some(_)) => {
                debug!(%target, "Stored rates are empty");
                return Ok(None);
            }
            Ok(None) => debug!(%target, "No stored rates"),
            Err(e) => {
                error!(%target, error = %e, "Failed to read rates");
                return Err(RateError::Store(e));
            }
        }

        let fetched = match date {
            None => self.provider.fetch_latest(&self.currencies).await,
            Some(day) => self.provider.fetch_for_date(&self.currencies, day).await,
        };
        let snapshot = fetched.map_err(|e| {
            error!(%target, error = %e, "Failed to fetch rates");
            RateError::Provider(e)
        })?;

        if snapshot.is_empty() {
            debug!(%target, "Provider returned no rates");
            return Ok(None);
        }

        self.write_through(&snapshot).await;
        Ok(Some(snapshot))
    }

    async fn write_through(&self, snapshot: &RateSnapshot) {
        if let Err(e) = self.store.write(snapshot).await {
            error!(date = %snapshot.date, error = %e, "Failed to write rates");
        }
    }
}
