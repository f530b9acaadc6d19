//! Periodic refresh of the latest rates into the store

use crate::core::RateResolver;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tracing::{debug, info, warn};

/// Refreshes the latest rates every `period`, starting immediately, until
/// `shutdown` flips to `true` or its sender is dropped.
pub fn spawn_refresher(
    resolver: Arc<RateResolver>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        info!(period_secs = period.as_secs(), "Rate refresher started");
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);

        loop {
            tokio::select! {
                _ = interval.tick() => {
                    match resolver.refresh_latest().await {
                        Ok(snapshot) => debug!(
                            date = %snapshot.date,
                            currencies = snapshot.rates.len(),
                            "Refreshed latest rates"
                        ),
                        Err(e) => warn!(error = %e, "Failed to refresh latest rates"),
                    }
                }
                changed = shutdown.changed() => {
                    if changed.is_err() || *shutdown.borrow() {
                        break;
                    }
                }
            }
        }
        info!("Rate refresher stopped");
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rates::RateSnapshot;
    use crate::core::{RateProvider, RateStore};
    use crate::store::memory::MemoryRateStore;
    use async_trait::async_trait;
    use chrono::NaiveDate;
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};

    #[derive(Default)]
    struct CountingProvider {
        latest_calls: AtomicUsize,
    }

    #[async_trait]
    impl RateProvider for CountingProvider {
        async fn fetch_latest(&self, _currencies: &[String]) -> anyhow::Result<RateSnapshot> {
            self.latest_calls.fetch_add(1, Ordering::SeqCst);
            let rates = BTreeMap::from([("UAH".to_string(), 39.5)]);
            Ok(RateSnapshot::new(
                NaiveDate::from_ymd_opt(2024, 4, 22).unwrap(),
                "USD",
                rates,
            ))
        }

        async fn fetch_for_date(
            &self,
            _currencies: &[String],
            date: NaiveDate,
        ) -> anyhow::Result<RateSnapshot> {
            Ok(RateSnapshot::empty(date, "USD"))
        }
    }

    #[tokio::test]
    async fn test_refresher_writes_through_and_stops() {
        let store = Arc::new(MemoryRateStore::new("USD"));
        let provider = Arc::new(CountingProvider::default());
        let resolver = Arc::new(RateResolver::new(
            Arc::clone(&store) as Arc<dyn RateStore>,
            Arc::clone(&provider) as Arc<dyn RateProvider>,
            vec!["UAH".to_string()],
        ));

        let (tx, rx) = watch::channel(false);
        let handle = spawn_refresher(resolver, Duration::from_secs(3600), rx);

        // The first tick fires immediately.
        for _ in 0..50 {
            if provider.latest_calls.load(Ordering::SeqCst) > 0 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        tx.send(true).unwrap();
        handle.await.unwrap();

        assert_eq!(provider.latest_calls.load(Ordering::SeqCst), 1);
        let stored = store
            .read(NaiveDate::from_ymd_opt(2024, 4, 22).unwrap())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(stored.rate("UAH"), Some(39.5));
    }
}
