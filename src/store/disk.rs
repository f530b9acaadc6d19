use crate::core::rates::{DATE_FORMAT, RateSnapshot};
use crate::core::store::{RateStore, RequestLog, RequestLogEntry};
use anyhow::{Context, Result, anyhow};
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use fjall::{Config, Keyspace, PartitionCreateOptions, PartitionHandle, PersistMode};
use std::collections::BTreeMap;
use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};
use tracing::{debug, info};

const RATES_PARTITION: &str = "rates";
const REQUESTS_PARTITION: &str = "requests";
const KEY_SEPARATOR: char = '|';

/// Durable rate store on a fjall keyspace.
///
/// Every rate is its own row keyed `DATE|BASE|CURRENCY` with the rate stored
/// as a big-endian `f64`, so a (date, base) lookup is a prefix scan. The
/// request audit log lives in a second partition keyed by a big-endian id.
pub struct DiskRateStore {
    keyspace: Keyspace,
    rates: PartitionHandle,
    requests: PartitionHandle,
    base: String,
    next_request_id: AtomicU64,
}

impl DiskRateStore {
    pub fn open(db_path: &Path, base: &str) -> Result<Self> {
        std::fs::create_dir_all(db_path)
            .with_context(|| format!("Failed to create data directory: {}", db_path.display()))?;

        let keyspace = Config::new(db_path.join("rates_db"))
            .open()
            .with_context(|| format!("Failed to open rate store at {}", db_path.display()))?;
        let rates = keyspace.open_partition(RATES_PARTITION, PartitionCreateOptions::default())?;
        let requests =
            keyspace.open_partition(REQUESTS_PARTITION, PartitionCreateOptions::default())?;

        let next_request_id = match requests.last_key_value()? {
            Some((key, _)) => decode_id(&key)? + 1,
            None => 1,
        };

        debug!(path = %db_path.display(), "Opened rate store");
        Ok(Self {
            keyspace,
            rates,
            requests,
            base: base.to_string(),
            next_request_id: AtomicU64::new(next_request_id),
        })
    }

    /// Writes a couple of placeholder days when the store has never held any
    /// rates.
    pub async fn seed_if_empty(&self) -> Result<()> {
        if !self.rates.is_empty()? {
            return Ok(());
        }

        let placeholders = [
            ("2024-04-20", [("UAH", 39.4), ("EUR", 0.8), ("RON", 4.7)]),
            ("2024-04-21", [("UAH", 39.5), ("EUR", 0.9), ("RON", 4.8)]),
        ];
        for (date, rates) in placeholders {
            let date = NaiveDate::parse_from_str(date, DATE_FORMAT)?;
            let rates = rates.iter().map(|(c, r)| (c.to_string(), *r)).collect();
            self.write(&RateSnapshot::new(date, self.base.clone(), rates))
                .await?;
        }
        info!("Seeded rate store with placeholder rates");
        Ok(())
    }

    /// Flushes everything to disk. Called on shutdown.
    pub fn persist(&self) -> Result<()> {
        self.keyspace
            .persist(PersistMode::SyncAll)
            .context("Failed to persist rate store")
    }
}

fn date_prefix(date: NaiveDate, base: &str) -> String {
    format!(
        "{}{KEY_SEPARATOR}{base}{KEY_SEPARATOR}",
        date.format(DATE_FORMAT)
    )
}

fn decode_rate(value: &[u8]) -> Result<f64> {
    let bytes: [u8; 8] = value
        .try_into()
        .map_err(|_| anyhow!("Corrupt rate value of {} bytes", value.len()))?;
    Ok(f64::from_be_bytes(bytes))
}

fn decode_id(key: &[u8]) -> Result<u64> {
    let bytes: [u8; 8] = key
        .try_into()
        .map_err(|_| anyhow!("Corrupt request log key of {} bytes", key.len()))?;
    Ok(u64::from_be_bytes(bytes))
}

#[async_trait]
impl RateStore for DiskRateStore {
    async fn read(&self, date: NaiveDate) -> Result<Option<RateSnapshot>> {
        let prefix = date_prefix(date, &self.base);
        let mut rates = BTreeMap::new();

        for item in self.rates.prefix(prefix.as_bytes()) {
            let (key, value) = item?;
            let key = std::str::from_utf8(&key).context("Corrupt rate key")?;
            let currency = key
                .strip_prefix(prefix.as_str())
                .ok_or_else(|| anyhow!("Unexpected rate key: {key}"))?;
            rates.insert(currency.to_string(), decode_rate(&value)?);
        }

        if rates.is_empty() {
            debug!(%date, "Store MISS");
            return Ok(None);
        }
        debug!(%date, "Store HIT");
        Ok(Some(RateSnapshot::new(date, self.base.clone(), rates)))
    }

    async fn write(&self, snapshot: &RateSnapshot) -> Result<()> {
        let prefix = date_prefix(snapshot.date, &snapshot.base);
        let rows: Vec<(Vec<u8>, Vec<u8>)> = snapshot
            .rates
            .iter()
            .map(|(currency, rate)| {
                (
                    format!("{prefix}{currency}").into_bytes(),
                    rate.to_be_bytes().to_vec(),
                )
            })
            .collect();

        // The commit and fsync block, so they run off the async workers.
        let keyspace = self.keyspace.clone();
        let partition = self.rates.clone();
        let date = snapshot.date;
        tokio::task::spawn_blocking(move || -> Result<()> {
            let mut batch = keyspace.batch();
            for (key, value) in rows {
                batch.insert(&partition, key, value);
            }
            batch
                .commit()
                .with_context(|| format!("Failed to write rates for {date}"))?;
            keyspace
                .persist(PersistMode::SyncAll)
                .context("Failed to persist rate store")
        })
        .await
        .context("Rate store write task failed")??;

        debug!(date = %snapshot.date, count = snapshot.rates.len(), "Store PUT");
        Ok(())
    }
}

#[async_trait]
impl RequestLog for DiskRateStore {
    async fn record(&self, kind: &str, request: &str) -> Result<()> {
        let id = self.next_request_id.fetch_add(1, Ordering::SeqCst);
        let entry = RequestLogEntry {
            id,
            timestamp: Utc::now(),
            kind: kind.to_string(),
            request: request.to_string(),
        };
        self.requests
            .insert(id.to_be_bytes().to_vec(), serde_json::to_vec(&entry)?)
            .context("Failed to record request")?;
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RequestLogEntry>> {
        self.requests
            .iter()
            .rev()
            .take(limit)
            .map(|item| -> Result<RequestLogEntry> {
                let (_, value) = item?;
                Ok(serde_json::from_slice(&value)?)
            })
            .collect()
    }
}
