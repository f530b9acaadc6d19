use crate::core::rates::RateSnapshot;
use crate::core::store::{RateStore, RequestLog, RequestLogEntry};
use anyhow::Result;
use async_trait::async_trait;
use chrono::{NaiveDate, Utc};
use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::debug;

type RowKey = (NaiveDate, String, String);

/// In-memory rate store with the same row granularity as the disk store.
/// Contents are lost on restart.
pub struct MemoryRateStore {
    base: String,
    rows: Arc<Mutex<HashMap<RowKey, f64>>>,
    requests: Arc<Mutex<Vec<RequestLogEntry>>>,
}

impl MemoryRateStore {
    pub fn new(base: &str) -> Self {
        Self {
            base: base.to_string(),
            rows: Arc::new(Mutex::new(HashMap::new())),
            requests: Arc::new(Mutex::new(Vec::new())),
        }
    }
}

#[async_trait]
impl RateStore for MemoryRateStore {
    async fn read(&self, date: NaiveDate) -> Result<Option<RateSnapshot>> {
        let rows = self.rows.lock().await;
        let rates: BTreeMap<String, f64> = rows
            .iter()
            .filter(|((d, base, _), _)| *d == date && *base == self.base)
            .map(|((_, _, currency), rate)| (currency.clone(), *rate))
            .collect();

        if rates.is_empty() {
            debug!(%date, "Store MISS");
            return Ok(None);
        }
        debug!(%date, "Store HIT");
        Ok(Some(RateSnapshot::new(date, self.base.clone(), rates)))
    }

    async fn write(&self, snapshot: &RateSnapshot) -> Result<()> {
        let mut rows = self.rows.lock().await;
        for (currency, rate) in &snapshot.rates {
            rows.insert(
                (snapshot.date, snapshot.base.clone(), currency.clone()),
                *rate,
            );
        }
        debug!(date = %snapshot.date, count = snapshot.rates.len(), "Store PUT");
        Ok(())
    }
}

#[async_trait]
impl RequestLog for MemoryRateStore {
    async fn record(&self, kind: &str, request: &str) -> Result<()> {
        let mut requests = self.requests.lock().await;
        let id = requests.len() as u64 + 1;
        requests.push(RequestLogEntry {
            id,
            timestamp: Utc::now(),
            kind: kind.to_string(),
            request: request.to_string(),
        });
        Ok(())
    }

    async fn recent(&self, limit: usize) -> Result<Vec<RequestLogEntry>> {
        let requests = self.requests.lock().await;
        Ok(requests.iter().rev().take(limit).cloned().collect())
    }
}
