//! Persistence abstractions for rates and the request audit log

use crate::core::rates::RateSnapshot;
use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Display;

/// Durable cache of rate snapshots keyed by (date, base).
///
/// Implementations are bound to a single base currency at construction.
#[async_trait]
pub trait RateStore: Send + Sync {
    /// Returns `None` when nothing is stored for `date`.
    async fn read(&self, date: NaiveDate) -> Result<Option<RateSnapshot>>;

    /// Upserts one row per currency of `snapshot`. Rows for currencies not in
    /// the snapshot are left untouched.
    async fn write(&self, snapshot: &RateSnapshot) -> Result<()>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestLogEntry {
    pub id: u64,
    pub timestamp: DateTime<Utc>,
    pub kind: String,
    pub request: String,
}

impl Display for RequestLogEntry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "{} {} {}",
            self.timestamp.format("%Y-%m-%d %H:%M:%S"),
            self.kind,
            self.request
        )
    }
}

#[async_trait]
pub trait RequestLog: Send + Sync {
    async fn record(&self, kind: &str, request: &str) -> Result<()>;

    /// Newest entries first.
    async fn recent(&self, limit: usize) -> Result<Vec<RequestLogEntry>>;
}
