pub mod disk;
pub mod memory;

use crate::core::config::AppConfig;
use crate::core::store::{RateStore, RequestLog};
use anyhow::Result;
use disk::DiskRateStore;
use memory::MemoryRateStore;
use std::sync::Arc;
use tracing::{error, info};

/// The rate store and request log opened for a config, sharing one backend.
#[derive(Clone)]
pub struct Storage {
    pub rates: Arc<dyn RateStore>,
    pub requests: Arc<dyn RequestLog>,
    disk: Option<Arc<DiskRateStore>>,
}

impl Storage {
    pub async fn open(config: &AppConfig) -> Result<Self> {
        if config.is_in_memory() {
            info!("Using in-memory rate store");
            return Ok(Self::in_memory(&config.base));
        }

        let path = config.default_data_path()?;
        info!(path = %path.display(), "Opening rate store");
        let store = Arc::new(DiskRateStore::open(&path, &config.base)?);
        if config.seed_placeholder_rates {
            store.seed_if_empty().await?;
        }

        Ok(Self {
            rates: Arc::clone(&store) as Arc<dyn RateStore>,
            requests: Arc::clone(&store) as Arc<dyn RequestLog>,
            disk: Some(store),
        })
    }

    pub fn in_memory(base: &str) -> Self {
        let store = Arc::new(MemoryRateStore::new(base));
        Self {
            rates: Arc::clone(&store) as Arc<dyn RateStore>,
            requests: store,
            disk: None,
        }
    }

    /// Flushes the durable backend, if any.
    pub fn close(&self) {
        if let Some(disk) = &self.disk {
            if let Err(e) = disk.persist() {
                error!(error = %e, "Failed to flush rate store on shutdown");
            } else {
                info!("Rate store flushed");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::config::MEMORY_DATA_PATH;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_open_in_memory() {
        let config = AppConfig {
            data_path: Some(MEMORY_DATA_PATH.to_string()),
            ..AppConfig::default()
        };
        let storage = Storage::open(&config).await.unwrap();
        assert!(storage.disk.is_none());
        storage.requests.record("rates", "date: ").await.unwrap();
        assert_eq!(storage.requests.recent(10).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_open_on_disk_with_seed() {
        let dir = TempDir::new().unwrap();
        let config = AppConfig {
            data_path: Some(dir.path().to_string_lossy().to_string()),
            seed_placeholder_rates: true,
            ..AppConfig::default()
        };
        let storage = Storage::open(&config).await.unwrap();
        assert!(storage.disk.is_some());

        let date = chrono::NaiveDate::from_ymd_opt(2024, 4, 21).unwrap();
        let seeded = storage.rates.read(date).await.unwrap().unwrap();
        assert_eq!(seeded.rate("EUR"), Some(0.9));
        storage.close();
    }
}
