pub mod cli;
pub mod core;
pub mod providers;
pub mod refresh;
pub mod server;
pub mod store;

use crate::core::RateResolver;
use crate::core::config::{AppConfig, ConfigOverrides};
use anyhow::Result;
use providers::CurrencyFreaksProvider;
use server::AppState;
use std::sync::Arc;
use std::time::Duration;
use store::Storage;
use tokio::sync::watch;
use tracing::{debug, info};

pub enum AppCommand {
    Serve,
    Rates { date: Option<String> },
    Pair { pair: String },
}

/// Loads the config, applies `overrides` and validates the result.
pub fn load_config(config_path: Option<&str>, overrides: &ConfigOverrides) -> Result<AppConfig> {
    let mut config = AppConfig::load(config_path)?;
    config.apply_overrides(overrides);
    config.validate()?;
    debug!("Loaded config: {config:#?}");
    Ok(config)
}

pub async fn run_command(
    command: AppCommand,
    config_path: Option<&str>,
    overrides: &ConfigOverrides,
) -> Result<()> {
    let config = load_config(config_path, overrides)?;

    let storage = Storage::open(&config).await?;
    let provider = Arc::new(CurrencyFreaksProvider::new(&config.provider)?);
    let resolver = Arc::new(RateResolver::new(
        Arc::clone(&storage.rates),
        provider,
        config.currencies.clone(),
    ));

    let result = match command {
        AppCommand::Serve => serve(config, Arc::clone(&resolver), &storage).await,
        AppCommand::Rates { date } => cli::rates::run_rates(&resolver, date.as_deref()).await,
        AppCommand::Pair { pair } => cli::rates::run_pair(&resolver, &pair).await,
    };

    storage.close();
    result
}

async fn serve(config: AppConfig, resolver: Arc<RateResolver>, storage: &Storage) -> Result<()> {
    info!(
        port = config.server.port,
        currencies = %config.currencies.join(","),
        "Rate service starting"
    );

    let (shutdown_tx, shutdown_rx) = watch::channel(false);
    let refresher = (config.update_interval_secs > 0).then(|| {
        refresh::spawn_refresher(
            Arc::clone(&resolver),
            Duration::from_secs(config.update_interval_secs),
            shutdown_rx,
        )
    });

    let state = Arc::new(AppState {
        config,
        resolver,
        requests: Arc::clone(&storage.requests),
    });
    let result = server::serve(state, server::shutdown_signal()).await;

    let _ = shutdown_tx.send(true);
    if let Some(handle) = refresher {
        if let Err(e) = handle.await {
            tracing::error!(error = %e, "Rate refresher task failed");
        }
    }
    result
}
