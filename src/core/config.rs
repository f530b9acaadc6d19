use crate::core::rates::RateParsing;
use crate::providers::currencyfreaks::UPSTREAM_BASE;
use anyhow::{Context, Result, bail};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use std::{fs, path::PathBuf};
use tracing::debug;

pub const MEMORY_DATA_PATH: &str = ":memory:";

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_port")]
    pub port: u16,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: default_port(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct ProviderConfig {
    #[serde(default = "default_latest_url")]
    pub latest_url: String,
    #[serde(default = "default_historical_url")]
    pub historical_url: String,
    /// Never written back out, so it cannot leak through the status endpoint.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    #[serde(default = "default_retries")]
    pub retries: usize,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
    #[serde(default)]
    pub rate_parsing: RateParsing,
}

impl Default for ProviderConfig {
    fn default() -> Self {
        Self {
            latest_url: default_latest_url(),
            historical_url: default_historical_url(),
            api_key: None,
            retries: default_retries(),
            timeout_secs: default_timeout_secs(),
            rate_parsing: RateParsing::default(),
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub provider: ProviderConfig,
    #[serde(default = "default_currencies")]
    pub currencies: Vec<String>,
    #[serde(default = "default_base")]
    pub base: String,
    /// Seconds between background refreshes of the latest rates. 0 disables.
    #[serde(default = "default_interval")]
    pub update_interval_secs: u64,
    pub data_path: Option<String>,
    #[serde(default)]
    pub debug: bool,
    #[serde(default)]
    pub seed_placeholder_rates: bool,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            provider: ProviderConfig::default(),
            currencies: default_currencies(),
            base: default_base(),
            update_interval_secs: default_interval(),
            data_path: None,
            debug: false,
            seed_placeholder_rates: false,
        }
    }
}

/// Values given on the command line or through the environment. Anything set
/// here wins over the config file.
#[derive(Debug, Clone, Default)]
pub struct ConfigOverrides {
    pub port: Option<u16>,
    pub data_path: Option<String>,
    pub api_key: Option<String>,
    pub currencies: Option<String>,
    pub interval: Option<u64>,
    pub debug: bool,
}

fn default_port() -> u16 {
    8080
}

fn default_latest_url() -> String {
    "https://api.currencyfreaks.com/v2.0/rates/latest".to_string()
}

fn default_historical_url() -> String {
    "https://api.currencyfreaks.com/v2.0/rates/historical".to_string()
}

fn default_retries() -> usize {
    2
}

fn default_timeout_secs() -> u64 {
    10
}

fn default_currencies() -> Vec<String> {
    parse_currency_list("UAH,USD,EUR,RON")
}

fn default_base() -> String {
    "USD".to_string()
}

fn default_interval() -> u64 {
    3600
}

/// Splits a comma-separated list of currency codes, trimming and uppercasing
/// each one and dropping blanks and duplicates.
pub fn parse_currency_list(raw: &str) -> Vec<String> {
    let mut codes: Vec<String> = Vec::new();
    for code in raw.split(',').map(|c| c.trim().to_uppercase()) {
        if !code.is_empty() && !codes.contains(&code) {
            codes.push(code);
        }
    }
    codes
}

impl AppConfig {
    /// Loads the config at `path`, or the default location when it exists, or
    /// falls back to built-in defaults.
    pub fn load(path: Option<&str>) -> Result<Self> {
        if let Some(path) = path {
            return Self::load_from_path(path);
        }

        let default_path = Self::default_config_path()?;
        if default_path.exists() {
            debug!("Loading default config");
            Self::load_from_path(&default_path)
        } else {
            debug!("No config file found, using defaults");
            Ok(Self::default())
        }
    }

    pub fn default_config_path() -> Result<PathBuf> {
        let proj_dirs = ProjectDirs::from("io", "ratekeeper", "ratekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.config_dir().join("config.yaml"))
    }

    pub fn default_data_path(&self) -> Result<PathBuf> {
        if let Some(custom_path) = &self.data_path {
            return Ok(PathBuf::from(custom_path));
        }
        let proj_dirs = ProjectDirs::from("io", "ratekeeper", "ratekeeper")
            .context("Could not determine project directories")?;
        Ok(proj_dirs.data_dir().to_path_buf())
    }

    pub fn is_in_memory(&self) -> bool {
        self.data_path.as_deref() == Some(MEMORY_DATA_PATH)
    }

    pub fn load_from_path<P: AsRef<std::path::Path>>(path: P) -> Result<Self> {
        let config_str = fs::read_to_string(path.as_ref())
            .with_context(|| format!("Failed to read config file: {}", path.as_ref().display()))?;

        let mut config: Self = serde_yaml::from_str(&config_str)
            .with_context(|| format!("Failed to parse config file: {}", path.as_ref().display()))?;
        config.currencies = parse_currency_list(&config.currencies.join(","));
        config.base = config.base.trim().to_uppercase();
        debug!("Successfully loaded config");
        Ok(config)
    }

    pub fn apply_overrides(&mut self, overrides: &ConfigOverrides) {
        if let Some(port) = overrides.port {
            self.server.port = port;
        }
        if let Some(path) = &overrides.data_path {
            self.data_path = Some(path.clone());
        }
        if let Some(key) = &overrides.api_key {
            self.provider.api_key = Some(key.clone());
        }
        if let Some(currencies) = &overrides.currencies {
            self.currencies = parse_currency_list(currencies);
        }
        if let Some(interval) = overrides.interval {
            self.update_interval_secs = interval;
        }
        self.debug |= overrides.debug;
    }

    /// Checks what is needed before talking to the upstream provider.
    pub fn validate(&self) -> Result<()> {
        if self
            .provider
            .api_key
            .as_deref()
            .is_none_or(|k| k.trim().is_empty())
        {
            bail!("Missing upstream API key, set --apikey or APIKEY");
        }
        if self.currencies.is_empty() {
            bail!("No currencies configured");
        }
        if let Some(bad) = self
            .currencies
            .iter()
            .chain(std::iter::once(&self.base))
            .find(|c| c.len() != 3 || !c.chars().all(|ch| ch.is_ascii_uppercase()))
        {
            bail!("Invalid currency code: {bad}");
        }
        if self.base != UPSTREAM_BASE {
            bail!(
                "Unsupported base currency {}, upstream rates are quoted in {UPSTREAM_BASE}",
                self.base
            );
        }
        Ok(())
    }
}
