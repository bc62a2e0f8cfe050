//! Run configuration
//!
//! Loaded from `config.toml` under the user's config directory (or an
//! explicit `--config` path). A missing file means the built-in defaults,
//! which reproduce the production setup: eleven currencies, USDT, the
//! `BUY`/`SELL` tabs of the shared rates spreadsheet.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::error::RatesError;
use crate::pricing::{SourceKind, TradeSide};

const CONFIG_FILENAME: &str = "config.toml";

pub const DEFAULT_CURRENCIES: &[&str] = &[
    "ETB", "EGP", "MZN", "TZS", "NGN", "RWF", "ZAR", "ZMW", "GHS", "UGX", "KES",
];

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Stablecoin the fiat prices are quoted against
    pub asset: String,
    /// Fiat codes, in the order they are processed
    pub currencies: Vec<String>,
    /// Which price backend to use
    pub source: SourceKind,
    /// How many of the top listed offers feed the median
    pub sample_size: usize,
    pub spreadsheet: SpreadsheetConfig,
    pub tabs: TabsConfig,
    pub api: ApiConfig,
    pub browser: BrowserConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpreadsheetConfig {
    /// Spreadsheet title, looked up through Drive when `id` is not set
    pub title: String,
    pub id: Option<String>,
    /// Environment variable holding the service account JSON
    pub credentials_env: String,
    /// Service account key file, used when the variable is unset
    pub credentials_file: Option<PathBuf>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TabsConfig {
    pub buy: String,
    pub sell: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiConfig {
    pub endpoint: String,
    pub timeout_secs: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BrowserConfig {
    /// Trade pages live under `<base_url>/trade/<side>/<asset>`
    pub base_url: String,
    /// CSS selector matching one advertised price per offer
    pub price_selector: String,
    /// How long to wait for offers to render
    pub wait_secs: u64,
    pub sandbox: bool,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            asset: "USDT".to_string(),
            currencies: DEFAULT_CURRENCIES.iter().map(|c| c.to_string()).collect(),
            source: SourceKind::Api,
            sample_size: 5,
            spreadsheet: SpreadsheetConfig::default(),
            tabs: TabsConfig::default(),
            api: ApiConfig::default(),
            browser: BrowserConfig::default(),
        }
    }
}

impl Default for SpreadsheetConfig {
    fn default() -> Self {
        Self {
            title: "Copy of Currency Manipulation Feb 19".to_string(),
            id: None,
            credentials_env: "GOOGLE_CREDENTIALS".to_string(),
            credentials_file: None,
        }
    }
}

impl Default for TabsConfig {
    fn default() -> Self {
        Self {
            buy: "BUY".to_string(),
            sell: "SELL".to_string(),
        }
    }
}

impl Default for ApiConfig {
    fn default() -> Self {
        Self {
            endpoint: "https://p2p.binance.com/bapi/c2c/v2/friendly/c2c/adv/search".to_string(),
            timeout_secs: 30,
        }
    }
}

impl Default for BrowserConfig {
    fn default() -> Self {
        Self {
            base_url: "https://p2p.binance.com/en".to_string(),
            price_selector: "div.css-onyc9z".to_string(),
            wait_secs: 20,
            sandbox: false,
        }
    }
}

impl TabsConfig {
    /// Tabs in processing order, paired with the side they hold
    pub fn ordered(&self) -> [(&str, TradeSide); 2] {
        [
            (self.buy.as_str(), TradeSide::Buy),
            (self.sell.as_str(), TradeSide::Sell),
        ]
    }
}

/// Default location of the config file
pub fn default_config_path() -> Option<PathBuf> {
    std::env::var_os("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .or_else(dir_spec::config_home)
        .map(|dir| dir.join("p2p-rates").join(CONFIG_FILENAME))
}

impl Config {
    /// Load configuration.
    ///
    /// An explicit path must exist; the default path falls back to built-in
    /// defaults when absent.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let path = match path {
            Some(p) => p.to_path_buf(),
            None => match default_config_path() {
                Some(p) if p.exists() => p,
                _ => {
                    debug!("No config file found, using defaults");
                    return Ok(Self::default());
                }
            },
        };

        info!("Loading config from {}", path.display());
        let content = std::fs::read_to_string(&path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_toml(&content)
            .with_context(|| format!("Invalid config file {}", path.display()))?;
        Ok(config)
    }

    pub fn from_toml(content: &str) -> Result<Self, RatesError> {
        let config: Config =
            toml::from_str(content).map_err(|e| RatesError::Config(e.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), RatesError> {
        if self.currencies.is_empty() {
            return Err(RatesError::Config("currencies must not be empty".to_string()));
        }
        let mut seen = HashSet::new();
        for code in &self.currencies {
            if code.trim().is_empty() {
                return Err(RatesError::Config("blank currency code".to_string()));
            }
            if !seen.insert(code) {
                return Err(RatesError::Config(format!("duplicate currency {}", code)));
            }
        }
        if self.sample_size == 0 {
            return Err(RatesError::Config("sample_size must be at least 1".to_string()));
        }
        if self.tabs.buy.trim().is_empty() || self.tabs.sell.trim().is_empty() {
            return Err(RatesError::Config("tab names must not be empty".to_string()));
        }
        if self.tabs.buy == self.tabs.sell {
            return Err(RatesError::Config(
                "buy and sell tabs must be different".to_string(),
            ));
        }
        Ok(())
    }
}
