// In crates/app-config/src/types.rs

use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::{Error, Result};

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct Settings {
    /// The application's general settings.
    pub app: AppSettings,
    /// Portfolio and trading parameters for the simulator.
    pub simulator: SimulatorSettings,
    /// The assets every exchange quotes, in display order.
    pub assets: Vec<AssetSettings>,
    /// The simulated exchanges with their seed prices, in scan order.
    pub exchanges: Vec<ExchangeSettings>,
    #[serde(default)]
    pub quote_source: QuoteSourceSettings,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AppSettings {
    /// The environment the application is running in (e.g., "development", "production").
    pub environment: String,
    /// The log level for the application.
    pub log_level: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SimulatorSettings {
    /// Starting cash balance in USD.
    pub initial_balance: f64,
    #[serde(default = "default_log_capacity")]
    pub result_log_capacity: usize,
    #[serde(default = "default_min_volatility")]
    pub min_volatility: f64,
    #[serde(default = "default_max_volatility")]
    pub max_volatility: f64,
    /// Minimum profit percentage an opportunity must exceed (e.g., 0.5 for 0.5%).
    #[serde(default = "default_threshold")]
    pub threshold_percent: f64,
    /// Default USD amount committed per simulated trade.
    #[serde(default = "default_investment")]
    pub investment_amount: f64,
    pub default_asset: String,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct AssetSettings {
    pub symbol: String,
    pub name: String,
    /// Reference price used by the random quote source.
    pub base_price: f64,
    /// Decimal places quotes are rounded to after a tick.
    #[serde(default = "default_precision")]
    pub precision: u32,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct ExchangeSettings {
    pub name: String,
    /// Per-tick perturbation magnitude (e.g., 0.02 for +/-2%).
    pub volatility: f64,
    /// Seed price per asset symbol.
    pub prices: Vec<SeedPrice>,
}

impl ExchangeSettings {
    pub fn seed_price(&self, symbol: &str) -> Option<f64> {
        self.prices.iter().find(|p| p.asset == symbol).map(|p| p.price)
    }
}

// Kept as a list rather than a table so asset symbols never pass through key normalization.
#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct SeedPrice {
    pub asset: String,
    pub price: f64,
}

#[derive(Deserialize, Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum QuoteSourceKind {
    Random,
    Snapshot,
    Http,
}

#[derive(Deserialize, Serialize, Debug, Clone)]
pub struct QuoteSourceSettings {
    #[serde(default = "default_source_kind")]
    pub kind: QuoteSourceKind,
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_secs: u64,
    /// Total relative width of the random source's price band (0.02 means +/-1%).
    #[serde(default = "default_spread")]
    pub spread: f64,
    /// JSON snapshot file, required for `snapshot`.
    pub path: Option<String>,
    /// Endpoint serving the snapshot shape, required for `http`.
    pub url: Option<String>,
    #[serde(default = "default_timeout")]
    pub timeout_secs: u64,
}

impl Default for QuoteSourceSettings {
    fn default() -> Self {
        Self {
            kind: default_source_kind(),
            refresh_interval_secs: default_refresh_interval(),
            spread: default_spread(),
            path: None,
            url: None,
            timeout_secs: default_timeout(),
        }
    }
}

impl Settings {
    /// Checks the invariants the simulator relies on.
    pub fn validate(&self) -> Result<()> {
        let sim = &self.simulator;
        if !sim.initial_balance.is_finite() || sim.initial_balance < 0.0 {
            return Err(Error::Invalid("simulator.initial_balance must be a non-negative number".into()));
        }
        if sim.result_log_capacity == 0 {
            return Err(Error::Invalid("simulator.result_log_capacity must be at least 1".into()));
        }
        if !(sim.min_volatility >= 0.0 && sim.min_volatility <= sim.max_volatility && sim.max_volatility < 1.0) {
            return Err(Error::Invalid(format!(
                "volatility bounds must satisfy 0 <= min <= max < 1 (got {} and {})",
                sim.min_volatility, sim.max_volatility
            )));
        }
        if !sim.investment_amount.is_finite() || sim.investment_amount <= 0.0 {
            return Err(Error::Invalid("simulator.investment_amount must be positive".into()));
        }

        if self.assets.is_empty() {
            return Err(Error::Invalid("at least one asset must be configured".into()));
        }
        let mut symbols = HashSet::new();
        for asset in &self.assets {
            if !symbols.insert(asset.symbol.as_str()) {
                return Err(Error::Invalid(format!("duplicate asset '{}'", asset.symbol)));
            }
            if !(asset.base_price.is_finite() && asset.base_price > 0.0) {
                return Err(Error::Invalid(format!("asset '{}' needs a positive base_price", asset.symbol)));
            }
        }
        if !symbols.contains(sim.default_asset.as_str()) {
            return Err(Error::Invalid(format!("default_asset '{}' is not a configured asset", sim.default_asset)));
        }

        if self.exchanges.len() < 2 {
            return Err(Error::Invalid("at least two exchanges are needed for arbitrage".into()));
        }
        let mut names = HashSet::new();
        for exchange in &self.exchanges {
            if !names.insert(exchange.name.as_str()) {
                return Err(Error::Invalid(format!("duplicate exchange '{}'", exchange.name)));
            }
            if !(exchange.volatility >= 0.0 && exchange.volatility < 1.0) {
                return Err(Error::Invalid(format!(
                    "exchange '{}' volatility {} is outside [0, 1)",
                    exchange.name, exchange.volatility
                )));
            }
            for asset in &self.assets {
                match exchange.seed_price(&asset.symbol) {
                    Some(price) if price.is_finite() && price > 0.0 => {}
                    Some(price) => {
                        return Err(Error::Invalid(format!(
                            "exchange '{}' has non-positive seed price {} for {}",
                            exchange.name, price, asset.symbol
                        )));
                    }
                    None => {
                        return Err(Error::Invalid(format!(
                            "exchange '{}' is missing a seed price for {}",
                            exchange.name, asset.symbol
                        )));
                    }
                }
            }
        }

        let source = &self.quote_source;
        if source.refresh_interval_secs == 0 {
            return Err(Error::Invalid("quote_source.refresh_interval_secs must be at least 1".into()));
        }
        match source.kind {
            QuoteSourceKind::Random if !(source.spread >= 0.0 && source.spread < 1.0) => {
                Err(Error::Invalid("quote_source.spread must be in [0, 1)".into()))
            }
            QuoteSourceKind::Snapshot if source.path.is_none() => {
                Err(Error::Invalid("quote_source.path is required for the snapshot source".into()))
            }
            QuoteSourceKind::Http if source.url.is_none() => {
                Err(Error::Invalid("quote_source.url is required for the http source".into()))
            }
            _ => Ok(()),
        }
    }

    /// Renders the resolved settings back to TOML.
    pub fn to_toml_string(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }
}

/// Helper functions for serde defaults
fn default_log_capacity() -> usize { 5 }
fn default_min_volatility() -> f64 { 0.001 }
fn default_max_volatility() -> f64 { 0.05 }
fn default_threshold() -> f64 { 0.5 }
fn default_investment() -> f64 { 1000.0 }
fn default_precision() -> u32 { 2 }
fn default_source_kind() -> QuoteSourceKind { QuoteSourceKind::Random }
fn default_refresh_interval() -> u64 { 30 }
fn default_spread() -> f64 { 0.02 }
fn default_timeout() -> u64 { 5 }
