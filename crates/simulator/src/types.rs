// In crates/simulator/src/types.rs

use crate::quotes::ExchangeQuote;
use crate::{Error, Result};
use app_config::Settings;
use core_types::{Asset, ExchangeName};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use serde::Serialize;

/// An asset the simulator quotes and trades.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrackedAsset {
    pub asset: Asset,
    pub name: String,
    /// Decimal places ticked prices are rounded to.
    pub precision: u32,
}

/// Everything needed to (re)build a simulator session.
#[derive(Debug, Clone)]
pub struct SimulatorConfig {
    pub initial_balance: Decimal,
    pub result_log_capacity: usize,
    pub min_volatility: f64,
    pub max_volatility: f64,
    pub assets: Vec<TrackedAsset>,
    /// Seed quotes, in scan order.
    pub exchanges: Vec<ExchangeQuote>,
}

impl SimulatorConfig {
    /// Converts validated application settings into a simulator configuration.
    pub fn from_settings(settings: &Settings) -> Result<Self> {
        let initial_balance = to_decimal(settings.simulator.initial_balance, "simulator.initial_balance")?;

        let assets = settings
            .assets
            .iter()
            .map(|a| TrackedAsset {
                asset: Asset::new(a.symbol.clone()),
                name: a.name.clone(),
                precision: a.precision,
            })
            .collect::<Vec<_>>();

        let mut exchanges = Vec::with_capacity(settings.exchanges.len());
        for exchange in &settings.exchanges {
            let mut quote = ExchangeQuote::new(ExchangeName::new(exchange.name.clone()), exchange.volatility);
            for asset in &assets {
                let seed = exchange.seed_price(asset.asset.as_str()).ok_or_else(|| {
                    Error::InvalidParameters(format!("{} has no seed price for {}", exchange.name, asset.asset))
                })?;
                let price = to_decimal(seed, "seed price")?.round_dp(asset.precision);
                quote = quote.with_price(asset.asset.clone(), price);
            }
            exchanges.push(quote);
        }

        Ok(Self {
            initial_balance,
            result_log_capacity: settings.simulator.result_log_capacity,
            min_volatility: settings.simulator.min_volatility,
            max_volatility: settings.simulator.max_volatility,
            assets,
            exchanges,
        })
    }

    pub(crate) fn validate(&self) -> Result<()> {
        if self.initial_balance < Decimal::ZERO {
            return Err(Error::InvalidParameters("initial balance cannot be negative".into()));
        }
        if self.result_log_capacity == 0 {
            return Err(Error::InvalidParameters("result log capacity must be at least 1".into()));
        }
        if !(0.0 <= self.min_volatility && self.min_volatility <= self.max_volatility && self.max_volatility < 1.0) {
            return Err(Error::InvalidParameters(format!(
                "volatility bounds [{}, {}] are not within [0, 1)",
                self.min_volatility, self.max_volatility
            )));
        }
        for exchange in &self.exchanges {
            for (asset, price) in &exchange.prices_by_asset {
                if *price <= Decimal::ZERO {
                    return Err(Error::InvalidPrice {
                        exchange: exchange.name.clone(),
                        asset: asset.clone(),
                        price: *price,
                    });
                }
            }
        }
        Ok(())
    }
}

/// Converts a configuration float into a `Decimal`.
pub fn to_decimal(value: f64, what: &str) -> Result<Decimal> {
    Decimal::from_f64(value).ok_or_else(|| Error::InvalidParameters(format!("{} is not representable: {}", what, value)))
}
