// In crates/simulator/src/quotes.rs

use crate::{Error, Result};
use core_types::{Asset, ExchangeName, QuoteSnapshot};
use num_traits::FromPrimitive;
use rand::Rng;
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::BTreeMap;

/// The current prices of one simulated exchange.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ExchangeQuote {
    pub name: ExchangeName,
    pub prices_by_asset: BTreeMap<Asset, Decimal>,
    /// Per-tick perturbation magnitude in `[0, 1)`.
    pub volatility: f64,
}

impl ExchangeQuote {
    pub fn new(name: ExchangeName, volatility: f64) -> Self {
        Self {
            name,
            prices_by_asset: BTreeMap::new(),
            volatility,
        }
    }

    pub fn with_price(mut self, asset: Asset, price: Decimal) -> Self {
        self.prices_by_asset.insert(asset, price);
        self
    }

    pub fn price(&self, asset: &Asset) -> Option<Decimal> {
        self.prices_by_asset.get(asset).copied()
    }
}

/// A buy/sell exchange pair whose spread clears a threshold.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Opportunity {
    pub asset: Asset,
    pub buy_exchange: ExchangeName,
    pub sell_exchange: ExchangeName,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    pub profit_percentage: Decimal,
}

/// The ordered set of exchange quotes owned by the simulator.
///
/// Exchange order is the scan order used for tie-breaking, and the per-exchange
/// `BTreeMap` fixes the order in which random draws are consumed.
#[derive(Debug, Clone, PartialEq)]
pub struct QuoteBook {
    exchanges: Vec<ExchangeQuote>,
    precision: BTreeMap<Asset, u32>,
}

impl QuoteBook {
    pub fn new(exchanges: Vec<ExchangeQuote>, precision: BTreeMap<Asset, u32>) -> Self {
        Self { exchanges, precision }
    }

    pub fn exchanges(&self) -> &[ExchangeQuote] {
        &self.exchanges
    }

    pub fn get(&self, name: &ExchangeName) -> Option<&ExchangeQuote> {
        self.exchanges.iter().find(|e| &e.name == name)
    }

    pub fn get_mut(&mut self, name: &ExchangeName) -> Option<&mut ExchangeQuote> {
        self.exchanges.iter_mut().find(|e| &e.name == name)
    }

    /// Returns the quoted price of `asset` on `exchange`.
    pub fn price(&self, exchange: &ExchangeName, asset: &Asset) -> Result<Decimal> {
        let quote = self
            .get(exchange)
            .ok_or_else(|| Error::UnknownExchange(exchange.clone()))?;
        quote.price(asset).ok_or_else(|| Error::UnknownAsset(asset.clone()))
    }

    /// Applies one uniform multiplicative perturbation in `[-volatility, +volatility]`
    /// to every price of every exchange.
    pub fn tick<R: Rng>(&mut self, rng: &mut R) {
        for exchange in &mut self.exchanges {
            let volatility = exchange.volatility;
            for (asset, price) in exchange.prices_by_asset.iter_mut() {
                let change: f64 = rng.gen_range(-volatility..=volatility);
                let Some(factor) = Decimal::from_f64(1.0 + change) else {
                    continue;
                };
                let dp = self.precision.get(asset).copied().unwrap_or(2);
                let next = (*price * factor).round_dp(dp);
                // Rounding can collapse a tiny price to zero; quotes stay positive.
                if next > Decimal::ZERO {
                    *price = next;
                }
            }
        }
    }

    /// Scans every ordered exchange pair and keeps the strictly most profitable one
    /// above `threshold_percent`. The first pair in scan order wins ties.
    pub fn best_opportunity(&self, asset: &Asset, threshold_percent: Decimal) -> Option<Opportunity> {
        let mut best: Option<Opportunity> = None;

        for (i, buy) in self.exchanges.iter().enumerate() {
            let Some(buy_price) = buy.price(asset) else { continue };
            if buy_price <= Decimal::ZERO {
                continue;
            }
            for (j, sell) in self.exchanges.iter().enumerate() {
                if i == j {
                    continue;
                }
                let Some(sell_price) = sell.price(asset) else { continue };

                let profit_percentage = (sell_price - buy_price) / buy_price * Decimal::ONE_HUNDRED;
                if profit_percentage <= threshold_percent {
                    continue;
                }
                if best.as_ref().is_some_and(|b| profit_percentage <= b.profit_percentage) {
                    continue;
                }
                best = Some(Opportunity {
                    asset: asset.clone(),
                    buy_exchange: buy.name.clone(),
                    sell_exchange: sell.name.clone(),
                    buy_price,
                    sell_price,
                    profit_percentage,
                });
            }
        }

        best
    }

    /// Overwrites prices from a snapshot. Every entry is validated before any write,
    /// so a bad snapshot leaves the book untouched. Returns the number of prices applied.
    pub fn apply_snapshot(&mut self, snapshot: &QuoteSnapshot) -> Result<usize> {
        let mut updates = Vec::new();
        for (asset, by_exchange) in snapshot {
            if !self.precision.contains_key(asset) {
                return Err(Error::UnknownAsset(asset.clone()));
            }
            for (exchange, price) in by_exchange {
                let Some(index) = self.exchanges.iter().position(|e| &e.name == exchange) else {
                    // Quotes for exchanges the simulator does not model are ignored.
                    continue;
                };
                if *price <= Decimal::ZERO {
                    return Err(Error::InvalidPrice {
                        exchange: exchange.clone(),
                        asset: asset.clone(),
                        price: *price,
                    });
                }
                updates.push((index, asset.clone(), *price));
            }
        }

        let applied = updates.len();
        for (index, asset, price) in updates {
            self.exchanges[index].prices_by_asset.insert(asset, price);
        }
        Ok(applied)
    }
}
