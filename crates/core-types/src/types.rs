// In crates/core-types/src/types.rs

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Prices keyed by asset, then by exchange, as delivered by a quote source.
pub type QuoteSnapshot = BTreeMap<Asset, BTreeMap<ExchangeName, Decimal>>;

/// An asset symbol such as "BTC" or "ETH".
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Asset(pub String);

impl Asset {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self(symbol.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Asset {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for Asset {
    fn from(symbol: &str) -> Self {
        Self(symbol.to_string())
    }
}

/// The name of a simulated exchange, unique within a quote book.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ExchangeName(pub String);

impl ExchangeName {
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ExchangeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for ExchangeName {
    fn from(name: &str) -> Self {
        Self(name.to_string())
    }
}

/// What kind of simulated action produced a `SimulationResult`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TradeKind {
    /// Both legs executed at once on two different exchanges.
    Arbitrage,
    /// A one-sided purchase into holdings.
    Buy,
    /// A one-sided sale out of holdings.
    Sell,
}

/// A record of one executed simulated action.
///
/// A missing leg has no exchange and a zero price. When both legs are present,
/// `profit == (sell_price - buy_price) * amount`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimulationResult {
    pub kind: TradeKind,
    pub asset: Asset,
    pub buy_exchange: Option<ExchangeName>,
    pub sell_exchange: Option<ExchangeName>,
    pub buy_price: Decimal,
    pub sell_price: Decimal,
    /// Asset quantity moved by the action.
    pub amount: Decimal,
    pub profit: Decimal,
    pub profit_percentage: Decimal,
    pub timestamp: DateTime<Utc>,
}

impl SimulationResult {
    /// Builds a two-legged arbitrage record. Profit is derived from the legs.
    pub fn arbitrage(
        asset: Asset,
        buy_exchange: ExchangeName,
        sell_exchange: ExchangeName,
        buy_price: Decimal,
        sell_price: Decimal,
        amount: Decimal,
        profit_percentage: Decimal,
    ) -> Self {
        Self {
            kind: TradeKind::Arbitrage,
            asset,
            buy_exchange: Some(buy_exchange),
            sell_exchange: Some(sell_exchange),
            buy_price,
            sell_price,
            amount,
            profit: (sell_price - buy_price) * amount,
            profit_percentage,
            timestamp: Utc::now(),
        }
    }

    /// Builds a buy-only record. A purchase realizes no profit.
    pub fn buy_only(asset: Asset, exchange: ExchangeName, price: Decimal, amount: Decimal) -> Self {
        Self {
            kind: TradeKind::Buy,
            asset,
            buy_exchange: Some(exchange),
            sell_exchange: None,
            buy_price: price,
            sell_price: Decimal::ZERO,
            amount,
            profit: Decimal::ZERO,
            profit_percentage: Decimal::ZERO,
            timestamp: Utc::now(),
        }
    }

    /// Builds a sell-only record, measuring profit against `reference_cost`.
    pub fn sell_only(
        asset: Asset,
        exchange: ExchangeName,
        price: Decimal,
        amount: Decimal,
        reference_cost: Decimal,
    ) -> Self {
        let revenue = price * amount;
        let profit = revenue - reference_cost;
        let profit_percentage = if reference_cost.is_zero() {
            Decimal::ZERO
        } else {
            profit / reference_cost * Decimal::ONE_HUNDRED
        };
        Self {
            kind: TradeKind::Sell,
            asset,
            buy_exchange: None,
            sell_exchange: Some(exchange),
            buy_price: Decimal::ZERO,
            sell_price: price,
            amount,
            profit,
            profit_percentage,
            timestamp: Utc::now(),
        }
    }

    pub fn is_profitable(&self) -> bool {
        self.profit > Decimal::ZERO
    }
}
