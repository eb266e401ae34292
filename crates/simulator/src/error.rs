// In crates/simulator/src/error.rs

use core_types::{Asset, ExchangeName};
use rust_decimal::Decimal;
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum Error {
    #[error("Insufficient balance: {required} required, {available} available")]
    InsufficientBalance { required: Decimal, available: Decimal },

    #[error("Insufficient {asset} holdings: {requested} requested, {held} held")]
    InsufficientHoldings { asset: Asset, requested: Decimal, held: Decimal },

    #[error("No arbitrage opportunity for {asset} above {threshold_percent}%")]
    NoOpportunityFound { asset: Asset, threshold_percent: Decimal },

    #[error("Unknown exchange: {0}")]
    UnknownExchange(ExchangeName),

    #[error("Unknown asset: {0}")]
    UnknownAsset(Asset),

    #[error("Amount must be positive, got {0}")]
    InvalidAmount(Decimal),

    #[error("Volatility must be a finite number, got {0}")]
    InvalidVolatility(f64),

    #[error("Invalid price {price} for {asset} on {exchange}")]
    InvalidPrice { exchange: ExchangeName, asset: Asset, price: Decimal },

    #[error("Invalid simulator parameters: {0}")]
    InvalidParameters(String),
}

pub type Result<T> = std::result::Result<T, Error>;
