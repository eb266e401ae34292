// In crates/quote-source/src/snapshot.rs

use crate::{Error, QuoteSource, Result};
use async_trait::async_trait;
use core_types::{Asset, ExchangeName, QuoteSnapshot};
use num_traits::FromPrimitive;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The wire shape of a snapshot: `{ "BTC": { "Binance": 50012.5, ... }, ... }`.
type RawSnapshot = BTreeMap<String, BTreeMap<String, f64>>;

/// Parses snapshot JSON, rejecting any non-positive or non-finite price.
pub fn parse_snapshot(text: &str) -> Result<QuoteSnapshot> {
    let raw: RawSnapshot = serde_json::from_str(text)?;

    let mut snapshot = QuoteSnapshot::new();
    for (asset, by_exchange) in raw {
        let mut prices = BTreeMap::new();
        for (exchange, price) in by_exchange {
            let value = Decimal::from_f64(price)
                .filter(|p| *p > Decimal::ZERO)
                .ok_or_else(|| Error::InvalidPrice {
                    asset: asset.clone(),
                    exchange: exchange.clone(),
                    price,
                })?;
            prices.insert(ExchangeName::new(exchange), value);
        }
        snapshot.insert(Asset::new(asset), prices);
    }
    Ok(snapshot)
}

/// Reads quotes from a static JSON snapshot file on every fetch.
#[derive(Debug, Clone)]
pub struct SnapshotQuoteSource {
    path: PathBuf,
}

impl SnapshotQuoteSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl QuoteSource for SnapshotQuoteSource {
    fn name(&self) -> &'static str {
        "snapshot"
    }

    async fn fetch(&self) -> Result<QuoteSnapshot> {
        let text = tokio::fs::read_to_string(&self.path).await?;
        let snapshot = parse_snapshot(&text)?;
        tracing::debug!(path = %self.path.display(), assets = snapshot.len(), "Loaded quote snapshot.");
        Ok(snapshot)
    }
}
