// In crates/quote-source/src/random.rs

use crate::{Error, QuoteSource, Result};
use async_trait::async_trait;
use core_types::{Asset, ExchangeName, QuoteSnapshot};
use num_traits::FromPrimitive;
use parking_lot::Mutex;
use rand::Rng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;
use std::collections::BTreeMap;
use std::time::Duration;

/// An asset the random source quotes around a reference price.
#[derive(Debug, Clone)]
pub struct SourceAsset {
    pub asset: Asset,
    pub base_price: f64,
    pub precision: u32,
}

/// Generates prices uniformly within `base_price * (1 +/- spread / 2)` on every fetch.
pub struct RandomQuoteSource {
    assets: Vec<SourceAsset>,
    exchanges: Vec<ExchangeName>,
    spread: f64,
    latency: Option<Duration>,
    rng: Mutex<StdRng>,
}

impl RandomQuoteSource {
    pub fn new(assets: Vec<SourceAsset>, exchanges: Vec<ExchangeName>, spread: f64, rng: StdRng) -> Self {
        Self {
            assets,
            exchanges,
            spread,
            latency: None,
            rng: Mutex::new(rng),
        }
    }

    /// Delays every fetch, mimicking a remote round trip.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    fn generate(&self) -> Result<QuoteSnapshot> {
        let half = self.spread / 2.0;
        let mut rng = self.rng.lock();
        let mut snapshot = QuoteSnapshot::new();

        for source_asset in &self.assets {
            let mut by_exchange = BTreeMap::new();
            for exchange in &self.exchanges {
                let change: f64 = rng.gen_range(-half..=half);
                let raw = source_asset.base_price * (1.0 + change);
                let price = Decimal::from_f64(raw)
                    .map(|p| p.round_dp(source_asset.precision))
                    .filter(|p| *p > Decimal::ZERO)
                    .ok_or_else(|| Error::InvalidPrice {
                        asset: source_asset.asset.to_string(),
                        exchange: exchange.to_string(),
                        price: raw,
                    })?;
                by_exchange.insert(exchange.clone(), price);
            }
            snapshot.insert(source_asset.asset.clone(), by_exchange);
        }

        Ok(snapshot)
    }
}

#[async_trait]
impl QuoteSource for RandomQuoteSource {
    fn name(&self) -> &'static str {
        "random"
    }

    async fn fetch(&self) -> Result<QuoteSnapshot> {
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        let snapshot = self.generate()?;
        tracing::debug!(assets = snapshot.len(), "Generated random quote snapshot.");
        Ok(snapshot)
    }
}
