// In crates/quote-source/src/lib.rs

use app_config::{QuoteSourceKind, Settings};
use async_trait::async_trait;
use core_types::{Asset, ExchangeName, QuoteSnapshot};
use rand::SeedableRng;
use rand::rngs::StdRng;
use std::time::Duration;

pub mod error;
pub mod http;
pub mod random;
pub mod snapshot;

// Re-export public types
pub use error::{Error, Result};
pub use http::HttpQuoteSource;
pub use random::{RandomQuoteSource, SourceAsset};
pub use snapshot::{SnapshotQuoteSource, parse_snapshot};

/// The external collaborator that supplies fresh exchange prices.
///
/// A source returns, for each asset it knows, a mapping from exchange name to a
/// positive price. Implementations never touch simulator state; the caller
/// decides whether and when to apply a snapshot.
#[async_trait]
pub trait QuoteSource: Send + Sync {
    /// A short name for logs (e.g., "random", "snapshot").
    fn name(&self) -> &'static str;

    /// Fetches a complete quote snapshot.
    async fn fetch(&self) -> Result<QuoteSnapshot>;
}

/// Builds the quote source selected in `settings`.
///
/// `seed` only affects the random source.
pub fn from_settings(settings: &Settings, seed: Option<u64>) -> Result<Box<dyn QuoteSource>> {
    let source = &settings.quote_source;
    match source.kind {
        QuoteSourceKind::Random => {
            let assets = settings
                .assets
                .iter()
                .map(|a| SourceAsset {
                    asset: Asset::new(a.symbol.clone()),
                    base_price: a.base_price,
                    precision: a.precision,
                })
                .collect();
            let exchanges = settings
                .exchanges
                .iter()
                .map(|e| ExchangeName::new(e.name.clone()))
                .collect();
            let rng = match seed {
                Some(seed) => StdRng::seed_from_u64(seed),
                None => StdRng::from_entropy(),
            };
            Ok(Box::new(RandomQuoteSource::new(assets, exchanges, source.spread, rng)))
        }
        QuoteSourceKind::Snapshot => {
            let path = source
                .path
                .clone()
                .ok_or_else(|| Error::Misconfigured("snapshot source needs a path".into()))?;
            Ok(Box::new(SnapshotQuoteSource::new(path)))
        }
        QuoteSourceKind::Http => {
            let url = source
                .url
                .clone()
                .ok_or_else(|| Error::Misconfigured("http source needs a url".into()))?;
            Ok(Box::new(HttpQuoteSource::new(url, Duration::from_secs(source.timeout_secs))?))
        }
    }
}
