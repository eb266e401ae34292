// In crates/simulator/src/lib.rs

pub mod arbitrage;
pub mod error;
pub mod portfolio;
pub mod quotes;
pub mod result_log;
pub mod types;

// Re-export public types
pub use arbitrage::ArbitrageSimulator;
pub use error::{Error, Result};
pub use portfolio::Portfolio;
pub use quotes::{ExchangeQuote, Opportunity, QuoteBook};
pub use result_log::ResultLog;
pub use types::{SimulatorConfig, TrackedAsset, to_decimal};
