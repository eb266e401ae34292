// --- Presentation-layer event structures ---

use chrono::{DateTime, Utc};
use core_types::{Asset, ExchangeName, SimulationResult};
use rust_decimal::Decimal;
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};

/// Represents a log message event to be sent to the UI.
#[derive(Debug, Clone, Serialize)]
pub struct LogEvent {
    pub timestamp: DateTime<Utc>,
    pub level: String,
    pub message: String,
}

/// One exchange's prices after a tick or refresh.
#[derive(Debug, Clone, Serialize)]
pub struct QuoteView {
    pub exchange: ExchangeName,
    pub prices: BTreeMap<Asset, Decimal>,
    pub volatility: f64,
}

/// Represents the full, updated state of the portfolio.
#[derive(Debug, Clone, Serialize)]
pub struct PortfolioUpdate {
    pub cash: Decimal,
    pub holdings: HashMap<Asset, Decimal>,
}

/// A recoverable failure the UI should surface to the user.
#[derive(Debug, Clone, Serialize)]
pub struct Alert {
    pub timestamp: DateTime<Utc>,
    pub message: String,
}

impl Alert {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            message: message.into(),
        }
    }
}

/// The top-level event enum.
/// `tag` and `content` are used by serde for clean JSON representation.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", content = "payload")]
pub enum SimEvent {
    Log(LogEvent),
    QuotesUpdated(Vec<QuoteView>),
    PortfolioUpdate(PortfolioUpdate),
    TradeExecuted(SimulationResult),
    Alert(Alert),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn events_serialize_with_type_and_payload() {
        let event = SimEvent::Alert(Alert::new("No opportunity"));
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["type"], "Alert");
        assert_eq!(json["payload"]["message"], "No opportunity");
    }

    #[test]
    fn portfolio_update_keys_holdings_by_symbol() {
        let event = SimEvent::PortfolioUpdate(PortfolioUpdate {
            cash: Decimal::new(1050, 1),
            holdings: HashMap::from([(Asset::from("ETH"), Decimal::ONE)]),
        });
        let json = serde_json::to_value(&event).unwrap();
        assert_eq!(json["payload"]["cash"], "105.0");
        assert_eq!(json["payload"]["holdings"]["ETH"], "1");
    }
}
