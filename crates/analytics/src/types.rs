// In crates/analytics/src/types.rs

use chrono::{DateTime, Utc};
use core_types::{SimulationResult, TradeKind};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// A struct to hold a point in the session's cash curve.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquityPoint {
    pub timestamp: DateTime<Utc>,
    pub value: Decimal,
}

/// Running counters over every action executed in a session.
///
/// Unlike the bounded result log, the tally sees every trade.
#[derive(Debug, Clone, Default, Serialize)]
pub struct TradeTally {
    pub total_trades: u32,
    pub profitable_trades: u32,
    pub arbitrage_trades: u32,
    pub total_profit: Decimal,
    pub best_profit: Option<Decimal>,
    pub cash_curve: Vec<EquityPoint>,
}

impl TradeTally {
    pub fn new() -> Self {
        Self::default()
    }

    /// Records an executed action together with the cash balance it left behind.
    pub fn record(&mut self, result: &SimulationResult, cash_after: Decimal) {
        self.total_trades += 1;
        if result.is_profitable() {
            self.profitable_trades += 1;
        }
        if result.kind == TradeKind::Arbitrage {
            self.arbitrage_trades += 1;
        }
        self.total_profit += result.profit;
        self.best_profit = Some(self.best_profit.map_or(result.profit, |best| best.max(result.profit)));
        self.cash_curve.push(EquityPoint {
            timestamp: result.timestamp,
            value: cash_after,
        });
    }
}

/// A summary of the simulated session, shaped like the dashboard's stats card.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct SessionStats {
    pub total_trades: u32,
    pub profitable_trades: u32,
    pub arbitrage_trades: u32,
    pub win_rate: f64,
    pub total_profit: Decimal,
    pub start_balance: Decimal,
    pub current_balance: Decimal,
    /// Holdings marked at the mean quote across exchanges.
    pub holdings_value: Decimal,
    /// `current_balance + holdings_value`.
    pub equity: Decimal,
    pub net_pnl_percentage: f64,
    pub max_drawdown_absolute: Decimal,
    pub max_drawdown_percentage: f64,
}
