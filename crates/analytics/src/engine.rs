use crate::types::{SessionStats, TradeTally};
use core_types::Asset;
use rust_decimal::Decimal;
use rust_decimal::prelude::*;
use rust_decimal_macros::dec;
use simulator::{ExchangeQuote, Portfolio};

/// The engine responsible for calculating session metrics.
#[derive(Default)]
pub struct AnalyticsEngine;

impl AnalyticsEngine {
    pub fn new() -> Self {
        Self::default()
    }

    /// Calculates the session summary from the running tally, the portfolio and current quotes.
    pub fn session_stats(&self, tally: &TradeTally, portfolio: &Portfolio, quotes: &[ExchangeQuote]) -> SessionStats {
        let mut stats = SessionStats {
            total_trades: tally.total_trades,
            profitable_trades: tally.profitable_trades,
            arbitrage_trades: tally.arbitrage_trades,
            total_profit: tally.total_profit,
            start_balance: portfolio.starting_cash,
            current_balance: portfolio.cash,
            ..SessionStats::default()
        };

        // 1. Win Rate
        if tally.total_trades > 0 {
            stats.win_rate = (tally.profitable_trades as f64 / tally.total_trades as f64) * 100.0;
        }

        // 2. Mark holdings to the mean quote
        stats.holdings_value = portfolio
            .holdings
            .iter()
            .filter_map(|(asset, quantity)| mean_price(asset, quotes).map(|price| price * *quantity))
            .sum::<Decimal>()
            .round_dp(2);
        stats.equity = stats.current_balance + stats.holdings_value;

        // 3. Net P&L Percentage
        if portfolio.starting_cash > dec!(0) {
            stats.net_pnl_percentage = ((stats.equity - portfolio.starting_cash) / portfolio.starting_cash)
                .to_f64()
                .unwrap_or(0.0)
                * 100.0;
        }

        // 4. Max Drawdown over the cash curve
        let mut peak = portfolio.starting_cash;
        let mut max_drawdown = dec!(0);
        let mut peak_at_max = peak;
        for point in &tally.cash_curve {
            peak = peak.max(point.value);
            let drawdown = peak - point.value;
            if drawdown > max_drawdown {
                max_drawdown = drawdown;
                peak_at_max = peak;
            }
        }
        stats.max_drawdown_absolute = max_drawdown;
        if peak_at_max > dec!(0) {
            stats.max_drawdown_percentage = (max_drawdown / peak_at_max).to_f64().unwrap_or(0.0) * 100.0;
        }

        stats
    }
}

fn mean_price(asset: &Asset, quotes: &[ExchangeQuote]) -> Option<Decimal> {
    let prices: Vec<Decimal> = quotes.iter().filter_map(|q| q.price(asset)).collect();
    if prices.is_empty() {
        return None;
    }
    Some(prices.iter().copied().sum::<Decimal>() / Decimal::from(prices.len()))
}
