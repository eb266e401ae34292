// In crates/engine/src/lib.rs

pub mod error;
pub mod refresher;

use analytics::{AnalyticsEngine, SessionStats, TradeTally};
use core_types::{Asset, ExchangeName, SimulationResult};
use events::{Alert, PortfolioUpdate, QuoteView, SimEvent};
use quote_source::QuoteSource;
use rust_decimal::Decimal;
use serde::Serialize;
use simulator::{ArbitrageSimulator, ExchangeQuote, Portfolio};
use std::sync::Arc;
use tokio::sync::{Mutex, broadcast};

pub use error::{Error, Result};
pub use refresher::{QuoteRefresher, RefreshHandle};

/// Capacity of the event broadcast channel.
pub const EVENT_CHANNEL_SIZE: usize = 1024;

/// Everything a session mutates, guarded by one lock.
struct SessionState {
    simulator: ArbitrageSimulator,
    tally: TradeTally,
}

/// A point-in-time copy of the simulator state for the presentation layer.
#[derive(Debug, Clone, Serialize)]
pub struct DashboardSnapshot {
    pub quotes: Vec<ExchangeQuote>,
    pub portfolio: Portfolio,
    pub results: Vec<SimulationResult>,
    pub stats: SessionStats,
}

/// A clonable handle to one simulator session.
///
/// Trades, volatility changes, resets and quote refreshes all run under the same
/// `tokio::sync::Mutex`, so a balance check and the update it guards can never
/// interleave with another operation.
#[derive(Clone)]
pub struct SimulatorService {
    state: Arc<Mutex<SessionState>>,
    events_tx: broadcast::Sender<SimEvent>,
}

impl SimulatorService {
    pub fn new(simulator: ArbitrageSimulator, events_tx: broadcast::Sender<SimEvent>) -> Self {
        Self {
            state: Arc::new(Mutex::new(SessionState {
                simulator,
                tally: TradeTally::new(),
            })),
            events_tx,
        }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SimEvent> {
        self.events_tx.subscribe()
    }

    /// Ticks quotes and executes the best arbitrage for `asset`, if one clears the threshold.
    pub async fn execute_arbitrage(
        &self,
        investment: Decimal,
        asset: &Asset,
        threshold_percent: Decimal,
    ) -> Result<SimulationResult> {
        let mut state = self.state.lock().await;
        let outcome = state.simulator.execute_arbitrage(investment, asset, threshold_percent);
        // Quotes moved even when no trade followed.
        self.publish(SimEvent::QuotesUpdated(quote_views(state.simulator.quotes())));
        match outcome {
            Ok(result) => {
                self.record_trade(&mut state, &result);
                Ok(result)
            }
            Err(e) => Err(self.alert(e)),
        }
    }

    pub async fn buy(&self, exchange: &ExchangeName, asset: &Asset, investment: Decimal) -> Result<SimulationResult> {
        let mut state = self.state.lock().await;
        let result = state.simulator.buy(exchange, asset, investment).map_err(|e| self.alert(e))?;
        self.record_trade(&mut state, &result);
        Ok(result)
    }

    pub async fn sell(&self, exchange: &ExchangeName, asset: &Asset, quantity: Decimal) -> Result<SimulationResult> {
        let mut state = self.state.lock().await;
        let result = state.simulator.sell(exchange, asset, quantity).map_err(|e| self.alert(e))?;
        self.record_trade(&mut state, &result);
        Ok(result)
    }

    pub async fn sell_notional(
        &self,
        exchange: &ExchangeName,
        asset: &Asset,
        investment: Decimal,
    ) -> Result<SimulationResult> {
        let mut state = self.state.lock().await;
        let result = state
            .simulator
            .sell_notional(exchange, asset, investment)
            .map_err(|e| self.alert(e))?;
        self.record_trade(&mut state, &result);
        Ok(result)
    }

    /// Returns the volatility actually applied after clamping.
    pub async fn update_volatility(&self, exchange: &ExchangeName, volatility: f64) -> Result<f64> {
        let mut state = self.state.lock().await;
        let applied = state
            .simulator
            .update_volatility(exchange, volatility)
            .map_err(|e| self.alert(e))?;
        self.publish(SimEvent::QuotesUpdated(quote_views(state.simulator.quotes())));
        Ok(applied)
    }

    /// Starts the session over from the seed quotes and starting balance.
    pub async fn reset(&self) {
        let mut state = self.state.lock().await;
        state.simulator.reset();
        state.tally = TradeTally::new();
        self.publish(SimEvent::QuotesUpdated(quote_views(state.simulator.quotes())));
        self.publish(SimEvent::PortfolioUpdate(portfolio_update(state.simulator.portfolio())));
    }

    /// Fetches a snapshot from `source` and applies it.
    ///
    /// The fetch runs without holding the session lock, so a slow source never
    /// blocks trading. The snapshot is applied only if the fetch succeeds and
    /// every price is valid.
    pub async fn refresh_quotes(&self, source: &dyn QuoteSource) -> Result<usize> {
        let snapshot = match source.fetch().await {
            Ok(snapshot) => snapshot,
            Err(e) => {
                tracing::warn!(source = source.name(), error = %e, "Quote refresh failed; keeping current quotes.");
                self.publish(SimEvent::Alert(Alert::new(format!("Failed to fetch updated prices: {}", e))));
                return Err(Error::QuoteSourceUnavailable(e));
            }
        };

        let mut state = self.state.lock().await;
        let applied = state.simulator.apply_quotes(&snapshot).map_err(|e| self.alert(e))?;
        tracing::info!(source = source.name(), applied, "Quotes refreshed.");
        self.publish(SimEvent::QuotesUpdated(quote_views(state.simulator.quotes())));
        Ok(applied)
    }

    pub async fn snapshot(&self) -> DashboardSnapshot {
        let state = self.state.lock().await;
        DashboardSnapshot {
            quotes: state.simulator.quotes().to_vec(),
            portfolio: state.simulator.portfolio().clone(),
            results: state.simulator.results().to_vec(),
            stats: Self::stats_for(&state),
        }
    }

    pub async fn stats(&self) -> SessionStats {
        let state = self.state.lock().await;
        Self::stats_for(&state)
    }

    /// Runs a read-only closure against the simulator.
    pub async fn read<T>(&self, f: impl FnOnce(&ArbitrageSimulator) -> T) -> T {
        let state = self.state.lock().await;
        f(&state.simulator)
    }

    fn stats_for(state: &SessionState) -> SessionStats {
        AnalyticsEngine::new().session_stats(&state.tally, state.simulator.portfolio(), state.simulator.quotes())
    }

    fn record_trade(&self, state: &mut SessionState, result: &SimulationResult) {
        let cash = state.simulator.portfolio().cash;
        state.tally.record(result, cash);
        self.publish(SimEvent::TradeExecuted(result.clone()));
        self.publish(SimEvent::PortfolioUpdate(portfolio_update(state.simulator.portfolio())));
    }

    fn alert(&self, error: simulator::Error) -> Error {
        tracing::warn!(error = %error, "Simulated operation rejected.");
        self.publish(SimEvent::Alert(Alert::new(error.to_string())));
        Error::Simulation(error)
    }

    fn publish(&self, event: SimEvent) {
        // No subscribers is fine.
        let _ = self.events_tx.send(event);
    }
}

fn quote_views(quotes: &[ExchangeQuote]) -> Vec<QuoteView> {
    quotes
        .iter()
        .map(|q| QuoteView {
            exchange: q.name.clone(),
            prices: q.prices_by_asset.clone(),
            volatility: q.volatility,
        })
        .collect()
}

fn portfolio_update(portfolio: &Portfolio) -> PortfolioUpdate {
    PortfolioUpdate {
        cash: portfolio.cash,
        holdings: portfolio.holdings.clone(),
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use async_trait::async_trait;
    use core_types::QuoteSnapshot;
    use rust_decimal_macros::dec;
    use simulator::{SimulatorConfig, TrackedAsset};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    pub(crate) fn btc() -> Asset {
        Asset::from("BTC")
    }

    pub(crate) fn service(balance: Decimal) -> SimulatorService {
        let config = SimulatorConfig {
            initial_balance: balance,
            result_log_capacity: 5,
            min_volatility: 0.0,
            max_volatility: 0.05,
            assets: vec![TrackedAsset {
                asset: btc(),
                name: "Bitcoin".into(),
                precision: 2,
            }],
            exchanges: vec![
                ExchangeQuote::new(ExchangeName::from("A"), 0.0).with_price(btc(), dec!(100)),
                ExchangeQuote::new(ExchangeName::from("B"), 0.0).with_price(btc(), dec!(102)),
            ],
        };
        let simulator = ArbitrageSimulator::seeded(config, 17).unwrap();
        let (tx, _) = broadcast::channel(EVENT_CHANNEL_SIZE);
        SimulatorService::new(simulator, tx)
    }

    /// Serves a fixed snapshot and counts fetches.
    pub(crate) struct FixedSource {
        pub snapshot: QuoteSnapshot,
        pub fetches: AtomicUsize,
        pub delay: Option<Duration>,
    }

    impl FixedSource {
        pub(crate) fn new(a: Decimal, b: Decimal) -> Self {
            Self {
                snapshot: QuoteSnapshot::from([(
                    btc(),
                    [(ExchangeName::from("A"), a), (ExchangeName::from("B"), b)].into_iter().collect(),
                )]),
                fetches: AtomicUsize::new(0),
                delay: None,
            }
        }
    }

    #[async_trait]
    impl QuoteSource for FixedSource {
        fn name(&self) -> &'static str {
            "fixed"
        }

        async fn fetch(&self) -> quote_source::Result<QuoteSnapshot> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }
            Ok(self.snapshot.clone())
        }
    }

    pub(crate) struct DownSource;

    #[async_trait]
    impl QuoteSource for DownSource {
        fn name(&self) -> &'static str {
            "down"
        }

        async fn fetch(&self) -> quote_source::Result<QuoteSnapshot> {
            Err(quote_source::Error::HttpStatus(503))
        }
    }

    #[tokio::test]
    async fn arbitrage_publishes_trade_and_portfolio_events() {
        let service = service(dec!(10000));
        let mut rx = service.subscribe();

        let result = service.execute_arbitrage(dec!(1000), &btc(), dec!(0)).await.unwrap();
        assert_eq!(result.profit, dec!(20));

        assert!(matches!(rx.recv().await.unwrap(), SimEvent::QuotesUpdated(_)));
        assert!(matches!(rx.recv().await.unwrap(), SimEvent::TradeExecuted(r) if r.profit == dec!(20)));
        assert!(matches!(rx.recv().await.unwrap(), SimEvent::PortfolioUpdate(p) if p.cash == dec!(10020)));

        let stats = service.stats().await;
        assert_eq!(stats.total_trades, 1);
        assert_eq!(stats.total_profit, dec!(20));
    }

    #[tokio::test]
    async fn rejected_trade_raises_an_alert_and_keeps_state() {
        let service = service(dec!(50));
        let mut rx = service.subscribe();

        let err = service.buy(&ExchangeName::from("A"), &btc(), dec!(100)).await.unwrap_err();
        assert!(matches!(err, Error::Simulation(simulator::Error::InsufficientBalance { .. })));
        assert!(matches!(rx.recv().await.unwrap(), SimEvent::Alert(a) if a.message.contains("Insufficient balance")));

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.portfolio.cash, dec!(50));
        assert!(snapshot.results.is_empty());
    }

    #[tokio::test]
    async fn no_opportunity_is_reported_without_touching_the_portfolio() {
        let service = service(dec!(10000));
        let err = service.execute_arbitrage(dec!(1000), &btc(), dec!(5)).await.unwrap_err();
        assert!(matches!(err, Error::Simulation(simulator::Error::NoOpportunityFound { .. })));
        assert_eq!(service.snapshot().await.portfolio.cash, dec!(10000));
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_buys_never_overdraw() {
        let service = service(dec!(1000));
        let mut handles = Vec::new();
        for _ in 0..20 {
            let service = service.clone();
            handles.push(tokio::spawn(async move {
                service.buy(&ExchangeName::from("A"), &btc(), dec!(100)).await
            }));
        }

        let mut filled = 0;
        for handle in handles {
            if handle.await.unwrap().is_ok() {
                filled += 1;
            }
        }
        assert_eq!(filled, 10);
        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.portfolio.cash, dec!(0));
        assert_eq!(snapshot.portfolio.holding(&btc()), dec!(10));
    }

    #[tokio::test]
    async fn refresh_applies_a_successful_fetch() {
        let service = service(dec!(10000));
        let source = FixedSource::new(dec!(99), dec!(103));
        assert_eq!(service.refresh_quotes(&source).await.unwrap(), 2);
        let price = service.read(|sim| sim.quote(&ExchangeName::from("B"), &btc())).await.unwrap();
        assert_eq!(price, dec!(103));
    }

    #[tokio::test]
    async fn failed_refresh_keeps_quotes_and_reports_unavailable() {
        let service = service(dec!(10000));
        let mut rx = service.subscribe();
        let before = service.snapshot().await.quotes;

        let err = service.refresh_quotes(&DownSource).await.unwrap_err();
        assert!(matches!(err, Error::QuoteSourceUnavailable(_)));
        assert_eq!(service.snapshot().await.quotes, before);
        assert!(matches!(rx.recv().await.unwrap(), SimEvent::Alert(_)));
    }

    #[tokio::test]
    async fn slow_refresh_does_not_block_trading() {
        let service = service(dec!(10000));
        let mut source = FixedSource::new(dec!(99), dec!(103));
        source.delay = Some(Duration::from_millis(300));
        let source = Arc::new(source);

        let refreshing = {
            let service = service.clone();
            let source = source.clone();
            tokio::spawn(async move { service.refresh_quotes(source.as_ref()).await })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;

        let bought = tokio::time::timeout(
            Duration::from_millis(150),
            service.buy(&ExchangeName::from("A"), &btc(), dec!(100)),
        )
        .await;
        assert!(matches!(bought, Ok(Ok(_))));

        refreshing.await.unwrap().unwrap();
        let price = service.read(|sim| sim.quote(&ExchangeName::from("A"), &btc())).await.unwrap();
        assert_eq!(price, dec!(99));
    }

    #[tokio::test]
    async fn reset_clears_trades_and_stats() {
        let service = service(dec!(10000));
        service.buy(&ExchangeName::from("A"), &btc(), dec!(500)).await.unwrap();
        service.update_volatility(&ExchangeName::from("A"), 0.03).await.unwrap();
        service.reset().await;

        let snapshot = service.snapshot().await;
        assert_eq!(snapshot.portfolio.cash, dec!(10000));
        assert!(snapshot.results.is_empty());
        assert_eq!(snapshot.stats.total_trades, 0);
        assert_eq!(snapshot.quotes[0].volatility, 0.0);
    }
}
