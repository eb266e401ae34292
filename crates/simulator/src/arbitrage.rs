// In crates/simulator/src/arbitrage.rs

use crate::portfolio::{CASH_DP, Portfolio};
use crate::quotes::{ExchangeQuote, Opportunity, QuoteBook};
use crate::result_log::ResultLog;
use crate::types::{SimulatorConfig, TrackedAsset};
use crate::{Error, Result};
use core_types::{Asset, ExchangeName, QuoteSnapshot, SimulationResult};
use rand::SeedableRng;
use rand::Rng;
use rand::rngs::StdRng;
use rust_decimal::Decimal;

/// The in-process arbitrage simulator.
///
/// Owns the exchange quotes, one virtual portfolio and the bounded result log.
/// Every operation takes `&mut self` and either applies all of its effects or
/// none of them.
pub struct ArbitrageSimulator<R = StdRng> {
    config: SimulatorConfig,
    quotes: QuoteBook,
    portfolio: Portfolio,
    results: ResultLog,
    rng: R,
}

impl ArbitrageSimulator<StdRng> {
    /// Creates a simulator whose random source is seeded from the OS.
    pub fn with_entropy(config: SimulatorConfig) -> Result<Self> {
        Self::new(config, StdRng::from_entropy())
    }

    /// Creates a reproducible simulator.
    pub fn seeded(config: SimulatorConfig, seed: u64) -> Result<Self> {
        Self::new(config, StdRng::seed_from_u64(seed))
    }
}

impl<R: Rng> ArbitrageSimulator<R> {
    pub fn new(mut config: SimulatorConfig, rng: R) -> Result<Self> {
        config.validate()?;
        for exchange in &mut config.exchanges {
            exchange.volatility = exchange.volatility.clamp(config.min_volatility, config.max_volatility);
        }

        let quotes = Self::seed_book(&config);
        let portfolio = Portfolio::new(config.initial_balance);
        let results = ResultLog::new(config.result_log_capacity);
        tracing::info!(
            exchanges = config.exchanges.len(),
            assets = config.assets.len(),
            balance = %portfolio.cash,
            "Arbitrage simulator initialized."
        );

        Ok(Self {
            config,
            quotes,
            portfolio,
            results,
            rng,
        })
    }

    fn seed_book(config: &SimulatorConfig) -> QuoteBook {
        let precision = config.assets.iter().map(|a| (a.asset.clone(), a.precision)).collect();
        QuoteBook::new(config.exchanges.clone(), precision)
    }

    // --- Read accessors for the presentation layer ---

    pub fn quotes(&self) -> &[ExchangeQuote] {
        self.quotes.exchanges()
    }

    pub fn portfolio(&self) -> &Portfolio {
        &self.portfolio
    }

    pub fn results(&self) -> &ResultLog {
        &self.results
    }

    pub fn assets(&self) -> &[TrackedAsset] {
        &self.config.assets
    }

    /// Returns the current price of `asset` on `exchange`.
    pub fn quote(&self, exchange: &ExchangeName, asset: &Asset) -> Result<Decimal> {
        self.quotes.price(exchange, asset)
    }

    /// How many units of `asset` `investment` buys on `exchange` right now.
    pub fn crypto_amount(&self, exchange: &ExchangeName, asset: &Asset, investment: Decimal) -> Result<Decimal> {
        ensure_investment(investment)?;
        Ok(investment / self.quote(exchange, asset)?)
    }

    // --- Operations ---

    /// Perturbs every quote by a uniform draw in `[-volatility, +volatility]`.
    pub fn tick(&mut self) {
        self.quotes.tick(&mut self.rng);
        tracing::debug!("Quotes ticked.");
    }

    /// Finds the most profitable exchange pair for `asset` above `threshold_percent`.
    /// Has no side effects.
    pub fn find_best_opportunity(&self, asset: &Asset, threshold_percent: Decimal) -> Result<Option<Opportunity>> {
        self.ensure_tracked(asset)?;
        Ok(self.quotes.best_opportunity(asset, threshold_percent))
    }

    /// Ticks the quotes, then buys and sells `asset` across the best exchange pair.
    ///
    /// Only the net result of the round trip touches the cash balance; holdings
    /// are unchanged.
    pub fn execute_arbitrage(
        &mut self,
        investment: Decimal,
        asset: &Asset,
        threshold_percent: Decimal,
    ) -> Result<SimulationResult> {
        ensure_investment(investment)?;
        self.ensure_tracked(asset)?;

        self.tick();

        let opportunity = self.quotes.best_opportunity(asset, threshold_percent).ok_or_else(|| {
            Error::NoOpportunityFound {
                asset: asset.clone(),
                threshold_percent,
            }
        })?;
        self.portfolio.ensure_cash(investment)?;

        let amount = investment / opportunity.buy_price;
        let result = SimulationResult::arbitrage(
            asset.clone(),
            opportunity.buy_exchange,
            opportunity.sell_exchange,
            opportunity.buy_price,
            opportunity.sell_price,
            amount,
            opportunity.profit_percentage,
        );
        self.portfolio.adjust_cash(result.profit);

        tracing::info!(
            asset = %asset,
            buy = ?result.buy_exchange,
            sell = ?result.sell_exchange,
            profit = %result.profit.round_dp(2),
            pct = %result.profit_percentage.round_dp(2),
            "Arbitrage executed."
        );
        self.results.push(result.clone());
        Ok(result)
    }

    /// Spends `investment` USD on `asset` at `exchange`'s current quote.
    pub fn buy(&mut self, exchange: &ExchangeName, asset: &Asset, investment: Decimal) -> Result<SimulationResult> {
        ensure_investment(investment)?;
        let price = self.quote(exchange, asset)?;
        self.portfolio.ensure_cash(investment)?;

        let amount = investment / price;
        self.portfolio.adjust_cash(-investment);
        self.portfolio.add_holding(asset, amount, investment);

        let result = SimulationResult::buy_only(asset.clone(), exchange.clone(), price, amount);
        tracing::info!(asset = %asset, exchange = %exchange, %amount, %price, "Bought into holdings.");
        self.results.push(result.clone());
        Ok(result)
    }

    /// Sells `quantity` held units of `asset` at `exchange`'s current quote.
    ///
    /// Profit is measured against the average cost of the units sold.
    pub fn sell(&mut self, exchange: &ExchangeName, asset: &Asset, quantity: Decimal) -> Result<SimulationResult> {
        ensure_positive(quantity)?;
        let price = self.quote(exchange, asset)?;
        self.settle_sell(exchange, asset, price, quantity, None)
    }

    /// Sells the quantity `investment` USD would buy at the current quote.
    ///
    /// Profit is reported as revenue minus `investment`. Prefer [`Self::sell`]; this
    /// form keeps the dashboard's "sell by USD amount" button semantics.
    pub fn sell_notional(
        &mut self,
        exchange: &ExchangeName,
        asset: &Asset,
        investment: Decimal,
    ) -> Result<SimulationResult> {
        ensure_investment(investment)?;
        let price = self.quote(exchange, asset)?;
        let quantity = investment / price;
        self.settle_sell(exchange, asset, price, quantity, Some(investment))
    }

    fn settle_sell(
        &mut self,
        exchange: &ExchangeName,
        asset: &Asset,
        price: Decimal,
        quantity: Decimal,
        reference_cost: Option<Decimal>,
    ) -> Result<SimulationResult> {
        let released_cost = self.portfolio.remove_holding(asset, quantity)?;
        let revenue = price * quantity;
        self.portfolio.adjust_cash(revenue);

        let result = SimulationResult::sell_only(
            asset.clone(),
            exchange.clone(),
            price,
            quantity,
            reference_cost.unwrap_or(released_cost),
        );
        tracing::info!(asset = %asset, exchange = %exchange, %quantity, %price, profit = %result.profit.round_dp(2), "Sold from holdings.");
        self.results.push(result.clone());
        Ok(result)
    }

    /// Sets an exchange's volatility, clamped into the configured bounds.
    /// Returns the value actually applied.
    pub fn update_volatility(&mut self, exchange: &ExchangeName, volatility: f64) -> Result<f64> {
        if !volatility.is_finite() {
            return Err(Error::InvalidVolatility(volatility));
        }
        let applied = volatility.clamp(self.config.min_volatility, self.config.max_volatility);
        let quote = self
            .quotes
            .get_mut(exchange)
            .ok_or_else(|| Error::UnknownExchange(exchange.clone()))?;
        quote.volatility = applied;
        if applied != volatility {
            tracing::warn!(exchange = %exchange, requested = volatility, applied, "Volatility clamped.");
        }
        Ok(applied)
    }

    /// Replaces quotes with a fresh snapshot. Nothing is written if any price is invalid.
    pub fn apply_quotes(&mut self, snapshot: &QuoteSnapshot) -> Result<usize> {
        let applied = self.quotes.apply_snapshot(snapshot)?;
        tracing::debug!(applied, "Quotes replaced from snapshot.");
        Ok(applied)
    }

    /// Returns to the seed quotes, the starting balance and an empty log.
    pub fn reset(&mut self) {
        self.quotes = Self::seed_book(&self.config);
        self.portfolio = Portfolio::new(self.config.initial_balance);
        self.results.clear();
        tracing::info!("Simulator reset.");
    }

    fn ensure_tracked(&self, asset: &Asset) -> Result<()> {
        if self.config.assets.iter().any(|a| &a.asset == asset) {
            Ok(())
        } else {
            Err(Error::UnknownAsset(asset.clone()))
        }
    }
}

fn ensure_positive(amount: Decimal) -> Result<()> {
    if amount <= Decimal::ZERO {
        return Err(Error::InvalidAmount(amount));
    }
    Ok(())
}

/// USD amounts must be positive whole cents, so a debit always equals the investment.
fn ensure_investment(amount: Decimal) -> Result<()> {
    ensure_positive(amount)?;
    if amount.round_dp(CASH_DP) != amount {
        return Err(Error::InvalidAmount(amount));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use core_types::TradeKind;
    use rust_decimal_macros::dec;

    fn btc() -> Asset {
        Asset::from("BTC")
    }

    fn name(s: &str) -> ExchangeName {
        ExchangeName::from(s)
    }

    /// Two exchanges quoting BTC at the given prices, with zero volatility unless set.
    fn config(balance: Decimal, a: Decimal, b: Decimal) -> SimulatorConfig {
        SimulatorConfig {
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
                ExchangeQuote::new(name("A"), 0.0).with_price(btc(), a),
                ExchangeQuote::new(name("B"), 0.0).with_price(btc(), b),
            ],
        }
    }

    fn simulator(balance: Decimal, a: Decimal, b: Decimal) -> ArbitrageSimulator {
        ArbitrageSimulator::seeded(config(balance, a, b), 11).unwrap()
    }

    #[test]
    fn finds_buy_low_sell_high_pair() {
        let sim = simulator(dec!(10000), dec!(100), dec!(102));
        let best = sim.find_best_opportunity(&btc(), dec!(0)).unwrap().unwrap();
        assert_eq!(best.buy_exchange, name("A"));
        assert_eq!(best.sell_exchange, name("B"));
        assert_eq!(best.profit_percentage, dec!(2));
    }

    #[test]
    fn find_is_idempotent_without_a_tick() {
        let mut sim = ArbitrageSimulator::seeded(config(dec!(10000), dec!(50000), dec!(50100)), 3).unwrap();
        sim.update_volatility(&name("A"), 0.03).unwrap();
        sim.tick();
        let first = sim.find_best_opportunity(&btc(), dec!(0)).unwrap();
        let second = sim.find_best_opportunity(&btc(), dec!(0)).unwrap();
        assert_eq!(first, second);
    }

    #[test]
    fn unknown_asset_is_rejected() {
        let sim = simulator(dec!(10000), dec!(100), dec!(102));
        assert_eq!(
            sim.find_best_opportunity(&Asset::from("DOGE"), dec!(0)),
            Err(Error::UnknownAsset(Asset::from("DOGE")))
        );
    }

    #[test]
    fn arbitrage_credits_the_spread() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(102));
        let result = sim.execute_arbitrage(dec!(1000), &btc(), dec!(0)).unwrap();
        assert_eq!(result.kind, TradeKind::Arbitrage);
        assert_eq!(result.amount, dec!(10));
        assert_eq!(result.profit, dec!(20));
        assert_eq!(result.profit, (result.sell_price - result.buy_price) * result.amount);
        assert_eq!(sim.portfolio().cash, dec!(10020));
        assert!(sim.portfolio().holdings.is_empty());
        assert_eq!(sim.results().len(), 1);
    }

    #[test]
    fn arbitrage_below_threshold_changes_nothing() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(102));
        let before = sim.portfolio().clone();
        let err = sim.execute_arbitrage(dec!(1000), &btc(), dec!(5)).unwrap_err();
        assert_eq!(
            err,
            Error::NoOpportunityFound {
                asset: btc(),
                threshold_percent: dec!(5)
            }
        );
        assert_eq!(sim.portfolio(), &before);
        assert!(sim.results().is_empty());
    }

    #[test]
    fn arbitrage_with_insufficient_balance_changes_nothing() {
        let mut sim = simulator(dec!(500), dec!(100), dec!(102));
        let err = sim.execute_arbitrage(dec!(1000), &btc(), dec!(0)).unwrap_err();
        assert!(matches!(err, Error::InsufficientBalance { .. }));
        assert_eq!(sim.portfolio().cash, dec!(500));
        assert!(sim.results().is_empty());
    }

    #[test]
    fn buy_with_insufficient_balance_keeps_balance() {
        let mut sim = simulator(dec!(50), dec!(100), dec!(102));
        let err = sim.buy(&name("A"), &btc(), dec!(100)).unwrap_err();
        assert_eq!(
            err,
            Error::InsufficientBalance {
                required: dec!(100),
                available: dec!(50)
            }
        );
        assert_eq!(sim.portfolio().cash, dec!(50));
        assert!(sim.portfolio().holdings.is_empty());
    }

    #[test]
    fn buy_then_sell_same_quantity_restores_cash() {
        let mut sim = simulator(dec!(10000), dec!(2500), dec!(2500));
        let bought = sim.buy(&name("A"), &btc(), dec!(1000)).unwrap();
        assert_eq!(sim.portfolio().cash, dec!(9000));
        assert_eq!(sim.portfolio().holding(&btc()), bought.amount);
        assert_eq!(bought.sell_exchange, None);

        let sold = sim.sell(&name("A"), &btc(), bought.amount).unwrap();
        assert_eq!(sim.portfolio().cash, dec!(10000));
        assert_eq!(sim.portfolio().holding(&btc()), Decimal::ZERO);
        assert_eq!(sold.kind, TradeKind::Sell);
        assert!(sold.profit.abs() < dec!(0.000001));
    }

    #[test]
    fn sub_cent_investments_are_rejected() {
        let mut sim = simulator(dec!(100), dec!(1), dec!(1));
        assert_eq!(sim.buy(&name("A"), &btc(), dec!(0.004)), Err(Error::InvalidAmount(dec!(0.004))));
        assert_eq!(
            sim.execute_arbitrage(dec!(10.005), &btc(), dec!(0)),
            Err(Error::InvalidAmount(dec!(10.005)))
        );
        assert_eq!(sim.portfolio().cash, dec!(100));
        assert!(sim.portfolio().holdings.is_empty());
    }

    #[test]
    fn repeated_small_round_trips_never_create_cash() {
        let mut sim = simulator(dec!(100), dec!(3), dec!(3));
        for _ in 0..1000 {
            let _ = sim.buy(&name("A"), &btc(), dec!(0.004));
            sim.buy(&name("A"), &btc(), dec!(0.01)).unwrap();
        }
        let held = sim.portfolio().holding(&btc());
        assert_eq!(sim.portfolio().cash, dec!(90));

        sim.sell(&name("B"), &btc(), held).unwrap();
        assert!(sim.portfolio().cash <= dec!(100));
        assert!(sim.portfolio().holdings.is_empty());
    }

    #[test]
    fn sell_reports_profit_against_average_cost() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(110));
        sim.buy(&name("A"), &btc(), dec!(1000)).unwrap();
        let sold = sim.sell(&name("B"), &btc(), dec!(5)).unwrap();
        assert_eq!(sold.profit, dec!(50));
        assert_eq!(sold.profit_percentage, dec!(10));
        assert_eq!(sim.portfolio().cash, dec!(9550));
        assert_eq!(sim.portfolio().holding(&btc()), dec!(5));
    }

    #[test]
    fn selling_more_than_held_fails() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(102));
        sim.buy(&name("A"), &btc(), dec!(100)).unwrap();
        let err = sim.sell(&name("A"), &btc(), dec!(2)).unwrap_err();
        assert!(matches!(err, Error::InsufficientHoldings { .. }));
        assert_eq!(sim.portfolio().holding(&btc()), dec!(1));
        assert_eq!(sim.portfolio().cash, dec!(9900));
    }

    #[test]
    fn sell_notional_derives_quantity_from_usd() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(100));
        sim.buy(&name("A"), &btc(), dec!(1000)).unwrap();
        let sold = sim.sell_notional(&name("B"), &btc(), dec!(400)).unwrap();
        assert_eq!(sold.amount, dec!(4));
        assert_eq!(sold.profit, Decimal::ZERO);
        assert_eq!(sim.portfolio().holding(&btc()), dec!(6));

        let err = sim.sell_notional(&name("B"), &btc(), dec!(700)).unwrap_err();
        assert!(matches!(err, Error::InsufficientHoldings { .. }));
    }

    #[test]
    fn non_positive_amounts_are_rejected() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(102));
        assert_eq!(sim.buy(&name("A"), &btc(), dec!(0)), Err(Error::InvalidAmount(dec!(0))));
        assert_eq!(sim.sell(&name("A"), &btc(), dec!(-1)), Err(Error::InvalidAmount(dec!(-1))));
        assert!(sim.execute_arbitrage(dec!(0), &btc(), dec!(0)).is_err());
    }

    #[test]
    fn unknown_exchange_is_rejected() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(102));
        assert_eq!(sim.buy(&name("Z"), &btc(), dec!(1)), Err(Error::UnknownExchange(name("Z"))));
        assert_eq!(sim.update_volatility(&name("Z"), 0.01), Err(Error::UnknownExchange(name("Z"))));
    }

    #[test]
    fn volatility_is_clamped_into_bounds() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(102));
        assert_eq!(sim.update_volatility(&name("A"), 0.2).unwrap(), 0.05);
        assert_eq!(sim.update_volatility(&name("A"), -1.0).unwrap(), 0.0);
        assert_eq!(sim.update_volatility(&name("B"), 0.01).unwrap(), 0.01);
        assert_eq!(sim.quotes()[1].volatility, 0.01);
        assert!(matches!(sim.update_volatility(&name("A"), f64::NAN), Err(Error::InvalidVolatility(v)) if v.is_nan()));
    }

    #[test]
    fn result_log_keeps_the_five_newest() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(102));
        for _ in 0..7 {
            sim.buy(&name("A"), &btc(), dec!(10)).unwrap();
        }
        assert_eq!(sim.results().len(), 5);
        assert_eq!(sim.portfolio().cash, dec!(9930));
    }

    #[test]
    fn cash_never_goes_negative_over_random_sessions() {
        let mut sim = ArbitrageSimulator::seeded(config(dec!(2500), dec!(50000), dec!(50100)), 99).unwrap();
        sim.update_volatility(&name("A"), 0.03).unwrap();
        sim.update_volatility(&name("B"), 0.03).unwrap();
        for i in 0..200 {
            let _ = sim.execute_arbitrage(dec!(1000), &btc(), dec!(0.1));
            if i % 3 == 0 {
                let _ = sim.buy(&name("A"), &btc(), dec!(700));
            } else {
                let _ = sim.sell(&name("B"), &btc(), dec!(0.01));
            }
            assert!(sim.portfolio().cash >= Decimal::ZERO);
            assert!(sim.portfolio().holding(&btc()) >= Decimal::ZERO);
        }
    }

    #[test]
    fn reset_restores_the_seed_session() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(102));
        sim.update_volatility(&name("A"), 0.04).unwrap();
        sim.buy(&name("A"), &btc(), dec!(500)).unwrap();
        sim.tick();
        sim.reset();
        assert_eq!(sim.portfolio(), &Portfolio::new(dec!(10000)));
        assert!(sim.results().is_empty());
        assert_eq!(sim.quote(&name("A"), &btc()).unwrap(), dec!(100));
        assert_eq!(sim.quotes()[0].volatility, 0.0);
    }

    #[test]
    fn apply_quotes_rejects_invalid_snapshot_atomically() {
        let mut sim = simulator(dec!(10000), dec!(100), dec!(102));
        let snapshot = QuoteSnapshot::from([(
            btc(),
            [(name("A"), dec!(101)), (name("B"), dec!(0))].into_iter().collect(),
        )]);
        assert!(sim.apply_quotes(&snapshot).is_err());
        assert_eq!(sim.quote(&name("A"), &btc()).unwrap(), dec!(100));
    }

    #[test]
    fn crypto_amount_previews_the_purchase() {
        let sim = simulator(dec!(10000), dec!(50000), dec!(102));
        assert_eq!(sim.crypto_amount(&name("A"), &btc(), dec!(1000)).unwrap(), dec!(0.02));
    }
}
