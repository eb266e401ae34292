// In crates/simulator/src/portfolio.rs

use crate::{Error, Result};
use core_types::Asset;
use rust_decimal::{Decimal, RoundingStrategy};
use serde::Serialize;
use std::collections::HashMap;

/// Cash is kept in cents.
pub(crate) const CASH_DP: u32 = 2;

/// Represents the state of the simulated trading portfolio.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Portfolio {
    /// The cash balance of the portfolio in USD. Never negative.
    pub cash: Decimal,

    /// The balance the session started with.
    pub starting_cash: Decimal,

    /// Held quantity per asset. Assets sold down to zero are removed.
    pub holdings: HashMap<Asset, Decimal>,

    /// Cumulative USD paid for the current holdings of each asset.
    cost_basis: HashMap<Asset, Decimal>,
}

impl Portfolio {
    /// Creates a new portfolio with an initial cash balance and no holdings.
    pub fn new(initial_cash: Decimal) -> Self {
        Self {
            cash: initial_cash.round_dp(CASH_DP),
            starting_cash: initial_cash.round_dp(CASH_DP),
            holdings: HashMap::new(),
            cost_basis: HashMap::new(),
        }
    }

    pub fn holding(&self, asset: &Asset) -> Decimal {
        self.holdings.get(asset).copied().unwrap_or(Decimal::ZERO)
    }

    /// The average USD paid per unit of `asset`, if any is held.
    pub fn average_cost(&self, asset: &Asset) -> Option<Decimal> {
        let held = self.holding(asset);
        if held.is_zero() {
            return None;
        }
        self.cost_basis.get(asset).map(|cost| cost / held)
    }

    /// Fails without touching the balance when `amount` exceeds the cash on hand.
    pub fn ensure_cash(&self, amount: Decimal) -> Result<()> {
        if amount > self.cash {
            return Err(Error::InsufficientBalance {
                required: amount,
                available: self.cash,
            });
        }
        Ok(())
    }

    /// Applies a signed change to the cash balance.
    ///
    /// Sub-cent remainders always round against the portfolio: credits round down
    /// and debits round up.
    pub(crate) fn adjust_cash(&mut self, delta: Decimal) {
        self.cash += delta.round_dp_with_strategy(CASH_DP, RoundingStrategy::ToNegativeInfinity);
    }

    /// Records a purchase of `quantity` units of `asset` that cost `cost` USD.
    pub(crate) fn add_holding(&mut self, asset: &Asset, quantity: Decimal, cost: Decimal) {
        *self.holdings.entry(asset.clone()).or_insert(Decimal::ZERO) += quantity;
        *self.cost_basis.entry(asset.clone()).or_insert(Decimal::ZERO) += cost;
    }

    /// Removes `quantity` units of `asset` and returns the share of cost basis they carried.
    pub(crate) fn remove_holding(&mut self, asset: &Asset, quantity: Decimal) -> Result<Decimal> {
        let held = self.holding(asset);
        if quantity > held {
            return Err(Error::InsufficientHoldings {
                asset: asset.clone(),
                requested: quantity,
                held,
            });
        }

        let total_cost = self.cost_basis.get(asset).copied().unwrap_or(Decimal::ZERO);
        let remaining = held - quantity;
        if remaining.is_zero() {
            self.holdings.remove(asset);
            self.cost_basis.remove(asset);
            return Ok(total_cost);
        }

        let released = total_cost * quantity / held;
        self.holdings.insert(asset.clone(), remaining);
        self.cost_basis.insert(asset.clone(), total_cost - released);
        Ok(released)
    }
}
