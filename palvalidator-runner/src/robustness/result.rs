//! Per-permutation outcome and its ladder key.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

/// A (profit target, stop) ladder key.
///
/// Ordered and compared by stop only, so permutations form one ladder by
/// stop distance; two keys with the same stop collide whatever their targets.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct ProfitTargetStopPair {
    pub profit_target: Decimal,
    pub stop: Decimal,
}

impl ProfitTargetStopPair {
    pub fn new(profit_target: Decimal, stop: Decimal) -> Self {
        Self { profit_target, stop }
    }
}

impl PartialEq for ProfitTargetStopPair {
    fn eq(&self, other: &Self) -> bool {
        self.stop == other.stop
    }
}

impl Eq for ProfitTargetStopPair {}

impl PartialOrd for ProfitTargetStopPair {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for ProfitTargetStopPair {
    fn cmp(&self, other: &Self) -> Ordering {
        self.stop.cmp(&other.stop)
    }
}

/// Backtest summary for one permutation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RobustnessTestResult {
    /// PAL profitability of the permutation, in percent.
    pub win_rate: Decimal,
    /// Gross wins over gross losses; zero with no winners, 100 with no losers.
    pub profit_factor: Decimal,
    /// Closed positions in the backtest.
    pub num_trades: u64,
    /// Mean win over mean loss.
    pub payoff_ratio: Decimal,
    /// Median win over median loss. Used for tolerance checks when no Monte
    /// Carlo value is present.
    pub median_payoff_ratio: Decimal,
    /// Mean R-multiple per trade.
    pub r_multiple_expectancy: Decimal,
    /// Monte Carlo payoff ratio; zero means not computed.
    #[serde(default)]
    pub monte_carlo_payoff_ratio: Decimal,
}

impl RobustnessTestResult {
    pub fn new(
        win_rate: Decimal,
        profit_factor: Decimal,
        num_trades: u64,
        payoff_ratio: Decimal,
        median_payoff_ratio: Decimal,
        r_multiple_expectancy: Decimal,
    ) -> Self {
        Self {
            win_rate,
            profit_factor,
            num_trades,
            payoff_ratio,
            median_payoff_ratio,
            r_multiple_expectancy,
            monte_carlo_payoff_ratio: Decimal::ZERO,
        }
    }

    /// Attach a Monte Carlo payoff ratio. Zero leaves the result unrefined.
    pub fn with_monte_carlo_payoff_ratio(mut self, ratio: Decimal) -> Self {
        self.monte_carlo_payoff_ratio = ratio;
        self
    }

    pub fn has_monte_carlo_payoff_ratio(&self) -> bool {
        !self.monte_carlo_payoff_ratio.is_zero()
    }

    /// `pf / (pf + mc_payoff) * 100`, zero when the denominator is not positive.
    pub fn monte_carlo_profitability(&self) -> Decimal {
        let denominator = self.profit_factor + self.monte_carlo_payoff_ratio;
        if denominator <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.profit_factor / denominator * Decimal::ONE_HUNDRED
    }

    /// Payoff ratio for tolerance checks: the Monte Carlo value when computed,
    /// the median payoff ratio otherwise.
    pub fn effective_payoff_ratio(&self) -> Decimal {
        if self.has_monte_carlo_payoff_ratio() {
            self.monte_carlo_payoff_ratio
        } else {
            self.median_payoff_ratio
        }
    }
}
