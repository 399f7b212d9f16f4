//! Monte Carlo payoff ratio estimation.
//!
//! Resamples a closed position history's trade returns with replacement and
//! takes the median payoff ratio across resamples.

use rand::Rng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use palvalidator_core::history::payoff_ratio;
use palvalidator_core::stats::median;
use palvalidator_core::ClosedPositionHistory;

/// Trials used by the batch tester.
pub const DEFAULT_TRIALS: u32 = 200;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MonteCarloPayoffRatio {
    trials: u32,
}

impl MonteCarloPayoffRatio {
    pub fn new(trials: u32) -> Self {
        Self { trials }
    }

    pub fn trials(&self) -> u32 {
        self.trials
    }

    /// Median resampled payoff ratio. Zero when there are no trades or no
    /// trials, which downstream reads as "not computed".
    pub fn run_permutation_test<R: Rng>(&self, history: &ClosedPositionHistory, rng: &mut R) -> Decimal {
        let returns = history.percent_returns();
        if returns.is_empty() || self.trials == 0 {
            return Decimal::ZERO;
        }

        let n = returns.len();
        let mut ratios = Vec::with_capacity(self.trials as usize);
        let mut winners = Vec::with_capacity(n);
        let mut losers = Vec::with_capacity(n);

        for _ in 0..self.trials {
            winners.clear();
            losers.clear();
            for _ in 0..n {
                let r = returns[rng.gen_range(0..n)];
                if r > Decimal::ZERO {
                    winners.push(r);
                } else {
                    losers.push(r);
                }
            }
            ratios.push(payoff_ratio(&winners, &losers));
        }

        median(&ratios).unwrap_or(Decimal::ZERO)
    }
}

impl Default for MonteCarloPayoffRatio {
    fn default() -> Self {
        Self::new(DEFAULT_TRIALS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;
    use palvalidator_core::domain::{PositionSide, TradingPosition};
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use rust_decimal_macros::dec;

    fn history(exits: &[Decimal]) -> ClosedPositionHistory {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut h = ClosedPositionHistory::new();
        for &exit in exits {
            let mut pos = TradingPosition::open(PositionSide::Long, date, dec!(100)).unwrap();
            pos.close(date, exit).unwrap();
            h.add_closed_position(pos).unwrap();
        }
        h
    }

    #[test]
    fn empty_history_is_sentinel() {
        let mut rng = StdRng::seed_from_u64(1);
        let mc = MonteCarloPayoffRatio::default();
        assert_eq!(mc.run_permutation_test(&ClosedPositionHistory::new(), &mut rng), Decimal::ZERO);
        assert_eq!(mc.trials(), 200);
    }

    #[test]
    fn symmetric_trades_resample_to_same_ratio() {
        // Every win is +2%, every loss -2%: any resample with both has ratio 1.
        let h = history(&[dec!(102), dec!(98), dec!(102), dec!(98), dec!(102), dec!(98)]);
        let mut rng = StdRng::seed_from_u64(9);
        let ratio = MonteCarloPayoffRatio::new(101).run_permutation_test(&h, &mut rng);
        assert_eq!(ratio, Decimal::ONE);
    }

    #[test]
    fn same_seed_same_estimate() {
        let h = history(&[dec!(104), dec!(99), dec!(101.5), dec!(97), dec!(103)]);
        let mc = MonteCarloPayoffRatio::new(50);
        let a = mc.run_permutation_test(&h, &mut StdRng::seed_from_u64(3));
        let b = mc.run_permutation_test(&h, &mut StdRng::seed_from_u64(3));
        assert_eq!(a, b);
        assert!(a > Decimal::ZERO);
    }
}
