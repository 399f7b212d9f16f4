//! Permutation ladder: backtest a pattern at stops around its original stop.
//!
//! The ladder holds the payoff ratio fixed and varies only the stop:
//! - increment = original stop / divisor
//! - `below` stops from `original - increment * below`, stepping up
//! - the original (reference) permutation
//! - `above` stops from `original + increment`, stepping up
//!
//! Each permutation's target is `stop * payoff ratio`, at literal precision.

use rand::rngs::StdRng;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use tracing::{debug, info};

use palvalidator_core::decimal::round_literal;
use palvalidator_core::domain::PalStrategy;
use palvalidator_core::{BackTester, ClosedPositionHistory, PricePattern};

use super::calculator::{RobustnessCalculator, RobustnessError};
use super::criteria::{PermutationAttributes, RobustnessCriteria};
use super::result::RobustnessTestResult;
use crate::monte_carlo::MonteCarloPayoffRatio;
use crate::rng::SeedHierarchy;

/// One rung of the ladder.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permutation {
    pub stop: Decimal,
    pub profit_target: Decimal,
    pub is_reference: bool,
}

/// The full ladder for `pattern`, reference first, then ascending below and
/// above stops.
pub fn permutation_ladder(
    pattern: &PricePattern,
    attributes: &PermutationAttributes,
) -> Result<Vec<Permutation>, RobustnessError> {
    attributes.validate()?;
    let original_stop = pattern.stop_loss();
    let payoff_ratio = pattern.payoff_ratio();
    let increment = original_stop / Decimal::from(attributes.permutations_divisor());
    let below = attributes.below_ref_permutations();
    let above = attributes.above_ref_permutations();

    let lowest = original_stop - increment * Decimal::from(below);
    if below > 0 && lowest <= Decimal::ZERO {
        return Err(RobustnessError::NonPositiveStop {
            stop: lowest,
            increment,
        });
    }

    let rung = |stop: Decimal| {
        let stop = round_literal(stop);
        Permutation {
            stop,
            profit_target: round_literal(stop * payoff_ratio),
            is_reference: false,
        }
    };

    let mut ladder = Vec::with_capacity(attributes.number_of_permutations() as usize);
    ladder.push(Permutation {
        stop: original_stop,
        profit_target: pattern.profit_target(),
        is_reference: true,
    });
    ladder.extend((0..below).map(|k| rung(lowest + increment * Decimal::from(k))));
    ladder.extend((1..=above).map(|k| rung(original_stop + increment * Decimal::from(k))));
    Ok(ladder)
}

/// Summarize a finished backtest the way the calculator consumes it.
pub fn summarize_history(history: &ClosedPositionHistory) -> RobustnessTestResult {
    RobustnessTestResult::new(
        history.median_pal_profitability(),
        history.profit_factor(),
        history.num_positions() as u64,
        history.payoff_ratio(),
        history.median_payoff_ratio(),
        history.r_multiple_expectancy(),
    )
}

/// Backtest one permutation on a fresh clone of `prototype`.
///
/// Returns the permutation's pattern and its result. Nothing outlives the call
/// except those two values.
pub fn evaluate_permutation(
    strategy: &PalStrategy,
    permutation: &Permutation,
    prototype: &dyn BackTester,
    monte_carlo: Option<(&MonteCarloPayoffRatio, &mut StdRng)>,
) -> Result<(Arc<PricePattern>, RobustnessTestResult), RobustnessError> {
    let pattern = if permutation.is_reference {
        Arc::clone(strategy.pattern())
    } else {
        Arc::new(
            strategy
                .pattern()
                .with_exits(permutation.profit_target, permutation.stop)?,
        )
    };

    let mut backtester = prototype.clone_box();
    backtester.add_strategy(strategy.with_pattern(Arc::clone(&pattern)));
    backtester
        .backtest()
        .map_err(|source| RobustnessError::Backtest {
            stop: permutation.stop,
            source,
        })?;

    let history = backtester.closed_position_history();
    let mut result = summarize_history(history);
    if let Some((estimator, rng)) = monte_carlo {
        result = result.with_monte_carlo_payoff_ratio(estimator.run_permutation_test(history, rng));
    }

    debug!(
        stop = %permutation.stop,
        target = %permutation.profit_target,
        profit_factor = %result.profit_factor,
        trades = result.num_trades,
        mc_payoff = %result.monte_carlo_payoff_ratio,
        "permutation evaluated"
    );
    Ok((pattern, result))
}

/// Robustness test for one strategy, optionally with Monte Carlo payoff
/// refinement.
pub struct RobustnessTest {
    prototype: Box<dyn BackTester>,
    strategy: PalStrategy,
    attributes: PermutationAttributes,
    monte_carlo: Option<(MonteCarloPayoffRatio, SeedHierarchy)>,
    calculator: RobustnessCalculator,
}

impl RobustnessTest {
    pub fn new(
        prototype: &dyn BackTester,
        strategy: PalStrategy,
        attributes: PermutationAttributes,
        criteria: RobustnessCriteria,
    ) -> Self {
        let calculator = RobustnessCalculator::new(Arc::clone(strategy.pattern()), attributes, criteria);
        Self {
            prototype: prototype.clone_box(),
            strategy,
            attributes,
            monte_carlo: None,
            calculator,
        }
    }

    /// Refine every permutation's payoff ratio with `estimator`, each on its
    /// own stream from `seeds`.
    pub fn monte_carlo(
        prototype: &dyn BackTester,
        strategy: PalStrategy,
        attributes: PermutationAttributes,
        criteria: RobustnessCriteria,
        estimator: MonteCarloPayoffRatio,
        seeds: SeedHierarchy,
    ) -> Self {
        let mut test = Self::new(prototype, strategy, attributes, criteria);
        test.monte_carlo = Some((estimator, seeds));
        test
    }

    pub fn strategy(&self) -> &PalStrategy {
        &self.strategy
    }

    pub fn calculator(&self) -> &RobustnessCalculator {
        &self.calculator
    }

    pub fn into_calculator(self) -> RobustnessCalculator {
        self.calculator
    }

    /// Sweep the ladder into the calculator and return its verdict.
    pub fn run(&mut self) -> Result<bool, RobustnessError> {
        let pattern_hash = self.strategy.pattern().hash_code();
        let ladder = permutation_ladder(self.strategy.pattern(), &self.attributes)?;

        for permutation in &ladder {
            let mut rng = self
                .monte_carlo
                .as_ref()
                .map(|(_, seeds)| seeds.rng_for(pattern_hash, permutation.stop));
            let monte_carlo = self
                .monte_carlo
                .as_ref()
                .map(|(estimator, _)| estimator)
                .zip(rng.as_mut());

            let (pattern, result) =
                evaluate_permutation(&self.strategy, permutation, self.prototype.as_ref(), monte_carlo)?;
            self.calculator.add_test_result(result, &pattern)?;
        }

        let robust = self.calculator.is_robust()?;
        info!(
            strategy = self.strategy.name(),
            pattern_hash,
            robust,
            robustness_index = %self.calculator.robustness_index(),
            "robustness test complete"
        );
        Ok(robust)
    }
}
