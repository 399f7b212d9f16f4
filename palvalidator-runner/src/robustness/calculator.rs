//! Robustness decision engine.
//!
//! Collects one result per permutation in a ladder sorted by stop, then decides
//! whether the pattern holds up:
//! 1. Aggregate gates: robustness index, median profit factor, Qn bands
//! 2. The reference permutation itself
//! 3. Up to six neighbors above, then six below, the reference

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use palvalidator_core::decimal::ONE_POINT_FIVE;
use palvalidator_core::{BacktestError, PatternError, PercentNumber, PricePattern, SummaryStats};

use super::criteria::{PermutationAttributes, PermutationError, RobustnessCriteria};
use super::result::{ProfitTargetStopPair, RobustnessTestResult};
use super::tolerance::{
    tolerance_for_distance_and_iterations, tolerance_for_iterations, tolerance_for_num_trades,
};

/// Neighbors on each side of the reference that must also pass.
pub const NEIGHBORING_SIGNIFICANT_RESULTS: usize = 6;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum RobustnessError {
    #[error("permutation with stop {stop} already exists")]
    DuplicatePermutation { stop: Decimal },
    #[error("sweep incomplete: {entries} of {expected} permutations recorded")]
    IncompleteSweep { entries: usize, expected: u32 },
    #[error("no result for reference permutation with stop {stop}")]
    MissingReference { stop: Decimal },
    #[error("permutation stop must be positive, got {stop} (increment {increment})")]
    NonPositiveStop { stop: Decimal, increment: Decimal },
    #[error("backtest failed for stop {stop}: {source}")]
    Backtest {
        stop: Decimal,
        #[source]
        source: BacktestError,
    },
    #[error(transparent)]
    Pattern(#[from] PatternError),
    #[error(transparent)]
    Permutation(#[from] PermutationError),
}

/// Why a pattern was judged not robust.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum Rejection {
    RobustnessIndex { index: Decimal, minimum: Decimal },
    MedianProfitFactor { median: Decimal },
    MedianLessQn { median: Decimal, qn: Decimal },
    LowerTail { median: Decimal, qn: Decimal, smallest: Decimal },
    Reference { stop: Decimal },
    NeighborAbove { step: usize, stop: Decimal },
    NeighborBelow { step: usize, stop: Decimal },
}

/// Outcome of [`RobustnessCalculator::verdict`] over a complete sweep.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "verdict", rename_all = "snake_case")]
pub enum Verdict {
    /// Every gate passed.
    Robust,
    /// The first gate that failed, with the values it saw.
    Rejected(Rejection),
}

impl Verdict {
    pub fn is_robust(&self) -> bool {
        matches!(self, Verdict::Robust)
    }
}

/// One-sided tolerance: `comparison >= reference - tolerance * reference`.
///
/// Values above the reference always pass.
pub fn equal_with_tolerance(reference: Decimal, comparison: Decimal, tolerance: PercentNumber) -> bool {
    comparison >= reference - tolerance.as_fraction() * reference
}

/// `pf / (pf + safety * payoff) * 100`, zero when the denominator is not positive.
pub fn required_pal_profitability(profit_factor: Decimal, payoff_ratio: Decimal, safety_factor: Decimal) -> Decimal {
    let denominator = profit_factor + safety_factor * payoff_ratio;
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    profit_factor / denominator * Decimal::ONE_HUNDRED
}

/// Permutation results for one pattern and the verdict over them.
#[derive(Debug, Clone)]
pub struct RobustnessCalculator {
    pattern: Arc<PricePattern>,
    attributes: PermutationAttributes,
    criteria: RobustnessCriteria,
    required_profitability: Decimal,
    results: Vec<(ProfitTargetStopPair, RobustnessTestResult)>,
    num_profitable: usize,
    num_pal_profitable: usize,
    profit_factor_stats: SummaryStats,
}

impl RobustnessCalculator {
    pub fn new(
        pattern: Arc<PricePattern>,
        attributes: PermutationAttributes,
        criteria: RobustnessCriteria,
    ) -> Self {
        let required_profitability = required_pal_profitability(
            criteria.desired_profit_factor,
            pattern.payoff_ratio(),
            criteria.profitability_safety_factor,
        );
        Self {
            pattern,
            attributes,
            criteria,
            required_profitability,
            results: Vec::with_capacity(attributes.number_of_permutations() as usize),
            num_profitable: 0,
            num_pal_profitable: 0,
            profit_factor_stats: SummaryStats::new(),
        }
    }

    pub fn pattern(&self) -> &Arc<PricePattern> {
        &self.pattern
    }

    pub fn attributes(&self) -> &PermutationAttributes {
        &self.attributes
    }

    pub fn criteria(&self) -> &RobustnessCriteria {
        &self.criteria
    }

    /// PAL profitability the reference pattern needs after the safety discount.
    pub fn required_profitability(&self) -> Decimal {
        self.required_profitability
    }

    pub fn profit_factor_stats(&self) -> &SummaryStats {
        &self.profit_factor_stats
    }

    /// Record `result` for the permutation `pattern`, keyed by its stop.
    pub fn add_test_result(
        &mut self,
        result: RobustnessTestResult,
        pattern: &PricePattern,
    ) -> Result<(), RobustnessError> {
        let key = ProfitTargetStopPair::new(pattern.profit_target(), pattern.stop_loss());
        let slot = match self.results.binary_search_by(|(k, _)| k.cmp(&key)) {
            Ok(_) => return Err(RobustnessError::DuplicatePermutation { stop: key.stop }),
            Err(slot) => slot,
        };

        self.profit_factor_stats.add_value(result.profit_factor);
        if result.profit_factor > Decimal::ONE {
            self.num_profitable += 1;
        }
        if equal_with_tolerance(
            self.required_profitability,
            result.monte_carlo_profitability(),
            self.criteria.robustness_tolerance,
        ) {
            self.num_pal_profitable += 1;
        }
        self.results.insert(slot, (key, result));
        Ok(())
    }

    pub fn num_entries(&self) -> usize {
        self.results.len()
    }

    /// Results in ascending stop order.
    pub fn results(&self) -> impl DoubleEndedIterator<Item = &(ProfitTargetStopPair, RobustnessTestResult)> + ExactSizeIterator {
        self.results.iter()
    }

    pub fn result_at(&self, index: usize) -> Option<&(ProfitTargetStopPair, RobustnessTestResult)> {
        self.results.get(index)
    }

    /// Ladder position of the original (target, stop).
    pub fn reference_index(&self) -> Option<usize> {
        let key = ProfitTargetStopPair::new(self.pattern.profit_target(), self.pattern.stop_loss());
        self.results.binary_search_by(|(k, _)| k.cmp(&key)).ok()
    }

    /// Share of permutations with profit factor above 1, in percent.
    pub fn robustness_index(&self) -> Decimal {
        self.index_of(self.num_profitable)
    }

    /// Share of permutations within base tolerance of the required profitability.
    pub fn profitability_index(&self) -> Decimal {
        self.index_of(self.num_pal_profitable)
    }

    fn index_of(&self, count: usize) -> Decimal {
        if self.results.is_empty() {
            return Decimal::ZERO;
        }
        Decimal::from(count) / Decimal::from(self.results.len()) * Decimal::ONE_HUNDRED
    }

    pub fn is_robust(&self) -> Result<bool, RobustnessError> {
        self.verdict().map(|v| v.is_robust())
    }

    /// Run every gate in order, stopping at the first failure.
    ///
    /// Gates, in order:
    /// 1. robustness index at or above the criteria minimum
    /// 2. median profit factor at least 1.5
    /// 3. median minus Qn at least 1
    /// 4. no lower tail: median minus twice Qn below 1 with a losing permutation
    /// 5. the reference permutation
    /// 6. the nearest permutations above, then below, the reference
    ///
    /// Fails with [`RobustnessError::IncompleteSweep`] until every permutation
    /// is recorded.
    ///
    /// # Example
    ///
    /// ```
    /// use std::sync::Arc;
    ///
    /// use chrono::NaiveDate;
    /// use rust_decimal_macros::dec;
    ///
    /// use palvalidator_core::pattern::{PatternExpression, PriceBarReference};
    /// use palvalidator_core::{Direction, PatternDescription, PricePattern};
    /// use palvalidator_runner::robustness::{permutation_ladder, Verdict};
    /// use palvalidator_runner::{
    ///     PermutationAttributes, RobustnessCalculator, RobustnessCriteria, RobustnessTestResult,
    /// };
    ///
    /// # fn main() -> Result<(), Box<dyn std::error::Error>> {
    /// let pattern = Arc::new(PricePattern::new(
    ///     PatternDescription {
    ///         index: 1,
    ///         index_date: NaiveDate::from_ymd_opt(2019, 3, 4).ok_or("date")?,
    ///     },
    ///     Direction::Long,
    ///     PatternExpression::greater_than(PriceBarReference::close(0), PriceBarReference::high(1)),
    ///     dec!(2.0),
    ///     dec!(2.0),
    /// )?);
    ///
    /// // Stops 1.0, 1.5, 2.0, 2.5, 3.0.
    /// let attributes = PermutationAttributes::new(2, 2, 4, 1, 1)?;
    /// let mut calc = RobustnessCalculator::new(Arc::clone(&pattern), attributes, RobustnessCriteria::standard());
    ///
    /// let steady = RobustnessTestResult::new(dec!(68.97), dec!(2.0), 50, dec!(1.0), dec!(1.0), dec!(0.5));
    /// for rung in permutation_ladder(&pattern, &attributes)? {
    ///     calc.add_test_result(steady, &pattern.with_exits(rung.profit_target, rung.stop)?)?;
    /// }
    ///
    /// assert_eq!(calc.verdict()?, Verdict::Robust);
    /// # Ok(())
    /// # }
    /// ```
    pub fn verdict(&self) -> Result<Verdict, RobustnessError> {
        let expected = self.attributes.number_of_permutations();
        if self.results.len() < expected as usize {
            return Err(RobustnessError::IncompleteSweep {
                entries: self.results.len(),
                expected,
            });
        }

        let index = self.robustness_index();
        let minimum = self.criteria.min_robustness_index.percent();
        if index < minimum {
            return Ok(self.reject(Rejection::RobustnessIndex { index, minimum }));
        }

        let median = self.profit_factor_stats.median();
        if median < ONE_POINT_FIVE {
            return Ok(self.reject(Rejection::MedianProfitFactor { median }));
        }

        let qn = self.profit_factor_stats.robust_qn();
        if median - qn < Decimal::ONE {
            return Ok(self.reject(Rejection::MedianLessQn { median, qn }));
        }

        let smallest = self.profit_factor_stats.smallest();
        if median - qn * Decimal::TWO < Decimal::ONE && smallest < Decimal::ONE {
            return Ok(self.reject(Rejection::LowerTail { median, qn, smallest }));
        }

        let original_stop = self.pattern.stop_loss();
        let reference = self
            .reference_index()
            .ok_or(RobustnessError::MissingReference { stop: original_stop })?;
        let required = self.required_profitability;

        let (_, reference_result) = &self.results[reference];
        if !self.is_permutation_result_robust(reference_result, required, 0) {
            return Ok(self.reject(Rejection::Reference { stop: original_stop }));
        }

        let above = self.results[reference + 1..]
            .iter()
            .take(NEIGHBORING_SIGNIFICANT_RESULTS);
        for (step, (key, result)) in (1..).zip(above) {
            if !self.is_permutation_result_robust_at_distance(result, required, step as u64, key.stop) {
                return Ok(self.reject(Rejection::NeighborAbove { step, stop: key.stop }));
            }
        }

        let below = self.results[..reference]
            .iter()
            .rev()
            .take(NEIGHBORING_SIGNIFICANT_RESULTS);
        for (step, (key, result)) in (1..).zip(below) {
            if !self.is_permutation_result_robust_at_distance(result, required, step as u64, key.stop) {
                return Ok(self.reject(Rejection::NeighborBelow { step, stop: key.stop }));
            }
        }

        debug!(pattern_hash = self.pattern.hash_code(), "pattern robust");
        Ok(Verdict::Robust)
    }

    fn reject(&self, rejection: Rejection) -> Verdict {
        debug!(pattern_hash = self.pattern.hash_code(), ?rejection, "pattern not robust");
        Verdict::Rejected(rejection)
    }

    /// Permutation test with the tolerance for `iterations` ladder steps.
    pub fn is_permutation_result_robust(
        &self,
        result: &RobustnessTestResult,
        required_profitability: Decimal,
        iterations: u64,
    ) -> bool {
        self.passes(result, required_profitability, tolerance_for_iterations(iterations))
    }

    /// Permutation test with the combined distance and iteration tolerance for
    /// a permutation at `candidate_stop`, `iterations` steps from the reference.
    pub fn is_permutation_result_robust_at_distance(
        &self,
        result: &RobustnessTestResult,
        required_profitability: Decimal,
        iterations: u64,
        candidate_stop: Decimal,
    ) -> bool {
        let tolerance =
            tolerance_for_distance_and_iterations(self.pattern.stop_loss(), candidate_stop, iterations);
        self.passes(result, required_profitability, tolerance)
    }

    fn passes(&self, result: &RobustnessTestResult, required_profitability: Decimal, tolerance: PercentNumber) -> bool {
        if !equal_with_tolerance(required_profitability, result.monte_carlo_profitability(), tolerance) {
            return false;
        }
        if !equal_with_tolerance(
            self.pattern.payoff_ratio(),
            result.effective_payoff_ratio(),
            tolerance_for_num_trades(result.num_trades),
        ) {
            return false;
        }
        equal_with_tolerance(self.criteria.desired_profit_factor, result.profit_factor, tolerance)
    }

    /// Failures among the first permutations of the ladder. Iterations away
    /// start at the below-reference count and shrink toward the reference.
    pub fn num_failures_at_beginning(&self, required_profitability: Decimal) -> usize {
        let below = u64::from(self.attributes.below_ref_permutations());
        self.results
            .iter()
            .take(self.attributes.num_entries_to_test_at_beginning() as usize)
            .zip(0u64..)
            .filter(|((_, result), offset)| {
                !self.is_permutation_result_robust(result, required_profitability, below.saturating_sub(*offset))
            })
            .count()
    }

    /// Failures among the last permutations of the ladder. Iterations away
    /// start at the above-reference count and shrink toward the reference.
    pub fn num_failures_at_end(&self, required_profitability: Decimal) -> usize {
        let above = u64::from(self.attributes.above_ref_permutations());
        self.results
            .iter()
            .rev()
            .take(self.attributes.num_entries_to_test_at_end() as usize)
            .zip(0u64..)
            .filter(|((_, result), offset)| {
                !self.is_permutation_result_robust(result, required_profitability, above.saturating_sub(*offset))
            })
            .count()
    }
}
