//! Serializable snapshot of a robustness calculator.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use palvalidator_core::SummaryStats;

use crate::robustness::{RobustnessCalculator, Verdict};

/// One permutation row, in ascending stop order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PermutationRow {
    pub profit_target: Decimal,
    pub stop: Decimal,
    pub monte_carlo_profitability: Decimal,
    pub profit_factor: Decimal,
    pub num_trades: u64,
    pub payoff_ratio: Decimal,
    pub median_payoff_ratio: Decimal,
    pub monte_carlo_payoff_ratio: Decimal,
}

/// Median, Qn and the one/two-Qn lower bands of a distribution.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DistributionSummary {
    pub median: Decimal,
    pub qn: Decimal,
    pub smallest: Decimal,
    pub largest: Decimal,
    pub median_less_one_qn: Decimal,
    pub median_less_two_qn: Decimal,
}

impl DistributionSummary {
    pub fn from_stats(stats: &SummaryStats) -> Self {
        let median = stats.median();
        let qn = stats.robust_qn();
        Self {
            median,
            qn,
            smallest: stats.smallest(),
            largest: stats.largest(),
            median_less_one_qn: median - qn,
            median_less_two_qn: median - qn * Decimal::TWO,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RobustnessSummary {
    pub pattern_hash: u64,
    pub pattern_index: u32,
    pub original_stop: Decimal,
    pub original_target: Decimal,
    pub required_profitability: Decimal,
    pub robustness_index: Decimal,
    pub profitability_index: Decimal,
    pub num_entries: usize,
    pub profit_factor: DistributionSummary,
    pub monte_carlo_profitability: DistributionSummary,
    /// `None` when the sweep could not be judged.
    pub verdict: Option<Verdict>,
    pub permutations: Vec<PermutationRow>,
}

impl RobustnessSummary {
    pub fn from_calculator(calculator: &RobustnessCalculator) -> Self {
        let pattern = calculator.pattern();
        let mut profitability = SummaryStats::new();
        let permutations: Vec<PermutationRow> = calculator
            .results()
            .map(|(key, result)| {
                let mc_profitability = result.monte_carlo_profitability();
                profitability.add_value(mc_profitability);
                PermutationRow {
                    profit_target: key.profit_target,
                    stop: key.stop,
                    monte_carlo_profitability: mc_profitability,
                    profit_factor: result.profit_factor,
                    num_trades: result.num_trades,
                    payoff_ratio: result.payoff_ratio,
                    median_payoff_ratio: result.median_payoff_ratio,
                    monte_carlo_payoff_ratio: result.monte_carlo_payoff_ratio,
                }
            })
            .collect();

        Self {
            pattern_hash: pattern.hash_code(),
            pattern_index: pattern.description().index,
            original_stop: pattern.stop_loss(),
            original_target: pattern.profit_target(),
            required_profitability: calculator.required_profitability(),
            robustness_index: calculator.robustness_index(),
            profitability_index: calculator.profitability_index(),
            num_entries: calculator.num_entries(),
            profit_factor: DistributionSummary::from_stats(calculator.profit_factor_stats()),
            monte_carlo_profitability: DistributionSummary::from_stats(&profitability),
            verdict: calculator.verdict().ok(),
            permutations,
        }
    }

    pub fn is_robust(&self) -> bool {
        self.verdict.as_ref().is_some_and(Verdict::is_robust)
    }
}
