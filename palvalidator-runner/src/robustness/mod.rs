//! Permutation robustness validation for PAL patterns.
//!
//! A pattern is re-backtested across a ladder of stops around its original
//! stop, holding its payoff ratio fixed. The calculator then decides whether
//! the results are consistently profitable near the reference.
//!
//! # Pipeline
//!
//! 1. **Ladder** - `permutation_ladder` lays out the stops and targets
//! 2. **Backtest** - `evaluate_permutation` runs each rung on a fresh backtester clone
//! 3. **Verdict** - `RobustnessCalculator::verdict` applies the aggregate and neighbor gates
//!
//! Tolerances widen with distance from the reference and shrink with trade
//! count; the lookup curves live in [`tolerance`].

pub mod calculator;
pub mod criteria;
pub mod ladder;
pub mod result;
pub mod tolerance;

pub use calculator::{
    equal_with_tolerance, required_pal_profitability, Rejection, RobustnessCalculator, RobustnessError, Verdict,
    NEIGHBORING_SIGNIFICANT_RESULTS,
};
pub use criteria::{CriteriaError, PermutationAttributes, PermutationError, RobustnessCriteria};
pub use ladder::{evaluate_permutation, permutation_ladder, summarize_history, Permutation, RobustnessTest};
pub use result::{ProfitTargetStopPair, RobustnessTestResult};
