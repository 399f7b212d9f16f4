//! End-to-end robustness tests.
//!
//! A scripted backtester returns a fixed closed-position history for every
//! stop except an optional weak one, so verdicts are known in advance.

use std::sync::Arc;

use chrono::NaiveDate;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use palvalidator_core::domain::{PalStrategy, Portfolio, PositionSide, TradingPosition};
use palvalidator_core::pattern::{PatternExpression, PriceBarReference};
use palvalidator_core::{
    BackTester, BacktestError, ClosedPositionHistory, Direction, PatternDescription, PricePattern,
};
use palvalidator_runner::robustness::{permutation_ladder, Rejection};
use palvalidator_runner::{
    MonteCarloPayoffRatio, PermutationAttributes, RobustnessCalculator, RobustnessCriteria,
    RobustnessSummary, RobustnessTest, RobustnessTestResult, RobustnessTester, SeedHierarchy,
    Verdict,
};

// ── Fixtures ─────────────────────────────────────────────────────────

fn history(winners: usize, losers: usize) -> ClosedPositionHistory {
    let date = NaiveDate::from_ymd_opt(2021, 6, 1).unwrap();
    let mut h = ClosedPositionHistory::new();
    let exits = std::iter::repeat(dec!(102))
        .take(winners)
        .chain(std::iter::repeat(dec!(98)).take(losers));
    for exit in exits {
        let mut pos = TradingPosition::open(PositionSide::Long, date, dec!(100)).unwrap();
        pos.close(date, exit).unwrap();
        h.add_closed_position(pos).unwrap();
    }
    h
}

/// Profit factor 2, payoff 1: 32 winners and 16 losers of 2% each.
fn strong_history() -> ClosedPositionHistory {
    history(32, 16)
}

/// Profit factor 0.5.
fn weak_history() -> ClosedPositionHistory {
    history(16, 32)
}

#[derive(Clone)]
struct ScriptedBackTester {
    weak_stop: Option<Decimal>,
    strategies: Vec<PalStrategy>,
    history: ClosedPositionHistory,
}

impl ScriptedBackTester {
    fn new(weak_stop: Option<Decimal>) -> Self {
        Self {
            weak_stop,
            strategies: Vec::new(),
            history: ClosedPositionHistory::new(),
        }
    }
}

impl BackTester for ScriptedBackTester {
    fn clone_box(&self) -> Box<dyn BackTester> {
        Box::new(self.clone())
    }

    fn add_strategy(&mut self, strategy: PalStrategy) {
        self.strategies.push(strategy);
    }

    fn backtest(&mut self) -> Result<(), BacktestError> {
        let strategy = self.strategies.last().ok_or(BacktestError::NoStrategy)?;
        let stop = strategy.pattern().stop_loss();
        self.history = if self.weak_stop == Some(stop) {
            weak_history()
        } else {
            strong_history()
        };
        Ok(())
    }

    fn closed_position_history(&self) -> &ClosedPositionHistory {
        &self.history
    }
}

fn pattern(index: u32) -> PricePattern {
    PricePattern::new(
        PatternDescription {
            index,
            index_date: NaiveDate::from_ymd_opt(2019, 3, 4).unwrap(),
        },
        Direction::Long,
        PatternExpression::greater_than(PriceBarReference::close(0), PriceBarReference::high(1)),
        dec!(2.0),
        dec!(2.0),
    )
    .unwrap()
}

fn strategy(index: u32) -> PalStrategy {
    PalStrategy::new(
        format!("scripted-{index}"),
        Arc::new(pattern(index)),
        Arc::new(Portfolio::single("scripted", "SYN")),
    )
}

// ── Calculator fed with synthetic results ────────────────────────────

fn standard_calculator(reference_pf: Decimal) -> RobustnessCalculator {
    let base = Arc::new(pattern(1));
    let attrs = PermutationAttributes::pal();
    let mut calc = RobustnessCalculator::new(Arc::clone(&base), attrs, RobustnessCriteria::standard());
    for rung in permutation_ladder(&base, &attrs).unwrap() {
        let pf = if rung.is_reference { reference_pf } else { dec!(2.0) };
        let result = RobustnessTestResult::new(dec!(68.97), pf, 50, dec!(1.0), dec!(1.0), dec!(0.5));
        let permuted = base.with_exits(rung.profit_target, rung.stop).unwrap();
        calc.add_test_result(result, &permuted).unwrap();
    }
    calc
}

#[test]
fn standard_ladder_all_profitable_is_robust() {
    let calc = standard_calculator(dec!(2.0));
    assert_eq!(calc.num_entries(), 19);
    assert_eq!(calc.required_profitability().round_dp(2), dec!(68.97));
    assert_eq!(calc.robustness_index(), dec!(100));

    let (first, _) = calc.result_at(0).unwrap();
    let (last, _) = calc.result_at(18).unwrap();
    assert_eq!(first.stop, dec!(0.25));
    assert_eq!(last.stop, dec!(2.5));
    assert_eq!(calc.reference_index(), Some(14));

    assert!(calc.is_robust().unwrap());
}

#[test]
fn weak_reference_fails_standard_ladder() {
    let calc = standard_calculator(dec!(0.5));
    // 18 of 19 permutations still profitable, so only the reference gate trips.
    assert_eq!(
        calc.verdict().unwrap(),
        Verdict::Rejected(Rejection::Reference { stop: dec!(2.0) })
    );
    assert!(!calc.is_robust().unwrap());
}

#[test]
fn robustness_index_counts_profitable_permutations() {
    let base = Arc::new(pattern(1));
    let attrs = PermutationAttributes::pal();
    let mut calc = RobustnessCalculator::new(Arc::clone(&base), attrs, RobustnessCriteria::standard());
    let ladder = permutation_ladder(&base, &attrs).unwrap();
    for (i, rung) in ladder.iter().enumerate() {
        let pf = if i % 3 == 0 { dec!(0.9) } else { dec!(1.4) };
        let result = RobustnessTestResult::new(dec!(50), pf, 30, dec!(1), dec!(1), dec!(0));
        calc.add_test_result(result, &base.with_exits(rung.profit_target, rung.stop).unwrap())
            .unwrap();
    }
    // i = 0, 3, ..., 18: seven unprofitable of 19.
    assert_eq!(calc.robustness_index(), Decimal::from(12) / Decimal::from(19) * dec!(100));
}

// ── Full sweeps through a backtester ─────────────────────────────────

#[test]
fn robustness_test_sweeps_full_ladder() {
    let prototype = ScriptedBackTester::new(None);
    let mut test = RobustnessTest::new(
        &prototype,
        strategy(1),
        PermutationAttributes::pal(),
        RobustnessCriteria::standard(),
    );
    assert!(test.run().unwrap());

    let calc = test.into_calculator();
    assert_eq!(calc.num_entries(), 19);
    let stops: Vec<_> = calc.results().map(|(k, _)| k.stop).collect();
    assert!(stops.windows(2).all(|w| w[0] < w[1]));
    for (key, result) in calc.results() {
        assert_eq!(key.profit_target, key.stop);
        assert_eq!(result.profit_factor, dec!(2));
        assert_eq!(result.num_trades, 48);
    }
}

#[test]
fn weak_neighbor_rejects_pattern() {
    // 2.125 is the first stop above the reference.
    let prototype = ScriptedBackTester::new(Some(dec!(2.125)));
    let mut test = RobustnessTest::new(
        &prototype,
        strategy(1),
        PermutationAttributes::pal(),
        RobustnessCriteria::standard(),
    );
    assert!(!test.run().unwrap());
    assert_eq!(
        test.calculator().verdict().unwrap(),
        Verdict::Rejected(Rejection::NeighborAbove { step: 1, stop: dec!(2.125) })
    );
}

#[test]
fn monte_carlo_sweep_is_reproducible() {
    let run = || {
        let mut test = RobustnessTest::monte_carlo(
            &ScriptedBackTester::new(None),
            strategy(1),
            PermutationAttributes::stat_significant(),
            RobustnessCriteria::standard(),
            MonteCarloPayoffRatio::new(40),
            SeedHierarchy::new(2024),
        );
        test.run().unwrap();
        RobustnessSummary::from_calculator(test.calculator())
    };
    let a = run();
    assert_eq!(a, run());
    assert_eq!(a.num_entries, 30);
    assert!(a.permutations.iter().all(|row| row.monte_carlo_payoff_ratio > Decimal::ZERO));
}

#[test]
fn batch_files_surviving_and_rejected() {
    let mut tester = RobustnessTester::standard().with_monte_carlo_trials(0);
    tester.add_strategy(&strategy(1));
    tester.add_strategy(&strategy(2));
    tester.run(&ScriptedBackTester::new(None)).unwrap();
    assert_eq!(tester.num_surviving_strategies(), 2);

    let mut weak = RobustnessTester::standard().with_monte_carlo_trials(0);
    weak.add_strategy(&strategy(3));
    weak.run(&ScriptedBackTester::new(Some(dec!(2.0)))).unwrap();
    assert_eq!(weak.num_rejected_strategies(), 1);
    let hash = pattern(3).hash_code();
    assert!(weak.failed_calculator(hash).is_some());
    assert!(weak.passed_calculator(hash).is_none());
}
