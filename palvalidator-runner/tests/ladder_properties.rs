//! Property tests for ladder generation and the tolerance rules.
//!
//! Uses proptest to verify:
//! 1. Ladder completeness: B + A + 1 rungs, strictly increasing, reference unchanged
//! 2. Target coupling: every rung's target is its stop times the original payoff ratio
//! 3. One-sided tolerance: any excess passes, any shortfall past the floor fails
//! 4. Table clamping and the robustness index formula

use std::sync::Arc;

use chrono::NaiveDate;
use proptest::prelude::*;
use rust_decimal::Decimal;

use palvalidator_core::decimal::round_literal;
use palvalidator_core::pattern::{PatternExpression, PriceBarReference};
use palvalidator_core::{Direction, PatternDescription, PercentNumber, PricePattern};
use palvalidator_runner::robustness::tolerance::{
    tolerance_for_iterations, tolerance_for_num_trades, tolerance_for_percent_difference,
};
use palvalidator_runner::robustness::{equal_with_tolerance, permutation_ladder};
use palvalidator_runner::{
    PermutationAttributes, RobustnessCalculator, RobustnessCriteria, RobustnessTestResult,
};

// ── Strategies (proptest) ────────────────────────────────────────────

/// Hundredths between 0.50 and 5.00.
fn arb_exit() -> impl Strategy<Value = Decimal> {
    (50i64..=500).prop_map(|cents| Decimal::new(cents, 2))
}

/// (below, above, divisor) with every stop staying positive.
fn arb_attributes() -> impl Strategy<Value = PermutationAttributes> {
    (0u32..20, 0u32..20)
        .prop_flat_map(|(below, above)| (Just(below), Just(above), (below + 1)..64))
        .prop_map(|(below, above, divisor)| {
            PermutationAttributes::new(below, above, divisor, 1, 1).unwrap()
        })
}

fn pattern(target: Decimal, stop: Decimal) -> PricePattern {
    PricePattern::new(
        PatternDescription {
            index: 9,
            index_date: NaiveDate::from_ymd_opt(2018, 11, 5).unwrap(),
        },
        Direction::Short,
        PatternExpression::greater_than(PriceBarReference::open(1), PriceBarReference::close(0)),
        target,
        stop,
    )
    .unwrap()
}

// ── 1-2. Ladder shape ────────────────────────────────────────────────

proptest! {
    #[test]
    fn ladder_is_complete_and_ordered(
        target in arb_exit(),
        stop in arb_exit(),
        attrs in arb_attributes(),
    ) {
        let p = pattern(target, stop);
        let ladder = permutation_ladder(&p, &attrs).unwrap();

        let expected = attrs.below_ref_permutations() + attrs.above_ref_permutations() + 1;
        prop_assert_eq!(ladder.len(), expected as usize);

        let mut stops: Vec<Decimal> = ladder.iter().map(|r| r.stop).collect();
        stops.sort();
        prop_assert!(stops.windows(2).all(|w| w[0] < w[1]));
        prop_assert_eq!(stops[attrs.below_ref_permutations() as usize], p.stop_loss());

        let references: Vec<_> = ladder.iter().filter(|r| r.is_reference).collect();
        prop_assert_eq!(references.len(), 1);
        prop_assert_eq!(references[0].stop, p.stop_loss());
        prop_assert_eq!(references[0].profit_target, p.profit_target());
    }

    #[test]
    fn targets_track_original_payoff_ratio(
        target in arb_exit(),
        stop in arb_exit(),
        attrs in arb_attributes(),
    ) {
        let p = pattern(target, stop);
        for rung in permutation_ladder(&p, &attrs).unwrap().iter().filter(|r| !r.is_reference) {
            prop_assert!(rung.stop > Decimal::ZERO);
            prop_assert_eq!(rung.profit_target, round_literal(rung.stop * p.payoff_ratio()));
        }
    }
}

// ── 3. One-sided tolerance ───────────────────────────────────────────

proptest! {
    #[test]
    fn excess_always_passes(reference in arb_exit(), excess in 0i64..100_000, iterations in 0u64..200) {
        let comparison = reference + Decimal::new(excess, 3);
        prop_assert!(equal_with_tolerance(reference, comparison, tolerance_for_iterations(iterations)));
    }

    #[test]
    fn floor_is_inclusive(reference in arb_exit(), iterations in 0u64..200) {
        let tolerance = tolerance_for_iterations(iterations);
        let floor = reference - tolerance.as_fraction() * reference;
        prop_assert!(equal_with_tolerance(reference, floor, tolerance));
        prop_assert!(!equal_with_tolerance(reference, floor - Decimal::new(1, 9), tolerance));
    }
}

#[test]
fn one_sided_boundary_at_two_percent() {
    let two = PercentNumber::from_percent(Decimal::TWO);
    let reference = Decimal::from(50);
    assert!(equal_with_tolerance(reference, Decimal::from(49), two));
    assert!(!equal_with_tolerance(reference, Decimal::new(48_999_999, 6), two));
    assert!(equal_with_tolerance(reference, Decimal::from(500), two));
}

// ── 4. Tables and index ──────────────────────────────────────────────

#[test]
fn tables_clamp_at_both_ends() {
    assert_eq!(tolerance_for_iterations(150), tolerance_for_iterations(100));
    assert_eq!(tolerance_for_iterations(u64::MAX), tolerance_for_iterations(100));
    assert_eq!(tolerance_for_percent_difference(0), tolerance_for_percent_difference(1));
    assert_eq!(tolerance_for_percent_difference(0).percent(), Decimal::ONE);
    assert_eq!(tolerance_for_num_trades(10_000), tolerance_for_num_trades(100));
}

proptest! {
    #[test]
    fn robustness_index_is_share_of_profitable(profitable in proptest::collection::vec(any::<bool>(), 1..40)) {
        let n = profitable.len() as u32;
        let attrs = PermutationAttributes::new(n - 1, 0, n, 1, 1).unwrap();
        let base = Arc::new(pattern(Decimal::ONE, Decimal::ONE));
        let mut calc = RobustnessCalculator::new(Arc::clone(&base), attrs, RobustnessCriteria::standard());

        for (rung, &wins) in permutation_ladder(&base, &attrs).unwrap().iter().zip(&profitable) {
            let pf = if wins { Decimal::TWO } else { Decimal::ONE };
            let result = RobustnessTestResult::new(Decimal::ZERO, pf, 10, Decimal::ONE, Decimal::ONE, Decimal::ZERO);
            calc.add_test_result(result, &base.with_exits(rung.profit_target, rung.stop).unwrap()).unwrap();
        }

        let p = profitable.iter().filter(|&&w| w).count();
        prop_assert_eq!(
            calc.robustness_index(),
            Decimal::from(p) / Decimal::from(profitable.len()) * Decimal::ONE_HUNDRED
        );
    }
}
