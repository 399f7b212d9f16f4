//! Tolerance lookup tables.
//!
//! Each table maps an unsigned distance (percent distance between stops,
//! ladder steps from the reference, or trade count) to a tolerance. Indices
//! past the end read the last entry.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use palvalidator_core::decimal::{percent_return, to_index};
use palvalidator_core::PercentNumber;

/// Entries per table, indices `0..=MAX_TABLE_INDEX`.
const TABLE_LEN: usize = 101;
pub const MAX_TABLE_INDEX: usize = TABLE_LEN - 1;

/// Log-shaped growth by percent distance: entry `k` is `ln(k + 1)`, with
/// entries 0 and 1 floored to 1.
const LN_DISTANCE: [Decimal; TABLE_LEN] = [
    dec!(1.00000), dec!(1.00000), dec!(1.09861), dec!(1.38629), dec!(1.60944), dec!(1.79176),
    dec!(1.94591), dec!(2.07944), dec!(2.19722), dec!(2.30259), dec!(2.3979), dec!(2.48491),
    dec!(2.56495), dec!(2.63906), dec!(2.70805), dec!(2.77259), dec!(2.83321), dec!(2.89037),
    dec!(2.94444), dec!(2.99573), dec!(3.04452), dec!(3.09104), dec!(3.13549), dec!(3.17805),
    dec!(3.21888), dec!(3.2581), dec!(3.29584), dec!(3.3322), dec!(3.3673), dec!(3.4012),
    dec!(3.43399), dec!(3.46574), dec!(3.49651), dec!(3.52636), dec!(3.55535), dec!(3.58352),
    dec!(3.61092), dec!(3.63759), dec!(3.66356), dec!(3.68888), dec!(3.71357), dec!(3.73767),
    dec!(3.7612), dec!(3.78419), dec!(3.80666), dec!(3.82864), dec!(3.85015), dec!(3.8712),
    dec!(3.89182), dec!(3.91202), dec!(3.93183), dec!(3.95124), dec!(3.97029), dec!(3.98898),
    dec!(4.00733), dec!(4.02535), dec!(4.04305), dec!(4.06044), dec!(4.07754), dec!(4.09434),
    dec!(4.11087), dec!(4.12713), dec!(4.14313), dec!(4.15888), dec!(4.17439), dec!(4.18965),
    dec!(4.20469), dec!(4.21951), dec!(4.23411), dec!(4.2485), dec!(4.26268), dec!(4.27667),
    dec!(4.29046), dec!(4.30407), dec!(4.31749), dec!(4.33073), dec!(4.34381), dec!(4.35671),
    dec!(4.36945), dec!(4.38203), dec!(4.39445), dec!(4.40672), dec!(4.41884), dec!(4.43082),
    dec!(4.44265), dec!(4.45435), dec!(4.46591), dec!(4.47734), dec!(4.48864), dec!(4.49981),
    dec!(4.51086), dec!(4.52179), dec!(4.5326), dec!(4.54329), dec!(4.55388), dec!(4.56435),
    dec!(4.57471), dec!(4.58497), dec!(4.59512), dec!(4.60517), dec!(4.61512),
];
/// Square-root growth by ladder steps. Entry 0 is 1; entries 1 to 3 are floored to 2.
const SQRT_ITERATIONS: [Decimal; TABLE_LEN] = [
    dec!(1.000000), dec!(2.000000), dec!(2.000000), dec!(2.000000), dec!(2.000000), dec!(2.236068),
    dec!(2.449490), dec!(2.645751), dec!(2.828427), dec!(3.000000), dec!(3.162278), dec!(3.316625),
    dec!(3.464102), dec!(3.605551), dec!(3.741657), dec!(3.872983), dec!(4.000000), dec!(4.123106),
    dec!(4.242641), dec!(4.358899), dec!(4.472136), dec!(4.582576), dec!(4.690416), dec!(4.795832),
    dec!(4.898979), dec!(5.000000), dec!(5.099020), dec!(5.196152), dec!(5.291503), dec!(5.385165),
    dec!(5.477226), dec!(5.567764), dec!(5.656854), dec!(5.744563), dec!(5.830952), dec!(5.916080),
    dec!(6.000000), dec!(6.082763), dec!(6.164414), dec!(6.244998), dec!(6.324555), dec!(6.403124),
    dec!(6.480741), dec!(6.557439), dec!(6.633250), dec!(6.708204), dec!(6.782330), dec!(6.855655),
    dec!(6.928203), dec!(7.000000), dec!(7.071068), dec!(7.141428), dec!(7.211103), dec!(7.280110),
    dec!(7.348469), dec!(7.416198), dec!(7.483315), dec!(7.549834), dec!(7.615773), dec!(7.681146),
    dec!(7.745967), dec!(7.810250), dec!(7.874008), dec!(7.937254), dec!(8.000000), dec!(8.062258),
    dec!(8.124038), dec!(8.185353), dec!(8.246211), dec!(8.306624), dec!(8.366600), dec!(8.426150),
    dec!(8.485281), dec!(8.544004), dec!(8.602325), dec!(8.660254), dec!(8.717798), dec!(8.774964),
    dec!(8.831761), dec!(8.888194), dec!(8.944272), dec!(9.000000), dec!(9.055385), dec!(9.110434),
    dec!(9.165151), dec!(9.219544), dec!(9.273618), dec!(9.327379), dec!(9.380832), dec!(9.433981),
    dec!(9.486833), dec!(9.539392), dec!(9.591663), dec!(9.643651), dec!(9.695360), dec!(9.746794),
    dec!(9.797959), dec!(9.848858), dec!(9.899495), dec!(9.949874), dec!(10.000000),
];
/// Half square-root growth by trade count.
const HALF_SQRT_TRADES: [Decimal; TABLE_LEN] = [
    dec!(0.000000), dec!(0.500000), dec!(0.707107), dec!(0.866025), dec!(1.000000), dec!(1.118034),
    dec!(1.224745), dec!(1.322876), dec!(1.414214), dec!(1.500000), dec!(1.581139), dec!(1.658312),
    dec!(1.732051), dec!(1.802776), dec!(1.870829), dec!(1.936492), dec!(2.000000), dec!(2.061553),
    dec!(2.121320), dec!(2.179449), dec!(2.236068), dec!(2.291288), dec!(2.345208), dec!(2.397916),
    dec!(2.449490), dec!(2.500000), dec!(2.549510), dec!(2.598076), dec!(2.645751), dec!(2.692582),
    dec!(2.738613), dec!(2.783882), dec!(2.828427), dec!(2.872281), dec!(2.915476), dec!(2.958040),
    dec!(3.000000), dec!(3.041381), dec!(3.082207), dec!(3.122499), dec!(3.162278), dec!(3.201562),
    dec!(3.240370), dec!(3.278719), dec!(3.316625), dec!(3.354102), dec!(3.391165), dec!(3.427827),
    dec!(3.464102), dec!(3.500000), dec!(3.535534), dec!(3.570714), dec!(3.605551), dec!(3.640055),
    dec!(3.674235), dec!(3.708099), dec!(3.741657), dec!(3.774917), dec!(3.807887), dec!(3.840573),
    dec!(3.872983), dec!(3.905125), dec!(3.937004), dec!(3.968627), dec!(4.000000), dec!(4.031129),
    dec!(4.062019), dec!(4.092676), dec!(4.123106), dec!(4.153312), dec!(4.183300), dec!(4.213075),
    dec!(4.242641), dec!(4.272002), dec!(4.301163), dec!(4.330127), dec!(4.358899), dec!(4.387482),
    dec!(4.415880), dec!(4.444097), dec!(4.472136), dec!(4.500000), dec!(4.527693), dec!(4.555217),
    dec!(4.582576), dec!(4.609772), dec!(4.636809), dec!(4.663690), dec!(4.690416), dec!(4.716991),
    dec!(4.743416), dec!(4.769696), dec!(4.795832), dec!(4.821825), dec!(4.847680), dec!(4.873397),
    dec!(4.898979), dec!(4.924429), dec!(4.949747), dec!(4.974937), dec!(5.000000),
];
fn lookup(table: &[Decimal; TABLE_LEN], index: u64) -> Decimal {
    let i = usize::try_from(index).unwrap_or(MAX_TABLE_INDEX).min(MAX_TABLE_INDEX);
    table[i]
}

/// Tolerance for a candidate stop `percent_difference` percent away from the original.
pub fn tolerance_for_percent_difference(percent_difference: u64) -> PercentNumber {
    PercentNumber::from_percent(lookup(&LN_DISTANCE, percent_difference))
}

/// Tolerance for a permutation `iterations` ladder steps from the reference.
pub fn tolerance_for_iterations(iterations: u64) -> PercentNumber {
    PercentNumber::from_percent(lookup(&SQRT_ITERATIONS, iterations))
}

/// Payoff ratio tolerance for a permutation with `num_trades` trades.
pub fn tolerance_for_num_trades(num_trades: u64) -> PercentNumber {
    PercentNumber::from_percent(lookup(&HALF_SQRT_TRADES, num_trades))
}

/// Multiplicative factor mirror of [`tolerance_for_percent_difference`].
pub fn decimal_tolerance_for_percent_difference(percent_difference: u64) -> Decimal {
    lookup(&LN_DISTANCE, percent_difference)
}

/// Multiplicative factor mirror of [`tolerance_for_iterations`].
pub fn decimal_tolerance_for_iterations(iterations: u64) -> Decimal {
    lookup(&SQRT_ITERATIONS, iterations)
}

/// Combined tolerance for a permutation `iterations` steps from the reference
/// whose stop is `candidate_stop`: the distance factor of
/// `|percent_return(original_stop, candidate_stop)|` (truncated) times the
/// iteration factor, read as a percent.
pub fn tolerance_for_distance_and_iterations(
    original_stop: Decimal,
    candidate_stop: Decimal,
    iterations: u64,
) -> PercentNumber {
    let distance = to_index(percent_return(original_stop, candidate_stop).abs());
    PercentNumber::from_percent(
        decimal_tolerance_for_percent_difference(distance) * decimal_tolerance_for_iterations(iterations),
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floors_at_the_low_end() {
        assert_eq!(tolerance_for_percent_difference(0).percent(), dec!(1));
        assert_eq!(tolerance_for_percent_difference(1).percent(), dec!(1));
        assert_eq!(tolerance_for_iterations(0).percent(), dec!(1));
        for k in 1..=4 {
            assert_eq!(tolerance_for_iterations(k).percent(), dec!(2));
        }
        assert_eq!(tolerance_for_num_trades(0).percent(), Decimal::ZERO);
    }

    #[test]
    fn clamps_past_the_end() {
        assert_eq!(tolerance_for_iterations(150), tolerance_for_iterations(100));
        assert_eq!(tolerance_for_num_trades(u64::MAX).percent(), dec!(5));
        assert_eq!(tolerance_for_percent_difference(1_000).percent(), dec!(4.61512));
    }

    #[test]
    fn tables_are_monotonic() {
        for table in [&LN_DISTANCE, &SQRT_ITERATIONS, &HALF_SQRT_TRADES] {
            assert!(table.windows(2).all(|w| w[0] <= w[1]));
        }
    }

    #[test]
    fn sample_entries() {
        assert_eq!(tolerance_for_iterations(6).percent(), dec!(2.449490));
        assert_eq!(tolerance_for_num_trades(50).percent(), dec!(3.535534));
        assert_eq!(decimal_tolerance_for_percent_difference(6), dec!(1.94591));
    }

    #[test]
    fn combined_tolerance() {
        // 2.0 -> 2.125 is 6.25%, truncated to 6.
        let tol = tolerance_for_distance_and_iterations(dec!(2.0), dec!(2.125), 1);
        assert_eq!(tol.percent(), dec!(1.94591) * dec!(2));
        // Same stop: distance 0, one step.
        let tol = tolerance_for_distance_and_iterations(dec!(2.0), dec!(2.0), 0);
        assert_eq!(tol.percent(), dec!(1));
    }
}
