//! Fixed-precision decimal helpers.
//!
//! All money values, percentages and ratios flow through `rust_decimal::Decimal`.
//! This module adds the percent wrapper used by tolerance tables and a few
//! conversions the robustness engine needs.

use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Number of fractional digits carried by pattern stop/target literals.
pub const PATTERN_DECIMAL_PLACES: u32 = 7;

/// A percentage such as `2%`, stored as the percent value (`2.0`).
///
/// `as_fraction()` yields the value used in arithmetic (`0.02`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PercentNumber(Decimal);

impl PercentNumber {
    /// Build from a percent value: `from_percent(dec!(2.0))` is 2%.
    pub const fn from_percent(percent: Decimal) -> Self {
        Self(percent)
    }

    /// Build from a fraction: `from_fraction(dec!(0.02))` is 2%.
    pub fn from_fraction(fraction: Decimal) -> Self {
        Self(fraction * Decimal::ONE_HUNDRED)
    }

    /// The percent value (`2.0` for 2%).
    pub fn percent(&self) -> Decimal {
        self.0
    }

    /// The fractional value (`0.02` for 2%).
    pub fn as_fraction(&self) -> Decimal {
        self.0 / Decimal::ONE_HUNDRED
    }
}

impl fmt::Display for PercentNumber {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.0)
    }
}

/// Percent change from `reference` to `candidate`: `(candidate - reference) / reference * 100`.
///
/// Returns zero when `reference` is zero.
pub fn percent_return(reference: Decimal, candidate: Decimal) -> Decimal {
    if reference.is_zero() {
        return Decimal::ZERO;
    }
    ((candidate - reference) / reference) * Decimal::ONE_HUNDRED
}

/// Truncate a non-negative decimal to an unsigned integer index.
///
/// Negative values map to zero; values beyond `u64` saturate.
pub fn to_index(value: Decimal) -> u64 {
    if value.is_sign_negative() {
        return 0;
    }
    value.trunc().to_u64().unwrap_or(u64::MAX)
}

/// Round a literal to the precision carried by pattern expressions.
pub fn round_literal(value: Decimal) -> Decimal {
    value.round_dp(PATTERN_DECIMAL_PLACES)
}

/// Lossy conversion for logging and display.
pub fn to_f64(value: Decimal) -> f64 {
    value.to_f64().unwrap_or(f64::NAN)
}

/// One and a half, the median profit factor floor.
pub const ONE_POINT_FIVE: Decimal = dec!(1.5);
