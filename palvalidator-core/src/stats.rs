//! Robust summary statistics over decimal samples.
//!
//! The Qn scale estimator follows Croux & Rousseeuw (1992): the k-th order
//! statistic of the pairwise absolute differences, `k = h(h-1)/2` with
//! `h = n/2 + 1`, scaled for consistency at the normal and corrected for small
//! samples.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

/// Normal consistency constant for Qn.
const QN_CONSISTENCY: Decimal = dec!(2.21914);

/// Median of `values`. Even counts average the two middle values.
pub fn median(values: &[Decimal]) -> Option<Decimal> {
    if values.is_empty() {
        return None;
    }
    let mut sorted = values.to_vec();
    sorted.sort();
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        Some((sorted[mid - 1] + sorted[mid]) / Decimal::TWO)
    } else {
        Some(sorted[mid])
    }
}

fn small_sample_factor(n: usize) -> Decimal {
    if n <= 9 {
        match n {
            2 => dec!(0.399),
            3 => dec!(0.994),
            4 => dec!(0.512),
            5 => dec!(0.844),
            6 => dec!(0.611),
            7 => dec!(0.857),
            8 => dec!(0.669),
            _ => dec!(0.872),
        }
    } else {
        let n = Decimal::from(n);
        if n % Decimal::TWO == Decimal::ONE {
            n / (n + dec!(1.4))
        } else {
            n / (n + dec!(3.8))
        }
    }
}

/// Qn robust scale estimate. Fewer than two values yields zero.
pub fn robust_qn(values: &[Decimal]) -> Decimal {
    let n = values.len();
    if n < 2 {
        return Decimal::ZERO;
    }

    let mut diffs = Vec::with_capacity(n * (n - 1) / 2);
    for (i, a) in values.iter().enumerate() {
        for b in &values[i + 1..] {
            diffs.push((*a - *b).abs());
        }
    }
    diffs.sort();

    let h = n / 2 + 1;
    let k = h * (h - 1) / 2;
    let kth = diffs[k.clamp(1, diffs.len()) - 1];

    small_sample_factor(n) * QN_CONSISTENCY * kth
}

/// Accumulates a sample and reports robust location and scale.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SummaryStats {
    values: Vec<Decimal>,
}

impl SummaryStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_value(&mut self, value: Decimal) {
        self.values.push(value);
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn values(&self) -> &[Decimal] {
        &self.values
    }

    /// Median, or zero when empty.
    pub fn median(&self) -> Decimal {
        median(&self.values).unwrap_or(Decimal::ZERO)
    }

    pub fn robust_qn(&self) -> Decimal {
        robust_qn(&self.values)
    }

    /// Smallest value, or zero when empty.
    pub fn smallest(&self) -> Decimal {
        self.values.iter().copied().min().unwrap_or(Decimal::ZERO)
    }

    /// Largest value, or zero when empty.
    pub fn largest(&self) -> Decimal {
        self.values.iter().copied().max().unwrap_or(Decimal::ZERO)
    }
}

impl Extend<Decimal> for SummaryStats {
    fn extend<T: IntoIterator<Item = Decimal>>(&mut self, iter: T) {
        self.values.extend(iter);
    }
}
