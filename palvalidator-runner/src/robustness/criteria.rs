//! Robustness criteria and permutation ladder attributes.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use palvalidator_core::PercentNumber;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum CriteriaError {
    #[error("minimum robustness index must be within 0..=100, got {0}")]
    RobustnessIndexOutOfRange(Decimal),
    #[error("desired profit factor must be positive, got {0}")]
    NonPositiveProfitFactor(Decimal),
    #[error("robustness tolerance must not be negative, got {0}")]
    NegativeTolerance(Decimal),
    #[error("profitability safety factor must be within (0, 1], got {0}")]
    SafetyFactorOutOfRange(Decimal),
}

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PermutationError {
    #[error("below ({below}) + above ({above}) + 1 must equal the permutation count ({total})")]
    CountMismatch { total: u32, below: u32, above: u32 },
    #[error("permutation divisor must be positive")]
    ZeroDivisor,
}

/// Acceptance thresholds for one robustness run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RobustnessCriteria {
    /// Minimum share of permutations with profit factor above 1.
    pub min_robustness_index: PercentNumber,
    pub desired_profit_factor: Decimal,
    /// Base tolerance for PAL-profitability counting.
    pub robustness_tolerance: PercentNumber,
    /// Discount on the payoff ratio for commission and slippage.
    pub profitability_safety_factor: Decimal,
}

impl RobustnessCriteria {
    pub fn new(
        min_robustness_index: PercentNumber,
        desired_profit_factor: Decimal,
        robustness_tolerance: PercentNumber,
        profitability_safety_factor: Decimal,
    ) -> Result<Self, CriteriaError> {
        let criteria = Self {
            min_robustness_index,
            desired_profit_factor,
            robustness_tolerance,
            profitability_safety_factor,
        };
        criteria.validate()?;
        Ok(criteria)
    }

    /// 70% robustness index, profit factor 2.0, 2% tolerance, 0.9 safety factor.
    pub fn standard() -> Self {
        Self {
            min_robustness_index: PercentNumber::from_percent(dec!(70.0)),
            desired_profit_factor: dec!(2.0),
            robustness_tolerance: PercentNumber::from_percent(dec!(2.0)),
            profitability_safety_factor: dec!(0.9),
        }
    }

    pub fn validate(&self) -> Result<(), CriteriaError> {
        let index = self.min_robustness_index.percent();
        if index < Decimal::ZERO || index > Decimal::ONE_HUNDRED {
            return Err(CriteriaError::RobustnessIndexOutOfRange(index));
        }
        if self.desired_profit_factor <= Decimal::ZERO {
            return Err(CriteriaError::NonPositiveProfitFactor(self.desired_profit_factor));
        }
        if self.robustness_tolerance.percent() < Decimal::ZERO {
            return Err(CriteriaError::NegativeTolerance(self.robustness_tolerance.percent()));
        }
        let safety = self.profitability_safety_factor;
        if safety <= Decimal::ZERO || safety > Decimal::ONE {
            return Err(CriteriaError::SafetyFactorOutOfRange(safety));
        }
        Ok(())
    }
}

impl Default for RobustnessCriteria {
    fn default() -> Self {
        Self::standard()
    }
}

/// Shape of the permutation ladder around the reference stop.
///
/// Deserialized values go through [`PermutationAttributes::validate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "RawPermutationAttributes")]
pub struct PermutationAttributes {
    number_of_permutations: u32,
    below_ref_permutations: u32,
    above_ref_permutations: u32,
    permutations_divisor: u32,
    num_entries_to_test_at_beginning: u32,
    num_entries_to_test_at_end: u32,
}

#[derive(Deserialize)]
struct RawPermutationAttributes {
    number_of_permutations: u32,
    below_ref_permutations: u32,
    above_ref_permutations: u32,
    permutations_divisor: u32,
    num_entries_to_test_at_beginning: u32,
    num_entries_to_test_at_end: u32,
}

impl TryFrom<RawPermutationAttributes> for PermutationAttributes {
    type Error = PermutationError;

    fn try_from(raw: RawPermutationAttributes) -> Result<Self, Self::Error> {
        let attrs = Self {
            number_of_permutations: raw.number_of_permutations,
            below_ref_permutations: raw.below_ref_permutations,
            above_ref_permutations: raw.above_ref_permutations,
            permutations_divisor: raw.permutations_divisor,
            num_entries_to_test_at_beginning: raw.num_entries_to_test_at_beginning,
            num_entries_to_test_at_end: raw.num_entries_to_test_at_end,
        };
        attrs.validate()?;
        Ok(attrs)
    }
}

impl PermutationAttributes {
    pub fn new(
        below_ref_permutations: u32,
        above_ref_permutations: u32,
        permutations_divisor: u32,
        num_entries_to_test_at_beginning: u32,
        num_entries_to_test_at_end: u32,
    ) -> Result<Self, PermutationError> {
        let attrs = Self {
            number_of_permutations: below_ref_permutations + above_ref_permutations + 1,
            below_ref_permutations,
            above_ref_permutations,
            permutations_divisor,
            num_entries_to_test_at_beginning,
            num_entries_to_test_at_end,
        };
        attrs.validate()?;
        Ok(attrs)
    }

    /// 19 permutations: 14 below, 4 above, stop / 16 per step.
    pub fn pal() -> Self {
        Self {
            number_of_permutations: 19,
            below_ref_permutations: 14,
            above_ref_permutations: 4,
            permutations_divisor: 16,
            num_entries_to_test_at_beginning: 2,
            num_entries_to_test_at_end: 2,
        }
    }

    /// 30 permutations: 15 below, 14 above, stop / 30 per step.
    pub fn stat_significant() -> Self {
        Self {
            number_of_permutations: 30,
            below_ref_permutations: 15,
            above_ref_permutations: 14,
            permutations_divisor: 30,
            num_entries_to_test_at_beginning: 3,
            num_entries_to_test_at_end: 3,
        }
    }

    pub fn validate(&self) -> Result<(), PermutationError> {
        let derived = u64::from(self.below_ref_permutations) + u64::from(self.above_ref_permutations) + 1;
        if derived != u64::from(self.number_of_permutations) {
            return Err(PermutationError::CountMismatch {
                total: self.number_of_permutations,
                below: self.below_ref_permutations,
                above: self.above_ref_permutations,
            });
        }
        if self.permutations_divisor == 0 {
            return Err(PermutationError::ZeroDivisor);
        }
        Ok(())
    }

    pub fn number_of_permutations(&self) -> u32 {
        self.number_of_permutations
    }

    pub fn below_ref_permutations(&self) -> u32 {
        self.below_ref_permutations
    }

    pub fn above_ref_permutations(&self) -> u32 {
        self.above_ref_permutations
    }

    pub fn permutations_divisor(&self) -> u32 {
        self.permutations_divisor
    }

    pub fn num_entries_to_test_at_beginning(&self) -> u32 {
        self.num_entries_to_test_at_beginning
    }

    pub fn num_entries_to_test_at_end(&self) -> u32 {
        self.num_entries_to_test_at_end
    }
}
