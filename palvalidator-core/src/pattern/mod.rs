//! Price-action patterns: an entry expression plus percent profit target and stop.

pub mod ast;

pub use ast::{ExpressionError, PatternExpression, PriceBarReference, PriceComponent};

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::decimal::round_literal;
use crate::domain::PositionSide;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum PatternError {
    #[error("stop loss must be positive, got {0}")]
    NonPositiveStop(Decimal),
    #[error("profit target must be positive, got {0}")]
    NonPositiveTarget(Decimal),
    #[error(transparent)]
    Expression(#[from] ExpressionError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    Long,
    Short,
}

impl Direction {
    pub fn side(&self) -> PositionSide {
        match self {
            Direction::Long => PositionSide::Long,
            Direction::Short => PositionSide::Short,
        }
    }
}

/// Where the pattern came from. Diagnostic only.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PatternDescription {
    pub index: u32,
    pub index_date: NaiveDate,
}

/// An entry expression with percent exits.
///
/// Target and stop are held at literal precision; the payoff ratio is
/// `target / stop` at the same precision.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PricePattern {
    description: PatternDescription,
    direction: Direction,
    expression: PatternExpression,
    profit_target: Decimal,
    stop_loss: Decimal,
    payoff_ratio: Decimal,
}

impl PricePattern {
    pub fn new(
        description: PatternDescription,
        direction: Direction,
        expression: PatternExpression,
        profit_target: Decimal,
        stop_loss: Decimal,
    ) -> Result<Self, PatternError> {
        let profit_target = round_literal(profit_target);
        let stop_loss = round_literal(stop_loss);
        if stop_loss <= Decimal::ZERO {
            return Err(PatternError::NonPositiveStop(stop_loss));
        }
        if profit_target <= Decimal::ZERO {
            return Err(PatternError::NonPositiveTarget(profit_target));
        }
        Ok(Self {
            description,
            direction,
            expression,
            profit_target,
            stop_loss,
            payoff_ratio: round_literal(profit_target / stop_loss),
        })
    }

    /// Same description, direction and expression with new exit literals.
    pub fn with_exits(&self, profit_target: Decimal, stop_loss: Decimal) -> Result<Self, PatternError> {
        Self::new(
            self.description,
            self.direction,
            self.expression.clone(),
            profit_target,
            stop_loss,
        )
    }

    pub fn description(&self) -> &PatternDescription {
        &self.description
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn is_long(&self) -> bool {
        self.direction == Direction::Long
    }

    pub fn is_short(&self) -> bool {
        self.direction == Direction::Short
    }

    pub fn expression(&self) -> &PatternExpression {
        &self.expression
    }

    pub fn profit_target(&self) -> Decimal {
        self.profit_target
    }

    pub fn stop_loss(&self) -> Decimal {
        self.stop_loss
    }

    pub fn payoff_ratio(&self) -> Decimal {
        self.payoff_ratio
    }

    pub fn max_bars_back(&self) -> usize {
        self.expression.max_bars_back()
    }

    /// Stable 64-bit identity over description, direction, expression and exits.
    ///
    /// Scale-insensitive: `2.0` and `2.0000000` hash alike.
    pub fn hash_code(&self) -> u64 {
        let mut hasher = blake3::Hasher::new();
        hasher.update(&self.description.index.to_le_bytes());
        hasher.update(self.description.index_date.to_string().as_bytes());
        hasher.update(&[self.direction as u8]);
        hasher.update(self.expression.to_string().as_bytes());
        hasher.update(self.profit_target.normalize().to_string().as_bytes());
        hasher.update(b"|");
        hasher.update(self.stop_loss.normalize().to_string().as_bytes());
        let hash = hasher.finalize();
        let mut bytes = [0u8; 8];
        bytes.copy_from_slice(&hash.as_bytes()[..8]);
        u64::from_le_bytes(bytes)
    }
}

#[cfg(test)]
pub(crate) mod test_support {
    use super::*;

    pub fn description() -> PatternDescription {
        PatternDescription {
            index: 1,
            index_date: NaiveDate::from_ymd_opt(2019, 3, 4).unwrap(),
        }
    }

    pub fn higher_close() -> PatternExpression {
        PatternExpression::greater_than(PriceBarReference::close(0), PriceBarReference::close(1))
    }

    pub fn long_pattern(target: Decimal, stop: Decimal) -> PricePattern {
        PricePattern::new(description(), Direction::Long, higher_close(), target, stop).unwrap()
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::*;
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn payoff_ratio_at_literal_precision() {
        let p = long_pattern(dec!(2), dec!(3));
        assert_eq!(p.payoff_ratio(), dec!(0.6666667));
        assert_eq!(long_pattern(dec!(2.0), dec!(2.0)).payoff_ratio(), dec!(1));
    }

    #[test]
    fn literals_rounded() {
        let p = long_pattern(dec!(1.123456789), dec!(1));
        assert_eq!(p.profit_target(), dec!(1.1234568));
    }

    #[test]
    fn rejects_non_positive_exits() {
        let expr = higher_close();
        assert_eq!(
            PricePattern::new(description(), Direction::Long, expr.clone(), dec!(1), dec!(0)),
            Err(PatternError::NonPositiveStop(dec!(0)))
        );
        assert!(matches!(
            PricePattern::new(description(), Direction::Short, expr, dec!(-1), dec!(1)),
            Err(PatternError::NonPositiveTarget(_))
        ));
    }

    #[test]
    fn with_exits_keeps_identity_fields() {
        let p = long_pattern(dec!(2), dec!(1));
        let q = p.with_exits(dec!(3), dec!(1.5)).unwrap();
        assert_eq!(q.expression(), p.expression());
        assert_eq!(q.description(), p.description());
        assert_eq!(q.payoff_ratio(), dec!(2));
        assert_ne!(q.hash_code(), p.hash_code());
    }

    #[test]
    fn hash_code_ignores_scale() {
        let a = long_pattern(dec!(2.0), dec!(1.0));
        let b = long_pattern(dec!(2.0000000), dec!(1));
        assert_eq!(a.hash_code(), b.hash_code());
    }

    #[test]
    fn hash_code_tracks_direction() {
        let long = long_pattern(dec!(2), dec!(1));
        let short = PricePattern::new(description(), Direction::Short, higher_close(), dec!(2), dec!(1)).unwrap();
        assert_ne!(long.hash_code(), short.hash_code());
    }
}
