//! Pattern expression tree.
//!
//! A price-action pattern is a conjunction of bar comparisons such as
//! `close[0] > high[1] AND low[1] > low[2]`, where the bracketed number is the
//! offset back from the bar being evaluated.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;

use crate::domain::Bar;

/// Errors from parsing or building pattern expressions.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum ExpressionError {
    #[error("unknown price component '{0}' (expected open, high, low or close)")]
    UnknownComponent(String),
    #[error("malformed bar reference '{0}' (expected e.g. close[1])")]
    MalformedReference(String),
    #[error("pattern expression must contain at least one comparison")]
    Empty,
}

/// Which price of a bar a reference reads.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PriceComponent {
    Open,
    High,
    Low,
    Close,
}

impl PriceComponent {
    fn read(&self, bar: &Bar) -> Decimal {
        match self {
            PriceComponent::Open => bar.open,
            PriceComponent::High => bar.high,
            PriceComponent::Low => bar.low,
            PriceComponent::Close => bar.close,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            PriceComponent::Open => "open",
            PriceComponent::High => "high",
            PriceComponent::Low => "low",
            PriceComponent::Close => "close",
        }
    }
}

/// A price component read `offset` bars back from the evaluation bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct PriceBarReference {
    pub component: PriceComponent,
    pub offset: usize,
}

impl PriceBarReference {
    pub fn new(component: PriceComponent, offset: usize) -> Self {
        Self { component, offset }
    }

    pub fn open(offset: usize) -> Self {
        Self::new(PriceComponent::Open, offset)
    }

    pub fn high(offset: usize) -> Self {
        Self::new(PriceComponent::High, offset)
    }

    pub fn low(offset: usize) -> Self {
        Self::new(PriceComponent::Low, offset)
    }

    pub fn close(offset: usize) -> Self {
        Self::new(PriceComponent::Close, offset)
    }

    /// Value at `index - offset`, or `None` when there is not enough history.
    pub fn value(&self, bars: &[Bar], index: usize) -> Option<Decimal> {
        let at = index.checked_sub(self.offset)?;
        bars.get(at).map(|bar| self.component.read(bar))
    }
}

impl fmt::Display for PriceBarReference {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}[{}]", self.component.name(), self.offset)
    }
}

impl FromStr for PriceBarReference {
    type Err = ExpressionError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let malformed = || ExpressionError::MalformedReference(trimmed.to_string());

        let (name, rest) = trimmed.split_once('[').ok_or_else(malformed)?;
        let digits = rest.strip_suffix(']').ok_or_else(malformed)?;
        let offset: usize = digits.trim().parse().map_err(|_| malformed())?;

        let component = match name.trim().to_ascii_lowercase().as_str() {
            "open" | "o" => PriceComponent::Open,
            "high" | "h" => PriceComponent::High,
            "low" | "l" => PriceComponent::Low,
            "close" | "c" => PriceComponent::Close,
            other => return Err(ExpressionError::UnknownComponent(other.to_string())),
        };

        Ok(Self { component, offset })
    }
}

impl TryFrom<String> for PriceBarReference {
    type Error = ExpressionError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<PriceBarReference> for String {
    fn from(value: PriceBarReference) -> Self {
        value.to_string()
    }
}

/// Boolean expression over bar references.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatternExpression {
    GreaterThan(PriceBarReference, PriceBarReference),
    And(Box<PatternExpression>, Box<PatternExpression>),
}

impl PatternExpression {
    pub fn greater_than(lhs: PriceBarReference, rhs: PriceBarReference) -> Self {
        PatternExpression::GreaterThan(lhs, rhs)
    }

    pub fn and(lhs: PatternExpression, rhs: PatternExpression) -> Self {
        PatternExpression::And(Box::new(lhs), Box::new(rhs))
    }

    /// Fold a list of `lhs > rhs` comparisons into a left-leaning conjunction.
    pub fn conjunction(
        comparisons: impl IntoIterator<Item = (PriceBarReference, PriceBarReference)>,
    ) -> Result<Self, ExpressionError> {
        let mut iter = comparisons.into_iter();
        let (lhs, rhs) = iter.next().ok_or(ExpressionError::Empty)?;
        let first = PatternExpression::greater_than(lhs, rhs);
        Ok(iter.fold(first, |acc, (lhs, rhs)| {
            PatternExpression::and(acc, PatternExpression::greater_than(lhs, rhs))
        }))
    }

    /// Deepest bar offset referenced anywhere in the expression.
    pub fn max_bars_back(&self) -> usize {
        match self {
            PatternExpression::GreaterThan(lhs, rhs) => lhs.offset.max(rhs.offset),
            PatternExpression::And(lhs, rhs) => lhs.max_bars_back().max(rhs.max_bars_back()),
        }
    }

    /// Evaluate at `index`. Missing history evaluates to false.
    pub fn evaluate(&self, bars: &[Bar], index: usize) -> bool {
        match self {
            PatternExpression::GreaterThan(lhs, rhs) => {
                match (lhs.value(bars, index), rhs.value(bars, index)) {
                    (Some(l), Some(r)) => l > r,
                    _ => false,
                }
            }
            PatternExpression::And(lhs, rhs) => {
                lhs.evaluate(bars, index) && rhs.evaluate(bars, index)
            }
        }
    }
}

impl fmt::Display for PatternExpression {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PatternExpression::GreaterThan(lhs, rhs) => write!(f, "{lhs} > {rhs}"),
            PatternExpression::And(lhs, rhs) => write!(f, "{lhs} AND {rhs}"),
        }
    }
}
