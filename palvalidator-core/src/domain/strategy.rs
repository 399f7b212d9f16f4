//! Strategy wrapper: a price pattern traded over a portfolio.

use serde::{Deserialize, Serialize};
use std::sync::Arc;

use crate::pattern::PricePattern;

/// The securities a strategy trades.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Portfolio {
    pub name: String,
    pub symbols: Vec<String>,
}

impl Portfolio {
    pub fn single(name: impl Into<String>, symbol: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            symbols: vec![symbol.into()],
        }
    }

    pub fn contains(&self, symbol: &str) -> bool {
        self.symbols.iter().any(|s| s == symbol)
    }
}

/// A price pattern traded long or short (direction follows the pattern).
///
/// Pattern and portfolio are shared; cloning a strategy never copies them.
#[derive(Debug, Clone, PartialEq)]
pub struct PalStrategy {
    name: String,
    pattern: Arc<PricePattern>,
    portfolio: Arc<Portfolio>,
}

impl PalStrategy {
    pub fn new(name: impl Into<String>, pattern: Arc<PricePattern>, portfolio: Arc<Portfolio>) -> Self {
        Self {
            name: name.into(),
            pattern,
            portfolio,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn pattern(&self) -> &Arc<PricePattern> {
        &self.pattern
    }

    pub fn portfolio(&self) -> &Arc<Portfolio> {
        &self.portfolio
    }

    pub fn is_long(&self) -> bool {
        self.pattern.is_long()
    }

    pub fn is_short(&self) -> bool {
        !self.is_long()
    }

    /// Same name and portfolio, trading `pattern` instead.
    pub fn with_pattern(&self, pattern: Arc<PricePattern>) -> Self {
        Self {
            name: self.name.clone(),
            pattern,
            portfolio: Arc::clone(&self.portfolio),
        }
    }

    /// A copy ready to attach to a fresh backtester.
    ///
    /// Strategies carry no run state, so this is a cheap handle copy.
    pub fn clone_for_backtesting(&self) -> Self {
        self.clone()
    }
}
