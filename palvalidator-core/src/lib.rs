//! PAL Validator Core: domain types and the collaborators robustness validation consumes.
//!
//! This crate contains:
//! - Fixed-precision decimal helpers (percent numbers, percent return)
//! - Bars, bar series and a deterministic synthetic generator
//! - The price-action pattern AST and `PricePattern`
//! - Strategies, trading positions and per-instrument position state
//! - Closed position history and robust statistics (median, Qn)
//! - The `BackTester` seam with a bar-by-bar pattern backtester

pub mod backtest;
pub mod decimal;
pub mod domain;
pub mod history;
pub mod pattern;
pub mod stats;
pub mod synthetic;

pub use backtest::{BackTester, BacktestError, PatternBackTester};
pub use decimal::PercentNumber;
pub use history::ClosedPositionHistory;
pub use pattern::{Direction, PatternDescription, PatternError, PricePattern};
pub use stats::SummaryStats;
