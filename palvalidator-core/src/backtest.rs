//! Backtesting seam and the bar-by-bar pattern backtester.
//!
//! Per bar, for each attached strategy:
//! 1. Entry: a signal from the previous close fills at this bar's open
//! 2. Intrabar: stop is checked before target; exits fill at the level
//! 3. Signal: when flat, evaluate the pattern at this bar's close
//!
//! A position still open after the last bar is closed at the last close.

use rust_decimal::Decimal;
use std::sync::Arc;
use thiserror::Error;
use tracing::debug;

use crate::domain::{
    Bar, BarSeries, InstrumentPosition, PalStrategy, PositionError, PositionSide, TradingPosition,
};
use crate::history::ClosedPositionHistory;

#[derive(Debug, Error, Clone, PartialEq)]
pub enum BacktestError {
    #[error("no strategy attached to backtester")]
    NoStrategy,
    #[error("bar series for {0} is empty")]
    EmptySeries(String),
    #[error("strategy '{strategy}' does not trade {symbol}")]
    SymbolNotInPortfolio { strategy: String, symbol: String },
    #[error(transparent)]
    Position(#[from] PositionError),
}

/// A backtesting engine the robustness sweep drives.
///
/// Every permutation works on its own `clone_box()` copy, so implementations
/// must make clones independent of each other.
pub trait BackTester: Send + Sync {
    fn clone_box(&self) -> Box<dyn BackTester>;

    fn add_strategy(&mut self, strategy: PalStrategy);

    /// Run every attached strategy, replacing any previous history.
    fn backtest(&mut self) -> Result<(), BacktestError>;

    fn closed_position_history(&self) -> &ClosedPositionHistory;
}

impl Clone for Box<dyn BackTester> {
    fn clone(&self) -> Self {
        self.clone_box()
    }
}

/// Exit levels for an open position, as prices.
#[derive(Debug, Clone, Copy)]
struct ExitLevels {
    stop: Decimal,
    target: Decimal,
}

impl ExitLevels {
    fn new(side: PositionSide, entry: Decimal, target_pct: Decimal, stop_pct: Decimal) -> Self {
        let target_move = entry * target_pct / Decimal::ONE_HUNDRED;
        let stop_move = entry * stop_pct / Decimal::ONE_HUNDRED;
        match side {
            PositionSide::Long => Self {
                stop: entry - stop_move,
                target: entry + target_move,
            },
            PositionSide::Short => Self {
                stop: entry + stop_move,
                target: entry - target_move,
            },
        }
    }

    /// Fill price if `bar` touches an exit. Stop wins when both are touched.
    fn hit(&self, side: PositionSide, bar: &Bar) -> Option<Decimal> {
        let (stop_hit, target_hit) = match side {
            PositionSide::Long => (bar.low <= self.stop, bar.high >= self.target),
            PositionSide::Short => (bar.high >= self.stop, bar.low <= self.target),
        };
        if stop_hit {
            Some(self.stop)
        } else if target_hit {
            Some(self.target)
        } else {
            None
        }
    }
}

/// Backtests price patterns over one shared bar series.
#[derive(Debug, Clone)]
pub struct PatternBackTester {
    series: Arc<BarSeries>,
    strategies: Vec<PalStrategy>,
    history: ClosedPositionHistory,
}

impl PatternBackTester {
    pub fn new(series: Arc<BarSeries>) -> Self {
        Self {
            series,
            strategies: Vec::new(),
            history: ClosedPositionHistory::new(),
        }
    }

    pub fn series(&self) -> &Arc<BarSeries> {
        &self.series
    }

    pub fn strategies(&self) -> &[PalStrategy] {
        &self.strategies
    }

    fn run_strategy(&self, strategy: &PalStrategy) -> Result<Vec<TradingPosition>, BacktestError> {
        let bars = &self.series.bars;
        let pattern = strategy.pattern();
        let side = pattern.direction().side();
        let mut position = InstrumentPosition::new(self.series.symbol.clone());
        let mut closed = Vec::new();
        let mut levels: Option<ExitLevels> = None;
        let mut pending_entry = false;

        for (i, bar) in bars.iter().enumerate() {
            if pending_entry {
                pending_entry = false;
                let exit_levels =
                    ExitLevels::new(side, bar.open, pattern.profit_target(), pattern.stop_loss());
                let entry = TradingPosition::open(side, bar.date, bar.open)?
                    .with_r_multiple_stop(exit_levels.stop);
                position.add_position(entry)?;
                levels = Some(exit_levels);
            } else if !position.is_flat() {
                position.add_bar();
            }

            if let Some(exit_levels) = levels {
                if let Some(price) = exit_levels.hit(side, bar) {
                    closed.extend(position.close_all(bar.date, price)?);
                    levels = None;
                }
            }

            if position.is_flat() && i + 1 < bars.len() && pattern.expression().evaluate(bars, i) {
                pending_entry = true;
            }
        }

        if !position.is_flat() {
            if let Some(last) = bars.last() {
                closed.extend(position.close_all(last.date, last.close)?);
            }
        }

        Ok(closed)
    }
}

impl BackTester for PatternBackTester {
    fn clone_box(&self) -> Box<dyn BackTester> {
        Box::new(Self {
            series: Arc::clone(&self.series),
            strategies: self.strategies.clone(),
            history: ClosedPositionHistory::new(),
        })
    }

    fn add_strategy(&mut self, strategy: PalStrategy) {
        self.strategies.push(strategy);
    }

    fn backtest(&mut self) -> Result<(), BacktestError> {
        if self.strategies.is_empty() {
            return Err(BacktestError::NoStrategy);
        }
        if self.series.is_empty() {
            return Err(BacktestError::EmptySeries(self.series.symbol.clone()));
        }

        let mut history = ClosedPositionHistory::new();
        for strategy in &self.strategies {
            if !strategy.portfolio().contains(&self.series.symbol) {
                return Err(BacktestError::SymbolNotInPortfolio {
                    strategy: strategy.name().to_string(),
                    symbol: self.series.symbol.clone(),
                });
            }
            for pos in self.run_strategy(strategy)? {
                history.add_closed_position(pos)?;
            }
            debug!(
                strategy = strategy.name(),
                stop = %strategy.pattern().stop_loss(),
                target = %strategy.pattern().profit_target(),
                trades = history.num_positions(),
                "backtest complete"
            );
        }
        self.history = history;
        Ok(())
    }

    fn closed_position_history(&self) -> &ClosedPositionHistory {
        &self.history
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Portfolio;
    use crate::pattern::test_support::{description, higher_close};
    use crate::pattern::{Direction, PricePattern};
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn bar(day: u32, o: Decimal, h: Decimal, l: Decimal, c: Decimal) -> Bar {
        Bar::new(NaiveDate::from_ymd_opt(2024, 1, day).unwrap(), o, h, l, c)
    }

    fn series() -> Arc<BarSeries> {
        Arc::new(BarSeries::new(
            "SYN",
            vec![
                bar(1, dec!(100), dec!(101), dec!(99), dec!(100)),
                // higher close -> signal
                bar(2, dec!(100), dec!(102), dec!(99), dec!(101)),
                // entry at 101; target 2% = 103.02 hit; higher close -> signal
                bar(3, dec!(101), dec!(104), dec!(100.5), dec!(103)),
                // entry at 104; stop 1% = 102.96 hit
                bar(4, dec!(104), dec!(104.5), dec!(102), dec!(102.5)),
                bar(5, dec!(102.5), dec!(103), dec!(102), dec!(102.4)),
                bar(8, dec!(102.4), dec!(103), dec!(102), dec!(102.6)),
            ],
        ))
    }

    fn strategy(direction: Direction, target: Decimal, stop: Decimal) -> PalStrategy {
        let pattern = PricePattern::new(description(), direction, higher_close(), target, stop).unwrap();
        PalStrategy::new(
            "test",
            Arc::new(pattern),
            Arc::new(Portfolio::single("syn", "SYN")),
        )
    }

    #[test]
    fn long_target_then_stop() {
        let mut bt = PatternBackTester::new(series());
        bt.add_strategy(strategy(Direction::Long, dec!(2), dec!(1)));
        bt.backtest().unwrap();
        let history = bt.closed_position_history();
        assert_eq!(history.num_positions(), 2);
        assert_eq!(history.num_winners(), 1);
        assert_eq!(history.num_losers(), 1);
        let returns = history.percent_returns();
        assert_eq!(returns[0], dec!(2));
        assert_eq!(returns[1], dec!(-1));
    }

    #[test]
    fn open_position_closed_at_last_close() {
        let mut bt = PatternBackTester::new(series());
        // Exits far away: the first trade never exits intrabar.
        bt.add_strategy(strategy(Direction::Long, dec!(50), dec!(50)));
        bt.backtest().unwrap();
        let history = bt.closed_position_history();
        assert_eq!(history.num_positions(), 1);
        let pos = &history.positions()[0];
        assert_eq!(pos.entry_price, dec!(101));
        assert_eq!(pos.exit.map(|e| e.price), Some(dec!(102.6)));
    }

    #[test]
    fn short_stop_above_entry() {
        let mut bt = PatternBackTester::new(series());
        bt.add_strategy(strategy(Direction::Short, dec!(1), dec!(2)));
        bt.backtest().unwrap();
        let first = &bt.closed_position_history().positions()[0];
        // Short at 101, stop 103.02 hit on bar 3 (high 104).
        assert_eq!(first.exit.map(|e| e.price), Some(dec!(103.02)));
        assert!(first.is_loser());
    }

    #[test]
    fn errors_without_strategy_or_bars() {
        let mut bt = PatternBackTester::new(series());
        assert_eq!(bt.backtest(), Err(BacktestError::NoStrategy));

        let mut empty = PatternBackTester::new(Arc::new(BarSeries::new("SYN", Vec::new())));
        empty.add_strategy(strategy(Direction::Long, dec!(1), dec!(1)));
        assert!(matches!(empty.backtest(), Err(BacktestError::EmptySeries(_))));
    }

    #[test]
    fn clone_box_is_independent() {
        let mut bt = PatternBackTester::new(series());
        bt.add_strategy(strategy(Direction::Long, dec!(2), dec!(1)));
        let mut copy = bt.clone_box();
        copy.backtest().unwrap();
        assert_eq!(copy.closed_position_history().num_positions(), 2);
        assert_eq!(bt.closed_position_history().num_positions(), 0);
    }

    #[test]
    fn portfolio_must_hold_symbol() {
        let pattern = PricePattern::new(description(), Direction::Long, higher_close(), dec!(1), dec!(1)).unwrap();
        let mut bt = PatternBackTester::new(series());
        bt.add_strategy(PalStrategy::new(
            "other",
            Arc::new(pattern),
            Arc::new(Portfolio::single("x", "XYZ")),
        ));
        assert!(matches!(
            bt.backtest(),
            Err(BacktestError::SymbolNotInPortfolio { .. })
        ));
    }
}
