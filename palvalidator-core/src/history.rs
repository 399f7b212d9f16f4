//! Closed position history and the trade statistics derived from it.
//!
//! Returns are percent returns per position. Break-even positions count as
//! losers, so every closed position is exactly one of winner or loser.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::{PositionError, TradingPosition};
use crate::stats::median;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClosedPositionHistory {
    positions: Vec<TradingPosition>,
    winners: Vec<Decimal>,
    losers: Vec<Decimal>,
    r_multiple_sum: Decimal,
    bars_in_market: u64,
}

impl ClosedPositionHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_closed_position(&mut self, position: TradingPosition) -> Result<(), PositionError> {
        let ret = position.percent_return()?;
        if ret > Decimal::ZERO {
            self.winners.push(ret);
        } else {
            self.losers.push(ret);
        }
        if let Some(r) = position.r_multiple() {
            self.r_multiple_sum += r;
        }
        self.bars_in_market += u64::from(position.bars_in_position);
        self.positions.push(position);
        Ok(())
    }

    pub fn positions(&self) -> &[TradingPosition] {
        &self.positions
    }

    /// Percent returns in the order positions were added.
    pub fn percent_returns(&self) -> Vec<Decimal> {
        self.positions
            .iter()
            .filter_map(|p| p.percent_return().ok())
            .collect()
    }

    pub fn num_positions(&self) -> usize {
        self.positions.len()
    }

    pub fn num_winners(&self) -> usize {
        self.winners.len()
    }

    pub fn num_losers(&self) -> usize {
        self.losers.len()
    }

    pub fn num_bars_in_market(&self) -> u64 {
        self.bars_in_market
    }

    pub fn percent_winners(&self) -> Decimal {
        ratio_percent(self.num_winners(), self.num_positions())
    }

    pub fn percent_losers(&self) -> Decimal {
        ratio_percent(self.num_losers(), self.num_positions())
    }

    pub fn average_winning_trade(&self) -> Decimal {
        mean(&self.winners)
    }

    /// Average loss, negative.
    pub fn average_losing_trade(&self) -> Decimal {
        mean(&self.losers)
    }

    pub fn median_winning_trade(&self) -> Decimal {
        median(&self.winners).unwrap_or(Decimal::ZERO)
    }

    /// Median loss, negative.
    pub fn median_losing_trade(&self) -> Decimal {
        median(&self.losers).unwrap_or(Decimal::ZERO)
    }

    /// Gross percent won over gross percent lost.
    ///
    /// No trades or no winners give zero; winners without losers give 100.
    pub fn profit_factor(&self) -> Decimal {
        profit_factor(&self.winners, &self.losers)
    }

    pub fn payoff_ratio(&self) -> Decimal {
        payoff_ratio(&self.winners, &self.losers)
    }

    /// Median win over median loss, falling back to the mean-based payoff
    /// ratio when the median loss is zero.
    pub fn median_payoff_ratio(&self) -> Decimal {
        if self.positions.is_empty() {
            return Decimal::ZERO;
        }
        let median_loss = self.median_losing_trade().abs();
        if median_loss.is_zero() {
            return self.payoff_ratio();
        }
        if self.winners.is_empty() {
            return Decimal::ZERO;
        }
        self.median_winning_trade() / median_loss
    }

    pub fn pal_profitability(&self) -> Decimal {
        pal_profitability(self.profit_factor(), self.payoff_ratio())
    }

    pub fn median_pal_profitability(&self) -> Decimal {
        pal_profitability(self.profit_factor(), self.median_payoff_ratio())
    }

    /// Mean R multiple per position, zero unless the R sum is positive.
    pub fn r_multiple_expectancy(&self) -> Decimal {
        if self.positions.is_empty() || self.r_multiple_sum <= Decimal::ZERO {
            return Decimal::ZERO;
        }
        self.r_multiple_sum / Decimal::from(self.positions.len())
    }
}

fn ratio_percent(part: usize, whole: usize) -> Decimal {
    if whole == 0 {
        return Decimal::ZERO;
    }
    Decimal::from(part) / Decimal::from(whole) * Decimal::ONE_HUNDRED
}

fn mean(values: &[Decimal]) -> Decimal {
    if values.is_empty() {
        return Decimal::ZERO;
    }
    values.iter().sum::<Decimal>() / Decimal::from(values.len())
}

/// Profit factor of a split sample of percent returns.
pub fn profit_factor(winners: &[Decimal], losers: &[Decimal]) -> Decimal {
    match (winners.is_empty(), losers.is_empty()) {
        (true, _) => Decimal::ZERO,
        (false, true) => Decimal::ONE_HUNDRED,
        (false, false) => {
            let lost = losers.iter().sum::<Decimal>().abs();
            if lost.is_zero() {
                return Decimal::ONE_HUNDRED;
            }
            winners.iter().sum::<Decimal>() / lost
        }
    }
}

/// Average win over average loss of a split sample of percent returns.
///
/// No winners give zero; no losers (or only break-even losers) give the
/// average win.
pub fn payoff_ratio(winners: &[Decimal], losers: &[Decimal]) -> Decimal {
    if winners.is_empty() {
        return Decimal::ZERO;
    }
    let avg_loss = mean(losers).abs();
    if avg_loss.is_zero() {
        return mean(winners);
    }
    mean(winners) / avg_loss
}

/// `pf / (pf + payoff) * 100`, zero when the denominator is not positive.
pub fn pal_profitability(profit_factor: Decimal, payoff_ratio: Decimal) -> Decimal {
    let denominator = profit_factor + payoff_ratio;
    if denominator <= Decimal::ZERO {
        return Decimal::ZERO;
    }
    profit_factor / denominator * Decimal::ONE_HUNDRED
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::PositionSide;
    use chrono::NaiveDate;
    use rust_decimal_macros::dec;

    fn closed(exit: Decimal) -> TradingPosition {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let mut pos = TradingPosition::open(PositionSide::Long, date, dec!(100))
            .unwrap()
            .with_r_multiple_stop(dec!(98));
        pos.close(date, exit).unwrap();
        pos
    }

    fn history(exits: &[Decimal]) -> ClosedPositionHistory {
        let mut h = ClosedPositionHistory::new();
        for &exit in exits {
            h.add_closed_position(closed(exit)).unwrap();
        }
        h
    }

    #[test]
    fn empty_history_is_all_zero() {
        let h = ClosedPositionHistory::new();
        assert_eq!(h.profit_factor(), Decimal::ZERO);
        assert_eq!(h.payoff_ratio(), Decimal::ZERO);
        assert_eq!(h.median_payoff_ratio(), Decimal::ZERO);
        assert_eq!(h.pal_profitability(), Decimal::ZERO);
        assert_eq!(h.r_multiple_expectancy(), Decimal::ZERO);
        assert_eq!(h.percent_winners(), Decimal::ZERO);
    }

    #[test]
    fn mixed_history_statistics() {
        // Returns: +4, +2, -2, -1
        let h = history(&[dec!(104), dec!(102), dec!(98), dec!(99)]);
        assert_eq!(h.num_positions(), 4);
        assert_eq!(h.percent_winners(), dec!(50));
        assert_eq!(h.profit_factor(), dec!(2));
        assert_eq!(h.payoff_ratio(), dec!(2));
        assert_eq!(h.median_payoff_ratio(), dec!(2));
        assert_eq!(h.pal_profitability(), dec!(50));
        // R multiples: 2, 1, -1, -0.5 -> sum 1.5 over 4
        assert_eq!(h.r_multiple_expectancy(), dec!(0.375));
    }

    #[test]
    fn all_winners() {
        let h = history(&[dec!(103), dec!(101)]);
        assert_eq!(h.profit_factor(), dec!(100));
        assert_eq!(h.payoff_ratio(), dec!(2));
        assert_eq!(h.median_payoff_ratio(), dec!(2));
    }

    #[test]
    fn all_losers() {
        let h = history(&[dec!(97), dec!(100)]);
        assert_eq!(h.num_losers(), 2);
        assert_eq!(h.profit_factor(), Decimal::ZERO);
        assert_eq!(h.payoff_ratio(), Decimal::ZERO);
        assert_eq!(h.r_multiple_expectancy(), Decimal::ZERO);
    }

    #[test]
    fn open_position_rejected() {
        let date = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let pos = TradingPosition::open(PositionSide::Long, date, dec!(10)).unwrap();
        let mut h = ClosedPositionHistory::new();
        assert!(h.add_closed_position(pos).is_err());
        assert_eq!(h.num_positions(), 0);
    }

    #[test]
    fn pal_profitability_guard() {
        assert_eq!(pal_profitability(Decimal::ZERO, Decimal::ZERO), Decimal::ZERO);
        assert_eq!(pal_profitability(dec!(2), dec!(2)), dec!(50));
    }
}
