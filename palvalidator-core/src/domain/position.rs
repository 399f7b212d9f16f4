//! A single trading position: one unit entered on one side, optionally closed.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors from position bookkeeping.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum PositionError {
    #[error("operation '{0}' is not valid while flat")]
    Flat(&'static str),
    #[error("unit {unit} out of range (position holds {units} units)")]
    UnitOutOfRange { unit: usize, units: usize },
    #[error("position entered {0} is already closed")]
    AlreadyClosed(NaiveDate),
    #[error("position entered {0} is still open")]
    StillOpen(NaiveDate),
    #[error("cannot add a {added:?} unit to a {held:?} position")]
    SideMismatch { held: PositionSide, added: PositionSide },
    #[error("entry price must be positive, got {0}")]
    NonPositivePrice(Decimal),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionSide {
    Long,
    Short,
}

/// Where and when a position was closed.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PositionExit {
    pub date: NaiveDate,
    pub price: Decimal,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradingPosition {
    pub side: PositionSide,
    pub entry_date: NaiveDate,
    pub entry_price: Decimal,
    /// Stop price used to express returns in units of initial risk.
    pub r_multiple_stop: Option<Decimal>,
    pub bars_in_position: u32,
    pub exit: Option<PositionExit>,
}

impl TradingPosition {
    pub fn open(
        side: PositionSide,
        entry_date: NaiveDate,
        entry_price: Decimal,
    ) -> Result<Self, PositionError> {
        if entry_price <= Decimal::ZERO {
            return Err(PositionError::NonPositivePrice(entry_price));
        }
        Ok(Self {
            side,
            entry_date,
            entry_price,
            r_multiple_stop: None,
            bars_in_position: 1,
            exit: None,
        })
    }

    pub fn with_r_multiple_stop(mut self, stop_price: Decimal) -> Self {
        self.r_multiple_stop = Some(stop_price);
        self
    }

    pub fn is_long(&self) -> bool {
        self.side == PositionSide::Long
    }

    pub fn is_open(&self) -> bool {
        self.exit.is_none()
    }

    /// Count another bar spent in the market. Closed positions are not aged.
    pub fn add_bar(&mut self) {
        if self.is_open() {
            self.bars_in_position += 1;
        }
    }

    pub fn close(&mut self, date: NaiveDate, price: Decimal) -> Result<(), PositionError> {
        if !self.is_open() {
            return Err(PositionError::AlreadyClosed(self.entry_date));
        }
        self.exit = Some(PositionExit { date, price });
        Ok(())
    }

    /// Signed percent return at `price`, from this position's side.
    pub fn percent_return_at(&self, price: Decimal) -> Decimal {
        let change = match self.side {
            PositionSide::Long => price - self.entry_price,
            PositionSide::Short => self.entry_price - price,
        };
        change / self.entry_price * Decimal::ONE_HUNDRED
    }

    /// Realized percent return. Fails on an open position.
    pub fn percent_return(&self) -> Result<Decimal, PositionError> {
        self.exit
            .map(|exit| self.percent_return_at(exit.price))
            .ok_or(PositionError::StillOpen(self.entry_date))
    }

    /// Realized return in units of initial risk, when a risk stop was recorded.
    ///
    /// A zero risk distance yields zero.
    pub fn r_multiple(&self) -> Option<Decimal> {
        let stop = self.r_multiple_stop?;
        let exit = self.exit?;
        let (gain, risk) = match self.side {
            PositionSide::Long => (exit.price - self.entry_price, self.entry_price - stop),
            PositionSide::Short => (self.entry_price - exit.price, stop - self.entry_price),
        };
        if risk.is_zero() {
            return Some(Decimal::ZERO);
        }
        Some(gain / risk)
    }

    pub fn is_winner(&self) -> bool {
        matches!(self.percent_return(), Ok(r) if r > Decimal::ZERO)
    }

    /// A closed position that did not make money. Break-even counts here.
    pub fn is_loser(&self) -> bool {
        matches!(self.percent_return(), Ok(r) if r <= Decimal::ZERO)
    }
}
