//! Per-instrument position state.
//!
//! An instrument is flat, or holds one or more units on a single side. State
//! transitions are functions that return the next state; the holder swaps it in
//! only when the transition succeeds.

use chrono::NaiveDate;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::position::{PositionError, PositionSide, TradingPosition};

/// Position state. Units are addressed 1-based.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub enum PositionState {
    #[default]
    Flat,
    Long(Vec<TradingPosition>),
    Short(Vec<TradingPosition>),
}

impl PositionState {
    fn units(&self) -> &[TradingPosition] {
        match self {
            PositionState::Flat => &[],
            PositionState::Long(units) | PositionState::Short(units) => units,
        }
    }

    fn side(&self) -> Option<PositionSide> {
        match self {
            PositionState::Flat => None,
            PositionState::Long(_) => Some(PositionSide::Long),
            PositionState::Short(_) => Some(PositionSide::Short),
        }
    }

    fn from_units(side: PositionSide, units: Vec<TradingPosition>) -> Self {
        if units.is_empty() {
            return PositionState::Flat;
        }
        match side {
            PositionSide::Long => PositionState::Long(units),
            PositionSide::Short => PositionState::Short(units),
        }
    }

    /// State after adding `position` as a new unit.
    pub fn with_unit(&self, position: TradingPosition) -> Result<Self, PositionError> {
        match self.side() {
            None => Ok(Self::from_units(position.side, vec![position])),
            Some(held) if held != position.side => Err(PositionError::SideMismatch {
                held,
                added: position.side,
            }),
            Some(held) => {
                let mut units = self.units().to_vec();
                units.push(position);
                Ok(Self::from_units(held, units))
            }
        }
    }

    /// State after closing unit `unit`, plus the closed position.
    pub fn close_unit(
        &self,
        unit: usize,
        date: NaiveDate,
        price: Decimal,
    ) -> Result<(Self, TradingPosition), PositionError> {
        let held = self.side().ok_or(PositionError::Flat("close_unit"))?;
        let mut units = self.units().to_vec();
        if unit == 0 || unit > units.len() {
            return Err(PositionError::UnitOutOfRange {
                unit,
                units: units.len(),
            });
        }
        let mut closed = units.remove(unit - 1);
        closed.close(date, price)?;
        Ok((Self::from_units(held, units), closed))
    }

    /// Flat state plus every closed unit, in entry order.
    pub fn close_all(
        &self,
        date: NaiveDate,
        price: Decimal,
    ) -> Result<(Self, Vec<TradingPosition>), PositionError> {
        if self.side().is_none() {
            return Err(PositionError::Flat("close_all"));
        }
        let closed = self
            .units()
            .iter()
            .cloned()
            .map(|mut pos| pos.close(date, price).map(|_| pos))
            .collect::<Result<Vec<_>, _>>()?;
        Ok((PositionState::Flat, closed))
    }
}

/// Position bookkeeping for one symbol.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InstrumentPosition {
    symbol: String,
    state: PositionState,
}

impl InstrumentPosition {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            state: PositionState::Flat,
        }
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn state(&self) -> &PositionState {
        &self.state
    }

    pub fn is_flat(&self) -> bool {
        matches!(self.state, PositionState::Flat)
    }

    pub fn is_long(&self) -> bool {
        matches!(self.state, PositionState::Long(_))
    }

    pub fn is_short(&self) -> bool {
        matches!(self.state, PositionState::Short(_))
    }

    pub fn num_units(&self) -> usize {
        self.state.units().len()
    }

    pub fn unit(&self, unit: usize) -> Result<&TradingPosition, PositionError> {
        let units = self.state.units();
        if units.is_empty() {
            return Err(PositionError::Flat("unit"));
        }
        unit.checked_sub(1)
            .and_then(|i| units.get(i))
            .ok_or(PositionError::UnitOutOfRange {
                unit,
                units: units.len(),
            })
    }

    /// Entry price of the most recently added unit.
    pub fn fill_price(&self) -> Result<Decimal, PositionError> {
        self.state
            .units()
            .last()
            .map(|pos| pos.entry_price)
            .ok_or(PositionError::Flat("fill_price"))
    }

    pub fn add_position(&mut self, position: TradingPosition) -> Result<(), PositionError> {
        self.state = self.state.with_unit(position)?;
        Ok(())
    }

    /// Age every open unit by one bar. A no-op while flat.
    pub fn add_bar(&mut self) {
        if let PositionState::Long(units) | PositionState::Short(units) = &mut self.state {
            units.iter_mut().for_each(TradingPosition::add_bar);
        }
    }

    pub fn close_unit(
        &mut self,
        unit: usize,
        date: NaiveDate,
        price: Decimal,
    ) -> Result<TradingPosition, PositionError> {
        let (next, closed) = self.state.close_unit(unit, date, price)?;
        self.state = next;
        Ok(closed)
    }

    pub fn close_all(
        &mut self,
        date: NaiveDate,
        price: Decimal,
    ) -> Result<Vec<TradingPosition>, PositionError> {
        let (next, closed) = self.state.close_all(date, price)?;
        self.state = next;
        Ok(closed)
    }
}
