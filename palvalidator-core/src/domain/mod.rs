//! Domain types: bars, positions, strategies.

pub mod bar;
pub mod instrument_position;
pub mod position;
pub mod strategy;

pub use bar::{Bar, BarSeries};
pub use instrument_position::{InstrumentPosition, PositionState};
pub use position::{PositionError, PositionExit, PositionSide, TradingPosition};
pub use strategy::{PalStrategy, Portfolio};
