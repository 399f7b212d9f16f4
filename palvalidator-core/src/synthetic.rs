//! Deterministic synthetic OHLC series.
//!
//! A seeded multiplicative random walk on weekdays. The same seed always
//! yields the same series, which keeps CLI runs and tests reproducible.

use chrono::{Datelike, Duration, NaiveDate, Weekday};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;

use crate::domain::{Bar, BarSeries};

/// Price precision of generated bars.
const PRICE_DECIMALS: u32 = 2;

#[derive(Debug, Clone, PartialEq)]
pub struct RandomWalk {
    pub symbol: String,
    pub bars: usize,
    pub seed: u64,
    pub start_price: Decimal,
    pub start_date: NaiveDate,
    /// Largest absolute close-to-close move, in basis points.
    pub max_move_bps: i64,
    /// Largest wick beyond the body, in basis points.
    pub max_wick_bps: i64,
}

impl RandomWalk {
    pub fn new(symbol: impl Into<String>, bars: usize, seed: u64, start_price: Decimal) -> Self {
        Self {
            symbol: symbol.into(),
            bars,
            seed,
            start_price,
            start_date: NaiveDate::from_ymd_opt(2015, 1, 2).unwrap_or(NaiveDate::MIN),
            max_move_bps: 200,
            max_wick_bps: 100,
        }
    }

    pub fn generate(&self) -> BarSeries {
        let mut rng = StdRng::seed_from_u64(self.seed);
        let mut bars = Vec::with_capacity(self.bars);
        let mut date = next_weekday(self.start_date);
        let mut prev_close = self.start_price.max(dec!(0.01));

        for _ in 0..self.bars {
            let open = round_price(prev_close * bps(rng.gen_range(-self.max_wick_bps / 4..=self.max_wick_bps / 4)));
            let close = round_price(open * bps(rng.gen_range(-self.max_move_bps..=self.max_move_bps)));
            let body_high = open.max(close);
            let body_low = open.min(close);
            let high = round_price(body_high * bps(rng.gen_range(0..=self.max_wick_bps)));
            let low = round_price(body_low * bps(-rng.gen_range(0..=self.max_wick_bps)));

            bars.push(Bar::new(date, open, high.max(body_high), low.min(body_low), close));
            prev_close = close;
            date = next_weekday(date + Duration::days(1));
        }

        BarSeries::new(self.symbol.clone(), bars)
    }
}

fn bps(move_bps: i64) -> Decimal {
    Decimal::ONE + Decimal::new(move_bps, 4)
}

fn round_price(price: Decimal) -> Decimal {
    price.round_dp(PRICE_DECIMALS).max(dec!(0.01))
}

fn next_weekday(mut date: NaiveDate) -> NaiveDate {
    while matches!(date.weekday(), Weekday::Sat | Weekday::Sun) {
        date += Duration::days(1);
    }
    date
}
