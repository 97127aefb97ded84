//! PriceBar — one daily OHLCV row for a single ticker.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Daily OHLCV bar as delivered by the market data provider.
///
/// `adj_close` is stored alongside `close` (column `Adj_Close`), but every
/// calculation in this crate uses `close`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceBar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub adj_close: f64,
    pub volume: u64,
}

impl PriceBar {
    /// True when the close is missing (NaN or infinite).
    pub fn is_void(&self) -> bool {
        !self.close.is_finite()
    }

    /// Basic OHLC sanity: high bounds everything, low is bounded by everything.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
    }
}
