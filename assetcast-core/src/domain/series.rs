//! AssetSeries — the canonical, date-ordered price history of one ticker.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use super::bar::PriceBar;

/// Ordered price history for one ticker.
///
/// Construction canonicalizes the bars: sorted ascending by date, bars with a
/// missing close dropped, and for a repeated date the last bar wins. The
/// series is immutable afterwards; a re-fetch produces a new series.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssetSeries {
    ticker: String,
    bars: Vec<PriceBar>,
}

impl AssetSeries {
    pub fn new(ticker: impl Into<String>, mut bars: Vec<PriceBar>) -> Self {
        bars.retain(|b| !b.is_void());
        // Stable sort keeps provider order within a date; the last one wins.
        bars.sort_by_key(|b| b.date);
        let mut canonical: Vec<PriceBar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match canonical.last_mut() {
                Some(prev) if prev.date == bar.date => *prev = bar,
                _ => canonical.push(bar),
            }
        }
        Self {
            ticker: ticker.into(),
            bars: canonical,
        }
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn bars(&self) -> &[PriceBar] {
        &self.bars
    }

    pub fn into_bars(self) -> Vec<PriceBar> {
        self.bars
    }

    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Closing prices in date order.
    pub fn closes(&self) -> Vec<f64> {
        self.bars.iter().map(|b| b.close).collect()
    }

    pub fn dates(&self) -> Vec<NaiveDate> {
        self.bars.iter().map(|b| b.date).collect()
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Deterministic BLAKE3 hash over the ticker and every bar value.
    pub fn content_hash(&self) -> String {
        let mut hasher = blake3::Hasher::new();
        hasher.update(self.ticker.as_bytes());
        for bar in &self.bars {
            hasher.update(bar.date.to_string().as_bytes());
            hasher.update(&bar.open.to_le_bytes());
            hasher.update(&bar.high.to_le_bytes());
            hasher.update(&bar.low.to_le_bytes());
            hasher.update(&bar.close.to_le_bytes());
            hasher.update(&bar.adj_close.to_le_bytes());
            hasher.update(&bar.volume.to_le_bytes());
        }
        hasher.finalize().to_hex().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn bar(day: u32, close: f64) -> PriceBar {
        PriceBar {
            date: NaiveDate::from_ymd_opt(2024, 1, day).unwrap(),
            open: close,
            high: close,
            low: close,
            close,
            adj_close: close,
            volume: 10,
        }
    }

    #[test]
    fn sorts_by_date() {
        let series = AssetSeries::new("BTC-USD", vec![bar(3, 3.0), bar(1, 1.0), bar(2, 2.0)]);
        assert_eq!(series.closes(), vec![1.0, 2.0, 3.0]);
    }

    #[test]
    fn duplicate_dates_keep_last() {
        let series = AssetSeries::new("BTC-USD", vec![bar(1, 1.0), bar(1, 5.0), bar(2, 2.0)]);
        assert_eq!(series.len(), 2);
        assert_eq!(series.closes(), vec![5.0, 2.0]);
    }

    #[test]
    fn void_bars_are_dropped() {
        let series = AssetSeries::new("BTC-USD", vec![bar(1, 1.0), bar(2, f64::NAN)]);
        assert_eq!(series.len(), 1);
        assert_eq!(series.last_date(), NaiveDate::from_ymd_opt(2024, 1, 1));
    }

    #[test]
    fn hash_is_deterministic_and_value_sensitive() {
        let a = AssetSeries::new("SPY", vec![bar(1, 1.0), bar(2, 2.0)]);
        let b = AssetSeries::new("SPY", vec![bar(1, 1.0), bar(2, 2.0)]);
        let c = AssetSeries::new("SPY", vec![bar(1, 1.0), bar(2, 2.5)]);
        assert_eq!(a.content_hash(), b.content_hash());
        assert_ne!(a.content_hash(), c.content_hash());
    }
}
