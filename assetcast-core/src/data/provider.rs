//! Market data provider trait and structured error types.
//!
//! The provider trait abstracts over the remote source so the gateway's retry
//! policy can be exercised against scripted stubs in tests.

use chrono::NaiveDate;
use thiserror::Error;

use crate::domain::AssetSeries;

/// Structured error types for market data operations.
#[derive(Debug, Error)]
pub enum DataError {
    #[error("network unreachable: {0}")]
    NetworkUnreachable(String),

    #[error("rate limited by provider (retry after {retry_after_secs}s)")]
    RateLimited { retry_after_secs: u64 },

    #[error("response format changed: {0}")]
    ResponseFormatChanged(String),

    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("invalid date range: start {start} is after end {end}")]
    InvalidRange { start: NaiveDate, end: NaiveDate },

    #[error("data unavailable for '{ticker}' after {attempts} attempts: {last_error}")]
    DataUnavailable {
        ticker: String,
        attempts: u32,
        last_error: String,
    },

    #[error("data error: {0}")]
    Other(String),
}

impl DataError {
    /// Whether another attempt could plausibly succeed.
    ///
    /// An unknown symbol or an inverted range will fail the same way every
    /// time, so the gateway gives up on them immediately.
    pub fn is_retryable(&self) -> bool {
        !matches!(
            self,
            DataError::SymbolNotFound { .. }
                | DataError::InvalidRange { .. }
                | DataError::DataUnavailable { .. }
        )
    }
}

/// A single-attempt source of daily OHLCV history.
///
/// Implementations do not retry; [`super::MarketDataGateway`] owns that policy.
pub trait MarketDataProvider: Send + Sync {
    /// Human-readable name of this provider.
    fn name(&self) -> &str;

    /// Fetch the daily history of `ticker` between `start` and `end` inclusive.
    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AssetSeries, DataError>;
}

impl<P: MarketDataProvider + ?Sized> MarketDataProvider for Box<P> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AssetSeries, DataError> {
        (**self).fetch(ticker, start, end)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permanent_errors_are_not_retryable() {
        let not_found = DataError::SymbolNotFound {
            symbol: "NOPE".into(),
        };
        assert!(!not_found.is_retryable());

        let d = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        assert!(!DataError::InvalidRange { start: d, end: d }.is_retryable());
    }

    #[test]
    fn transient_errors_are_retryable() {
        assert!(DataError::NetworkUnreachable("reset".into()).is_retryable());
        assert!(DataError::RateLimited {
            retry_after_secs: 5
        }
        .is_retryable());
        assert!(DataError::ResponseFormatChanged("html".into()).is_retryable());
    }
}
