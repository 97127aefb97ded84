//! Market data gateway: bounded retry with exponential backoff around a provider.
//!
//! A failed attempt is logged and retried after `base_delay * 2^(n-1)`, capped
//! at `max_delay`. Errors that cannot succeed on a retry (unknown symbol,
//! inverted range) return immediately. Once the retry budget is spent the
//! caller gets [`DataError::DataUnavailable`].

use std::sync::Arc;
use std::time::Duration;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::provider::{DataError, MarketDataProvider};
use crate::domain::AssetSeries;

/// Retry budget for the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RetryPolicy {
    /// Retries after the first attempt; total attempts is `max_retries + 1`.
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_secs(2),
            max_delay: Duration::from_secs(60),
        }
    }
}

impl RetryPolicy {
    /// No waiting between attempts.
    pub fn immediate(max_retries: u32) -> Self {
        Self {
            max_retries,
            base_delay: Duration::ZERO,
            max_delay: Duration::ZERO,
        }
    }

    /// Delay before retry number `retry` (1-based).
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = 2u32.saturating_pow(retry.saturating_sub(1));
        self.base_delay.saturating_mul(factor).min(self.max_delay)
    }
}

/// Injectable sleep so tests can run the retry loop without waiting.
pub type Sleeper = Arc<dyn Fn(Duration) + Send + Sync>;

/// Retrying front door to a [`MarketDataProvider`].
pub struct MarketDataGateway<P> {
    provider: P,
    policy: RetryPolicy,
    sleeper: Sleeper,
}

impl<P: MarketDataProvider> MarketDataGateway<P> {
    pub fn new(provider: P, policy: RetryPolicy) -> Self {
        Self {
            provider,
            policy,
            sleeper: Arc::new(std::thread::sleep),
        }
    }

    /// Replace the sleep function used between attempts.
    pub fn with_sleeper(mut self, sleeper: Sleeper) -> Self {
        self.sleeper = sleeper;
        self
    }

    pub fn policy(&self) -> &RetryPolicy {
        &self.policy
    }

    pub fn provider(&self) -> &P {
        &self.provider
    }

    /// Fetch `ticker` over `[start, end]`, retrying transient failures.
    pub fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<AssetSeries, DataError> {
        if start > end {
            return Err(DataError::InvalidRange { start, end });
        }

        let attempts = self.policy.max_retries.saturating_add(1);
        let mut last_error = None;

        for retry in 0..=self.policy.max_retries {
            let attempt = retry.saturating_add(1);
            if retry > 0 {
                let mut delay = self.policy.delay_for(retry);
                if let Some(DataError::RateLimited { retry_after_secs }) = &last_error {
                    delay = delay
                        .max(Duration::from_secs(*retry_after_secs))
                        .min(self.policy.max_delay);
                }
                (self.sleeper)(delay);
            }

            match self.provider.fetch(ticker, start, end) {
                Ok(series) => {
                    info!(
                        ticker,
                        provider = self.provider.name(),
                        bars = series.len(),
                        attempt,
                        "fetched price history"
                    );
                    return Ok(series);
                }
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    warn!(ticker, attempt, attempts, error = %e, "fetch attempt failed");
                    last_error = Some(e);
                }
            }
        }

        Err(DataError::DataUnavailable {
            ticker: ticker.to_string(),
            attempts,
            last_error: last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "no attempts made".into()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.delay_for(1), Duration::from_secs(2));
        assert_eq!(policy.delay_for(2), Duration::from_secs(4));
        assert_eq!(policy.delay_for(3), Duration::from_secs(8));
        assert_eq!(policy.delay_for(6), Duration::from_secs(60));
        assert_eq!(policy.delay_for(40), Duration::from_secs(60));
    }

    struct FirstTry;

    impl MarketDataProvider for FirstTry {
        fn name(&self) -> &str {
            "first-try"
        }

        fn fetch(
            &self,
            ticker: &str,
            start: NaiveDate,
            _end: NaiveDate,
        ) -> Result<AssetSeries, DataError> {
            let bar = crate::domain::PriceBar {
                date: start,
                open: 1.0,
                high: 1.0,
                low: 1.0,
                close: 1.0,
                adj_close: 1.0,
                volume: 1,
            };
            Ok(AssetSeries::new(ticker, vec![bar]))
        }
    }

    #[test]
    fn largest_retry_budget_still_calls_the_provider() {
        let gateway = MarketDataGateway::new(FirstTry, RetryPolicy::immediate(u32::MAX));
        let day = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
        let series = gateway.fetch("BTC-USD", day, day).unwrap();
        assert_eq!(series.len(), 1);
    }

    #[test]
    fn immediate_policy_never_waits() {
        let policy = RetryPolicy::immediate(3);
        assert_eq!(policy.delay_for(1), Duration::ZERO);
        assert_eq!(policy.delay_for(3), Duration::ZERO);
    }
}
