//! Gateway retry behaviour against scripted providers.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use assetcast_core::data::{DataError, MarketDataGateway, MarketDataProvider, RetryPolicy, Sleeper};
use assetcast_core::domain::{AssetSeries, PriceBar};
use chrono::NaiveDate;

// ── Helpers ──────────────────────────────────────────────────────────

/// Fails `failures` times with a transient error, then succeeds.
struct FlakyProvider {
    failures: u32,
    calls: AtomicU32,
}

impl FlakyProvider {
    fn new(failures: u32) -> Self {
        Self {
            failures,
            calls: AtomicU32::new(0),
        }
    }

    fn calls(&self) -> u32 {
        self.calls.load(Ordering::SeqCst)
    }
}

impl MarketDataProvider for FlakyProvider {
    fn name(&self) -> &str {
        "flaky"
    }

    fn fetch(
        &self,
        ticker: &str,
        start: NaiveDate,
        _end: NaiveDate,
    ) -> Result<AssetSeries, DataError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if call < self.failures {
            return Err(DataError::NetworkUnreachable(format!("attempt {call} reset")));
        }
        let bar = PriceBar {
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

struct UnknownSymbol {
    calls: AtomicU32,
}

impl MarketDataProvider for UnknownSymbol {
    fn name(&self) -> &str {
        "unknown"
    }

    fn fetch(&self, ticker: &str, _: NaiveDate, _: NaiveDate) -> Result<AssetSeries, DataError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        Err(DataError::SymbolNotFound {
            symbol: ticker.to_string(),
        })
    }
}

fn recording_sleeper() -> (Sleeper, Arc<Mutex<Vec<Duration>>>) {
    let slept = Arc::new(Mutex::new(Vec::new()));
    let log = Arc::clone(&slept);
    let sleeper: Sleeper = Arc::new(move |d: Duration| log.lock().unwrap().push(d));
    (sleeper, slept)
}

fn range() -> (NaiveDate, NaiveDate) {
    (
        NaiveDate::from_ymd_opt(2019, 11, 1).unwrap(),
        NaiveDate::from_ymd_opt(2019, 12, 1).unwrap(),
    )
}

// ── Tests ────────────────────────────────────────────────────────────

#[test]
fn two_failures_then_success_retries_exactly_twice() {
    let (sleeper, slept) = recording_sleeper();
    let gateway =
        MarketDataGateway::new(FlakyProvider::new(2), RetryPolicy::default()).with_sleeper(sleeper);
    let (start, end) = range();

    let series = gateway.fetch("BTC-USD", start, end).unwrap();

    assert_eq!(series.len(), 1);
    assert_eq!(gateway.provider().calls(), 3);
    assert_eq!(
        *slept.lock().unwrap(),
        vec![Duration::from_secs(2), Duration::from_secs(4)]
    );
}

#[test]
fn exhausted_budget_is_data_unavailable() {
    let (sleeper, slept) = recording_sleeper();
    let gateway = MarketDataGateway::new(FlakyProvider::new(u32::MAX), RetryPolicy::default())
        .with_sleeper(sleeper);
    let (start, end) = range();

    let err = gateway.fetch("BTC-USD", start, end).unwrap_err();

    match err {
        DataError::DataUnavailable {
            ticker, attempts, ..
        } => {
            assert_eq!(ticker, "BTC-USD");
            assert_eq!(attempts, 6);
        }
        other => panic!("expected DataUnavailable, got {other:?}"),
    }
    assert_eq!(gateway.provider().calls(), 6);
    let slept = slept.lock().unwrap();
    assert_eq!(slept.len(), 5);
    assert!(slept.iter().all(|d| *d <= Duration::from_secs(60)));
}

#[test]
fn unknown_symbol_is_not_retried() {
    let (sleeper, slept) = recording_sleeper();
    let gateway = MarketDataGateway::new(
        UnknownSymbol {
            calls: AtomicU32::new(0),
        },
        RetryPolicy::default(),
    )
    .with_sleeper(sleeper);
    let (start, end) = range();

    let err = gateway.fetch("NOPE", start, end).unwrap_err();

    assert!(matches!(err, DataError::SymbolNotFound { .. }));
    assert_eq!(gateway.provider().calls.load(Ordering::SeqCst), 1);
    assert!(slept.lock().unwrap().is_empty());
}

#[test]
fn inverted_range_fails_before_any_request() {
    let gateway = MarketDataGateway::new(FlakyProvider::new(0), RetryPolicy::immediate(3));
    let (start, end) = range();

    let err = gateway.fetch("BTC-USD", end, start).unwrap_err();

    assert!(matches!(err, DataError::InvalidRange { .. }));
    assert_eq!(gateway.provider().calls(), 0);
}
