//! Property tests for feature, volatility and store invariants.
//!
//! 1. Windowing — `n - w` windows of length `w` with aligned targets
//! 2. Scaler round-trip — inverse(transform(v)) == v within 1e-9
//! 3. Volatility — non-negative for ≥ 2 points, exactly 0 below
//! 4. Store round-trip — rows read back equal rows written, same order

use assetcast_core::analytics::annualized_volatility;
use assetcast_core::domain::PriceBar;
use assetcast_core::features::{build_test_set, build_training_set, MinMaxScaler};
use assetcast_core::store::{LocalStore, WriteMode};
use chrono::NaiveDate;
use proptest::prelude::*;

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_price() -> impl Strategy<Value = f64> {
    (0.01..100_000.0_f64).prop_map(|p| (p * 100.0).round() / 100.0)
}

fn arb_closes(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(arb_price(), min..max)
}

fn arb_bars() -> impl Strategy<Value = Vec<PriceBar>> {
    prop::collection::vec((arb_price(), arb_price(), 0u64..10_000_000_000), 0..40).prop_map(
        |rows| {
            let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
            rows.into_iter()
                .enumerate()
                .map(|(i, (a, b, volume))| {
                    let (low, high) = if a <= b { (a, b) } else { (b, a) };
                    PriceBar {
                        date: base + chrono::Duration::days(i as i64),
                        open: low,
                        high,
                        low,
                        close: high,
                        adj_close: high,
                        volume,
                    }
                })
                .collect()
        },
    )
}

// ── 1. Windowing ─────────────────────────────────────────────────────

proptest! {
    #[test]
    fn training_set_has_n_minus_w_windows(
        (closes, window) in arb_closes(2, 120)
            .prop_flat_map(|c| { let n = c.len(); (Just(c), 1..n) })
    ) {
        let set = build_training_set(&closes, window).unwrap();
        let expected = closes.len() - window;
        prop_assert_eq!(set.inputs.dim(), (expected, window));
        prop_assert_eq!(set.targets.dim(), (expected, 1));

        // Target k is the scaled value right after window k.
        let scaled = set.scaler.transform_all(&closes);
        for k in 0..expected {
            prop_assert_eq!(set.targets[[k, 0]], scaled[k + window]);
            prop_assert_eq!(set.inputs[[k, window - 1]], scaled[k + window - 1]);
        }
    }

    #[test]
    fn window_not_smaller_than_series_is_rejected(closes in arb_closes(1, 30), extra in 0usize..5) {
        let window = closes.len() + extra;
        prop_assert!(build_training_set(&closes, window).is_err());
        prop_assert!(build_test_set(window, &closes).is_err());
    }
}

// ── 2. Scaler round-trip ─────────────────────────────────────────────

proptest! {
    #[test]
    fn scaler_round_trip(closes in arb_closes(1, 80)) {
        let scaler = MinMaxScaler::fit(&closes).unwrap();
        for &v in &closes {
            let scaled = scaler.transform(v);
            prop_assert!((-1e-12..=1.0 + 1e-12).contains(&scaled));
            prop_assert!((scaler.inverse_transform(scaled) - v).abs() < 1e-9);
        }
    }
}

// ── 3. Volatility ────────────────────────────────────────────────────

proptest! {
    #[test]
    fn volatility_is_non_negative(closes in arb_closes(2, 200)) {
        prop_assert!(annualized_volatility(&closes) >= 0.0);
    }

    #[test]
    fn volatility_of_short_series_is_zero(closes in arb_closes(0, 2)) {
        prop_assert_eq!(annualized_volatility(&closes), 0.0);
    }
}

// ── 4. Store round-trip ──────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(32))]

    #[test]
    fn stored_rows_read_back_identically(bars in arb_bars()) {
        let mut store = LocalStore::in_memory().unwrap();
        store.write_table("PROP_USD_lstm", &bars, WriteMode::Replace).unwrap();
        let (read, dates) = store.read_table::<PriceBar>("PROP_USD_lstm").unwrap();
        prop_assert_eq!(&read, &bars);
        prop_assert_eq!(dates, bars.iter().map(|b| b.date).collect::<Vec<_>>());

        // Writing again is idempotent under Replace.
        store.write_table("PROP_USD_lstm", &read, WriteMode::Replace).unwrap();
        let (again, _) = store.read_table::<PriceBar>("PROP_USD_lstm").unwrap();
        prop_assert_eq!(again, bars);
    }
}
