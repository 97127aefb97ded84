//! File-backed store tests: persistence across handles, naming, lookups.

use assetcast_core::domain::{AssetSeries, PredictionRecord, PriceBar};
use assetcast_core::store::{table_name, LocalStore, StoreError, WriteMode};
use chrono::NaiveDate;

fn day(d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, 5, d).unwrap()
}

fn bars() -> Vec<PriceBar> {
    (1..=5)
        .map(|d| PriceBar {
            date: day(d),
            open: 100.0 + d as f64,
            high: 102.0 + d as f64,
            low: 99.0 + d as f64,
            close: 101.0 + d as f64,
            adj_close: 101.0 + d as f64,
            volume: 1_000 * d as u64,
        })
        .collect()
}

fn record(date: NaiveDate, pct: f64) -> PredictionRecord {
    PredictionRecord {
        date,
        actual_close: 200.0,
        predicted_close: 200.0 + 2.0 * pct,
        difference: 2.0 * pct,
        percent_difference: pct,
    }
}

#[test]
fn rows_survive_reopening_the_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("Databases").join("crypto_data.db");
    let table = table_name("BTC-USD", "lstm").unwrap();

    {
        let mut store = LocalStore::open(&path).unwrap();
        store.write_table(&table, &bars(), WriteMode::Replace).unwrap();
    }

    let store = LocalStore::open(&path).unwrap();
    assert_eq!(store.path(), Some(path.as_path()));
    let (rows, dates) = store.read_table::<PriceBar>(&table).unwrap();
    assert_eq!(rows, bars());
    assert_eq!(dates, (1..=5).map(day).collect::<Vec<_>>());

    let series = store.read_series(&table, "BTC-USD").unwrap();
    assert_eq!(series, AssetSeries::new("BTC-USD", bars()));
    assert_eq!(
        store.columns(&table).unwrap(),
        vec!["Idx", "Date", "Open", "High", "Low", "Close", "Adj_Close", "Volume"]
    );
}

#[test]
fn duplicate_date_resolves_to_smallest_abs_percent() {
    let dir = tempfile::tempdir().unwrap();
    let mut store = LocalStore::open(dir.path().join("crypto_predictions.db")).unwrap();
    let table = table_name("ETH-USD", "lstm").unwrap();

    store
        .write_table(&table, &[record(day(3), 2.0)], WriteMode::Replace)
        .unwrap();
    store
        .write_table(&table, &[record(day(3), 0.5)], WriteMode::Append)
        .unwrap();

    let entry = store.entry_for_date(&table, day(3)).unwrap();
    assert_eq!(entry.percent_difference, 0.5);
}

#[test]
fn lookups_on_missing_data_are_distinguishable() {
    let store = LocalStore::in_memory().unwrap();
    assert!(matches!(
        store.entry_for_date("SPY_lstm", day(1)),
        Err(StoreError::TableNotFound { .. })
    ));

    let mut store = store;
    store
        .write_table("SPY_lstm", &[record(day(1), 1.0)], WriteMode::Replace)
        .unwrap();
    assert!(matches!(
        store.entry_for_date("SPY_lstm", day(2)),
        Err(StoreError::EntryNotFound { .. })
    ));
}
