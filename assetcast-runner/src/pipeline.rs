//! The analysis pipeline: fetch, persist, train, back-test, assess, persist.
//!
//! Every stage takes the [`AnalysisConfig`] explicitly. Stages run
//! sequentially on the calling thread; only back-test inference fans out
//! through rayon inside `assetcast-core`.

use std::path::PathBuf;
use std::time::Instant;

use assetcast_core::analytics::{
    annualized_volatility, assess, records_above_threshold, summarize, AssessmentError,
    AssessmentMetrics, TrendSummary,
};
use assetcast_core::data::{DataError, MarketDataGateway, MarketDataProvider};
use assetcast_core::domain::{AssetSeries, PredictionRecord};
use assetcast_core::features::{build_training_set_with_horizon, FeatureError};
use assetcast_core::model::{
    predict_backtest, predict_next, train, ModelError, TrainedModel, TrainingObserver,
};
use assetcast_core::store::{LocalStore, StoreError};
use chrono::{Local, NaiveDate};
use thiserror::Error;
use tracing::{debug, info, warn};

use crate::config::{AnalysisConfig, AssetType, ConfigError};

/// Back-test rows further off than this (in percent) are logged.
const OUTLIER_PERCENT: f64 = 10.0;

/// Where the raw series comes from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DataMode {
    /// Download through the gateway, then replace the stored table.
    Fetch,
    /// Use the stored table as-is.
    Offline,
}

impl DataMode {
    pub fn from_config(config: &AnalysisConfig) -> Self {
        if config.data.offline {
            DataMode::Offline
        } else {
            DataMode::Fetch
        }
    }
}

/// Errors from a pipeline run.
///
/// The conditions a user can act on get their own variants; everything else
/// is wrapped by the layer it came from.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("configuration error: {0}")]
    Configuration(#[from] ConfigError),

    #[error("data unavailable for '{ticker}' after {attempts} attempts: {last_error}")]
    DataUnavailable {
        ticker: String,
        attempts: u32,
        last_error: String,
    },

    #[error("insufficient data: need at least {needed} closes, have {available}")]
    InsufficientData { needed: usize, available: usize },

    #[error("table '{table}' not found (run without --offline to fetch it first)")]
    TableNotFound { table: String },

    #[error("no entry for {date} in table '{table}'")]
    EntryNotFound { table: String, date: NaiveDate },

    #[error("data quality: actual close is zero on {date} (row {index})")]
    DataQuality { date: NaiveDate, index: usize },

    #[error("store error: {0}")]
    Store(StoreError),

    #[error("model error: {0}")]
    Model(ModelError),

    #[error("data error: {0}")]
    Data(DataError),

    #[error("assessment error: {0}")]
    Assessment(AssessmentError),
}

impl From<StoreError> for RunError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::TableNotFound { table } => RunError::TableNotFound { table },
            StoreError::EntryNotFound { table, date } => RunError::EntryNotFound { table, date },
            other => RunError::Store(other),
        }
    }
}

impl From<DataError> for RunError {
    fn from(err: DataError) -> Self {
        match err {
            DataError::DataUnavailable {
                ticker,
                attempts,
                last_error,
            } => RunError::DataUnavailable {
                ticker,
                attempts,
                last_error,
            },
            other => RunError::Data(other),
        }
    }
}

impl From<FeatureError> for RunError {
    fn from(err: FeatureError) -> Self {
        match err {
            FeatureError::InsufficientData { needed, available } => {
                RunError::InsufficientData { needed, available }
            }
            other => RunError::Model(ModelError::Feature(other)),
        }
    }
}

impl From<ModelError> for RunError {
    fn from(err: ModelError) -> Self {
        match err {
            ModelError::Feature(inner) => inner.into(),
            other => RunError::Model(other),
        }
    }
}

impl From<AssessmentError> for RunError {
    fn from(err: AssessmentError) -> Self {
        match err {
            AssessmentError::DataQuality { date, index } => RunError::DataQuality { date, index },
            other => RunError::Assessment(other),
        }
    }
}

/// Everything a finished run produced.
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub ticker: String,
    pub asset_type: AssetType,
    pub currency_symbol: &'static str,
    /// Table name used in both stores.
    pub table: String,
    pub raw_db: PathBuf,
    pub predictions_db: PathBuf,
    pub start: NaiveDate,
    pub end: NaiveDate,
    /// Bars in the series the model was trained on.
    pub bars: usize,
    /// BLAKE3 hash of that series.
    pub dataset_hash: String,
    pub records: Vec<PredictionRecord>,
    /// The stored assessment row for the last back-tested date.
    ///
    /// Looked up the same way as [`lookup_entry`]. With `persist = "append"`
    /// the table can hold that date from earlier runs too, and the row with
    /// the smallest absolute percent difference is returned, which need not
    /// be `records.last()`.
    pub last_entry: PredictionRecord,
    pub metrics: AssessmentMetrics,
    pub forecast: f64,
    /// Annualized volatility in percent.
    pub volatility: f64,
    pub summary: TrendSummary,
    pub model: TrainedModel,
}

/// Result of [`fetch_and_store`].
#[derive(Debug, Clone, PartialEq)]
pub struct FetchOutcome {
    pub ticker: String,
    pub table: String,
    pub raw_db: PathBuf,
    pub rows: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub dataset_hash: String,
}

/// Run the whole pipeline with today's local date.
pub fn run_analysis<P: MarketDataProvider>(
    config: &AnalysisConfig,
    gateway: &MarketDataGateway<P>,
    observer: &mut dyn TrainingObserver,
) -> Result<AnalysisOutcome, RunError> {
    run_analysis_at(config, gateway, observer, Local::now().date_naive())
}

/// Run the whole pipeline, resolving `EndDate::Today` to `today`.
pub fn run_analysis_at<P: MarketDataProvider>(
    config: &AnalysisConfig,
    gateway: &MarketDataGateway<P>,
    observer: &mut dyn TrainingObserver,
    today: NaiveDate,
) -> Result<AnalysisOutcome, RunError> {
    config.validate(today)?;
    let started = Instant::now();
    let ticker = config.ticker();
    let table = config.table_name()?;
    let start = config.asset.start;
    let end = config.end_date(today);
    let window = config.asset.window;

    let mut raw_store = LocalStore::open(config.raw_db_path())?;
    let mode = DataMode::from_config(config);
    if mode == DataMode::Fetch {
        let fetched = gateway.fetch(&ticker, start, end)?;
        let written = raw_store.write_table(&table, fetched.bars(), config.data.persist.into())?;
        info!(ticker = %ticker, table = %table, rows = written, "stored raw series");
    }
    let series = stored_series(&raw_store, &table, &ticker, start, end)?;
    let dataset_hash = series.content_hash();
    info!(
        ticker = %ticker,
        bars = series.len(),
        first = ?series.first_date(),
        last = ?series.last_date(),
        mode = ?mode,
        "loaded series"
    );

    let closes = series.closes();
    let dates = series.dates();
    let set = build_training_set_with_horizon(&closes, window, config.model.output_size)?;
    let model = train(&set, &config.model, observer)?;

    let scaled = model.scaler.transform_all(&closes);
    let predicted = predict_backtest(&model, &scaled)?;
    let forecast = predict_next(&model, &scaled)?;

    let first = backtest_offset(&dates, window, config.asset.backtest_start);
    let records = assess(
        &closes[first..],
        &predicted[first - window..],
        &dates[first..],
    )?;
    let summary = summarize(&records, forecast, config.currency_symbol())?;
    let metrics = AssessmentMetrics::compute(&records);
    let volatility = annualized_volatility(&closes);

    let predictions_db = config.predictions_db_path();
    let mut prediction_store = LocalStore::open(&predictions_db)?;
    prediction_store.write_table(&table, &records, config.data.persist.into())?;
    let last_entry = prediction_store.entry_for_date(&table, summary.last_date)?;

    let flagged = records_above_threshold(&records, OUTLIER_PERCENT).len();
    if flagged > 0 {
        warn!(
            ticker = %ticker,
            rows = flagged,
            threshold = OUTLIER_PERCENT,
            "back-test rows beyond percent-difference threshold"
        );
    }
    info!(
        ticker = %ticker,
        records = records.len(),
        mape = metrics.mape,
        volatility,
        forecast,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "analysis complete"
    );

    Ok(AnalysisOutcome {
        ticker,
        asset_type: config.asset.asset_type,
        currency_symbol: config.currency_symbol(),
        table,
        raw_db: config.raw_db_path(),
        predictions_db,
        start,
        end,
        bars: series.len(),
        dataset_hash,
        records,
        last_entry,
        metrics,
        forecast,
        volatility,
        summary,
        model,
    })
}

/// Download the configured range and write it to the raw store, without training.
pub fn fetch_and_store<P: MarketDataProvider>(
    config: &AnalysisConfig,
    gateway: &MarketDataGateway<P>,
    today: NaiveDate,
) -> Result<FetchOutcome, RunError> {
    config.validate(today)?;
    let ticker = config.ticker();
    let table = config.table_name()?;
    let series = gateway.fetch(&ticker, config.asset.start, config.end_date(today))?;

    let raw_db = config.raw_db_path();
    let mut store = LocalStore::open(&raw_db)?;
    let rows = store.write_table(&table, series.bars(), config.data.persist.into())?;
    info!(ticker = %ticker, table = %table, rows, "stored raw series");

    Ok(FetchOutcome {
        ticker,
        table,
        raw_db,
        rows,
        first_date: series.first_date(),
        last_date: series.last_date(),
        dataset_hash: series.content_hash(),
    })
}

/// The stored assessment table for the configured asset.
pub fn load_assessment(config: &AnalysisConfig) -> Result<Vec<PredictionRecord>, RunError> {
    let table = config.table_name()?;
    let store = LocalStore::open(config.predictions_db_path())?;
    let (records, _) = store.read_table::<PredictionRecord>(&table)?;
    Ok(records)
}

/// The stored assessment row for `date`.
pub fn lookup_entry(config: &AnalysisConfig, date: NaiveDate) -> Result<PredictionRecord, RunError> {
    let table = config.table_name()?;
    let store = LocalStore::open(config.predictions_db_path())?;
    Ok(store.entry_for_date(&table, date)?)
}

fn stored_series(
    store: &LocalStore,
    table: &str,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<AssetSeries, RunError> {
    let series = store.read_series(table, ticker)?;
    let total = series.len();
    let bars: Vec<_> = series
        .into_bars()
        .into_iter()
        .filter(|b| b.date >= start && b.date <= end)
        .collect();
    if bars.len() < total {
        debug!(table, kept = bars.len(), total, "trimmed stored rows to requested range");
    }
    Ok(AssetSeries::new(ticker, bars))
}

/// First series index to assess: `window`, or the first date on or after
/// `backtest_start` if that comes later.
fn backtest_offset(dates: &[NaiveDate], window: usize, backtest_start: Option<NaiveDate>) -> usize {
    match backtest_start {
        Some(from) => dates[window..]
            .iter()
            .position(|d| *d >= from)
            .map_or(dates.len(), |p| window + p),
        None => window,
    }
}
