//! Run configuration: TOML file sections, defaults, CLI-facing validation.
//!
//! ```toml
//! [asset]
//! ticker = "BTC-USD"
//! asset_type = "crypto"
//! window = 60
//! start = "2019-11-01"
//! end = "today"            # or "2024-06-30"
//!
//! [data]
//! data_dir = "Databases"
//!
//! [model]
//! units = 50
//! optimizer = "adam"
//!
//! [dashboard]
//! plot = true
//! port = 8050
//!
//! [retry]
//! max_retries = 5
//! ```

use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

use assetcast_core::data::RetryPolicy;
use assetcast_core::model::ModelConfig;
use assetcast_core::store::{self, WriteMode};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub const DEFAULT_MODEL_NAME: &str = "lstm";
pub const DEFAULT_WINDOW: usize = 60;
pub const DEFAULT_PORT: u16 = 8050;
pub const DEFAULT_DATA_DIR: &str = "Databases";
/// Upper bound on `retry.max_retries`.
pub const MAX_RETRIES: u32 = 20;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("--asset-type: '{0}' is not a valid asset type (expected Cryptocurrency, crypto or stock)")]
    InvalidAssetType(String),

    #[error("--today cannot be combined with --end-year/--end-month/--end-day")]
    ConflictingEndDate,

    #[error("incomplete end date: {flag} is missing")]
    MissingEndDatePart { flag: &'static str },

    #[error("--end-year/--end-month/--end-day: {year}-{month}-{day} is not a calendar date")]
    InvalidEndDate { year: i32, month: u32, day: u32 },

    #[error("{flag}: {reason}")]
    InvalidValue { flag: &'static str, reason: String },

    #[error("--start: start date {start} is after end date {end}")]
    StartAfterEnd { start: NaiveDate, end: NaiveDate },

    #[error("failed to read config file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),
}

// ── Asset type & currency ────────────────────────────────────────────

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum AssetType {
    Crypto,
    Stock,
}

impl AssetType {
    /// Short name used in store file names (`crypto_data.db`).
    pub fn name(self) -> &'static str {
        match self {
            AssetType::Crypto => "crypto",
            AssetType::Stock => "stock",
        }
    }

    pub fn label(self) -> &'static str {
        match self {
            AssetType::Crypto => "Cryptocurrency",
            AssetType::Stock => "Stock",
        }
    }
}

impl FromStr for AssetType {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "cryptocurrency" | "crypto" => Ok(AssetType::Crypto),
            "stock" => Ok(AssetType::Stock),
            _ => Err(ConfigError::InvalidAssetType(s.to_string())),
        }
    }
}

impl TryFrom<String> for AssetType {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<AssetType> for String {
    fn from(value: AssetType) -> Self {
        value.name().to_string()
    }
}

impl fmt::Display for AssetType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Quote currencies recognised in ticker suffixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Currency {
    Usd,
    Eur,
    Jpy,
    Gbp,
}

impl Currency {
    pub const ALL: [Currency; 4] = [Currency::Usd, Currency::Eur, Currency::Jpy, Currency::Gbp];

    pub fn code(self) -> &'static str {
        match self {
            Currency::Usd => "USD",
            Currency::Eur => "EUR",
            Currency::Jpy => "JPY",
            Currency::Gbp => "GBP",
        }
    }

    pub fn symbol(self) -> &'static str {
        match self {
            Currency::Usd => "$",
            Currency::Eur => "€",
            Currency::Jpy => "¥",
            Currency::Gbp => "£",
        }
    }

    /// Currency named by the ticker's `-XXX` suffix, if any.
    pub fn from_ticker(ticker: &str) -> Option<Self> {
        let (_, suffix) = ticker.rsplit_once('-')?;
        Self::ALL
            .into_iter()
            .find(|c| c.code().eq_ignore_ascii_case(suffix))
    }
}

/// Upper-case the ticker; crypto tickers without a quote currency get `-USD`.
pub fn normalize_ticker(raw: &str, asset_type: AssetType) -> String {
    let ticker = raw.trim().to_ascii_uppercase();
    match asset_type {
        AssetType::Crypto if Currency::from_ticker(&ticker).is_none() && !ticker.contains('-') => {
            format!("{ticker}-USD")
        }
        _ => ticker,
    }
}

/// Symbol for displaying prices of `ticker`; `$` unless the suffix says otherwise.
pub fn currency_symbol(ticker: &str) -> &'static str {
    Currency::from_ticker(ticker).map_or("$", Currency::symbol)
}

// ── End date ─────────────────────────────────────────────────────────

/// Last day of the requested history.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(try_from = "String", into = "String")]
pub enum EndDate {
    #[default]
    Today,
    On(NaiveDate),
}

impl EndDate {
    /// Resolve the `--today` / `--end-year --end-month --end-day` flags.
    ///
    /// `None` when no flag was given, so a config-file value stays in force.
    pub fn from_flags(
        today: bool,
        year: Option<i32>,
        month: Option<u32>,
        day: Option<u32>,
    ) -> Result<Option<EndDate>, ConfigError> {
        let any_part = year.is_some() || month.is_some() || day.is_some();
        if today && any_part {
            return Err(ConfigError::ConflictingEndDate);
        }
        if today {
            return Ok(Some(EndDate::Today));
        }
        if !any_part {
            return Ok(None);
        }
        let year = year.ok_or(ConfigError::MissingEndDatePart {
            flag: "--end-year",
        })?;
        let month = month.ok_or(ConfigError::MissingEndDatePart {
            flag: "--end-month",
        })?;
        let day = day.ok_or(ConfigError::MissingEndDatePart { flag: "--end-day" })?;
        NaiveDate::from_ymd_opt(year, month, day)
            .map(|d| Some(EndDate::On(d)))
            .ok_or(ConfigError::InvalidEndDate { year, month, day })
    }

    pub fn resolve(self, today: NaiveDate) -> NaiveDate {
        match self {
            EndDate::Today => today,
            EndDate::On(date) => date,
        }
    }
}

impl TryFrom<String> for EndDate {
    type Error = ConfigError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        if value.trim().eq_ignore_ascii_case("today") {
            return Ok(EndDate::Today);
        }
        NaiveDate::parse_from_str(value.trim(), "%Y-%m-%d")
            .map(EndDate::On)
            .map_err(|e| ConfigError::InvalidValue {
                flag: "asset.end",
                reason: format!("'{value}' is neither \"today\" nor YYYY-MM-DD ({e})"),
            })
    }
}

impl From<EndDate> for String {
    fn from(value: EndDate) -> Self {
        match value {
            EndDate::Today => "today".to_string(),
            EndDate::On(date) => date.format("%Y-%m-%d").to_string(),
        }
    }
}

// ── Sections ─────────────────────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AssetConfig {
    pub ticker: String,
    pub asset_type: AssetType,
    /// Number of prior closes per example (prediction days).
    pub window: usize,
    pub start: NaiveDate,
    pub end: EndDate,
    /// Suffix of every table name for this run.
    pub model_name: String,
    /// Only assess dates on or after this day.
    pub backtest_start: Option<NaiveDate>,
}

impl Default for AssetConfig {
    fn default() -> Self {
        Self {
            ticker: String::new(),
            asset_type: AssetType::Crypto,
            window: DEFAULT_WINDOW,
            start: NaiveDate::from_ymd_opt(2019, 11, 1).unwrap_or_default(),
            end: EndDate::Today,
            model_name: DEFAULT_MODEL_NAME.to_string(),
            backtest_start: None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PersistPolicy {
    #[default]
    Replace,
    Append,
}

impl From<PersistPolicy> for WriteMode {
    fn from(value: PersistPolicy) -> Self {
        match value {
            PersistPolicy::Replace => WriteMode::Replace,
            PersistPolicy::Append => WriteMode::Append,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    pub data_dir: PathBuf,
    /// Raw-series store file name; defaults to `{asset_type}_data.db`.
    pub database: Option<String>,
    /// Read the stored table instead of calling the provider.
    pub offline: bool,
    pub persist: PersistPolicy,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(DEFAULT_DATA_DIR),
            database: None,
            offline: false,
            persist: PersistPolicy::Replace,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DashboardConfig {
    /// Serve the dashboard after the run.
    pub plot: bool,
    pub port: u16,
}

impl Default for DashboardConfig {
    fn default() -> Self {
        Self {
            plot: false,
            port: DEFAULT_PORT,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay_secs: f64,
    pub max_delay_secs: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        let policy = RetryPolicy::default();
        Self {
            max_retries: policy.max_retries,
            base_delay_secs: policy.base_delay.as_secs_f64(),
            max_delay_secs: policy.max_delay.as_secs_f64(),
        }
    }
}

fn delay(secs: f64) -> Result<Duration, ConfigError> {
    Duration::try_from_secs_f64(secs).map_err(|e| ConfigError::InvalidValue {
        flag: "retry",
        reason: format!("delay {secs} s: {e}"),
    })
}

impl RetryConfig {
    pub fn policy(&self) -> Result<RetryPolicy, ConfigError> {
        if self.max_retries > MAX_RETRIES {
            return Err(ConfigError::InvalidValue {
                flag: "retry",
                reason: format!("max_retries must be at most {MAX_RETRIES}"),
            });
        }
        Ok(RetryPolicy {
            max_retries: self.max_retries,
            base_delay: delay(self.base_delay_secs)?,
            max_delay: delay(self.max_delay_secs)?,
        })
    }
}

// ── AnalysisConfig ───────────────────────────────────────────────────

/// Everything one analysis run needs, passed explicitly to each stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AnalysisConfig {
    pub asset: AssetConfig,
    pub data: DataConfig,
    pub model: ModelConfig,
    pub dashboard: DashboardConfig,
    pub retry: RetryConfig,
}

impl AnalysisConfig {
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(text)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml(&text)
    }

    /// Normalized ticker (upper case, crypto quote currency applied).
    pub fn ticker(&self) -> String {
        normalize_ticker(&self.asset.ticker, self.asset.asset_type)
    }

    pub fn currency_symbol(&self) -> &'static str {
        currency_symbol(&self.ticker())
    }

    /// `{ticker}_{model}` table shared by the raw and assessment stores.
    pub fn table_name(&self) -> Result<String, ConfigError> {
        store::table_name(&self.ticker(), &self.asset.model_name).map_err(|e| {
            ConfigError::InvalidValue {
                flag: "--ticker",
                reason: e.to_string(),
            }
        })
    }

    pub fn raw_db_path(&self) -> PathBuf {
        let file = self
            .data
            .database
            .clone()
            .unwrap_or_else(|| format!("{}_data.db", self.asset.asset_type.name()));
        self.data.data_dir.join(file)
    }

    pub fn predictions_db_path(&self) -> PathBuf {
        self.data
            .data_dir
            .join(format!("{}_predictions.db", self.asset.asset_type.name()))
    }

    pub fn end_date(&self, today: NaiveDate) -> NaiveDate {
        self.asset.end.resolve(today)
    }

    /// Check every field that would otherwise fail deep inside the pipeline.
    pub fn validate(&self, today: NaiveDate) -> Result<(), ConfigError> {
        if self.asset.ticker.trim().is_empty() {
            return Err(ConfigError::InvalidValue {
                flag: "--ticker",
                reason: "a ticker is required, e.g. BTC-USD".into(),
            });
        }
        self.table_name()?;
        if self.asset.window == 0 {
            return Err(ConfigError::InvalidValue {
                flag: "--window",
                reason: "must be a positive integer".into(),
            });
        }
        if let Some(db) = &self.data.database {
            if db.trim().is_empty() || db.contains(['/', '\\']) {
                return Err(ConfigError::InvalidValue {
                    flag: "--database",
                    reason: format!("'{db}' must be a plain file name"),
                });
            }
        }
        if self.dashboard.port == 0 {
            return Err(ConfigError::InvalidValue {
                flag: "--port",
                reason: "must be between 1 and 65535".into(),
            });
        }
        self.retry.policy()?;
        self.model
            .validate()
            .map_err(|e| ConfigError::InvalidValue {
                flag: "model",
                reason: e.to_string(),
            })?;

        let end = self.end_date(today);
        if self.asset.start > end {
            return Err(ConfigError::StartAfterEnd {
                start: self.asset.start,
                end,
            });
        }
        Ok(())
    }
}
