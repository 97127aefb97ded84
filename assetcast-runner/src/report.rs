//! Reporting and export — text summary, assessment CSV, JSON run manifest.
//!
//! The manifest carries a `schema_version`; newer versions are rejected on
//! load.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use assetcast_core::analytics::{format_currency, AssessmentMetrics};
use assetcast_core::domain::PredictionRecord;
use assetcast_core::model::ModelConfig;
use chrono::{NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use crate::pipeline::AnalysisOutcome;

/// Current schema version for run manifests.
pub const SCHEMA_VERSION: u32 = 1;

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

// ─── Text ───────────────────────────────────────────────────────────

/// Multi-line human-readable summary of a run.
pub fn text_summary(outcome: &AnalysisOutcome) -> String {
    let cur = outcome.currency_symbol;
    let m = &outcome.metrics;
    let mut out = String::new();
    let _ = writeln!(
        out,
        "{} ({}) {} → {}",
        outcome.ticker, outcome.asset_type, outcome.start, outcome.end
    );
    let _ = writeln!(
        out,
        "  bars: {}  table: {}  dataset: {}",
        outcome.bars,
        outcome.table,
        short_hash(&outcome.dataset_hash)
    );
    let _ = writeln!(
        out,
        "  back-test: {} days  MAE {}  RMSE {}  MAPE {:.2}%  max |Δ%| {:.2}%",
        m.count,
        format_currency(m.mae, cur),
        format_currency(m.rmse, cur),
        m.mape,
        m.max_abs_percent
    );
    if let Some(loss) = outcome.model.final_loss() {
        let _ = writeln!(
            out,
            "  training: {} epochs  final loss {:.6}  seed {}",
            outcome.model.loss_history.len(),
            loss,
            outcome.model.seed
        );
    }
    let _ = writeln!(out, "  volatility: {:.2}%", outcome.volatility);
    let _ = writeln!(out, "  {}", outcome.summary.forecast_text);
    out
}

/// Description paragraph shown under the dashboard chart.
pub fn dashboard_description(outcome: &AnalysisOutcome) -> String {
    let summary = &outcome.summary;
    format!(
        "The prediction for the price of the asset on the next day (previous date: {}) is: {}. \
         The mean volatility of the asset is {:.2}%. Comparing the predicted price with the \
         last real value, {} can be observed between the two days.",
        summary.last_date,
        format_currency(summary.forecast, outcome.currency_symbol),
        outcome.volatility,
        summary.direction.description()
    )
}

fn short_hash(hash: &str) -> &str {
    hash.get(..12).unwrap_or(hash)
}

// ─── CSV export ─────────────────────────────────────────────────────

/// Assessment records as CSV with the store's column names.
///
/// Columns: Date, Real_Values, Predicted_Values, Difference, Percent_Difference
pub fn records_csv(records: &[PredictionRecord]) -> Result<String> {
    let mut wtr = csv::Writer::from_writer(vec![]);
    wtr.write_record([
        "Date",
        "Real_Values",
        "Predicted_Values",
        "Difference",
        "Percent_Difference",
    ])?;
    for r in records {
        wtr.write_record(&[
            r.date.format("%Y-%m-%d").to_string(),
            format!("{:.6}", r.actual_close),
            format!("{:.6}", r.predicted_close),
            format!("{:.6}", r.difference),
            format!("{:.6}", r.percent_difference),
        ])?;
    }
    let bytes = wtr.into_inner().context("failed to flush CSV writer")?;
    String::from_utf8(bytes).context("CSV output is not valid UTF-8")
}

pub fn write_records_csv(records: &[PredictionRecord], path: &Path) -> Result<()> {
    let csv = records_csv(records)?;
    ensure_parent(path)?;
    std::fs::write(path, csv).with_context(|| format!("failed to write {}", path.display()))
}

// ─── JSON manifest ──────────────────────────────────────────────────

/// Provenance of one analysis run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunManifest {
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub generated_at: String,
    pub ticker: String,
    pub asset_type: String,
    pub table: String,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub window: usize,
    pub bars: usize,
    /// BLAKE3 hash of the series the model was trained on.
    pub dataset_hash: String,
    pub model: ModelConfig,
    pub seed: u64,
    pub loss_history: Vec<f64>,
    pub metrics: AssessmentMetrics,
    pub volatility: f64,
    pub forecast: f64,
    pub last_date: NaiveDate,
}

impl RunManifest {
    pub fn from_outcome(outcome: &AnalysisOutcome) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            generated_at: Utc::now().to_rfc3339(),
            ticker: outcome.ticker.clone(),
            asset_type: outcome.asset_type.name().to_string(),
            table: outcome.table.clone(),
            start: outcome.start,
            end: outcome.end,
            window: outcome.model.window,
            bars: outcome.bars,
            dataset_hash: outcome.dataset_hash.clone(),
            model: outcome.model.config.clone(),
            seed: outcome.model.seed,
            loss_history: outcome.model.loss_history.clone(),
            metrics: outcome.metrics,
            volatility: outcome.volatility,
            forecast: outcome.forecast,
            last_date: outcome.summary.last_date,
        }
    }

    /// `{table}_{first 12 hash chars}.json`; a re-run on the same data overwrites.
    pub fn file_name(&self) -> String {
        format!("{}_{}.json", self.table, short_hash(&self.dataset_hash))
    }
}

/// Write the run manifest into `dir`, returning the file path.
pub fn write_manifest(outcome: &AnalysisOutcome, dir: &Path) -> Result<PathBuf> {
    let manifest = RunManifest::from_outcome(outcome);
    let json =
        serde_json::to_string_pretty(&manifest).context("failed to serialize run manifest")?;
    std::fs::create_dir_all(dir)
        .with_context(|| format!("failed to create manifest directory {}", dir.display()))?;
    let path = dir.join(manifest.file_name());
    std::fs::write(&path, json).with_context(|| format!("failed to write {}", path.display()))?;
    Ok(path)
}

/// Load a manifest, rejecting unknown schema versions.
pub fn read_manifest(path: &Path) -> Result<RunManifest> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let manifest: RunManifest =
        serde_json::from_str(&text).context("failed to deserialize run manifest")?;
    if manifest.schema_version > SCHEMA_VERSION {
        bail!(
            "unsupported schema version {} (max supported: {})",
            manifest.schema_version,
            SCHEMA_VERSION
        );
    }
    Ok(manifest)
}

fn ensure_parent(path: &Path) -> Result<()> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("failed to create {}", parent.display()))?;
        }
    }
    Ok(())
}
