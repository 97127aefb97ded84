//! AssetCast Runner — configuration, analysis pipeline, reporting.
//!
//! This crate builds on `assetcast-core` to provide:
//! - TOML run configuration with CLI-facing validation
//! - The fetch → store → train → assess → store pipeline
//! - Text, CSV and JSON-manifest reports
//! - A `tracing`-backed training progress observer

pub mod config;
pub mod pipeline;
pub mod progress;
pub mod report;

pub use config::{
    currency_symbol, normalize_ticker, AnalysisConfig, AssetType, ConfigError, Currency, EndDate,
    PersistPolicy,
};
pub use pipeline::{
    fetch_and_store, load_assessment, lookup_entry, run_analysis, run_analysis_at,
    AnalysisOutcome, DataMode, FetchOutcome, RunError,
};
pub use progress::LoggingObserver;
pub use report::{
    dashboard_description, read_manifest, records_csv, text_summary, write_manifest,
    write_records_csv, RunManifest, SCHEMA_VERSION,
};
