//! AssetCast CLI — analyze, fetch, show and export commands.
//!
//! Commands:
//! - `analyze` — fetch, train, back-test, store the assessment, optionally plot
//! - `fetch` — download a price history into the raw store only
//! - `show` — print a stored assessment table, one date's entry, or raw bars
//! - `export` — write a stored assessment table to CSV

use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use assetcast_core::analytics::format_currency;
use assetcast_core::data::{MarketDataGateway, YahooProvider};
use assetcast_core::domain::{PredictionRecord, PriceBar};
use assetcast_core::store::LocalStore;
use assetcast_dashboard::{launch, DashboardData};
use assetcast_runner::{
    dashboard_description, fetch_and_store, load_assessment, lookup_entry, run_analysis,
    text_summary, write_manifest, write_records_csv, AnalysisConfig, EndDate, LoggingObserver,
};
use chrono::NaiveDate;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(
    name = "assetcast",
    about = "AssetCast CLI — next-day price prediction for one crypto or stock asset"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch history, train the model, assess it and store the results.
    Analyze {
        #[command(flatten)]
        target: TargetArgs,

        #[command(flatten)]
        model: ModelArgs,

        /// Use the stored raw table instead of downloading.
        #[arg(long, default_value_t = false)]
        offline: bool,

        /// Only assess dates on or after this day (YYYY-MM-DD).
        #[arg(long)]
        backtest_start: Option<String>,

        /// Serve the chart after the run.
        #[arg(long, default_value_t = false)]
        plot: bool,

        /// Dashboard port. Defaults to 8050.
        #[arg(long)]
        port: Option<u16>,

        /// Also write the assessment to this CSV file.
        #[arg(long)]
        csv: Option<PathBuf>,

        /// Directory for the JSON run manifest.
        #[arg(long)]
        manifest_dir: Option<PathBuf>,

        /// Save the trained model weights as JSON.
        #[arg(long)]
        save_model: Option<PathBuf>,
    },
    /// Download history into the raw store without training.
    Fetch {
        #[command(flatten)]
        target: TargetArgs,
    },
    /// Print a stored table.
    Show {
        #[command(flatten)]
        target: TargetArgs,

        /// Print only the assessment entry for this date (YYYY-MM-DD).
        #[arg(long)]
        date: Option<String>,

        /// Print the raw OHLCV table instead of the assessment.
        #[arg(long, default_value_t = false)]
        raw: bool,

        /// Print at most this many rows (the most recent ones).
        #[arg(long)]
        limit: Option<usize>,
    },
    /// Write a stored assessment table to CSV.
    Export {
        #[command(flatten)]
        target: TargetArgs,

        /// Destination CSV file.
        #[arg(long)]
        output: PathBuf,
    },
}

/// Which asset, which range, which store.
#[derive(Args, Debug, Default)]
struct TargetArgs {
    /// TOML config file; flags override its values.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Ticker symbol (e.g., BTC-USD, AAPL).
    #[arg(long)]
    ticker: Option<String>,

    /// Cryptocurrency, crypto or stock.
    #[arg(long)]
    asset_type: Option<String>,

    /// Prior closes per prediction. Defaults to 60.
    #[arg(long)]
    window: Option<usize>,

    /// Start date (YYYY-MM-DD). Defaults to 2019-11-01.
    #[arg(long)]
    start: Option<String>,

    /// End the range today (the default).
    #[arg(long, default_value_t = false)]
    today: bool,

    #[arg(long)]
    end_year: Option<i32>,

    #[arg(long)]
    end_month: Option<u32>,

    #[arg(long)]
    end_day: Option<u32>,

    /// Raw-series store file name inside the data directory.
    #[arg(long)]
    database: Option<String>,

    /// Store directory. Defaults to ./Databases.
    #[arg(long)]
    data_dir: Option<PathBuf>,

    /// Model name used as the table suffix. Defaults to lstm.
    #[arg(long)]
    model_name: Option<String>,
}

#[derive(Args, Debug, Default)]
struct ModelArgs {
    /// Hidden units per LSTM layer.
    #[arg(long)]
    units: Option<usize>,

    #[arg(long)]
    dropout: Option<f64>,

    /// sgd, adam or rmsprop.
    #[arg(long)]
    optimizer: Option<String>,

    /// mean_squared_error (mse), mean_absolute_error (mae) or huber.
    #[arg(long)]
    loss: Option<String>,

    #[arg(long)]
    epochs: Option<usize>,

    #[arg(long)]
    batch_size: Option<usize>,

    /// Closes predicted per example; only the first is assessed.
    #[arg(long)]
    output_size: Option<usize>,

    #[arg(long)]
    learning_rate: Option<f64>,

    /// Master seed for weight init, shuffling and dropout.
    #[arg(long)]
    seed: Option<u64>,
}

fn main() -> Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Commands::Analyze {
            target,
            model,
            offline,
            backtest_start,
            plot,
            port,
            csv,
            manifest_dir,
            save_model,
        } => {
            let mut config = build_config(&target)?;
            apply_model_args(&mut config, &model)?;
            config.data.offline |= offline;
            config.dashboard.plot |= plot;
            if let Some(port) = port {
                config.dashboard.port = port;
            }
            if let Some(s) = backtest_start {
                config.asset.backtest_start = Some(parse_date("--backtest-start", &s)?);
            }
            config.validate(today())?;
            run_analyze(&config, csv, manifest_dir, save_model)
        }
        Commands::Fetch { target } => {
            let config = build_config(&target)?;
            config.validate(today())?;
            run_fetch(&config)
        }
        Commands::Show {
            target,
            date,
            raw,
            limit,
        } => {
            let config = build_config(&target)?;
            let date = date.map(|d| parse_date("--date", &d)).transpose()?;
            run_show(&config, date, raw, limit)
        }
        Commands::Export { target, output } => {
            let config = build_config(&target)?;
            let records = load_assessment(&config)?;
            write_records_csv(&records, &output)?;
            println!("Exported {} rows to {}", records.len(), output.display());
            Ok(())
        }
    }
}

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

fn today() -> NaiveDate {
    chrono::Local::now().date_naive()
}

fn parse_date(flag: &str, value: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .with_context(|| format!("{flag}: '{value}' is not a YYYY-MM-DD date"))
}

/// Config file (or defaults) with target flags applied on top.
fn build_config(args: &TargetArgs) -> Result<AnalysisConfig> {
    let mut config = match &args.config {
        Some(path) => AnalysisConfig::from_file(path)?,
        None => AnalysisConfig::default(),
    };
    if let Some(ticker) = &args.ticker {
        config.asset.ticker = ticker.clone();
    }
    if let Some(asset_type) = &args.asset_type {
        config.asset.asset_type = asset_type.parse()?;
    }
    if let Some(window) = args.window {
        config.asset.window = window;
    }
    if let Some(start) = &args.start {
        config.asset.start = parse_date("--start", start)?;
    }
    if let Some(end) = EndDate::from_flags(args.today, args.end_year, args.end_month, args.end_day)?
    {
        config.asset.end = end;
    }
    if let Some(database) = &args.database {
        config.data.database = Some(database.clone());
    }
    if let Some(dir) = &args.data_dir {
        config.data.data_dir = dir.clone();
    }
    if let Some(name) = &args.model_name {
        config.asset.model_name = name.clone();
    }
    if config.asset.ticker.trim().is_empty() {
        bail!("--ticker is required (or set asset.ticker in the --config file)");
    }
    config.table_name()?;
    Ok(config)
}

fn apply_model_args(config: &mut AnalysisConfig, args: &ModelArgs) -> Result<()> {
    let model = &mut config.model;
    if let Some(units) = args.units {
        model.units = units;
    }
    if let Some(dropout) = args.dropout {
        model.dropout = dropout;
    }
    if let Some(optimizer) = &args.optimizer {
        model.optimizer = optimizer.parse().context("--optimizer")?;
    }
    if let Some(loss) = &args.loss {
        model.loss = loss.parse().context("--loss")?;
    }
    if let Some(epochs) = args.epochs {
        model.epochs = epochs;
    }
    if let Some(batch_size) = args.batch_size {
        model.batch_size = batch_size;
    }
    if let Some(output_size) = args.output_size {
        model.output_size = output_size;
    }
    if let Some(lr) = args.learning_rate {
        model.learning_rate = Some(lr);
    }
    if let Some(seed) = args.seed {
        model.seed = Some(seed);
    }
    Ok(())
}

fn gateway(config: &AnalysisConfig) -> Result<MarketDataGateway<YahooProvider>> {
    let provider = YahooProvider::new().context("failed to build HTTP client")?;
    Ok(MarketDataGateway::new(provider, config.retry.policy()?))
}

fn run_analyze(
    config: &AnalysisConfig,
    csv: Option<PathBuf>,
    manifest_dir: Option<PathBuf>,
    save_model: Option<PathBuf>,
) -> Result<()> {
    let gateway = gateway(config)?;
    let mut observer = LoggingObserver::new(config.asset.model_name.clone()).every(5);
    let outcome = run_analysis(config, &gateway, &mut observer)?;

    println!();
    print!("{}", text_summary(&outcome));

    if let Some(path) = csv {
        write_records_csv(&outcome.records, &path)?;
        println!("Assessment CSV: {}", path.display());
    }
    if let Some(dir) = manifest_dir {
        let path = write_manifest(&outcome, &dir)?;
        println!("Run manifest:   {}", path.display());
    }
    if let Some(path) = save_model {
        outcome
            .model
            .save_json(&path)
            .with_context(|| format!("failed to save model to {}", path.display()))?;
        println!("Model weights:  {}", path.display());
    }

    if config.dashboard.plot {
        let data = DashboardData::from_records(
            outcome.ticker.clone(),
            outcome.currency_symbol,
            &outcome.records,
            outcome.forecast,
            outcome.volatility,
            dashboard_description(&outcome),
        );
        let handle = launch(data, config.dashboard.port)
            .with_context(|| format!("--port {}", config.dashboard.port))?;
        println!("Dashboard:      {} (Ctrl-C to stop)", handle.url());
        handle.wait()?;
    }
    Ok(())
}

fn run_fetch(config: &AnalysisConfig) -> Result<()> {
    let gateway = gateway(config)?;
    let fetched = fetch_and_store(config, &gateway, today())?;
    let range = match (fetched.first_date, fetched.last_date) {
        (Some(first), Some(last)) => format!("{first} → {last}"),
        _ => "empty".to_string(),
    };
    println!(
        "Stored {} rows for {} in {} (table {}, {range})",
        fetched.rows,
        fetched.ticker,
        fetched.raw_db.display(),
        fetched.table
    );
    Ok(())
}

fn run_show(
    config: &AnalysisConfig,
    date: Option<NaiveDate>,
    raw: bool,
    limit: Option<usize>,
) -> Result<()> {
    let cur = config.currency_symbol();
    if let Some(date) = date {
        let entry = lookup_entry(config, date)?;
        print_records(&[entry], cur);
        return Ok(());
    }

    if raw {
        let table = config.table_name()?;
        let store = LocalStore::open(config.raw_db_path())?;
        let (bars, _) = store.read_table::<PriceBar>(&table)?;
        println!(
            "{:<12} {:>14} {:>14} {:>14} {:>14} {:>16}",
            "Date", "Open", "High", "Low", "Close", "Volume"
        );
        println!("{}", "-".repeat(89));
        for b in tail(&bars, limit) {
            println!(
                "{:<12} {:>14} {:>14} {:>14} {:>14} {:>16}",
                b.date.to_string(),
                format_currency(b.open, cur),
                format_currency(b.high, cur),
                format_currency(b.low, cur),
                format_currency(b.close, cur),
                b.volume
            );
        }
        return Ok(());
    }

    let records = load_assessment(config)?;
    print_records(tail(&records, limit), cur);
    Ok(())
}

fn tail<T>(rows: &[T], limit: Option<usize>) -> &[T] {
    let n = limit.unwrap_or(rows.len()).min(rows.len());
    &rows[rows.len() - n..]
}

fn print_records(records: &[PredictionRecord], cur: &str) {
    println!(
        "{:<12} {:>14} {:>16} {:>12} {:>10}",
        "Date", "Real", "Predicted", "Difference", "Diff %"
    );
    println!("{}", "-".repeat(68));
    for r in records {
        println!(
            "{:<12} {:>14} {:>16} {:>12} {:>9.2}%",
            r.date.to_string(),
            format_currency(r.actual_close, cur),
            format_currency(r.predicted_close, cur),
            format_currency(r.difference, cur),
            r.percent_difference
        );
    }
}
