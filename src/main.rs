//! CLI entry point for the COVID mobility analysis.
//!
//! `run` fetches the three sources and produces every artifact; `plot` and
//! `predict` work from an existing `final.csv` in the output directory.

use anyhow::Result;
use clap::{Parser, Subcommand};
use covid_mobility::{
    config::Config,
    fetch::BasicClient,
    pipeline::{load_final_table, run, run_plots, run_prediction},
};
use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use tracing::info;
use tracing_subscriber::{
    EnvFilter, Layer,
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

#[derive(Parser)]
#[command(name = "covid_mobility")]
#[command(about = "Merge mobility and COVID case data, chart it and predict cases", long_about = None)]
struct Cli {
    /// TOML config file; defaults are used when omitted
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Directory for downloaded copies, final.csv and charts
    #[arg(short, long, global = true)]
    output_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Fetch all sources, build final.csv, draw charts and predict cases
    Run,
    /// Draw the state charts from an existing final.csv
    Plot {
        /// State FIPS code to chart
        #[arg(short, long)]
        fips: Option<u32>,

        /// Name used for the chart files
        #[arg(short, long)]
        name: Option<String>,
    },
    /// Train the model on an existing final.csv and chart one state's predictions
    Predict {
        /// State FIPS code to chart
        #[arg(short, long)]
        fips: Option<u32>,

        /// Name used for the chart file
        #[arg(short, long)]
        name: Option<String>,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok(); // Load .env file

    // Logging setup: colored stderr + JSON rolling log file
    let log_file_path =
        std::env::var("LOG_FILE_PATH").unwrap_or_else(|_| "logs/covid_mobility.log".to_string());
    let log_dir = Path::new(&log_file_path)
        .parent()
        .unwrap_or(Path::new("logs"));
    let log_file_name = Path::new(&log_file_path)
        .file_name()
        .unwrap_or(OsStr::new("covid_mobility.log"));

    let file_appender = tracing_appender::rolling::daily(log_dir, log_file_name);
    let (non_blocking_file, _file_guard) = tracing_appender::non_blocking(file_appender);

    let stderr_layer = fmt::layer()
        .with_target(true)
        .with_span_events(FmtSpan::CLOSE)
        .with_ansi(true)
        .with_writer(std::io::stderr)
        .with_filter(EnvFilter::from_env("RUST_LOG").add_directive("info".parse()?));

    let json_layer = fmt::layer()
        .json()
        .with_current_span(true)
        .with_span_list(true)
        .with_writer(non_blocking_file)
        .with_filter(EnvFilter::from_env("RUST_LOG_JSON").add_directive("debug".parse()?));

    tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .init();

    let cli = Cli::parse();

    let mut config = Config::load(cli.config.as_deref())?;
    if let Some(dir) = cli.output_dir {
        config.output_dir = dir;
    }
    info!(output_dir = %config.output_dir.display(), "Configuration ready");

    match cli.command {
        Commands::Run => {
            let client = BasicClient::new();
            run(&client, &config).await?;
        }
        Commands::Plot { fips, name } => {
            let fips = fips.unwrap_or(config.plots.fips);
            let name = name.unwrap_or_else(|| config.plots.name.clone());

            let records = load_final_table(&config)?;
            let paths = run_plots(&records, fips, &name, &config)?;
            info!(count = paths.len(), "Charts written");
        }
        Commands::Predict { fips, name } => {
            let fips = fips.unwrap_or(config.prediction.fips);
            let name = name.unwrap_or_else(|| config.prediction.name.clone());

            let records = load_final_table(&config)?;
            let (prediction_run, path) = run_prediction(&records, fips, &name, &config)?;
            info!(
                predictions = prediction_run.predictions.len(),
                rmse = prediction_run.metrics.rmse,
                path = %path.display(),
                "Prediction complete"
            );
        }
    }

    Ok(())
}
