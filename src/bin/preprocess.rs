use std::path::PathBuf;

use anyhow::Result;
use clap::Parser;
use tracing::info;

use wc22_weather::config::{self, PipelineConfig};
use wc22_weather::impute::ImputationStrategy;
use wc22_weather::pipeline;

/// Cleans, merges and analyses the match and weather tables, then writes the artifacts the
/// dashboard reads.
#[derive(Parser, Debug)]
#[command(name = "preprocess", version)]
struct Args {
    /// Match statistics CSV
    #[arg(long, env = "WC22_MATCHES_CSV", default_value = config::DEFAULT_MATCHES_CSV)]
    matches: PathBuf,

    /// Hourly weather CSV
    #[arg(long, env = "WC22_WEATHER_CSV", default_value = config::DEFAULT_WEATHER_CSV)]
    weather: PathBuf,

    /// Directory the CSV and JSON artifacts are written to
    #[arg(long, env = "WC22_OUT_DIR", default_value = ".")]
    out_dir: PathBuf,

    /// Gap filling for temperature and humidity: mean, ffill or linear
    #[arg(long, env = "WC22_IMPUTATION", default_value = "linear")]
    imputation: ImputationStrategy,

    /// Also export the tables to this .xlsx workbook
    #[arg(long, env = "WC22_XLSX")]
    xlsx: Option<PathBuf>,
}

impl From<Args> for PipelineConfig {
    fn from(args: Args) -> Self {
        Self {
            matches_path: args.matches,
            weather_path: args.weather,
            out_dir: args.out_dir,
            imputation: args.imputation,
            xlsx_path: args.xlsx,
        }
    }
}

fn main() -> Result<()> {
    let _ = dotenvy::from_filename(".env.local");
    let _ = dotenvy::from_filename(".env");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let config = PipelineConfig::from(Args::parse());
    let report = pipeline::run(&config)?;
    info!(
        rows = report.rows,
        outliers = report.outliers,
        unmatched = report.join.unmatched_rows,
        "preprocessing complete"
    );
    Ok(())
}
