//! Command line entry point.
//!
//! Commands:
//! - `run`: build the aligned feature matrix, write it as CSV and print the run report as JSON
//! - `clean-index`: normalize a raw vendor index export for `run`
//! - `evaluate`: score a CSV of actual vs predicted values and print the metrics as JSON

use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};

use tadawul_features::dataset::{read_frame, write_csv};
use tadawul_features::features::float_values;
use tadawul_features::ingest::clean_vendor_index;
use tadawul_features::{PipelineConfig, evaluate_predictions, logging, run_and_persist};

#[derive(Parser)]
#[command(
    name = "tadawul-features",
    about = "Feature engineering and date alignment for Tadawul return modelling"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Build the aligned feature matrix from the configured series.
    Run {
        /// JSON configuration file. Defaults to the Aramco / Al Rajhi / TASI layout.
        #[arg(long)]
        config: Option<PathBuf>,

        /// Directory that relative input and output paths are resolved against.
        #[arg(long)]
        data_dir: Option<PathBuf>,

        /// Override the output CSV path.
        #[arg(long)]
        output: Option<PathBuf>,
    },
    /// Clean a raw vendor index export (thousands separators, K/M/B volumes, `%` signs).
    CleanIndex {
        #[arg(long)]
        input: PathBuf,

        #[arg(long)]
        output: PathBuf,
    },
    /// Print MSE and R² for two numeric columns of a CSV as JSON.
    Evaluate {
        #[arg(long)]
        input: PathBuf,

        #[arg(long, default_value = "actual")]
        actual: String,

        #[arg(long, default_value = "predicted")]
        predicted: String,
    },
}

fn dense(values: Vec<Option<f64>>, column: &str) -> Result<Vec<f64>> {
    values
        .into_iter()
        .enumerate()
        .map(|(row, value)| value.with_context(|| format!("missing `{column}` value at row {row}")))
        .collect()
}

fn main() -> Result<()> {
    logging::init_logging()?;
    let cli = Cli::parse();

    match cli.command {
        Commands::Run {
            config,
            data_dir,
            output,
        } => {
            let mut pipeline = match config {
                Some(path) => PipelineConfig::from_json_file(&path)?,
                None => PipelineConfig::default(),
            };
            if let Some(root) = data_dir {
                pipeline = pipeline.with_data_dir(root);
            }
            if let Some(path) = output {
                pipeline.output_path = path;
            }

            let report = run_and_persist(&pipeline)?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Commands::CleanIndex { input, output } => {
            let raw = read_frame(&input)?;
            let cleaned = clean_vendor_index(&raw)?;
            write_csv(&cleaned, &output)?;
            println!("Saved: {}", output.display());
        }
        Commands::Evaluate {
            input,
            actual,
            predicted,
        } => {
            let frame = read_frame(&input)?;
            let actual_values = dense(float_values(&frame, &actual)?, &actual)?;
            let predicted_values = dense(float_values(&frame, &predicted)?, &predicted)?;
            let metrics = evaluate_predictions(&actual_values, &predicted_values)?;
            println!("{}", serde_json::to_string_pretty(&metrics)?);
        }
    }

    Ok(())
}
