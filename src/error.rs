use std::path::PathBuf;

use chrono::NaiveDate;
use polars::prelude::PolarsError;
use thiserror::Error;

use crate::ingest::ParseNumericError;

#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("expected column `{column}` not found for {ticker} after standardization")]
    MissingColumn { ticker: String, column: String },
    #[error("column `{column}` from {ticker} already exists in the aligned table")]
    ColumnCollision { ticker: String, column: String },
    #[error("{ticker} contains duplicate date {date}")]
    DuplicateDate { ticker: String, date: NaiveDate },
    #[error("column `{column}` for {ticker} is not numeric")]
    NonNumericColumn { ticker: String, column: String },
}

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("failed to load {}: {reason}", path.display())]
    DataLoad { path: PathBuf, reason: String },
    #[error("schema error: {0}")]
    Schema(#[from] SchemaError),
    #[error("insufficient data at {stage}: {available} rows available, {required} required")]
    InsufficientData {
        stage: String,
        required: usize,
        available: usize,
    },
    #[error("column `{column}` row {row}: {source}")]
    Parse {
        column: String,
        row: usize,
        source: ParseNumericError,
    },
    #[error("invalid pipeline configuration: {0}")]
    InvalidConfig(String),
    #[error("failed to read configuration {}: {reason}", path.display())]
    Config { path: PathBuf, reason: String },
    #[error("failed to transform table: {source}")]
    Transform {
        #[from]
        source: PolarsError,
    },
    #[error("failed to write {}: {source}", path.display())]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },
}

pub type PipelineResult<T> = Result<T, PipelineError>;
