//! Load → standardize → derive → clean for each configured series, then align and persist.

use std::path::PathBuf;

use chrono::NaiveDate;
use polars::prelude::*;
use serde::Serialize;

use crate::align::align_on_date;
use crate::cleaning::drop_incomplete_features;
use crate::config::PipelineConfig;
use crate::dataset::{DATE_COLUMN, TimeSeriesTable, load_series, write_csv};
use crate::error::{PipelineError, PipelineResult};
use crate::features::{FeatureSpec, derive_features};
use crate::logging::log_event;
use crate::standardize::{canonical_change_column, standardize_change_column};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SeriesSummary {
    pub ticker: String,
    pub loaded_rows: usize,
    pub cleaned_rows: usize,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PipelineReport {
    pub output_path: PathBuf,
    pub rows: usize,
    pub columns: usize,
    pub first_date: Option<NaiveDate>,
    pub last_date: Option<NaiveDate>,
    pub series: Vec<SeriesSummary>,
}

/// Standardize, derive and clean one loaded series.
pub fn preprocess_series<S: AsRef<str>>(
    table: &TimeSeriesTable,
    spec: &FeatureSpec,
    candidates: &[S],
) -> PipelineResult<TimeSeriesTable> {
    let standardized = standardize_change_column(table, candidates)?;
    let derived = derive_features(&standardized, spec)?;
    drop_incomplete_features(&derived, spec)
}

/// Keep `Date`, the canonical change column and the derived features of this ticker only.
pub fn model_columns(
    table: &TimeSeriesTable,
    spec: &FeatureSpec,
) -> PipelineResult<TimeSeriesTable> {
    let ticker = table.ticker();
    let mut selection = vec![DATE_COLUMN.to_string(), canonical_change_column(ticker)];
    selection.extend(spec.derived_columns(ticker));
    let projected = table.frame().select(selection)?;
    Ok(table.with_frame(projected))
}

fn build_feature_matrix(
    config: &PipelineConfig,
) -> PipelineResult<(DataFrame, Vec<SeriesSummary>)> {
    config.validate()?;
    let spec = config.feature_spec()?;

    let mut processed = Vec::with_capacity(config.series.len());
    let mut summaries = Vec::with_capacity(config.series.len());

    for source in &config.series {
        let loaded = load_series(&source.path, &source.ticker)?;
        let candidates = config.change_column_candidates.as_slice();
        let cleaned = preprocess_series(&loaded, &spec, candidates)?;

        if cleaned.height() == 0 {
            return Err(PipelineError::InsufficientData {
                stage: format!("cleaning {}", source.ticker),
                required: spec.warm_up() + 1,
                available: loaded.height(),
            });
        }

        summaries.push(SeriesSummary {
            ticker: source.ticker.clone(),
            loaded_rows: loaded.height(),
            cleaned_rows: cleaned.height(),
        });
        processed.push(model_columns(&cleaned, &spec)?);
    }

    let aligned = align_on_date(&processed)?;
    if aligned.height() < config.min_rows {
        let error = PipelineError::InsufficientData {
            stage: "alignment".to_string(),
            required: config.min_rows,
            available: aligned.height(),
        };
        log_event(
            file!(),
            "PipelineDriver",
            "build_feature_matrix",
            "pipeline.align",
            line!(),
            "Aligned feature matrix is too short for training",
            Some(&error.to_string()),
            None,
        );
        return Err(error);
    }

    Ok((aligned, summaries))
}

/// Produce the aligned feature matrix without writing it.
pub fn run_preprocessing(config: &PipelineConfig) -> PipelineResult<DataFrame> {
    build_feature_matrix(config).map(|(aligned, _)| aligned)
}

/// Produce the aligned feature matrix and write it to `config.output_path`.
///
/// Nothing is written unless every stage succeeds.
pub fn run_and_persist(config: &PipelineConfig) -> PipelineResult<PipelineReport> {
    let (aligned, series) = build_feature_matrix(config)?;
    write_csv(&aligned, &config.output_path)?;

    let dates = TimeSeriesTable::from_frame("aligned", aligned.clone())?.dates()?;
    let report = PipelineReport {
        output_path: config.output_path.clone(),
        rows: aligned.height(),
        columns: aligned.width(),
        first_date: dates.first().copied(),
        last_date: dates.last().copied(),
        series,
    };

    log_event(
        file!(),
        "PipelineDriver",
        "run_and_persist",
        "pipeline.persist",
        line!(),
        &format!(
            "Preprocessing complete: {} rows x {} columns saved to {}",
            report.rows,
            report.columns,
            report.output_path.display()
        ),
        None,
        None,
    );

    Ok(report)
}
