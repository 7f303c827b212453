//! Shapes the aligned feature matrix the way the model trainer consumes it.

use polars::prelude::*;

use crate::error::{PipelineError, PipelineResult, SchemaError};
use crate::logging::log_event;
use crate::standardize::canonical_change_column;

/// Predictor columns and target series for one target ticker.
#[derive(Debug, Clone)]
pub struct ModelInput {
    pub predictors: DataFrame,
    pub target: Series,
}

/// Split the aligned matrix into `*_Change_pct*` predictors from every other ticker and the
/// target ticker's `{ticker}_Change_pct` column.
pub fn define_target(frame: &DataFrame, ticker: &str) -> PipelineResult<ModelInput> {
    let target_column = canonical_change_column(ticker);
    let target_prefix = format!("{ticker}_");

    let target = frame
        .column(&target_column)
        .map_err(|_| SchemaError::MissingColumn {
            ticker: ticker.to_string(),
            column: target_column.clone(),
        })?
        .clone();

    let predictor_columns: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .filter(|name| name.contains("Change_pct") && !name.starts_with(&target_prefix))
        .map(str::to_string)
        .collect();

    if predictor_columns.is_empty() {
        return Err(SchemaError::MissingColumn {
            ticker: ticker.to_string(),
            column: "*_Change_pct predictor".to_string(),
        }
        .into());
    }

    let predictors = frame.select(predictor_columns.iter().map(String::as_str))?;

    log_event(
        file!(),
        "ModelInput",
        "define_target",
        "model_input.target",
        line!(),
        &format!(
            "Selected target {target_column} with {} predictors",
            predictor_columns.len()
        ),
        None,
        Some(ticker),
    );

    Ok(ModelInput { predictors, target })
}

/// Number of leading rows kept for training when the last `holdout_fraction` of the rows is
/// held out. The holdout size rounds up, so it is never empty for a positive fraction.
pub fn chronological_split(rows: usize, holdout_fraction: f64) -> PipelineResult<usize> {
    if !(holdout_fraction > 0.0 && holdout_fraction < 1.0) {
        return Err(PipelineError::InvalidConfig(format!(
            "holdout fraction must lie strictly between 0 and 1, got {holdout_fraction}"
        )));
    }

    let holdout = (rows as f64 * holdout_fraction).ceil() as usize;
    let train = rows.saturating_sub(holdout);
    if train == 0 || holdout == 0 {
        return Err(PipelineError::InsufficientData {
            stage: "chronological split".to_string(),
            required: 2,
            available: rows,
        });
    }

    Ok(train)
}

/// Leading training rows and trailing holdout rows, in date order.
pub fn split_frame(
    frame: &DataFrame,
    holdout_fraction: f64,
) -> PipelineResult<(DataFrame, DataFrame)> {
    let train = chronological_split(frame.height(), holdout_fraction)?;
    let holdout = frame.height() - train;
    Ok((frame.slice(0, train), frame.slice(train as i64, holdout)))
}
