use std::collections::BTreeMap;

use thiserror::Error;

use crate::logging::log_event;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum MetricsError {
    #[error("actual has {actual} values but predicted has {predicted}")]
    LengthMismatch { actual: usize, predicted: usize },
    #[error("cannot evaluate an empty prediction set")]
    Empty,
    #[error("non-finite value at position {0}")]
    NonFinite(usize),
}

pub type MetricsResult<T> = Result<T, MetricsError>;

pub const MSE: &str = "MSE";
pub const R2: &str = "R2";

fn validate(actual: &[f64], predicted: &[f64]) -> MetricsResult<()> {
    if actual.len() != predicted.len() {
        return Err(MetricsError::LengthMismatch {
            actual: actual.len(),
            predicted: predicted.len(),
        });
    }
    if actual.is_empty() {
        return Err(MetricsError::Empty);
    }
    if let Some(position) = actual
        .iter()
        .zip(predicted)
        .position(|(a, p)| !a.is_finite() || !p.is_finite())
    {
        return Err(MetricsError::NonFinite(position));
    }
    Ok(())
}

fn sum_squared_residuals(actual: &[f64], predicted: &[f64]) -> f64 {
    actual
        .iter()
        .zip(predicted)
        .map(|(a, p)| {
            let diff = a - p;
            diff * diff
        })
        .sum()
}

pub fn mean_squared_error(actual: &[f64], predicted: &[f64]) -> MetricsResult<f64> {
    validate(actual, predicted)?;
    Ok(sum_squared_residuals(actual, predicted) / actual.len() as f64)
}

/// Coefficient of determination. A constant target scores 1.0 when predicted exactly and
/// 0.0 otherwise.
pub fn r2_score(actual: &[f64], predicted: &[f64]) -> MetricsResult<f64> {
    validate(actual, predicted)?;
    let mean = actual.iter().sum::<f64>() / actual.len() as f64;
    let total = actual
        .iter()
        .map(|a| {
            let diff = a - mean;
            diff * diff
        })
        .sum::<f64>();
    let residual = sum_squared_residuals(actual, predicted);

    if total == 0.0 {
        return Ok(if residual == 0.0 { 1.0 } else { 0.0 });
    }
    Ok(1.0 - residual / total)
}

/// Metric name to value, keyed by [`MSE`] and [`R2`].
pub fn evaluate_predictions(
    actual: &[f64],
    predicted: &[f64],
) -> MetricsResult<BTreeMap<String, f64>> {
    let mse = mean_squared_error(actual, predicted).inspect_err(|error| {
        log_event(
            file!(),
            "Evaluator",
            "evaluate_predictions",
            "metrics.evaluate",
            line!(),
            "Rejected prediction set",
            Some(&error.to_string()),
            None,
        );
    })?;
    let r2 = r2_score(actual, predicted)?;

    log_event(
        file!(),
        "Evaluator",
        "evaluate_predictions",
        "metrics.evaluate",
        line!(),
        &format!("Evaluated {} predictions: MSE={mse:.4} R2={r2:.4}", actual.len()),
        None,
        None,
    );

    Ok(BTreeMap::from([(MSE.to_string(), mse), (R2.to_string(), r2)]))
}
