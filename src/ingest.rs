//! Cleaning for raw vendor index exports before they enter the pipeline.
//!
//! Vendor files carry thousands separators in prices, suffixed volumes such as `12.5M`, and
//! percent signs in the change column. Every token either parses or surfaces as a
//! [`ParseNumericError`] carrying the original text; nothing is silently nulled.

use polars::prelude::*;
use thiserror::Error;

use crate::dataset::TimeSeriesTable;
use crate::error::{PipelineError, PipelineResult};
use crate::logging::log_event;

const PRICE_COLUMNS: [&str; 4] = ["Open", "High", "Low", "Close"];
const VENDOR_VOLUME_COLUMN: &str = "Vol.";
const CHANGE_COLUMN: &str = "Change %";

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("could not parse `{token}` as a number")]
pub struct ParseNumericError {
    pub token: String,
}

impl ParseNumericError {
    fn new(token: &str) -> Self {
        Self {
            token: token.to_string(),
        }
    }
}

fn parse_plain(token: &str) -> Result<f64, ParseNumericError> {
    let cleaned = token.trim().replace(',', "");
    cleaned
        .parse::<f64>()
        .map_err(|_| ParseNumericError::new(token))
}

/// Parse a number with an optional `K`, `M` or `B` magnitude suffix (`12M` → 12,000,000).
pub fn parse_numeric(token: &str) -> Result<f64, ParseNumericError> {
    let normalized = token.trim().to_ascii_uppercase();
    let (digits, scale) = match normalized.chars().last() {
        Some('B') => (&normalized[..normalized.len() - 1], 1_000_000_000.0),
        Some('M') => (&normalized[..normalized.len() - 1], 1_000_000.0),
        Some('K') => (&normalized[..normalized.len() - 1], 1_000.0),
        _ => (normalized.as_str(), 1.0),
    };

    parse_plain(digits)
        .map(|value| value * scale)
        .map_err(|_| ParseNumericError::new(token))
}

/// Parse a percentage such as `-1.25%` into `-1.25`.
pub fn parse_percent(token: &str) -> Result<f64, ParseNumericError> {
    parse_plain(&token.replace('%', "")).map_err(|_| ParseNumericError::new(token))
}

fn is_missing_token(token: &str) -> bool {
    matches!(token.trim(), "" | "-")
}

fn numeric_column(
    frame: &DataFrame,
    column: &str,
    output: &str,
    parser: fn(&str) -> Result<f64, ParseNumericError>,
) -> PipelineResult<Series> {
    let series = frame.column(column)?;
    if series.dtype().is_numeric() {
        let mut casted = series.cast(&DataType::Float64)?;
        casted.rename(output);
        return Ok(casted);
    }

    let tokens = series.cast(&DataType::Utf8)?;
    let values = tokens
        .utf8()?
        .into_iter()
        .enumerate()
        .map(|(row, token)| match token {
            Some(raw) if !is_missing_token(raw) => {
                parser(raw).map(Some).map_err(|source| PipelineError::Parse {
                    column: column.to_string(),
                    row,
                    source,
                })
            }
            _ => Ok(None),
        })
        .collect::<PipelineResult<Vec<Option<f64>>>>()?;

    Ok(Series::new(output, values))
}

/// Normalize a raw index export into the OHLCV + `Change %` layout the loader expects.
///
/// `Price` becomes `Close` when no `Close` column exists, `Vol.` becomes `Volume`, and rows
/// are sorted ascending by `Date`.
pub fn clean_vendor_index(frame: &DataFrame) -> PipelineResult<DataFrame> {
    let mut cleaned = frame.clone();
    let names: Vec<String> = cleaned
        .get_column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let has = |name: &str| names.iter().any(|present| present == name);

    if has("Price") && !has("Close") {
        cleaned.rename("Price", "Close")?;
    }

    for column in PRICE_COLUMNS {
        if cleaned.get_column_names().contains(&column) {
            let parsed = numeric_column(&cleaned, column, column, parse_plain)?;
            cleaned.with_column(parsed)?;
        }
    }

    let volume_source = if has(VENDOR_VOLUME_COLUMN) {
        Some(VENDOR_VOLUME_COLUMN)
    } else if has("Volume") {
        Some("Volume")
    } else {
        None
    };
    if let Some(source) = volume_source {
        let parsed = numeric_column(&cleaned, source, "Volume", parse_numeric)?;
        if source != "Volume" {
            cleaned.drop_in_place(source)?;
        }
        cleaned.with_column(parsed)?;
    }

    if has(CHANGE_COLUMN) {
        let parsed = numeric_column(&cleaned, CHANGE_COLUMN, CHANGE_COLUMN, parse_percent)?;
        cleaned.with_column(parsed)?;
    }

    let sorted = TimeSeriesTable::from_frame("index", cleaned)?.into_frame();

    log_event(
        file!(),
        "VendorIngest",
        "clean_vendor_index",
        "ingest.clean",
        line!(),
        &format!(
            "Cleaned vendor index export: {} rows, columns [{}]",
            sorted.height(),
            sorted.get_column_names().join(", ")
        ),
        None,
        None,
    );

    Ok(sorted)
}
