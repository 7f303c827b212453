use polars::prelude::*;

use crate::dataset::TimeSeriesTable;
use crate::error::{PipelineResult, SchemaError};
use crate::logging::log_event;

/// Raw spellings of the percent-change column, highest priority first.
pub const CHANGE_PCT_CANDIDATES: [&str; 3] = ["Change %", "Change_pct", "% Change"];

pub fn canonical_change_column(ticker: &str) -> String {
    format!("{ticker}_Change_pct")
}

/// Rename the first recognised percent-change column to `{ticker}_Change_pct` and cast it
/// to `Float64`.
///
/// Candidates are tried in the order given, so when several spellings coexist the earliest
/// one in `candidates` wins and the others are left untouched. A table that already carries
/// the canonical column is accepted as is.
pub fn standardize_change_column<S: AsRef<str>>(
    table: &TimeSeriesTable,
    candidates: &[S],
) -> PipelineResult<TimeSeriesTable> {
    let candidates: Vec<&str> = candidates.iter().map(|name| name.as_ref()).collect();
    let ticker = table.ticker();
    let expected = canonical_change_column(ticker);
    let mut frame = table.frame().clone();
    let present: Vec<String> = frame
        .get_column_names()
        .into_iter()
        .map(str::to_string)
        .collect();
    let has_canonical = present.contains(&expected);

    let source = if has_canonical {
        None
    } else {
        candidates
            .iter()
            .find(|candidate| present.iter().any(|name| name == *candidate))
            .map(|candidate| candidate.to_string())
    };

    match &source {
        Some(raw) => {
            frame.rename(raw, &expected)?;
        }
        None if !has_canonical => {
            let error = SchemaError::MissingColumn {
                ticker: ticker.to_string(),
                column: expected.clone(),
            };
            log_event(
                file!(),
                "ColumnStandardizer",
                "standardize_change_column",
                "standardize.rename",
                line!(),
                &format!(
                    "None of [{}] present in columns [{}]",
                    candidates.join(", "),
                    present.join(", ")
                ),
                Some(&error.to_string()),
                Some(ticker),
            );
            return Err(error.into());
        }
        None => {}
    }

    let numeric = frame
        .column(&expected)?
        .strict_cast(&DataType::Float64)
        .map_err(|_| SchemaError::NonNumericColumn {
            ticker: ticker.to_string(),
            column: expected.clone(),
        })?;
    frame.with_column(numeric)?;

    log_event(
        file!(),
        "ColumnStandardizer",
        "standardize_change_column",
        "standardize.rename",
        line!(),
        &format!(
            "Standardized {} -> {expected}",
            source.as_deref().unwrap_or(expected.as_str())
        ),
        None,
        Some(ticker),
    );

    Ok(table.with_frame(frame))
}
