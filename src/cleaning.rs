use polars::prelude::*;

use crate::dataset::TimeSeriesTable;
use crate::error::{PipelineResult, SchemaError};
use crate::features::{FeatureSpec, float_values};
use crate::logging::log_event;

/// Drop rows where any of this ticker's derived feature columns is missing.
///
/// Only the columns `spec` derives for `table.ticker()` are inspected; features belonging to
/// other tickers already present in the frame never cause a row to be dropped. Row order is
/// preserved and the result is renumbered from zero.
pub fn drop_incomplete_features(
    table: &TimeSeriesTable,
    spec: &FeatureSpec,
) -> PipelineResult<TimeSeriesTable> {
    let ticker = table.ticker();
    let frame = table.frame();
    let columns = spec.derived_columns(ticker);
    let present = frame.get_column_names();

    let mut keep = vec![true; frame.height()];
    for column in &columns {
        if !present.contains(&column.as_str()) {
            return Err(SchemaError::MissingColumn {
                ticker: ticker.to_string(),
                column: column.clone(),
            }
            .into());
        }

        for (row, value) in float_values(frame, column)?.into_iter().enumerate() {
            if value.is_none() {
                keep[row] = false;
            }
        }
    }

    let mask = BooleanChunked::from_slice("keep", &keep);
    let cleaned = frame.filter(&mask)?;
    let dropped = frame.height() - cleaned.height();

    log_event(
        file!(),
        "FeatureCleaner",
        "drop_incomplete_features",
        "cleaning.dropna",
        line!(),
        &format!(
            "Dropped {dropped} incomplete rows across {} feature columns; {} rows remain",
            columns.len(),
            cleaned.height()
        ),
        None,
        Some(ticker),
    );

    Ok(table.with_frame(cleaned))
}
