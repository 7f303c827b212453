use std::collections::{BTreeSet, HashMap, HashSet};

use chrono::NaiveDate;
use polars::prelude::*;

use crate::dataset::{DATE_COLUMN, TimeSeriesTable, date_series};
use crate::error::{PipelineError, PipelineResult, SchemaError};
use crate::logging::log_event;

fn date_positions(table: &TimeSeriesTable) -> PipelineResult<HashMap<NaiveDate, IdxSize>> {
    let dates = table.dates()?;
    let mut positions = HashMap::with_capacity(dates.len());
    for (row, date) in dates.into_iter().enumerate() {
        if positions.insert(date, row as IdxSize).is_some() {
            let error = SchemaError::DuplicateDate {
                ticker: table.ticker().to_string(),
                date,
            };
            log_event(
                file!(),
                "SeriesAligner",
                "align_on_date",
                "align.validate",
                line!(),
                "Refusing to join a table with repeated dates",
                Some(&error.to_string()),
                Some(table.ticker()),
            );
            return Err(error.into());
        }
    }
    Ok(positions)
}

/// Inner-join every table on `Date`.
///
/// The result has one `Date` column followed by the non-date columns of each table in
/// input order, restricted to the dates present in all tables and sorted ascending.
/// Repeated dates within a table and non-date column names shared between tables are
/// rejected.
pub fn align_on_date(tables: &[TimeSeriesTable]) -> PipelineResult<DataFrame> {
    let Some(first) = tables.first() else {
        return Err(PipelineError::InsufficientData {
            stage: "align".to_string(),
            required: 1,
            available: 0,
        });
    };

    let positions = tables
        .iter()
        .map(date_positions)
        .collect::<PipelineResult<Vec<_>>>()?;

    let common: BTreeSet<NaiveDate> = positions[0]
        .keys()
        .copied()
        .filter(|date| positions[1..].iter().all(|other| other.contains_key(date)))
        .collect();
    let common: Vec<NaiveDate> = common.into_iter().collect();

    let mut seen: HashSet<String> = HashSet::from([DATE_COLUMN.to_string()]);
    let mut columns = vec![date_series(DATE_COLUMN, &common)?];

    for (table, lookup) in tables.iter().zip(&positions) {
        let rows: Vec<IdxSize> = common.iter().map(|date| lookup[date]).collect();
        let taken = table.frame().take(&IdxCa::from_vec("rows", rows))?;

        for series in taken.get_columns() {
            let name = series.name();
            if name == DATE_COLUMN {
                continue;
            }
            if !seen.insert(name.to_string()) {
                let error = SchemaError::ColumnCollision {
                    ticker: table.ticker().to_string(),
                    column: name.to_string(),
                };
                log_event(
                    file!(),
                    "SeriesAligner",
                    "align_on_date",
                    "align.join",
                    line!(),
                    "Column name collision while joining",
                    Some(&error.to_string()),
                    Some(table.ticker()),
                );
                return Err(error.into());
            }
            columns.push(series.clone());
        }
    }

    let aligned = DataFrame::new(columns)?;

    log_event(
        file!(),
        "SeriesAligner",
        "align_on_date",
        "align.join",
        line!(),
        &format!(
            "Aligned {} tables starting from {} into {} common dates and {} columns",
            tables.len(),
            first.ticker(),
            aligned.height(),
            aligned.width()
        ),
        None,
        None,
    );

    Ok(aligned)
}
