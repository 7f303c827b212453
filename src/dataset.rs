use std::fs::{self, File};
use std::path::{Path, PathBuf};

use chrono::{Datelike, NaiveDate, NaiveDateTime};
use polars::prelude::*;

use crate::error::{PipelineError, PipelineResult, SchemaError};
use crate::logging::log_event;

pub const DATE_COLUMN: &str = "Date";

const CE_DAYS_AT_UNIX_EPOCH: i32 = 719_163;
const DATE_FORMATS: [&str; 3] = ["%Y-%m-%d", "%Y/%m/%d", "%m/%d/%Y"];
const DATETIME_FORMATS: [&str; 2] = ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S"];

/// One ticker's rows keyed by a `Date` column of polars `Date` dtype, ascending.
#[derive(Debug, Clone)]
pub struct TimeSeriesTable {
    ticker: String,
    frame: DataFrame,
}

impl TimeSeriesTable {
    /// Build a table from an in-memory frame, normalizing and sorting its `Date` column.
    pub fn from_frame(ticker: impl Into<String>, frame: DataFrame) -> PipelineResult<Self> {
        let ticker = ticker.into();
        let origin = PathBuf::from(format!("<{ticker} frame>"));
        let frame = sort_by_date(frame, &origin)?;
        Ok(Self { ticker, frame })
    }

    pub fn ticker(&self) -> &str {
        &self.ticker
    }

    pub fn frame(&self) -> &DataFrame {
        &self.frame
    }

    pub fn into_frame(self) -> DataFrame {
        self.frame
    }

    pub fn height(&self) -> usize {
        self.frame.height()
    }

    /// Same ticker, new contents. Callers are responsible for keeping the `Date` column intact.
    pub fn with_frame(&self, frame: DataFrame) -> Self {
        Self {
            ticker: self.ticker.clone(),
            frame,
        }
    }

    pub fn dates(&self) -> PipelineResult<Vec<NaiveDate>> {
        let days = self
            .frame
            .column(DATE_COLUMN)?
            .cast(&DataType::Int32)?;
        let dates = days
            .i32()?
            .into_iter()
            .enumerate()
            .map(|(row, value)| {
                value.and_then(days_to_date).ok_or_else(|| PipelineError::DataLoad {
                    path: PathBuf::from(format!("<{} frame>", self.ticker)),
                    reason: format!("missing date at row {row}"),
                })
            })
            .collect::<PipelineResult<Vec<_>>>()?;
        Ok(dates)
    }
}

/// Read a CSV with headers into memory.
///
/// Date columns stay as text here. Polars guesses a single day-first or month-first layout
/// from the first value, which silently swaps `MM/DD/YYYY` dates whose day is 12 or less;
/// [`TimeSeriesTable`] parses them against explicit formats instead.
pub fn read_frame<P: AsRef<Path>>(path: P) -> PipelineResult<DataFrame> {
    let path_ref = path.as_ref();
    let load_error = |source: PolarsError| {
        log_event(
            file!(),
            "SeriesLoader",
            "read_frame",
            "dataset.load",
            line!(),
            &format!("Failed to load {}", path_ref.display()),
            Some(&source.to_string()),
            None,
        );
        PipelineError::DataLoad {
            path: path_ref.to_path_buf(),
            reason: source.to_string(),
        }
    };

    if !path_ref.is_file() {
        return Err(load_error(PolarsError::ComputeError(
            "file does not exist".into(),
        )));
    }

    LazyCsvReader::new(path_ref)
        .has_header(true)
        .with_try_parse_dates(false)
        .with_infer_schema_length(Some(2048))
        .finish()
        .and_then(|lazy| lazy.collect())
        .map_err(load_error)
}

/// Load one ticker's raw series, parse its `Date` column and sort rows ascending by date.
///
/// A date that appears on more than one row is [`SchemaError::DuplicateDate`].
pub fn load_series<P: AsRef<Path>>(path: P, ticker: &str) -> PipelineResult<TimeSeriesTable> {
    let path_ref = path.as_ref();
    let frame = read_frame(path_ref)?;
    let frame = sort_by_date(frame, path_ref)
        .and_then(|sorted| reject_duplicate_dates(sorted, ticker))
        .inspect_err(|error| {
            log_event(
                file!(),
                "SeriesLoader",
                "load_series",
                "dataset.load",
                line!(),
                &format!("Rejected {}", path_ref.display()),
                Some(&error.to_string()),
                Some(ticker),
            );
        })?;

    log_event(
        file!(),
        "SeriesLoader",
        "load_series",
        "dataset.load",
        line!(),
        &format!(
            "Loaded {} rows from {}",
            frame.height(),
            path_ref.display()
        ),
        None,
        Some(ticker),
    );

    Ok(TimeSeriesTable {
        ticker: ticker.to_string(),
        frame,
    })
}

/// Persist a frame as CSV with ISO dates. The file is written next to `path` and renamed
/// into place, so a failed write never leaves a truncated output behind.
pub fn write_csv<P: AsRef<Path>>(frame: &DataFrame, path: P) -> PipelineResult<()> {
    let path_ref = path.as_ref();
    let write_error = |source: std::io::Error| PipelineError::Write {
        path: path_ref.to_path_buf(),
        source,
    };

    if let Some(parent) = path_ref.parent()
        && !parent.as_os_str().is_empty()
    {
        fs::create_dir_all(parent).map_err(write_error)?;
    }

    let staging = path_ref.with_extension("csv.partial");
    let mut output = frame.clone();
    let written = File::create(&staging).map_err(write_error).and_then(|mut file| {
        CsvWriter::new(&mut file)
            .has_header(true)
            .with_date_format(Some("%Y-%m-%d".to_string()))
            .finish(&mut output)
            .map_err(|error| write_error(std::io::Error::other(error.to_string())))
    });

    if let Err(error) = written {
        let _ = fs::remove_file(&staging);
        return Err(error);
    }

    fs::rename(&staging, path_ref).map_err(write_error)?;

    log_event(
        file!(),
        "SeriesLoader",
        "write_csv",
        "dataset.write",
        line!(),
        &format!(
            "Wrote {} rows x {} columns to {}",
            frame.height(),
            frame.width(),
            path_ref.display()
        ),
        None,
        None,
    );

    Ok(())
}

// Expects a frame already sorted by `sort_by_date`, so repeats are adjacent.
fn reject_duplicate_dates(frame: DataFrame, ticker: &str) -> PipelineResult<DataFrame> {
    let days = frame.column(DATE_COLUMN)?.cast(&DataType::Int32)?;
    let days: Vec<Option<i32>> = days.i32()?.into_iter().collect();
    if let Some(pair) = days.windows(2).find(|pair| pair[0] == pair[1])
        && let Some(date) = pair[0].and_then(days_to_date)
    {
        return Err(SchemaError::DuplicateDate {
            ticker: ticker.to_string(),
            date,
        }
        .into());
    }
    Ok(frame)
}

pub fn days_to_date(days: i32) -> Option<NaiveDate> {
    NaiveDate::from_num_days_from_ce_opt(days.checked_add(CE_DAYS_AT_UNIX_EPOCH)?)
}

pub fn date_to_days(date: NaiveDate) -> i32 {
    date.num_days_from_ce() - CE_DAYS_AT_UNIX_EPOCH
}

/// Build a polars `Date` series from calendar dates.
pub fn date_series(name: &str, dates: &[NaiveDate]) -> PolarsResult<Series> {
    let days: Vec<i32> = dates.iter().copied().map(date_to_days).collect();
    Series::new(name, days).cast(&DataType::Date)
}

fn parse_date_token(token: &str) -> Option<NaiveDate> {
    let token = token.trim();
    DATE_FORMATS
        .iter()
        .find_map(|format| NaiveDate::parse_from_str(token, format).ok())
        .or_else(|| {
            DATETIME_FORMATS
                .iter()
                .find_map(|format| NaiveDateTime::parse_from_str(token, format).ok())
                .map(|timestamp| timestamp.date())
        })
}

fn column_days(series: &Series) -> Result<Vec<Option<i32>>, String> {
    match series.dtype() {
        DataType::Date | DataType::Datetime(_, _) => {
            let as_date = series
                .cast(&DataType::Date)
                .and_then(|dates| dates.cast(&DataType::Int32))
                .map_err(|error| error.to_string())?;
            let days = as_date.i32().map_err(|error| error.to_string())?;
            Ok(days.into_iter().collect())
        }
        DataType::Utf8 => {
            let tokens = series.utf8().map_err(|error| error.to_string())?;
            tokens
                .into_iter()
                .enumerate()
                .map(|(row, token)| match token {
                    Some(raw) => parse_date_token(raw)
                        .map(|date| Some(date_to_days(date)))
                        .ok_or_else(|| format!("unparsable date `{raw}` at row {row}")),
                    None => Ok(None),
                })
                .collect()
        }
        other => Err(format!("date column has unsupported type {other}")),
    }
}

fn sort_by_date(frame: DataFrame, origin: &Path) -> PipelineResult<DataFrame> {
    let load_error = |reason: String| PipelineError::DataLoad {
        path: origin.to_path_buf(),
        reason,
    };

    let series = frame
        .column(DATE_COLUMN)
        .map_err(|_| load_error(format!("missing `{DATE_COLUMN}` column")))?;
    let days = column_days(series).map_err(load_error)?;

    let mut keyed = Vec::with_capacity(days.len());
    for (row, value) in days.into_iter().enumerate() {
        let day = value.ok_or_else(|| load_error(format!("missing date at row {row}")))?;
        keyed.push((day, row as IdxSize));
    }
    keyed.sort_by_key(|(day, _)| *day);

    let order = IdxCa::from_vec("order", keyed.iter().map(|(_, row)| *row).collect());
    let sorted_days: Vec<i32> = keyed.iter().map(|(day, _)| *day).collect();

    let mut sorted = frame.take(&order)?;
    sorted.with_column(Series::new(DATE_COLUMN, sorted_days).cast(&DataType::Date)?)?;
    Ok(sorted)
}
