use polars::prelude::*;

use crate::dataset::TimeSeriesTable;
use crate::error::{PipelineError, PipelineResult, SchemaError};
use crate::logging::log_event;
use crate::standardize::canonical_change_column;

/// Lags and rolling window applied to one ticker's percent-change column.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeatureSpec {
    lags: Vec<usize>,
    window: usize,
}

impl Default for FeatureSpec {
    fn default() -> Self {
        Self {
            lags: vec![1, 3, 5],
            window: 5,
        }
    }
}

impl FeatureSpec {
    /// Lags are sorted and de-duplicated; every lag must be at least 1 and the window at least 2.
    pub fn new(mut lags: Vec<usize>, window: usize) -> PipelineResult<Self> {
        if lags.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one lag is required".to_string(),
            ));
        }
        if lags.contains(&0) {
            return Err(PipelineError::InvalidConfig(
                "lags must be at least 1".to_string(),
            ));
        }
        if window < 2 {
            return Err(PipelineError::InvalidConfig(format!(
                "rolling window must be at least 2, got {window}"
            )));
        }

        lags.sort_unstable();
        lags.dedup();
        Ok(Self { lags, window })
    }

    pub fn lags(&self) -> &[usize] {
        &self.lags
    }

    pub fn window(&self) -> usize {
        self.window
    }

    /// Leading rows with at least one undefined feature: `max(lags ∪ {window - 1})`.
    pub fn warm_up(&self) -> usize {
        self.lags
            .iter()
            .copied()
            .chain(std::iter::once(self.window - 1))
            .max()
            .unwrap_or(0)
    }

    pub fn lag_column(ticker: &str, lag: usize) -> String {
        format!("{}_lag_{lag}", canonical_change_column(ticker))
    }

    pub fn volatility_column(ticker: &str, window: usize) -> String {
        format!("{ticker}_Volatility_{window}")
    }

    pub fn trend_column(ticker: &str, window: usize) -> String {
        format!("{ticker}_Trend_{window}")
    }

    /// Every column [`derive_features`] appends for `ticker`, in insertion order.
    pub fn derived_columns(&self, ticker: &str) -> Vec<String> {
        let mut columns: Vec<String> = self
            .lags
            .iter()
            .map(|lag| Self::lag_column(ticker, *lag))
            .collect();
        columns.push(Self::volatility_column(ticker, self.window));
        columns.push(Self::trend_column(ticker, self.window));
        columns
    }
}

/// Value `lag` positions earlier; the first `lag` entries are missing.
pub fn lagged(values: &[Option<f64>], lag: usize) -> Vec<Option<f64>> {
    (0..values.len())
        .map(|idx| idx.checked_sub(lag).and_then(|prior| values[prior]))
        .collect()
}

/// Trailing mean over exactly `window` observations ending at each row.
pub fn rolling_mean(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |slice| {
        slice.iter().sum::<f64>() / slice.len() as f64
    })
}

/// Trailing sample standard deviation (N - 1 denominator) over exactly `window` observations.
pub fn rolling_sample_std(values: &[Option<f64>], window: usize) -> Vec<Option<f64>> {
    rolling(values, window, |slice| {
        let first = slice[0];
        if slice.iter().all(|value| *value == first) {
            return 0.0;
        }

        let mean = slice.iter().sum::<f64>() / slice.len() as f64;
        let sum_squares = slice
            .iter()
            .map(|value| {
                let diff = value - mean;
                diff * diff
            })
            .sum::<f64>();
        (sum_squares / (slice.len() as f64 - 1.0)).sqrt()
    })
}

// A window containing any missing value yields a missing statistic.
fn rolling<F>(values: &[Option<f64>], window: usize, statistic: F) -> Vec<Option<f64>>
where
    F: Fn(&[f64]) -> f64,
{
    let mut output = Vec::with_capacity(values.len());
    let mut buffer = Vec::with_capacity(window);

    for idx in 0..values.len() {
        if window == 0 || idx + 1 < window {
            output.push(None);
            continue;
        }

        buffer.clear();
        buffer.extend(values[idx + 1 - window..=idx].iter().map_while(|value| *value));
        output.push((buffer.len() == window).then(|| statistic(&buffer)));
    }

    output
}

/// Read a numeric column as `Float64`, treating nulls and NaN as missing.
pub fn float_values(frame: &DataFrame, column: &str) -> PolarsResult<Vec<Option<f64>>> {
    let series = frame.column(column)?;
    let casted = if series.dtype() != &DataType::Float64 {
        series.cast(&DataType::Float64)?
    } else {
        series.clone()
    };

    Ok(casted
        .f64()?
        .into_iter()
        .map(|value| value.filter(|v| !v.is_nan()))
        .collect())
}

fn change_values(table: &TimeSeriesTable) -> PipelineResult<Vec<Option<f64>>> {
    let column = canonical_change_column(table.ticker());
    if !table
        .frame()
        .get_column_names()
        .contains(&column.as_str())
    {
        return Err(SchemaError::MissingColumn {
            ticker: table.ticker().to_string(),
            column,
        }
        .into());
    }
    Ok(float_values(table.frame(), &column)?)
}

/// Append `{ticker}_Change_pct_lag_{k}` for every lag.
pub fn with_lagged_features(
    table: &TimeSeriesTable,
    lags: &[usize],
) -> PipelineResult<TimeSeriesTable> {
    if lags.contains(&0) {
        return Err(PipelineError::InvalidConfig(
            "lags must be at least 1".to_string(),
        ));
    }

    let ticker = table.ticker();
    let values = change_values(table)?;
    let mut enriched = table.frame().clone();
    for lag in lags {
        let column = FeatureSpec::lag_column(ticker, *lag);
        enriched.with_column(Series::new(&column, lagged(&values, *lag)))?;
    }

    log_event(
        file!(),
        "FeatureDeriver",
        "with_lagged_features",
        "features.lag",
        line!(),
        &format!(
            "Computed lags {:?} for {}",
            lags,
            canonical_change_column(ticker)
        ),
        None,
        Some(ticker),
    );

    Ok(table.with_frame(enriched))
}

/// Append `{ticker}_Volatility_{window}` and `{ticker}_Trend_{window}`.
pub fn with_rolling_stats(
    table: &TimeSeriesTable,
    window: usize,
) -> PipelineResult<TimeSeriesTable> {
    if window < 2 {
        return Err(PipelineError::InvalidConfig(format!(
            "rolling window must be at least 2, got {window}"
        )));
    }

    let ticker = table.ticker();
    let values = change_values(table)?;
    let mut enriched = table.frame().clone();
    enriched.with_column(Series::new(
        &FeatureSpec::volatility_column(ticker, window),
        rolling_sample_std(&values, window),
    ))?;
    enriched.with_column(Series::new(
        &FeatureSpec::trend_column(ticker, window),
        rolling_mean(&values, window),
    ))?;

    log_event(
        file!(),
        "FeatureDeriver",
        "with_rolling_stats",
        "features.rolling",
        line!(),
        &format!("Computed {window}-period volatility and trend for {ticker}"),
        None,
        Some(ticker),
    );

    Ok(table.with_frame(enriched))
}

pub fn derive_features(
    table: &TimeSeriesTable,
    spec: &FeatureSpec,
) -> PipelineResult<TimeSeriesTable> {
    let lagged = with_lagged_features(table, spec.lags())?;
    with_rolling_stats(&lagged, spec.window())
}
