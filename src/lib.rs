//! tadawul-features prepares model input for predicting an index's daily percentage change
//! from the percentage changes of individual equities. Each series is loaded, its change
//! column standardized, lag and rolling-window features derived, the warm-up rows dropped,
//! and all series inner-joined on date into one feature matrix.

pub mod align;
pub mod cleaning;
pub mod config;
pub mod dataset;
pub mod error;
pub mod features;
pub mod ingest;
pub mod logging;
pub mod metrics;
pub mod model_input;
pub mod pipeline;
pub mod standardize;

pub use align::align_on_date;
pub use cleaning::drop_incomplete_features;
pub use config::{PipelineConfig, SeriesSource};
pub use dataset::{DATE_COLUMN, TimeSeriesTable, load_series, write_csv};
pub use error::{PipelineError, PipelineResult, SchemaError};
pub use features::{FeatureSpec, derive_features, with_lagged_features, with_rolling_stats};
pub use metrics::{MetricsError, MetricsResult, evaluate_predictions};
pub use pipeline::{PipelineReport, run_and_persist, run_preprocessing};
pub use standardize::{CHANGE_PCT_CANDIDATES, canonical_change_column, standardize_change_column};

pub type Result<T> = anyhow::Result<T>;
