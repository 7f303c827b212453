//! Explicit run configuration for the preprocessing pipeline.
//!
//! Every input path, feature parameter and the output location travel through
//! [`PipelineConfig`]; nothing is resolved from ambient state.

use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{PipelineError, PipelineResult};
use crate::features::FeatureSpec;
use crate::logging::log_event;
use crate::standardize::CHANGE_PCT_CANDIDATES;

/// One named series and the CSV it is loaded from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeriesSource {
    pub ticker: String,
    pub path: PathBuf,
}

impl SeriesSource {
    pub fn new(ticker: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            ticker: ticker.into(),
            path: path.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PipelineConfig {
    pub series: Vec<SeriesSource>,
    pub lags: Vec<usize>,
    pub window: usize,
    pub output_path: PathBuf,
    /// Raw spellings of the percent-change column, highest priority first.
    pub change_column_candidates: Vec<String>,
    /// Minimum number of aligned rows the model trainer needs.
    pub min_rows: usize,
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            series: vec![
                SeriesSource::new("Aramco", "data/Aramco.csv"),
                SeriesSource::new("Al_Rajhi", "data/Al_Rajhi.csv"),
                SeriesSource::new("TASI", "data/TASI_cleaned.csv"),
            ],
            lags: vec![1, 3, 5],
            window: 5,
            output_path: PathBuf::from("data/model_input/merged_features.csv"),
            change_column_candidates: CHANGE_PCT_CANDIDATES
                .iter()
                .map(|name| name.to_string())
                .collect(),
            min_rows: 5,
        }
    }
}

impl PipelineConfig {
    pub fn from_json_file<P: AsRef<Path>>(path: P) -> PipelineResult<Self> {
        let path_ref = path.as_ref();
        let raw = fs::read_to_string(path_ref).map_err(|error| PipelineError::Config {
            path: path_ref.to_path_buf(),
            reason: error.to_string(),
        })?;
        let config: Self = serde_json::from_str(&raw).map_err(|error| PipelineError::Config {
            path: path_ref.to_path_buf(),
            reason: error.to_string(),
        })?;

        log_event(
            file!(),
            "PipelineConfig",
            "from_json_file",
            "config.load",
            line!(),
            &format!("Loaded configuration from {}", path_ref.display()),
            None,
            None,
        );

        config.validate()?;
        Ok(config)
    }

    /// Resolve every relative input and output path against `root`.
    pub fn with_data_dir<P: AsRef<Path>>(mut self, root: P) -> Self {
        let root = root.as_ref();
        for source in &mut self.series {
            if source.path.is_relative() {
                source.path = root.join(&source.path);
            }
        }
        if self.output_path.is_relative() {
            self.output_path = root.join(&self.output_path);
        }
        self
    }

    pub fn feature_spec(&self) -> PipelineResult<FeatureSpec> {
        FeatureSpec::new(self.lags.clone(), self.window)
    }

    pub fn validate(&self) -> PipelineResult<()> {
        if self.series.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "at least one series is required".to_string(),
            ));
        }

        let mut seen = HashSet::new();
        for source in &self.series {
            if source.ticker.trim().is_empty() {
                return Err(PipelineError::InvalidConfig(format!(
                    "series loaded from {} has an empty ticker",
                    source.path.display()
                )));
            }
            if !seen.insert(source.ticker.as_str()) {
                return Err(PipelineError::InvalidConfig(format!(
                    "ticker {} is configured more than once",
                    source.ticker
                )));
            }
        }

        if self.change_column_candidates.is_empty() {
            return Err(PipelineError::InvalidConfig(
                "no percent-change column spellings configured".to_string(),
            ));
        }

        if self.min_rows == 0 {
            return Err(PipelineError::InvalidConfig(
                "min_rows must be at least 1".to_string(),
            ));
        }

        self.feature_spec().map(|_| ())
    }
}
