use std::sync::OnceLock;

use anyhow::anyhow;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;
use tracing_subscriber::{EnvFilter, fmt};

use crate::Result;

static SUBSCRIBER: OnceLock<std::result::Result<(), String>> = OnceLock::new();

#[derive(Debug, Serialize)]
pub struct LogEvent<'a> {
    pub filename: &'a str,
    pub timestamp: DateTime<Utc>,
    pub component: &'a str,
    pub operation: &'a str,
    pub stage: &'a str,
    pub line_num: u32,
    pub ticker: Option<&'a str>,
    pub error: Option<&'a str>,
    pub message: &'a str,
}

/// Initialize a tracing subscriber emitting one JSON record per event.
///
/// Calling this function multiple times is safe; only the first invocation installs the
/// subscriber. Records go to stderr; `RUST_LOG` overrides the default `info` filter.
pub fn init_logging() -> Result<()> {
    let result = SUBSCRIBER.get_or_init(|| {
        let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
        fmt()
            .with_env_filter(filter)
            .json()
            .with_current_span(false)
            .with_span_list(false)
            .with_timer(fmt::time::UtcTime::rfc_3339())
            .with_target(false)
            .with_writer(std::io::stderr)
            .try_init()
            .map_err(|error| error.to_string())?;

        Ok(())
    });

    match result {
        Ok(()) => Ok(()),
        Err(message) => Err(anyhow!(message.clone())),
    }
}

/// Emit a structured pipeline event identifying the component, stage and ticker involved.
#[allow(clippy::too_many_arguments)]
pub fn log_event(
    filename: &str,
    component: &str,
    operation: &str,
    stage: &str,
    line_num: u32,
    message: &str,
    error: Option<&str>,
    ticker: Option<&str>,
) {
    let event = LogEvent {
        filename,
        timestamp: Utc::now(),
        component,
        operation,
        stage,
        line_num,
        ticker,
        error,
        message,
    };

    if let Ok(serialized) = serde_json::to_string(&event) {
        info!(target: "tadawul_features", json = %serialized);
    } else {
        info!(target: "tadawul_features", message);
    }
}
