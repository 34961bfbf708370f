//! Subscriber setup shared by the hazard crates' tests and benches.
//!
//! `hazard-core` and `hazard-cache` only emit events and [`perf_span!`]
//! timings. Whoever drives them installs one subscriber with
//! [`init_global_tracing`], normally from [`TracingConfig::from_env`]:
//!
//! - `HAZARD_LOG`: filter directives, default [`DEFAULT_DIRECTIVES`]
//! - `HAZARD_LOG_FORMAT`: `compact` (default) or `json`
//! - `HAZARD_PERF_THRESHOLD_US`: turns timing spans on, logging those at
//!   least this many microseconds long

pub mod performance;

#[macro_use]
pub mod macros;

use std::env;

use thiserror::Error;
use tracing::Subscriber;
use tracing_subscriber::layer::{Layer, SubscriberExt};
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};
use tracing_subscriber::{fmt, EnvFilter, Registry};

#[doc(hidden)]
pub mod __private {
    pub use tracing::{debug, debug_span};
}

pub const LOG_ENV: &str = "HAZARD_LOG";
pub const LOG_FORMAT_ENV: &str = "HAZARD_LOG_FORMAT";
pub const PERF_THRESHOLD_ENV: &str = "HAZARD_PERF_THRESHOLD_US";

/// Only warnings, so test output stays readable.
pub const DEFAULT_DIRECTIVES: &str = "hazard_core=warn,hazard_cache=warn,warn";

#[derive(Debug, Error)]
pub enum TracingSetupError {
    #[error("invalid tracing directive: {0}")]
    InvalidFilter(String),
    #[error("failed to install global tracing subscriber: {0}")]
    SubscriberInit(#[from] TryInitError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Compact,
    Json,
}

impl LogFormat {
    fn parse(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "compact" => Some(Self::Compact),
            "json" => Some(Self::Json),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TracingConfig {
    pub directives: String,
    pub format: LogFormat,
    /// `Some` enables [`performance::PerformanceSpan`] output.
    pub perf_threshold_us: Option<u64>,
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::quiet()
    }
}

impl TracingConfig {
    pub fn quiet() -> Self {
        Self {
            directives: DEFAULT_DIRECTIVES.to_string(),
            format: LogFormat::Compact,
            perf_threshold_us: None,
        }
    }

    /// Start from [`TracingConfig::quiet`] and apply the `HAZARD_*`
    /// overrides. Blank or unparsable values are ignored.
    pub fn from_env() -> Self {
        let mut config = Self::quiet();
        if let Some(directives) = non_blank(LOG_ENV) {
            config.directives = directives;
        }
        if let Some(format) = non_blank(LOG_FORMAT_ENV).as_deref().and_then(LogFormat::parse) {
            config.format = format;
        }
        if let Some(threshold) = non_blank(PERF_THRESHOLD_ENV).and_then(|v| v.trim().parse().ok()) {
            config.perf_threshold_us = Some(threshold);
        }
        config
    }
}

fn non_blank(key: &str) -> Option<String> {
    env::var(key).ok().filter(|v| !v.trim().is_empty())
}

/// Build a subscriber writing through the test harness' capture.
pub fn build_subscriber(config: &TracingConfig) -> Result<impl Subscriber + Send + Sync, TracingSetupError> {
    let filter = EnvFilter::try_new(&config.directives)
        .map_err(|err| TracingSetupError::InvalidFilter(err.to_string()))?;
    let layer: Box<dyn Layer<Registry> + Send + Sync> = match config.format {
        LogFormat::Compact => Box::new(fmt::layer().compact().with_test_writer()),
        LogFormat::Json => Box::new(fmt::layer().json().with_ansi(false).with_test_writer()),
    };
    Ok(Registry::default().with(layer).with(filter))
}

/// Install the subscriber process-wide and apply the timing threshold.
///
/// Fails with [`TracingSetupError::SubscriberInit`] when a subscriber is
/// already set; callers that may race (parallel tests) ignore that.
pub fn init_global_tracing(config: &TracingConfig) -> Result<(), TracingSetupError> {
    let subscriber = build_subscriber(config)?;
    performance::configure(config.perf_threshold_us);
    subscriber.try_init()?;
    Ok(())
}
