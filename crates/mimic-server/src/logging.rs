//! Logging initialization.
//!
//! The subscriber is installed once during bootstrap, before any other
//! component runs; everything else just uses the `tracing` macros. An
//! optional JSON configuration document selects level, encoding, and
//! output; without one the server logs to stdout at info level in console
//! encoding. A malformed document is fatal at startup.

use anyhow::Context;
use serde::Deserialize;
use std::path::Path;
use std::sync::Arc;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Logging configuration document.
///
/// ```json
/// { "level": "info", "encoding": "console", "outputPath": "stdout" }
/// ```
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoggingConfig {
    /// Level filter; accepts full `tracing` filter directives
    /// (e.g. "info" or "mimic_server=debug")
    #[serde(default = "default_level")]
    pub level: String,
    #[serde(default)]
    pub encoding: LogEncoding,
    /// "stdout", "stderr", or a file path
    #[serde(default = "default_output_path")]
    pub output_path: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogEncoding {
    #[default]
    Console,
    Json,
}

fn default_level() -> String {
    "info".to_string()
}

fn default_output_path() -> String {
    "stdout".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_level(),
            encoding: LogEncoding::default(),
            output_path: default_output_path(),
        }
    }
}

impl LoggingConfig {
    /// Read and decode a logging configuration document.
    pub fn from_file(path: &Path) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path).with_context(|| {
            format!("failed to read logging configuration '{}'", path.display())
        })?;
        let config = serde_json::from_str(&contents).with_context(|| {
            format!("malformed logging configuration '{}'", path.display())
        })?;
        Ok(config)
    }
}

/// Install the global subscriber from an optional configuration document.
///
/// A `RUST_LOG` environment variable overrides the configured level.
pub fn init(config_path: Option<&Path>) -> Result<(), anyhow::Error> {
    let config = match config_path {
        Some(path) => LoggingConfig::from_file(path)?,
        None => LoggingConfig::default(),
    };
    init_with_config(&config)
}

/// Install the global subscriber for the given configuration.
pub fn init_with_config(config: &LoggingConfig) -> Result<(), anyhow::Error> {
    let filter = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.level))
        .with_context(|| format!("invalid logging level filter '{}'", config.level))?;

    let layer = match (config.encoding, config.output_path.as_str()) {
        (LogEncoding::Console, "stdout") => tracing_subscriber::fmt::layer().boxed(),
        (LogEncoding::Console, "stderr") => tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .boxed(),
        (LogEncoding::Json, "stdout") => tracing_subscriber::fmt::layer().json().boxed(),
        (LogEncoding::Json, "stderr") => tracing_subscriber::fmt::layer()
            .json()
            .with_writer(std::io::stderr)
            .boxed(),
        (encoding, path) => {
            let file = std::fs::File::create(path)
                .with_context(|| format!("failed to open log output '{path}'"))?;
            let writer = Arc::new(file);
            match encoding {
                LogEncoding::Console => tracing_subscriber::fmt::layer()
                    .with_ansi(false)
                    .with_writer(writer)
                    .boxed(),
                LogEncoding::Json => tracing_subscriber::fmt::layer()
                    .json()
                    .with_writer(writer)
                    .boxed(),
            }
        }
    };

    tracing_subscriber::registry()
        .with(filter)
        .with(layer)
        .try_init()
        .context("logging subscriber already installed")?;
    Ok(())
}
