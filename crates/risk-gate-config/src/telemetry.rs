// crates/risk-gate-config/src/telemetry.rs
// ============================================================================
// Module: Telemetry
// Description: Global tracing subscriber installation.
// Purpose: Route `tracing` events from every crate to stderr.
// Dependencies: tracing-subscriber
// ============================================================================

//! ## Overview
//! [`init`] installs a `fmt` subscriber once per process. `RUST_LOG` takes
//! precedence over the configured level when it is set and parses.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::io;

use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::config::LogFormat;
use crate::config::LoggingConfig;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Subscriber installation errors.
#[derive(Debug, Error)]
pub enum TelemetryError {
    /// The configured filter directive is invalid.
    #[error("invalid log filter '{value}': {message}")]
    Filter {
        /// Rejected directive.
        value: String,
        /// Parser message.
        message: String,
    },
    /// A global subscriber is already installed.
    #[error("telemetry error: {0}")]
    Subscriber(String),
}

// ============================================================================
// SECTION: Initialization
// ============================================================================

/// Installs the global subscriber described by `config`.
///
/// # Errors
///
/// Returns [`TelemetryError`] when the filter is invalid or a subscriber is
/// already installed.
pub fn init(config: &LoggingConfig) -> Result<(), TelemetryError> {
    let filter = build_filter(config)?;
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_target(false)
        .with_ansi(false);
    let installed = match config.format {
        LogFormat::Compact => builder.compact().try_init(),
        LogFormat::Json => builder.json().try_init(),
    };
    installed.map_err(|err| TelemetryError::Subscriber(err.to_string()))
}

/// Builds the event filter, preferring `RUST_LOG` over the configured level.
///
/// # Errors
///
/// Returns [`TelemetryError::Filter`] when the configured level is invalid.
pub fn build_filter(config: &LoggingConfig) -> Result<EnvFilter, TelemetryError> {
    if let Ok(filter) = EnvFilter::try_from_default_env() {
        return Ok(filter);
    }
    EnvFilter::try_new(config.level.trim()).map_err(|err| TelemetryError::Filter {
        value: config.level.clone(),
        message: err.to_string(),
    })
}
