// crates/risk-gate-config/src/lib.rs
// ============================================================================
// Module: Risk Gate Config Library
// Description: Canonical config model, validation, and logging setup.
// Purpose: Single source of truth for risk-gate.toml semantics.
// Dependencies: risk-gate-core, risk-gate-store-sqlite, serde, toml, tracing-subscriber
// ============================================================================

//! ## Overview
//! `risk-gate-config` parses and validates `risk-gate.toml`, converts it into
//! the runtime configs of the core services and the `SQLite` store, and
//! installs the process-wide tracing subscriber.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod config;
pub mod telemetry;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use config::*;
pub use telemetry::TelemetryError;
