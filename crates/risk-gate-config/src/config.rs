// crates/risk-gate-config/src/config.rs
// ============================================================================
// Module: Risk Gate Configuration
// Description: Configuration loading and validation for Risk Gate.
// Purpose: Provide strict, fail-closed config parsing with hard limits.
// Dependencies: risk-gate-core, risk-gate-store-sqlite, risk-logic, serde, toml
// ============================================================================

//! ## Overview
//! Configuration is loaded from a TOML file with strict size and path limits.
//! Every section is optional and falls back to its defaults; values that are
//! present are validated after parsing and invalid input fails closed.
//!
//! Resolution order for the file path: explicit argument, then the
//! `RISK_GATE_CONFIG` environment variable, then `risk-gate.toml` in the
//! working directory.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::env;
use std::fs;
use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use risk_gate_core::MAX_THRESHOLD_COUNT;
use risk_gate_core::RulesetServiceConfig;
use risk_gate_core::ScoreManagerConfig;
use risk_gate_store_sqlite::SqliteStoreConfig;
use risk_gate_store_sqlite::SqliteStoreMode;
use risk_gate_store_sqlite::SqliteSyncMode;
use risk_logic::FunctionRegistry;
use risk_logic::MAX_TREE_DEPTH;
use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// Default configuration filename when no path is specified.
const DEFAULT_CONFIG_NAME: &str = "risk-gate.toml";
/// Environment variable used to override the config path.
pub const CONFIG_ENV_VAR: &str = "RISK_GATE_CONFIG";
/// Maximum configuration file size in bytes.
pub const MAX_CONFIG_FILE_SIZE: usize = 1024 * 1024;
/// Maximum length of a single path component.
pub(crate) const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
pub(crate) const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Largest accepted evaluation depth limit.
pub const MAX_EVALUATION_DEPTH: usize = 256;
/// Default refresh window for scores in seconds.
const DEFAULT_REFRESH_SECONDS: u64 = 3600;
/// Default maximum thresholds per ruleset.
const DEFAULT_MAX_THRESHOLDS: usize = 32;
/// Default `SQLite` busy timeout in milliseconds.
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum `SQLite` busy timeout in milliseconds.
const MAX_BUSY_TIMEOUT_MS: u64 = 600_000;
/// Default log filter directive.
const DEFAULT_LOG_LEVEL: &str = "info";
/// Maximum length of the log filter directive.
const MAX_LOG_LEVEL_LENGTH: usize = 1024;

// ============================================================================
// SECTION: Config Model
// ============================================================================

/// Risk Gate configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct RiskGateConfig {
    /// Tree evaluation limits.
    #[serde(default)]
    pub evaluation: EvaluationConfig,
    /// Scoring and score lifecycle settings.
    #[serde(default)]
    pub scoring: ScoringConfig,
    /// Persistent store settings.
    #[serde(default)]
    pub store: StoreConfig,
    /// Log output settings.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl RiskGateConfig {
    /// Loads configuration from disk using the default resolution rules.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when the file cannot be read, parsed, or
    /// validated.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let resolved = resolve_path(path)?;
        validate_path(&resolved)?;
        let bytes = fs::read(&resolved).map_err(|err| ConfigError::Io(err.to_string()))?;
        if bytes.len() > MAX_CONFIG_FILE_SIZE {
            return Err(ConfigError::Invalid("config file exceeds size limit".to_string()));
        }
        let content = std::str::from_utf8(&bytes)
            .map_err(|_| ConfigError::Invalid("config file must be utf-8".to_string()))?;
        Self::from_toml_str(content)
    }

    /// Parses and validates configuration from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(content).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration for internal consistency.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when configuration is invalid.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.evaluation.validate()?;
        self.scoring.validate()?;
        self.store.validate()?;
        self.logging.validate()
    }

    /// Builds a function registry honoring the configured depth limit.
    #[must_use]
    pub fn function_registry(&self) -> Arc<FunctionRegistry> {
        Arc::new(FunctionRegistry::standard().with_max_depth(self.evaluation.max_tree_depth))
    }

    /// Returns score manager defaults.
    #[must_use]
    pub const fn score_manager_config(&self) -> ScoreManagerConfig {
        ScoreManagerConfig {
            default_refresh: Duration::from_secs(self.scoring.default_refresh_seconds),
            background_refresh: self.scoring.background_refresh,
        }
    }

    /// Returns ruleset service limits.
    #[must_use]
    pub const fn ruleset_service_config(&self) -> RulesetServiceConfig {
        RulesetServiceConfig {
            max_thresholds: self.scoring.max_thresholds,
        }
    }

    /// Returns the `SQLite` store config, or `None` when no path is set.
    #[must_use]
    pub fn sqlite_store_config(&self) -> Option<SqliteStoreConfig> {
        self.store.path.as_ref().map(|path| SqliteStoreConfig {
            path: path.clone(),
            busy_timeout_ms: self.store.busy_timeout_ms,
            journal_mode: self.store.journal_mode,
            sync_mode: self.store.sync_mode,
        })
    }
}

/// Tree evaluation limits.
#[derive(Debug, Clone, Deserialize)]
pub struct EvaluationConfig {
    /// Maximum depth accepted by tree construction and evaluation.
    #[serde(default = "default_max_tree_depth")]
    pub max_tree_depth: usize,
}

impl Default for EvaluationConfig {
    fn default() -> Self {
        Self {
            max_tree_depth: default_max_tree_depth(),
        }
    }
}

impl EvaluationConfig {
    /// Validates evaluation limits.
    fn validate(&self) -> Result<(), ConfigError> {
        if !(1 ..= MAX_EVALUATION_DEPTH).contains(&self.max_tree_depth) {
            return Err(ConfigError::Invalid(format!(
                "evaluation.max_tree_depth must be between 1 and {MAX_EVALUATION_DEPTH}"
            )));
        }
        Ok(())
    }
}

/// Scoring and score lifecycle settings.
#[derive(Debug, Clone, Deserialize)]
pub struct ScoringConfig {
    /// Refresh window used when neither the request nor the ruleset sets one.
    #[serde(default = "default_refresh_seconds")]
    pub default_refresh_seconds: u64,
    /// Whether background refresh requests go through the task queue.
    #[serde(default = "default_true")]
    pub background_refresh: bool,
    /// Maximum number of thresholds per ruleset.
    #[serde(default = "default_max_thresholds")]
    pub max_thresholds: usize,
}

impl Default for ScoringConfig {
    fn default() -> Self {
        Self {
            default_refresh_seconds: default_refresh_seconds(),
            background_refresh: true,
            max_thresholds: default_max_thresholds(),
        }
    }
}

impl ScoringConfig {
    /// Validates scoring settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if self.default_refresh_seconds == 0 {
            return Err(ConfigError::Invalid(
                "scoring.default_refresh_seconds must be greater than zero".to_string(),
            ));
        }
        if !(1 ..= MAX_THRESHOLD_COUNT).contains(&self.max_thresholds) {
            return Err(ConfigError::Invalid(format!(
                "scoring.max_thresholds must be between 1 and {MAX_THRESHOLD_COUNT}"
            )));
        }
        Ok(())
    }
}

/// Persistent store settings.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// `SQLite` database path; in-memory storage is used when unset.
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` synchronous mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: None,
            busy_timeout_ms: default_busy_timeout_ms(),
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

impl StoreConfig {
    /// Validates store settings.
    fn validate(&self) -> Result<(), ConfigError> {
        if let Some(path) = &self.path {
            validate_path_string("store.path", &path.to_string_lossy())?;
        }
        if self.busy_timeout_ms > MAX_BUSY_TIMEOUT_MS {
            return Err(ConfigError::Invalid(format!(
                "store.busy_timeout_ms must be at most {MAX_BUSY_TIMEOUT_MS}"
            )));
        }
        Ok(())
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LogFormat {
    /// Single-line human readable output.
    #[default]
    Compact,
    /// Newline-delimited JSON records.
    Json,
}

/// Log output settings.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is not set.
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Output format.
    #[serde(default)]
    pub format: LogFormat,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}

impl LoggingConfig {
    /// Validates log settings.
    fn validate(&self) -> Result<(), ConfigError> {
        let level = self.level.trim();
        if level.is_empty() {
            return Err(ConfigError::Invalid("logging.level must be non-empty".to_string()));
        }
        if level.len() > MAX_LOG_LEVEL_LENGTH {
            return Err(ConfigError::Invalid("logging.level exceeds max length".to_string()));
        }
        EnvFilter::try_new(level)
            .map_err(|err| ConfigError::Invalid(format!("logging.level is not a valid filter: {err}")))?;
        Ok(())
    }
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Configuration loading or validation errors.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// I/O failure while reading configuration.
    #[error("config io error: {0}")]
    Io(String),
    /// TOML parsing error.
    #[error("config parse error: {0}")]
    Parse(String),
    /// Invalid configuration data.
    #[error("invalid config: {0}")]
    Invalid(String),
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Resolves the config path from an explicit argument, env var, or default.
fn resolve_path(path: Option<&Path>) -> Result<PathBuf, ConfigError> {
    if let Some(path) = path {
        return Ok(path.to_path_buf());
    }
    if let Ok(env_path) = env::var(CONFIG_ENV_VAR) {
        if env_path.len() > MAX_TOTAL_PATH_LENGTH {
            return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
        }
        return Ok(PathBuf::from(env_path));
    }
    Ok(PathBuf::from(DEFAULT_CONFIG_NAME))
}

/// Validates the resolved path against length limits.
fn validate_path(path: &Path) -> Result<(), ConfigError> {
    if path.to_string_lossy().len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid("config path exceeds max length".to_string()));
    }
    check_components(path, "config path")
}

/// Validates a configured path string.
fn validate_path_string(field: &str, value: &str) -> Result<(), ConfigError> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Err(ConfigError::Invalid(format!("{field} must be non-empty")));
    }
    if trimmed.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(ConfigError::Invalid(format!("{field} exceeds max length")));
    }
    check_components(Path::new(trimmed), field)
}

/// Rejects any path component longer than the component limit.
fn check_components(path: &Path, field: &str) -> Result<(), ConfigError> {
    let too_long = path
        .components()
        .any(|component| component.as_os_str().to_string_lossy().len() > MAX_PATH_COMPONENT_LENGTH);
    if too_long {
        return Err(ConfigError::Invalid(format!("{field} component too long")));
    }
    Ok(())
}

/// Default evaluation depth limit.
const fn default_max_tree_depth() -> usize {
    MAX_TREE_DEPTH
}

/// Default score refresh window in seconds.
const fn default_refresh_seconds() -> u64 {
    DEFAULT_REFRESH_SECONDS
}

/// Default thresholds limit.
const fn default_max_thresholds() -> usize {
    DEFAULT_MAX_THRESHOLDS
}

/// Default `SQLite` busy timeout.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

/// Default boolean `true` for serde.
const fn default_true() -> bool {
    true
}

/// Default log filter.
fn default_log_level() -> String {
    DEFAULT_LOG_LEVEL.to_string()
}

// ============================================================================
// SECTION: Tests
// ============================================================================
