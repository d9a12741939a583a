// crates/risk-gate-cli/src/main.rs
// ============================================================================
// Module: Risk Gate CLI Entry Point
// Description: Command dispatcher for offline evaluation and config checks.
// Purpose: Evaluate trees, scenarios, and rulesets from JSON files.
// Dependencies: clap, risk-gate-config, risk-gate-core, risk-logic, serde_json
// ============================================================================

//! ## Overview
//! `risk-gate` runs the decisioning core against JSON documents on disk:
//! - `eval` evaluates one tree and prints its evaluation record;
//! - `scenario` executes a scenario's live iteration against a record;
//! - `score` executes a scoring ruleset against an entity payload;
//! - `config validate` loads and validates `risk-gate.toml`.
//!
//! Results go to stdout as JSON. Failures go to stderr with exit code 1.

// ============================================================================
// SECTION: Modules
// ============================================================================


// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fs::File;
use std::io::Read;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::Args;
use clap::Parser;
use clap::Subcommand;
use risk_gate_config::RiskGateConfig;
use risk_gate_config::telemetry;
use risk_gate_core::EntityType;
use risk_gate_core::RecordEnvironment;
use risk_gate_core::RulesetDefinition;
use risk_gate_core::ScenarioDefinition;
use risk_gate_core::ScenarioEvaluator;
use risk_gate_core::ScoringEngine;
use risk_gate_core::runtime::validate_rule_shape;
use risk_logic::Evaluator;
use risk_logic::FunctionRegistry;
use risk_logic::MapEnvironment;
use risk_logic::NodeDto;
use serde::Serialize;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tracing::debug;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Maximum size of any JSON input document.
const MAX_INPUT_BYTES: usize = 4 * 1024 * 1024;

// ============================================================================
// SECTION: CLI Types
// ============================================================================

/// Top-level CLI definition.
#[derive(Parser, Debug)]
#[command(name = "risk-gate", version, disable_help_subcommand = true)]
struct Cli {
    /// Config file used by evaluation commands; built-in defaults otherwise.
    #[arg(long, value_name = "PATH", global = true)]
    config: Option<PathBuf>,
    /// Selected subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Supported CLI subcommands.
#[derive(Subcommand, Debug)]
enum Commands {
    /// Evaluate a single tree against a payload.
    Eval(EvalCommand),
    /// Execute a scenario's live iteration against a record.
    Scenario(ScenarioCommand),
    /// Execute a scoring ruleset against an entity payload.
    Score(ScoreCommand),
    /// Configuration utilities.
    Config {
        /// Selected config subcommand.
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

/// Arguments for `eval`.
#[derive(Args, Debug)]
struct EvalCommand {
    /// Tree document in wire form.
    #[arg(long, value_name = "JSON")]
    tree: PathBuf,
    /// Payload fields as a JSON object.
    #[arg(long, value_name = "JSON")]
    payload: PathBuf,
    /// Custom lists as a JSON object of arrays.
    #[arg(long, value_name = "JSON")]
    lists: Option<PathBuf>,
}

/// Arguments for `scenario`.
#[derive(Args, Debug)]
struct ScenarioCommand {
    /// Scenario definition document.
    #[arg(long, value_name = "JSON")]
    scenario: PathBuf,
    /// Record payload as a JSON object.
    #[arg(long, value_name = "JSON")]
    payload: PathBuf,
    /// Object type of the record.
    #[arg(long, value_name = "TYPE")]
    object_type: String,
    /// Custom lists as a JSON object of arrays.
    #[arg(long, value_name = "JSON")]
    lists: Option<PathBuf>,
}

/// Arguments for `score`.
#[derive(Args, Debug)]
struct ScoreCommand {
    /// Ruleset definition document.
    #[arg(long, value_name = "JSON")]
    ruleset: PathBuf,
    /// Entity payload as a JSON object.
    #[arg(long, value_name = "JSON")]
    payload: PathBuf,
    /// Custom lists as a JSON object of arrays.
    #[arg(long, value_name = "JSON")]
    lists: Option<PathBuf>,
}

/// Config subcommands.
#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Load and validate a config file.
    Validate(ConfigValidateCommand),
}

/// Arguments for `config validate`.
#[derive(Args, Debug)]
struct ConfigValidateCommand {
    /// Config file; falls back to `RISK_GATE_CONFIG`, then `risk-gate.toml`.
    #[arg(long, value_name = "TOML")]
    path: Option<PathBuf>,
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// CLI error carrying a user-facing message.
#[derive(Debug, Error)]
#[error("{message}")]
struct CliError {
    /// Human-readable error message.
    message: String,
}

impl CliError {
    /// Constructs a new [`CliError`].
    const fn new(message: String) -> Self {
        Self {
            message,
        }
    }
}

/// CLI result alias for fallible operations.
type CliResult<T> = Result<T, CliError>;

/// Bounded read failures.
#[derive(Debug, Error)]
enum ReadLimitError {
    /// Underlying I/O failure.
    #[error("{0}")]
    Io(#[from] std::io::Error),
    /// File exceeds the size limit.
    #[error("file is {size} bytes, limit is {limit}")]
    TooLarge {
        /// Observed size.
        size: u64,
        /// Configured limit.
        limit: usize,
    },
}

// ============================================================================
// SECTION: Entry Point
// ============================================================================

/// CLI entry point returning an exit code.
fn main() -> ExitCode {
    let cli = Cli::parse();
    let stdout = std::io::stdout();
    let mut out = stdout.lock();
    match run(cli, &mut out) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => emit_error(&err.to_string()),
    }
}

/// Executes the selected command, writing results to `out`.
fn run(cli: Cli, out: &mut impl Write) -> CliResult<()> {
    if let Commands::Config {
        command: ConfigCommand::Validate(command),
    } = &cli.command
    {
        return command_config_validate(command, out);
    }
    let config = load_config(cli.config.as_deref())?;
    telemetry::init(&config.logging).map_err(|err| CliError::new(err.to_string()))?;
    let registry = config.function_registry();
    match cli.command {
        Commands::Eval(command) => command_eval(&command, &registry, out),
        Commands::Scenario(command) => command_scenario(&command, &registry, out),
        Commands::Score(command) => command_score(&command, &registry, out),
        Commands::Config {
            ..
        } => Ok(()),
    }
}

/// Loads the config named on the command line, or defaults when none is.
fn load_config(path: Option<&Path>) -> CliResult<RiskGateConfig> {
    let Some(path) = path else {
        return Ok(RiskGateConfig::default());
    };
    let config = RiskGateConfig::load(Some(path))
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    debug!(path = %path.display(), "config loaded");
    Ok(config)
}

// ============================================================================
// SECTION: Commands
// ============================================================================

/// Executes `eval`.
fn command_eval(
    command: &EvalCommand,
    registry: &Arc<FunctionRegistry>,
    out: &mut impl Write,
) -> CliResult<()> {
    let dto: NodeDto = read_json(&command.tree, "tree")?;
    let node = registry
        .decode(&dto)
        .map_err(|err| CliError::new(format!("malformed tree: {err}")))?;
    let env = read_environment(&command.payload, command.lists.as_deref())?;
    let evaluation = Evaluator::new(Arc::clone(registry)).evaluate(&node, &env);
    write_json(out, &evaluation)
}

/// Executes `scenario`.
fn command_scenario(
    command: &ScenarioCommand,
    registry: &Arc<FunctionRegistry>,
    out: &mut impl Write,
) -> CliResult<()> {
    let definition: ScenarioDefinition = read_json(&command.scenario, "scenario")?;
    let scenario = definition
        .build(registry)
        .map_err(|err| CliError::new(format!("invalid scenario: {err}")))?;
    let env = read_environment(&command.payload, command.lists.as_deref())?;
    let record = RecordEnvironment::new(EntityType::new(command.object_type.as_str()), env);
    let execution = ScenarioEvaluator::new(Evaluator::new(Arc::clone(registry)))
        .evaluate(&scenario, &record)
        .map_err(|err| CliError::new(format!("scenario evaluation failed: {err}")))?;
    write_json(out, &execution)
}

/// Executes `score`.
fn command_score(
    command: &ScoreCommand,
    registry: &Arc<FunctionRegistry>,
    out: &mut impl Write,
) -> CliResult<()> {
    let definition: RulesetDefinition = read_json(&command.ruleset, "ruleset")?;
    let ruleset = definition
        .build(registry)
        .map_err(|err| CliError::new(format!("invalid ruleset: {err}")))?;
    for rule in &ruleset.rules {
        validate_rule_shape(&rule.ast).map_err(|err| {
            CliError::new(format!("invalid ruleset: rule {}: {err}", rule.stable_id))
        })?;
    }
    let env = read_environment(&command.payload, command.lists.as_deref())?;
    let evaluation = ScoringEngine::new(Evaluator::new(Arc::clone(registry)))
        .execute(&ruleset, &env)
        .map_err(|err| CliError::new(format!("scoring failed: {err}")))?;
    write_json(out, &evaluation)
}

/// Executes `config validate`.
fn command_config_validate(command: &ConfigValidateCommand, out: &mut impl Write) -> CliResult<()> {
    RiskGateConfig::load(command.path.as_deref())
        .map_err(|err| CliError::new(format!("failed to load config: {err}")))?;
    writeln!(out, "config ok").map_err(|err| output_error(&err))
}

// ============================================================================
// SECTION: Input Helpers
// ============================================================================

/// Reads a file, refusing anything larger than `max_bytes`.
fn read_bytes_with_limit(path: &Path, max_bytes: usize) -> Result<Vec<u8>, ReadLimitError> {
    let file = File::open(path)?;
    let size = file.metadata()?.len();
    let limit = u64::try_from(max_bytes).unwrap_or(u64::MAX);
    if size > limit {
        return Err(ReadLimitError::TooLarge {
            size,
            limit: max_bytes,
        });
    }
    let mut bytes = Vec::new();
    file.take(limit.saturating_add(1)).read_to_end(&mut bytes)?;
    if bytes.len() > max_bytes {
        return Err(ReadLimitError::TooLarge {
            size: u64::try_from(bytes.len()).unwrap_or(u64::MAX),
            limit: max_bytes,
        });
    }
    Ok(bytes)
}

/// Reads and parses a JSON document.
fn read_json<T: DeserializeOwned>(path: &Path, label: &str) -> CliResult<T> {
    let bytes = read_bytes_with_limit(path, MAX_INPUT_BYTES).map_err(|err| {
        CliError::new(format!("failed to read {label} {}: {err}", path.display()))
    })?;
    serde_json::from_slice(&bytes)
        .map_err(|err| CliError::new(format!("invalid {label} json {}: {err}", path.display())))
}

/// Builds an evaluation environment from payload and optional list files.
fn read_environment(payload: &Path, lists: Option<&Path>) -> CliResult<MapEnvironment> {
    let document: serde_json::Value = read_json(payload, "payload")?;
    let mut env = MapEnvironment::from_json_payload(document)
        .map_err(|err| CliError::new(format!("invalid payload: {err}")))?;
    if let Some(lists) = lists {
        let document: serde_json::Value = read_json(lists, "lists")?;
        env = env
            .with_json_lists(document)
            .map_err(|err| CliError::new(format!("invalid lists: {err}")))?;
    }
    Ok(env)
}

// ============================================================================
// SECTION: Output Helpers
// ============================================================================

/// Writes a value as pretty JSON followed by a newline.
fn write_json<T: Serialize>(out: &mut impl Write, value: &T) -> CliResult<()> {
    serde_json::to_writer_pretty(&mut *out, value)
        .map_err(|err| CliError::new(format!("failed to serialize output: {err}")))?;
    writeln!(out).map_err(|err| output_error(&err))
}

/// Formats an output failure.
fn output_error(error: &std::io::Error) -> CliError {
    CliError::new(format!("failed to write stdout: {error}"))
}

/// Writes a single line to stderr.
fn write_stderr_line(message: &str) -> std::io::Result<()> {
    let mut stderr = std::io::stderr();
    writeln!(&mut stderr, "{message}")
}

/// Emits an error message to stderr and returns a failure exit code.
fn emit_error(message: &str) -> ExitCode {
    let _ = write_stderr_line(message);
    ExitCode::FAILURE
}
