// crates/risk-gate-core/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared fixtures for risk-gate-core integration tests.
// ============================================================================
//! ## Overview
//! Result-based assertions, rule builders, and a fully wired in-memory score
//! manager.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    dead_code,
    reason = "Test-only helpers; not every test binary uses every helper."
)]

use std::error::Error;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use risk_gate_core::ActorId;
use risk_gate_core::EntityRef;
use risk_gate_core::FixedClock;
use risk_gate_core::InMemoryEntityData;
use risk_gate_core::InMemoryScoringStore;
use risk_gate_core::InMemoryTaskQueue;
use risk_gate_core::RulesetStore;
use risk_gate_core::RulesetStatus;
use risk_gate_core::ScoreManager;
use risk_gate_core::ScoreManagerConfig;
use risk_gate_core::ScoringEngine;
use risk_gate_core::ScoringRule;
use risk_gate_core::ScoringRuleset;
use risk_gate_core::StableRuleId;
use risk_gate_core::StaticAuthorizer;
use risk_logic::Evaluator;
use risk_logic::Function;
use risk_logic::FunctionRegistry;
use risk_logic::Node;
use risk_logic::Value;
use risk_logic::args;
use time::OffsetDateTime;
use time::macros::datetime;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across risk-gate-core integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Assertion failure raised by [`ensure`].
#[derive(Debug)]
struct TestError {
    /// Failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

// ========================================================================
// Tree Helpers
// ========================================================================

/// Registry with every function enabled.
pub fn registry() -> FunctionRegistry {
    FunctionRegistry::standard()
}

/// Evaluator over the standard registry.
pub fn evaluator() -> Evaluator {
    Evaluator::new(Arc::new(registry()))
}

/// `payload.field > threshold`.
pub fn payload_greater(field: &str, threshold: i64) -> TestResult<Node> {
    let registry = registry();
    Ok(registry.binary(Function::Greater, registry.payload(field)?, registry.constant(threshold)?)?)
}

/// `ScoreComputation { condition, modifier, floor }`.
pub fn score_computation(condition: Node, modifier: i64, floor: Option<i64>) -> TestResult<Node> {
    let registry = registry();
    let mut arguments = vec![
        (args::CONDITION, condition),
        (args::MODIFIER, registry.constant(modifier)?),
    ];
    if let Some(floor) = floor {
        arguments.push((args::FLOOR, registry.constant(floor)?));
    }
    Ok(registry.call(Function::ScoreComputation, arguments)?)
}

/// Score computation whose condition is a boolean literal.
pub fn fixed_score(triggered: bool, modifier: i64, floor: Option<i64>) -> TestResult<Node> {
    score_computation(registry().constant(triggered)?, modifier, floor)
}

/// `DatabaseAccess` of `table.field` through `path`.
pub fn related(table: &str, field: &str, path: &[&str]) -> TestResult<Node> {
    let registry = registry();
    let links = path.iter().map(|link| Value::from(*link)).collect();
    Ok(registry.call(Function::DatabaseAccess, [
        (args::TABLE_NAME, registry.constant(table)?),
        (args::FIELD_NAME, registry.constant(field)?),
        (args::PATH, registry.constant(Value::List(links))?),
    ])?)
}

/// Scoring rule with a fixed stable id.
pub fn scoring_rule(stable_id: &str, ast: Node) -> ScoringRule {
    ScoringRule {
        stable_id: StableRuleId::new(stable_id),
        name: stable_id.to_string(),
        description: String::new(),
        ast,
    }
}

/// Committed ruleset for `acme/account` with the given rules.
pub fn committed_ruleset(thresholds: Vec<i64>, rules: Vec<ScoringRule>) -> ScoringRuleset {
    ScoringRuleset {
        organization_id: "acme".into(),
        entity_type: "account".into(),
        version: 1,
        status: RulesetStatus::Committed,
        name: "accounts".to_string(),
        thresholds,
        cooldown: Duration::ZERO,
        rules,
    }
}

// ========================================================================
// Lifecycle Fixture
// ========================================================================

/// Fixed start time of lifecycle tests.
pub const T0: OffsetDateTime = datetime!(2026-03-01 12:00 UTC);

/// Manager type wired with in-memory backends.
pub type TestManager = ScoreManager<
    InMemoryScoringStore,
    InMemoryTaskQueue,
    InMemoryEntityData,
    StaticAuthorizer,
    FixedClock,
>;

/// Wired manager plus handles on its shared backends.
pub struct Lifecycle {
    /// Manager under test.
    pub manager: TestManager,
    /// Shared store handle.
    pub store: InMemoryScoringStore,
    /// Shared queue handle.
    pub queue: InMemoryTaskQueue,
    /// Shared entity data handle.
    pub data: InMemoryEntityData,
    /// Shared clock handle.
    pub clock: FixedClock,
}

/// The entity used by lifecycle tests.
pub fn entity() -> EntityRef {
    EntityRef::new("acme", "account", "acc-1")
}

/// Actor allowed to override scores.
pub fn analyst() -> ActorId {
    ActorId::new("analyst")
}

/// Builds a lifecycle fixture with `ruleset` committed.
pub fn lifecycle(ruleset: Option<ScoringRuleset>, queue: InMemoryTaskQueue) -> TestResult<Lifecycle> {
    let store = InMemoryScoringStore::new();
    if let Some(mut ruleset) = ruleset {
        ruleset.status = RulesetStatus::Draft;
        store.replace_draft(&ruleset)?;
        store.commit_draft(&ruleset.organization_id, &ruleset.entity_type)?;
    }
    let data = InMemoryEntityData::new();
    let clock = FixedClock::new(T0);
    let manager = ScoreManager::new(
        store.clone(),
        queue.clone(),
        data.clone(),
        StaticAuthorizer::allowing([analyst()]),
        clock.clone(),
        ScoringEngine::new(evaluator()),
        ScoreManagerConfig {
            default_refresh: Duration::from_secs(3600),
            background_refresh: true,
        },
    );
    Ok(Lifecycle {
        manager,
        store,
        queue,
        data,
        clock,
    })
}
