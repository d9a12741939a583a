// crates/risk-gate-core/tests/scenario.rs
// ============================================================================
// Module: Scenario Execution Tests
// Description: Trigger gating, rule scoring, and outcome thresholds.
// ============================================================================
//! ## Overview
//! Integration tests for [`risk_gate_core::ScenarioEvaluator`].

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
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod support;

use risk_gate_core::EntityType;
use risk_gate_core::InputRecord;
use risk_gate_core::IterationId;
use risk_gate_core::Outcome;
use risk_gate_core::OutcomeThresholds;
use risk_gate_core::RecordEnvironment;
use risk_gate_core::Rule;
use risk_gate_core::RuleId;
use risk_gate_core::RuleOutcome;
use risk_gate_core::Scenario;
use risk_gate_core::ScenarioDefinition;
use risk_gate_core::ScenarioError;
use risk_gate_core::ScenarioEvaluator;
use risk_gate_core::ScenarioId;
use risk_gate_core::ScenarioIteration;
use risk_gate_core::ThresholdError;
use risk_logic::Environment;
use risk_logic::EnvironmentError;
use risk_logic::EvaluationError;
use risk_logic::Function;
use risk_logic::MapEnvironment;
use risk_logic::Node;
use risk_logic::Value;
use support::TestResult;
use support::ensure;
use support::evaluator;
use support::payload_greater;
use support::registry;

/// Scenario rule with the given formula and modifier.
fn rule(id: &str, formula: Node, score_modifier: i64) -> Rule {
    Rule {
        rule_id: RuleId::new(id),
        name: id.to_string(),
        description: String::new(),
        formula,
        score_modifier,
    }
}

/// Scenario on `transaction` records with review 50 and reject 100.
fn scenario(trigger: Node, rules: Vec<Rule>) -> TestResult<Scenario> {
    let mut scenario = Scenario::new(
        ScenarioId::new("card-fraud"),
        "acme".into(),
        "Card fraud".to_string(),
    );
    scenario.set_live_iteration(ScenarioIteration::new(
        IterationId::new("iter-1"),
        1,
        EntityType::new("transaction"),
        trigger,
        rules,
        OutcomeThresholds::new(50, 100)?,
    ));
    Ok(scenario)
}

/// Transaction record with an `amount` field.
fn transaction(amount: i64) -> RecordEnvironment {
    RecordEnvironment::new(
        EntityType::new("transaction"),
        MapEnvironment::new().with_payload_field("amount", amount),
    )
}

/// Runs a scenario whose single always-true rule adds `modifier`.
fn outcome_for(modifier: i64) -> TestResult<Outcome> {
    let always = registry().constant(true)?;
    let scenario = scenario(registry().constant(true)?, vec![rule("r1", always, modifier)])?;
    let execution = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &transaction(10))?;
    ensure(execution.score == modifier, format!("unexpected score {}", execution.score))?;
    Ok(execution.outcome)
}

// ============================================================================
// SECTION: Outcomes
// ============================================================================

#[test]
fn outcome_thresholds_are_inclusive() -> TestResult {
    for (modifier, expected) in [
        (49, Outcome::Approve),
        (50, Outcome::Review),
        (99, Outcome::Review),
        (100, Outcome::Reject),
        (101, Outcome::Reject),
    ] {
        let outcome = outcome_for(modifier)?;
        ensure(outcome == expected, format!("score {modifier} gave {outcome:?}"))?;
    }
    Ok(())
}

#[test]
fn inverted_thresholds_are_rejected() -> TestResult {
    let result = OutcomeThresholds::new(100, 50);
    ensure(
        result
            == Err(ThresholdError::Inverted {
                review: 100,
                reject: 50,
            }),
        format!("unexpected result {result:?}"),
    )
}

#[test]
fn only_hit_rules_contribute_to_the_score() -> TestResult {
    let scenario = scenario(registry().constant(true)?, vec![
        rule("big", payload_greater("amount", 1000)?, 60),
        rule("medium", payload_greater("amount", 100)?, 30),
        rule("small", payload_greater("amount", 10_000)?, 90),
    ])?;
    let execution = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &transaction(5000))?;
    ensure(execution.score == 90, format!("unexpected score {}", execution.score))?;
    ensure(execution.outcome == Outcome::Review, "expected review")?;
    let outcomes: Vec<RuleOutcome> = execution.rules.iter().map(|rule| rule.outcome).collect();
    ensure(
        outcomes == vec![RuleOutcome::Hit, RuleOutcome::Hit, RuleOutcome::NoHit],
        format!("unexpected rule outcomes {outcomes:?}"),
    )
}

#[test]
fn failing_rule_is_recorded_and_evaluation_continues() -> TestResult {
    let scenario = scenario(registry().constant(true)?, vec![
        rule("broken", payload_greater("missing", 1)?, 40),
        rule("amount", payload_greater("amount", 100)?, 20),
    ])?;
    let execution = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &transaction(500))?;
    let broken = &execution.rules[0];
    ensure(broken.outcome == RuleOutcome::Error, "broken rule should be an error")?;
    ensure(broken.score_modifier == 0, "errored rule must not contribute")?;
    ensure(
        matches!(broken.error, Some(EvaluationError::ArgumentFailed { .. })),
        format!("unexpected error {:?}", broken.error),
    )?;
    ensure(execution.rules[1].outcome == RuleOutcome::Hit, "second rule should hit")?;
    ensure(execution.score == 20, format!("unexpected score {}", execution.score))
}

#[test]
fn non_boolean_rule_is_an_error_outcome() -> TestResult {
    let scenario =
        scenario(registry().constant(true)?, vec![rule("numeric", registry().constant(5_i64)?, 10)])?;
    let execution = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &transaction(1))?;
    ensure(execution.rules[0].outcome == RuleOutcome::Error, "numeric formula should error")?;
    ensure(execution.score == 0, "error contributes nothing")
}

// ============================================================================
// SECTION: Trigger Gating
// ============================================================================

#[test]
fn unmatched_trigger_stops_execution() -> TestResult {
    let scenario = scenario(payload_greater("amount", 100)?, vec![])?;
    let result = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &transaction(5));
    ensure(
        result == Err(ScenarioError::TriggerNotMatched),
        format!("unexpected result {result:?}"),
    )
}

#[test]
fn record_type_must_match_trigger_type() -> TestResult {
    let scenario = scenario(registry().constant(true)?, vec![])?;
    let record = RecordEnvironment::new(EntityType::new("account"), MapEnvironment::new());
    let result = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &record);
    ensure(
        result
            == Err(ScenarioError::TypeMismatch {
                expected: EntityType::new("transaction"),
                actual: EntityType::new("account"),
            }),
        format!("unexpected result {result:?}"),
    )
}

#[test]
fn scenario_without_live_iteration_fails() -> TestResult {
    let scenario = Scenario::new(ScenarioId::new("draft"), "acme".into(), "Draft".to_string());
    let result = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &transaction(1));
    ensure(
        result
            == Err(ScenarioError::NoLiveVersion {
                scenario_id: ScenarioId::new("draft"),
            }),
        format!("unexpected result {result:?}"),
    )
}

#[test]
fn non_boolean_trigger_is_a_trigger_evaluation_error() -> TestResult {
    let scenario = scenario(registry().payload("amount")?, vec![])?;
    let result = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &transaction(1));
    match result {
        Err(ScenarioError::TriggerEvaluation {
            error: EvaluationError::TypeMismatch {
                function, ..
            },
            ..
        }) => ensure(function == Function::Payload, format!("unexpected function {function}")),
        other => Err(format!("unexpected result {other:?}").into()),
    }
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

#[test]
fn scenario_definition_builds_an_executable_scenario() -> TestResult {
    let document = serde_json::json!({
        "scenario_id": "card-fraud",
        "organization_id": "acme",
        "name": "Card fraud",
        "live_iteration": {
            "iteration_id": "iter-7",
            "version": 7,
            "trigger_object_type": "transaction",
            "trigger": { "name": "Constant", "constant": { "type": "bool", "value": true } },
            "rules": [{
                "rule_id": "large-amount",
                "name": "Large amount",
                "formula": {
                    "name": ">",
                    "named_children": {
                        "left": {
                            "name": "Payload",
                            "named_children": {
                                "fieldName": {
                                    "name": "Constant",
                                    "constant": { "type": "string", "value": "amount" }
                                }
                            }
                        },
                        "right": { "name": "Constant", "constant": { "type": "int", "value": 1000 } }
                    }
                },
                "score_modifier": 120
            }],
            "review_threshold": 50,
            "reject_threshold": 100
        }
    });
    let definition: ScenarioDefinition = serde_json::from_value(document)?;
    let scenario = definition.build(&registry())?;
    let execution = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &transaction(2500))?;
    ensure(execution.version == 7, format!("unexpected version {}", execution.version))?;
    ensure(execution.outcome == Outcome::Reject, format!("unexpected outcome {:?}", execution.outcome))
}

// ============================================================================
// SECTION: Fault Guard
// ============================================================================

/// Transaction record whose payload lookups panic.
struct PanickingRecord {
    /// Record type.
    object_type: EntityType,
}

impl Environment for PanickingRecord {
    fn payload_field(&self, name: &str) -> Result<Value, EnvironmentError> {
        panic!("record backend exploded while reading {name}");
    }

    fn list_values(&self, _list_id: &str) -> Result<Vec<Value>, EnvironmentError> {
        Ok(Vec::new())
    }

    fn related_field(
        &self,
        _table: &str,
        _field: &str,
        _path: &[String],
    ) -> Result<Value, EnvironmentError> {
        Ok(Value::Null)
    }

    fn variable(&self, _name: &str) -> Result<Value, EnvironmentError> {
        Ok(Value::Null)
    }
}

impl InputRecord for PanickingRecord {
    fn object_type(&self) -> &EntityType {
        &self.object_type
    }
}

#[test]
fn evaluation_panics_become_internal_failures() -> TestResult {
    let scenario = scenario(registry().constant(true)?, vec![rule(
        "large-amount",
        payload_greater("amount", 1000)?,
        60,
    )])?;
    let record = PanickingRecord {
        object_type: EntityType::new("transaction"),
    };
    let result = ScenarioEvaluator::new(evaluator()).evaluate(&scenario, &record);
    match result {
        Err(ScenarioError::InternalEvaluationFailure {
            message,
        }) => ensure(message.contains("exploded"), format!("unexpected message {message}")),
        other => Err(format!("unexpected result {other:?}").into()),
    }
}
