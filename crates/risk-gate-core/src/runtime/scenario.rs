// crates/risk-gate-core/src/runtime/scenario.rs
// ============================================================================
// Module: Scenario Execution
// Description: Trigger check, rule scoring, and outcome selection.
// Purpose: Turn a live scenario iteration and an input record into a decision.
// Dependencies: crate::{core, interfaces}, risk-logic, thiserror, tracing
// ============================================================================

//! ## Overview
//! [`ScenarioEvaluator::evaluate`] runs the live iteration of a scenario:
//! 1. the record type must match the iteration's trigger type;
//! 2. the trigger must evaluate to `true`;
//! 3. every rule is evaluated in order and a `true` formula adds its
//!    modifier. A failing rule is recorded and evaluation continues;
//! 4. the summed score is mapped to an [`Outcome`].
//!
//! The whole execution is fault-guarded: a panic inside evaluation becomes
//! [`ScenarioError::InternalEvaluationFailure`] and is logged with the
//! scenario context.

// ============================================================================
// SECTION: Imports
// ============================================================================

use risk_logic::EvaluationError;
use risk_logic::Evaluator;
use risk_logic::NodeEvaluation;
use risk_logic::Value;
use serde::Serialize;
use thiserror::Error;
use tracing::debug;
use tracing::error;

use crate::core::EntityType;
use crate::core::IterationId;
use crate::core::Outcome;
use crate::core::RuleId;
use crate::core::Scenario;
use crate::core::ScenarioId;
use crate::core::ScenarioIteration;
use crate::interfaces::InputRecord;
use crate::runtime::guard::guarded;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Scenario execution errors.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ScenarioError {
    /// Scenario has no published iteration.
    #[error("scenario {scenario_id} has no live iteration")]
    NoLiveVersion {
        /// Scenario identifier.
        scenario_id: ScenarioId,
    },
    /// Record type does not match the trigger type.
    #[error("record type {actual} does not match trigger type {expected}")]
    TypeMismatch {
        /// Trigger object type of the iteration.
        expected: EntityType,
        /// Object type of the record.
        actual: EntityType,
    },
    /// Trigger evaluated to `false`.
    #[error("trigger condition did not match")]
    TriggerNotMatched,
    /// Trigger failed to evaluate or did not produce a boolean.
    #[error("trigger evaluation failed: {error}")]
    TriggerEvaluation {
        /// Trigger failure.
        error: EvaluationError,
        /// Full trigger evaluation.
        evaluation: Box<NodeEvaluation>,
    },
    /// Evaluation faulted unexpectedly.
    #[error("internal evaluation failure: {message}")]
    InternalEvaluationFailure {
        /// Fault description.
        message: String,
    },
}

// ============================================================================
// SECTION: Execution Records
// ============================================================================

/// Outcome of one scenario rule.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum RuleOutcome {
    /// Formula evaluated to `true`.
    Hit,
    /// Formula evaluated to `false`.
    NoHit,
    /// Formula failed or did not produce a boolean.
    Error,
}

/// Execution record of one scenario rule.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RuleExecution {
    /// Rule identifier.
    pub rule_id: RuleId,
    /// Rule name.
    pub name: String,
    /// Rule outcome.
    pub outcome: RuleOutcome,
    /// Modifier added to the score (0 unless hit).
    pub score_modifier: i64,
    /// Failure, when the outcome is [`RuleOutcome::Error`].
    pub error: Option<EvaluationError>,
    /// Full formula evaluation.
    pub evaluation: NodeEvaluation,
}

/// Result of a successful scenario execution.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ScenarioExecution {
    /// Scenario identifier.
    pub scenario_id: ScenarioId,
    /// Iteration that was executed.
    pub iteration_id: IterationId,
    /// Iteration version.
    pub version: u32,
    /// Trigger evaluation.
    pub trigger_evaluation: NodeEvaluation,
    /// Rule executions, in rule order.
    pub rules: Vec<RuleExecution>,
    /// Summed score.
    pub score: i64,
    /// Decision.
    pub outcome: Outcome,
}

// ============================================================================
// SECTION: Scenario Evaluator
// ============================================================================

/// Executes live scenario iterations.
#[derive(Debug, Clone)]
pub struct ScenarioEvaluator {
    /// Tree evaluator.
    evaluator: Evaluator,
}

impl ScenarioEvaluator {
    /// Creates a scenario evaluator.
    #[must_use]
    pub const fn new(evaluator: Evaluator) -> Self {
        Self {
            evaluator,
        }
    }

    /// Executes the scenario's live iteration against a record.
    ///
    /// # Errors
    ///
    /// Returns [`ScenarioError`] when there is no live iteration, the record
    /// type or trigger does not match, or evaluation faults.
    pub fn evaluate(
        &self,
        scenario: &Scenario,
        record: &dyn InputRecord,
    ) -> Result<ScenarioExecution, ScenarioError> {
        let iteration = scenario.live_iteration().ok_or_else(|| ScenarioError::NoLiveVersion {
            scenario_id: scenario.scenario_id.clone(),
        })?;
        if record.object_type() != iteration.trigger_object_type() {
            return Err(ScenarioError::TypeMismatch {
                expected: iteration.trigger_object_type().clone(),
                actual: record.object_type().clone(),
            });
        }
        let execution = guarded(|| self.execute(scenario, iteration, record)).map_err(|message| {
            error!(
                scenario_id = %scenario.scenario_id,
                organization_id = %scenario.organization_id,
                iteration_id = %iteration.iteration_id(),
                %message,
                "scenario evaluation faulted"
            );
            ScenarioError::InternalEvaluationFailure {
                message,
            }
        })??;
        debug!(
            scenario_id = %scenario.scenario_id,
            score = execution.score,
            outcome = execution.outcome.as_str(),
            "scenario evaluated"
        );
        Ok(execution)
    }

    /// Runs trigger and rules of an iteration whose type already matched.
    fn execute(
        &self,
        scenario: &Scenario,
        iteration: &ScenarioIteration,
        record: &dyn InputRecord,
    ) -> Result<ScenarioExecution, ScenarioError> {
        let trigger_evaluation = self.evaluator.evaluate(iteration.trigger(), record);
        match boolean_result(&trigger_evaluation) {
            Ok(true) => {}
            Ok(false) => return Err(ScenarioError::TriggerNotMatched),
            Err(error) => {
                return Err(ScenarioError::TriggerEvaluation {
                    error,
                    evaluation: Box::new(trigger_evaluation),
                });
            }
        }

        let mut score: i64 = 0;
        let mut rules = Vec::with_capacity(iteration.rules().len());
        for rule in iteration.rules() {
            let evaluation = self.evaluator.evaluate(&rule.formula, record);
            let (outcome, score_modifier, error) = match boolean_result(&evaluation) {
                Ok(true) => (RuleOutcome::Hit, rule.score_modifier, None),
                Ok(false) => (RuleOutcome::NoHit, 0, None),
                Err(error) => (RuleOutcome::Error, 0, Some(error)),
            };
            score = score.saturating_add(score_modifier);
            rules.push(RuleExecution {
                rule_id: rule.rule_id.clone(),
                name: rule.name.clone(),
                outcome,
                score_modifier,
                error,
                evaluation,
            });
        }

        Ok(ScenarioExecution {
            scenario_id: scenario.scenario_id.clone(),
            iteration_id: iteration.iteration_id().clone(),
            version: iteration.version(),
            trigger_evaluation,
            rules,
            score,
            outcome: iteration.thresholds().outcome(score),
        })
    }
}

/// Reads a boolean root result, mapping other values to a type mismatch.
fn boolean_result(evaluation: &NodeEvaluation) -> Result<bool, EvaluationError> {
    match evaluation.result() {
        Ok(Value::Bool(value)) => Ok(*value),
        Ok(other) => Err(EvaluationError::type_mismatch(evaluation.function, "bool", other.kind())),
        Err(error) => Err(error.clone()),
    }
}
