// crates/risk-gate-core/src/runtime/scoring.rs
// ============================================================================
// Module: Scoring Engine
// Description: Ruleset execution, rule shape validation, and discretization.
// Purpose: Turn a ruleset and an entity environment into a discrete score.
// Dependencies: crate::core, risk-logic, thiserror, tracing
// ============================================================================

//! ## Overview
//! Every scoring rule body is either a `ScoreComputation` or a `Switch`
//! whose children are all `ScoreComputation` nodes. Executing a ruleset sums
//! the modifiers of triggered rules, keeps the highest triggered floor, and
//! discretizes the sum against the ruleset thresholds:
//!
//! `score = max(i + 1, floor)` where `i` is the smallest index with
//! `thresholds[i] > modifier` (or the threshold count when none is).
//!
//! Any failing rule fails the whole computation; a partial score is never
//! produced.

// ============================================================================
// SECTION: Imports
// ============================================================================

use risk_logic::Environment;
use risk_logic::EvaluationError;
use risk_logic::Evaluator;
use risk_logic::Function;
use risk_logic::Node;
use risk_logic::NodeEvaluation;
use risk_logic::ScoreComputationResult;
use risk_logic::Value;
use thiserror::Error;
use tracing::error;

use crate::core::RuleScoringEvaluation;
use crate::core::ScoringEvaluation;
use crate::core::ScoringRuleset;
use crate::core::StableRuleId;
use crate::runtime::guard::guarded;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ruleset execution errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoringError {
    /// A rule failed to evaluate.
    #[error("rule {stable_id} failed to evaluate: {error}")]
    RuleEvaluation {
        /// Failing rule.
        stable_id: StableRuleId,
        /// Root failure of the rule.
        error: EvaluationError,
    },
    /// Evaluation faulted unexpectedly.
    #[error("internal evaluation failure: {message}")]
    InternalEvaluationFailure {
        /// Fault description.
        message: String,
    },
}

/// Rule body shape violations.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RuleShapeError {
    /// Root is neither `ScoreComputation` nor `Switch`.
    #[error("rule root must be ScoreComputation or Switch, found {function}")]
    InvalidRoot {
        /// Function found at the root.
        function: Function,
    },
    /// `Switch` without children.
    #[error("Switch rule must have at least one child")]
    EmptySwitch,
    /// `Switch` child that is not a `ScoreComputation`.
    #[error("Switch child #{index} must be ScoreComputation, found {function}")]
    InvalidSwitchChild {
        /// Child position.
        index: usize,
        /// Function found at the child.
        function: Function,
    },
}

// ============================================================================
// SECTION: Shape Validation
// ============================================================================

/// Validates the shape of a scoring rule body.
///
/// # Errors
///
/// Returns [`RuleShapeError`] naming the violated constraint.
pub fn validate_rule_shape(ast: &Node) -> Result<(), RuleShapeError> {
    match ast.function() {
        Function::ScoreComputation => Ok(()),
        Function::Switch => {
            if ast.children().is_empty() {
                return Err(RuleShapeError::EmptySwitch);
            }
            ast.children().iter().enumerate().try_for_each(|(index, child)| {
                if child.function() == Function::ScoreComputation {
                    Ok(())
                } else {
                    Err(RuleShapeError::InvalidSwitchChild {
                        index,
                        function: child.function(),
                    })
                }
            })
        }
        function => Err(RuleShapeError::InvalidRoot {
            function,
        }),
    }
}

// ============================================================================
// SECTION: Discretization
// ============================================================================

/// Maps an aggregate modifier to a 1-based bucket.
///
/// Returns `i + 1` for the smallest `i` with `thresholds[i] > modifier`, or
/// `thresholds.len() + 1` when no threshold exceeds the modifier.
#[must_use]
pub fn discretize(modifier: i64, thresholds: &[i64]) -> i64 {
    let bucket = thresholds
        .iter()
        .position(|threshold| *threshold > modifier)
        .unwrap_or(thresholds.len());
    i64::try_from(bucket).map_or(i64::MAX, |bucket| bucket.saturating_add(1))
}

/// Combines the discretized modifier with the floor.
#[must_use]
pub fn final_score(modifier: i64, floor: i64, thresholds: &[i64]) -> i64 {
    discretize(modifier, thresholds).max(floor)
}

// ============================================================================
// SECTION: Scoring Engine
// ============================================================================

/// Executes scoring rulesets.
#[derive(Debug, Clone)]
pub struct ScoringEngine {
    /// Tree evaluator.
    evaluator: Evaluator,
}

impl ScoringEngine {
    /// Creates a scoring engine.
    #[must_use]
    pub const fn new(evaluator: Evaluator) -> Self {
        Self {
            evaluator,
        }
    }

    /// Executes every rule of `ruleset` against `env`.
    ///
    /// # Errors
    ///
    /// Returns [`ScoringError::RuleEvaluation`] for the first failing rule and
    /// [`ScoringError::InternalEvaluationFailure`] when evaluation faults.
    pub fn execute(
        &self,
        ruleset: &ScoringRuleset,
        env: &dyn Environment,
    ) -> Result<ScoringEvaluation, ScoringError> {
        guarded(|| self.compute(ruleset, env)).map_err(|message| {
            error!(
                organization_id = %ruleset.organization_id,
                entity_type = %ruleset.entity_type,
                version = ruleset.version,
                %message,
                "ruleset execution faulted"
            );
            ScoringError::InternalEvaluationFailure {
                message,
            }
        })?
    }

    /// Evaluates rules and aggregates their contributions.
    fn compute(
        &self,
        ruleset: &ScoringRuleset,
        env: &dyn Environment,
    ) -> Result<ScoringEvaluation, ScoringError> {
        let mut modifier: i64 = 0;
        let mut floor: i64 = 0;
        let mut rules = Vec::with_capacity(ruleset.rules.len());
        for rule in &ruleset.rules {
            let evaluation = self.evaluator.evaluate(&rule.ast, env);
            let result = score_result(&evaluation).map_err(|error| ScoringError::RuleEvaluation {
                stable_id: rule.stable_id.clone(),
                error,
            })?;
            if result.triggered {
                modifier = modifier.saturating_add(result.modifier);
                floor = floor.max(result.floor);
            }
            rules.push(RuleScoringEvaluation {
                stable_id: rule.stable_id.clone(),
                name: rule.name.clone(),
                result,
                evaluation,
            });
        }
        Ok(ScoringEvaluation {
            modifier,
            floor,
            score: final_score(modifier, floor, &ruleset.thresholds),
            rules,
        })
    }
}

/// Reads the score computation result at the root of a rule evaluation.
fn score_result(evaluation: &NodeEvaluation) -> Result<ScoreComputationResult, EvaluationError> {
    match evaluation.result() {
        Ok(Value::Score(result)) => Ok(*result),
        Ok(other) => Err(EvaluationError::type_mismatch(evaluation.function, "score", other.kind())),
        Err(error) => Err(error.clone()),
    }
}
