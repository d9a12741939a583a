// crates/risk-gate-core/src/core/scenario.rs
// ============================================================================
// Module: Scenario Model
// Description: Scenarios, iterations, rules, and outcome thresholds.
// Purpose: Hold the immutable inputs of scenario execution.
// Dependencies: risk-logic, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`Scenario`] owns at most one live [`ScenarioIteration`]. Iterations are
//! immutable once built; publishing a new one replaces the live pointer
//! through [`Scenario::set_live_iteration`], which is the only mutation.

// ============================================================================
// SECTION: Imports
// ============================================================================

use risk_logic::Node;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::EntityType;
use crate::core::identifiers::IterationId;
use crate::core::identifiers::OrganizationId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::ScenarioId;

// ============================================================================
// SECTION: Outcome
// ============================================================================

/// Decision produced by a scenario execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// Score below the review threshold.
    Approve,
    /// Score at or above review, below reject.
    Review,
    /// Score at or above the reject threshold.
    Reject,
}

impl Outcome {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Approve => "approve",
            Self::Review => "review",
            Self::Reject => "reject",
        }
    }
}

/// Threshold configuration errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ThresholdError {
    /// Review threshold is above the reject threshold.
    #[error("review threshold {review} exceeds reject threshold {reject}")]
    Inverted {
        /// Review threshold.
        review: i64,
        /// Reject threshold.
        reject: i64,
    },
}

/// Review and reject thresholds of an iteration.
///
/// # Invariants
/// - `review <= reject`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct OutcomeThresholds {
    /// Scores at or above this value are at least reviewed.
    review: i64,
    /// Scores at or above this value are rejected.
    reject: i64,
}

impl OutcomeThresholds {
    /// Creates thresholds.
    ///
    /// # Errors
    ///
    /// Returns [`ThresholdError::Inverted`] when `review > reject`.
    pub const fn new(review: i64, reject: i64) -> Result<Self, ThresholdError> {
        if review > reject {
            return Err(ThresholdError::Inverted {
                review,
                reject,
            });
        }
        Ok(Self {
            review,
            reject,
        })
    }

    /// Returns the review threshold.
    #[must_use]
    pub const fn review(&self) -> i64 {
        self.review
    }

    /// Returns the reject threshold.
    #[must_use]
    pub const fn reject(&self) -> i64 {
        self.reject
    }

    /// Maps a score to an outcome. Both thresholds are inclusive lower bounds.
    #[must_use]
    pub const fn outcome(&self, score: i64) -> Outcome {
        if score >= self.reject {
            Outcome::Reject
        } else if score >= self.review {
            Outcome::Review
        } else {
            Outcome::Approve
        }
    }
}

// ============================================================================
// SECTION: Rules And Iterations
// ============================================================================

/// Scenario rule: a boolean formula and the modifier it contributes.
#[derive(Debug, Clone, PartialEq)]
pub struct Rule {
    /// Rule identifier.
    pub rule_id: RuleId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Boolean formula.
    pub formula: Node,
    /// Score added when the formula holds.
    pub score_modifier: i64,
}

/// Immutable published version of a scenario.
#[derive(Debug, Clone, PartialEq)]
pub struct ScenarioIteration {
    /// Iteration identifier.
    iteration_id: IterationId,
    /// Monotonic version number.
    version: u32,
    /// Record type the trigger applies to.
    trigger_object_type: EntityType,
    /// Boolean trigger condition.
    trigger: Node,
    /// Scored rules, evaluated in order.
    rules: Vec<Rule>,
    /// Outcome thresholds.
    thresholds: OutcomeThresholds,
}

impl ScenarioIteration {
    /// Creates an iteration.
    #[must_use]
    pub const fn new(
        iteration_id: IterationId,
        version: u32,
        trigger_object_type: EntityType,
        trigger: Node,
        rules: Vec<Rule>,
        thresholds: OutcomeThresholds,
    ) -> Self {
        Self {
            iteration_id,
            version,
            trigger_object_type,
            trigger,
            rules,
            thresholds,
        }
    }

    /// Returns the iteration identifier.
    #[must_use]
    pub const fn iteration_id(&self) -> &IterationId {
        &self.iteration_id
    }

    /// Returns the version number.
    #[must_use]
    pub const fn version(&self) -> u32 {
        self.version
    }

    /// Returns the trigger record type.
    #[must_use]
    pub const fn trigger_object_type(&self) -> &EntityType {
        &self.trigger_object_type
    }

    /// Returns the trigger condition.
    #[must_use]
    pub const fn trigger(&self) -> &Node {
        &self.trigger
    }

    /// Returns the rules in evaluation order.
    #[must_use]
    pub fn rules(&self) -> &[Rule] {
        &self.rules
    }

    /// Returns the thresholds.
    #[must_use]
    pub const fn thresholds(&self) -> OutcomeThresholds {
        self.thresholds
    }
}

// ============================================================================
// SECTION: Scenario
// ============================================================================

/// Scenario with an optional live iteration.
#[derive(Debug, Clone, PartialEq)]
pub struct Scenario {
    /// Scenario identifier.
    pub scenario_id: ScenarioId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Iteration currently used for decisions.
    live_iteration: Option<ScenarioIteration>,
}

impl Scenario {
    /// Creates a scenario with no live iteration.
    #[must_use]
    pub const fn new(scenario_id: ScenarioId, organization_id: OrganizationId, name: String) -> Self {
        Self {
            scenario_id,
            organization_id,
            name,
            live_iteration: None,
        }
    }

    /// Returns the live iteration, if one is published.
    #[must_use]
    pub const fn live_iteration(&self) -> Option<&ScenarioIteration> {
        self.live_iteration.as_ref()
    }

    /// Publishes an iteration, replacing the previous live one.
    pub fn set_live_iteration(&mut self, iteration: ScenarioIteration) {
        self.live_iteration = Some(iteration);
    }
}
