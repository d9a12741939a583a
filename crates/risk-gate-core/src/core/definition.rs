// crates/risk-gate-core/src/core/definition.rs
// ============================================================================
// Module: Serializable Definitions
// Description: Wire forms of scenarios, rulesets, and ruleset drafts.
// Purpose: Load trees from documents through registry-validated decoding.
// Dependencies: risk-logic, serde, thiserror
// ============================================================================

//! ## Overview
//! Scenarios and rulesets hold validated [`Node`] trees, which have no serde
//! implementation of their own. The definitions in this module carry
//! [`NodeDto`] trees instead and are turned into domain values with a
//! [`FunctionRegistry`], so every document passes the same construction
//! checks as programmatic trees.
//! Security posture: definitions are untrusted input; building fails closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use risk_logic::FunctionRegistry;
use risk_logic::MalformedTree;
use risk_logic::Node;
use risk_logic::NodeDto;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::EntityType;
use crate::core::identifiers::IterationId;
use crate::core::identifiers::OrganizationId;
use crate::core::identifiers::RuleId;
use crate::core::identifiers::ScenarioId;
use crate::core::identifiers::StableRuleId;
use crate::core::ruleset::MAX_THRESHOLD_COUNT;
use crate::core::ruleset::RulesetStatus;
use crate::core::ruleset::ScoreThresholdError;
use crate::core::ruleset::ScoringRule;
use crate::core::ruleset::ScoringRuleset;
use crate::core::ruleset::validate_thresholds;
use crate::core::scenario::OutcomeThresholds;
use crate::core::scenario::Rule;
use crate::core::scenario::Scenario;
use crate::core::scenario::ScenarioIteration;
use crate::core::scenario::ThresholdError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Errors raised while building domain values from definitions.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DefinitionError {
    /// A tree failed registry validation.
    #[error("{context}: {source}")]
    Malformed {
        /// Location of the tree in the document.
        context: String,
        /// Construction failure.
        #[source]
        source: MalformedTree,
    },
    /// Outcome thresholds are inconsistent.
    #[error(transparent)]
    Thresholds(#[from] ThresholdError),
    /// Scoring thresholds are too many or out of order.
    #[error(transparent)]
    ScoreThresholds(#[from] ScoreThresholdError),
}

/// Decodes a tree, attaching the document location to failures.
fn decode(
    registry: &FunctionRegistry,
    dto: &NodeDto,
    context: impl FnOnce() -> String,
) -> Result<Node, DefinitionError> {
    registry.decode(dto).map_err(|source| DefinitionError::Malformed {
        context: context(),
        source,
    })
}

// ============================================================================
// SECTION: Scenario Definitions
// ============================================================================

/// Serialized scenario rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleDefinition {
    /// Rule identifier.
    pub rule_id: RuleId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Boolean formula.
    pub formula: NodeDto,
    /// Score added when the formula holds.
    pub score_modifier: i64,
}

/// Serialized scenario iteration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IterationDefinition {
    /// Iteration identifier.
    pub iteration_id: IterationId,
    /// Version number.
    pub version: u32,
    /// Record type the trigger applies to.
    pub trigger_object_type: EntityType,
    /// Boolean trigger condition.
    pub trigger: NodeDto,
    /// Scored rules.
    #[serde(default)]
    pub rules: Vec<RuleDefinition>,
    /// Review threshold.
    pub review_threshold: i64,
    /// Reject threshold.
    pub reject_threshold: i64,
}

/// Serialized scenario.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScenarioDefinition {
    /// Scenario identifier.
    pub scenario_id: ScenarioId,
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Display name.
    pub name: String,
    /// Live iteration, if published.
    #[serde(default)]
    pub live_iteration: Option<IterationDefinition>,
}

impl ScenarioDefinition {
    /// Builds a scenario, decoding every tree through `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when a tree is malformed or the thresholds
    /// are inverted.
    pub fn build(&self, registry: &FunctionRegistry) -> Result<Scenario, DefinitionError> {
        let mut scenario = Scenario::new(
            self.scenario_id.clone(),
            self.organization_id.clone(),
            self.name.clone(),
        );
        if let Some(iteration) = &self.live_iteration {
            scenario.set_live_iteration(iteration.build(registry)?);
        }
        Ok(scenario)
    }
}

impl IterationDefinition {
    /// Builds an iteration, decoding every tree through `registry`.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError`] when a tree is malformed or the thresholds
    /// are inverted.
    pub fn build(&self, registry: &FunctionRegistry) -> Result<ScenarioIteration, DefinitionError> {
        let thresholds = OutcomeThresholds::new(self.review_threshold, self.reject_threshold)?;
        let trigger = decode(registry, &self.trigger, || "trigger".to_string())?;
        let rules = self
            .rules
            .iter()
            .map(|rule| {
                Ok(Rule {
                    rule_id: rule.rule_id.clone(),
                    name: rule.name.clone(),
                    description: rule.description.clone(),
                    formula: decode(registry, &rule.formula, || format!("rule {}", rule.rule_id))?,
                    score_modifier: rule.score_modifier,
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;
        Ok(ScenarioIteration::new(
            self.iteration_id.clone(),
            self.version,
            self.trigger_object_type.clone(),
            trigger,
            rules,
            thresholds,
        ))
    }
}

// ============================================================================
// SECTION: Ruleset Definitions
// ============================================================================

/// Serialized scoring rule.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringRuleDefinition {
    /// Identifier preserved across versions.
    pub stable_id: StableRuleId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    #[serde(default)]
    pub description: String,
    /// Rule body.
    pub ast: NodeDto,
}

/// Default ruleset version for documents that omit it.
const fn default_version() -> u32 {
    1
}

/// Default ruleset status for documents that omit it.
const fn default_status() -> RulesetStatus {
    RulesetStatus::Committed
}

/// Serialized scoring ruleset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RulesetDefinition {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Scored entity type.
    pub entity_type: EntityType,
    /// Version number.
    #[serde(default = "default_version")]
    pub version: u32,
    /// Lifecycle status.
    #[serde(default = "default_status")]
    pub status: RulesetStatus,
    /// Display name.
    pub name: String,
    /// Discretization cut points.
    #[serde(default)]
    pub thresholds: Vec<i64>,
    /// Staleness cooldown in seconds.
    #[serde(default)]
    pub cooldown_seconds: u64,
    /// Rules.
    #[serde(default)]
    pub rules: Vec<ScoringRuleDefinition>,
}

impl RulesetDefinition {
    /// Builds a ruleset, decoding every rule body through `registry`.
    ///
    /// Thresholds must be strictly ascending and at most
    /// [`MAX_THRESHOLD_COUNT`] long. Rule body shape is validated by the
    /// versioning workflow and the scoring engine.
    ///
    /// # Errors
    ///
    /// Returns [`DefinitionError::ScoreThresholds`] for invalid thresholds
    /// and [`DefinitionError::Malformed`] when a rule body is malformed.
    pub fn build(&self, registry: &FunctionRegistry) -> Result<ScoringRuleset, DefinitionError> {
        validate_thresholds(&self.thresholds, MAX_THRESHOLD_COUNT)?;
        let rules = self
            .rules
            .iter()
            .map(|rule| {
                Ok(ScoringRule {
                    stable_id: rule.stable_id.clone(),
                    name: rule.name.clone(),
                    description: rule.description.clone(),
                    ast: decode(registry, &rule.ast, || format!("rule {}", rule.stable_id))?,
                })
            })
            .collect::<Result<Vec<_>, DefinitionError>>()?;
        Ok(ScoringRuleset {
            organization_id: self.organization_id.clone(),
            entity_type: self.entity_type.clone(),
            version: self.version,
            status: self.status,
            name: self.name.clone(),
            thresholds: self.thresholds.clone(),
            cooldown: Duration::from_secs(self.cooldown_seconds),
            rules,
        })
    }
}

impl From<&ScoringRuleset> for RulesetDefinition {
    fn from(ruleset: &ScoringRuleset) -> Self {
        Self {
            organization_id: ruleset.organization_id.clone(),
            entity_type: ruleset.entity_type.clone(),
            version: ruleset.version,
            status: ruleset.status,
            name: ruleset.name.clone(),
            thresholds: ruleset.thresholds.clone(),
            cooldown_seconds: ruleset.cooldown.as_secs(),
            rules: ruleset
                .rules
                .iter()
                .map(|rule| ScoringRuleDefinition {
                    stable_id: rule.stable_id.clone(),
                    name: rule.name.clone(),
                    description: rule.description.clone(),
                    ast: NodeDto::from(&rule.ast),
                })
                .collect(),
        }
    }
}
