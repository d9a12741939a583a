// crates/risk-gate-core/src/core/mod.rs
// ============================================================================
// Module: Risk Gate Core Types
// Description: Scenario, ruleset, and score record types.
// Purpose: Provide the shared data model for runtime services and stores.
// Dependencies: risk-logic, serde, time
// ============================================================================

//! ## Overview
//! Core types describe what is evaluated (scenarios, rulesets) and what is
//! recorded (scores). They carry no behavior beyond invariant-preserving
//! constructors and small lookups.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod definition;
pub mod identifiers;
pub mod ruleset;
pub mod scenario;
pub mod score;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use definition::DefinitionError;
pub use definition::IterationDefinition;
pub use definition::RuleDefinition;
pub use definition::RulesetDefinition;
pub use definition::ScenarioDefinition;
pub use definition::ScoringRuleDefinition;
pub use identifiers::ActorId;
pub use identifiers::EntityId;
pub use identifiers::EntityRef;
pub use identifiers::EntityType;
pub use identifiers::IterationId;
pub use identifiers::OrganizationId;
pub use identifiers::RuleId;
pub use identifiers::ScenarioId;
pub use identifiers::ScoreId;
pub use identifiers::StableRuleId;
pub use ruleset::IndexSpec;
pub use ruleset::IndexState;
pub use ruleset::MAX_THRESHOLD_COUNT;
pub use ruleset::RulesetStatus;
pub use ruleset::ScoreThresholdError;
pub use ruleset::ScoringRule;
pub use ruleset::ScoringRuleset;
pub use ruleset::validate_thresholds;
pub use scenario::Outcome;
pub use scenario::OutcomeThresholds;
pub use scenario::Rule;
pub use scenario::Scenario;
pub use scenario::ScenarioIteration;
pub use scenario::ThresholdError;
pub use score::RuleScoringEvaluation;
pub use score::ScoreSource;
pub use score::ScoringEvaluation;
pub use score::ScoringScore;
