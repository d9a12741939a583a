// crates/risk-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Risk Gate Runtime
// Description: Scenario execution, scoring, versioning, and score lifecycle.
// Purpose: Execute risk rules against records and entities.
// Dependencies: crate::{core, interfaces}, risk-logic
// ============================================================================

//! ## Overview
//! Runtime modules implement every operation of the risk gate on top of the
//! interfaces in [`crate::interfaces`]. Evaluation boundaries are
//! fault-guarded so a single faulty tree never propagates a panic.

// ============================================================================
// SECTION: Submodules
// ============================================================================

mod guard;
pub mod lifecycle;
pub mod ruleset;
pub mod scenario;
pub mod scoring;
pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use lifecycle::RefreshPolicy;
pub use lifecycle::ScoreError;
pub use lifecycle::ScoreManager;
pub use lifecycle::ScoreManagerConfig;
pub use ruleset::CreateRulesetRequest;
pub use ruleset::PreparationReport;
pub use ruleset::RuleDraft;
pub use ruleset::RulesetError;
pub use ruleset::RulesetService;
pub use ruleset::RulesetServiceConfig;
pub use scenario::RuleExecution;
pub use scenario::RuleOutcome;
pub use scenario::ScenarioError;
pub use scenario::ScenarioEvaluator;
pub use scenario::ScenarioExecution;
pub use scoring::RuleShapeError;
pub use scoring::ScoringEngine;
pub use scoring::ScoringError;
pub use scoring::discretize;
pub use scoring::final_score;
pub use scoring::validate_rule_shape;
pub use store::FixedClock;
pub use store::InMemoryEntityData;
pub use store::InMemoryScoringStore;
pub use store::InMemoryTaskQueue;
pub use store::RecordEnvironment;
pub use store::StaticAuthorizer;
