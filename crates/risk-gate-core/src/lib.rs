// crates/risk-gate-core/src/lib.rs
// ============================================================================
// Module: Risk Gate Core Library
// Description: Public API surface for the risk gate core.
// Purpose: Expose core types, interfaces, and runtime engines.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Risk gate core decides what to do with incoming records and how risky a
//! known entity is. Scenarios score a record and map the score to approve,
//! review, or reject. Scoring rulesets turn an entity into a discrete risk
//! score that is versioned, cached, refreshed, and overridable. The core is
//! backend-agnostic and reaches storage, queues, entity data, and
//! authorization only through [`interfaces`].

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;


// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use crate::core::*;

pub use interfaces::AuthorizationError;
pub use interfaces::Clock;
pub use interfaces::DataError;
pub use interfaces::EntityDataSource;
pub use interfaces::IndexCatalog;
pub use interfaces::InputRecord;
pub use interfaces::Job;
pub use interfaces::QueueError;
pub use interfaces::RulesetStore;
pub use interfaces::ScoreAuthorizer;
pub use interfaces::ScoreStore;
pub use interfaces::StoreError;
pub use interfaces::SystemClock;
pub use interfaces::TaskQueue;
pub use runtime::CreateRulesetRequest;
pub use runtime::FixedClock;
pub use runtime::InMemoryEntityData;
pub use runtime::InMemoryScoringStore;
pub use runtime::InMemoryTaskQueue;
pub use runtime::PreparationReport;
pub use runtime::RecordEnvironment;
pub use runtime::RefreshPolicy;
pub use runtime::RuleDraft;
pub use runtime::RuleExecution;
pub use runtime::RuleOutcome;
pub use runtime::RuleShapeError;
pub use runtime::RulesetError;
pub use runtime::RulesetService;
pub use runtime::RulesetServiceConfig;
pub use runtime::ScenarioError;
pub use runtime::ScenarioEvaluator;
pub use runtime::ScenarioExecution;
pub use runtime::ScoreError;
pub use runtime::ScoreManager;
pub use runtime::ScoreManagerConfig;
pub use runtime::ScoringEngine;
pub use runtime::ScoringError;
pub use runtime::StaticAuthorizer;
