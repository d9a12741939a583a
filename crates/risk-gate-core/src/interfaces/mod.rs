// crates/risk-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Risk Gate Interfaces
// Description: Backend-agnostic seams for storage, queues, data, and auth.
// Purpose: Define the contract surfaces used by the risk gate runtime.
// Dependencies: crate::core, risk-logic, thiserror, time
// ============================================================================

//! ## Overview
//! The runtime never talks to a database, queue, or identity provider
//! directly. Every side effect crosses one of the traits below, so the same
//! engines run against the in-memory implementations in
//! [`crate::runtime::store`] and against durable adapters.
//! Implementations must fail closed on missing or invalid data.

// ============================================================================
// SECTION: Imports
// ============================================================================

use risk_logic::Environment;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

use crate::core::ActorId;
use crate::core::EntityRef;
use crate::core::EntityType;
use crate::core::IndexSpec;
use crate::core::IndexState;
use crate::core::OrganizationId;
use crate::core::ScoringRuleset;
use crate::core::ScoringScore;

// ============================================================================
// SECTION: Input Records
// ============================================================================

/// Record a scenario is evaluated against.
pub trait InputRecord: Environment {
    /// Returns the record's object type.
    fn object_type(&self) -> &EntityType;
}

// ============================================================================
// SECTION: Stores
// ============================================================================

/// Storage errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum StoreError {
    /// Store I/O error.
    #[error("store io error: {0}")]
    Io(String),
    /// Stored data is corrupted or fails decoding.
    #[error("store corruption: {0}")]
    Corrupt(String),
    /// Request is invalid for the current store state.
    #[error("store invalid request: {0}")]
    Invalid(String),
    /// Store reported an error.
    #[error("store error: {0}")]
    Store(String),
}

/// Persistence of scoring rulesets.
///
/// # Invariants
/// - At most one draft and one committed ruleset exist per
///   (organization, entity type).
pub trait RulesetStore {
    /// Loads the committed ruleset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn committed_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<Option<ScoringRuleset>, StoreError>;

    /// Loads the draft ruleset.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn draft_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<Option<ScoringRuleset>, StoreError>;

    /// Lists every ruleset of an organization, ordered by entity type then status.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn list_rulesets(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ScoringRuleset>, StoreError>;

    /// Replaces the draft (header and every rule) atomically.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails; no partial draft remains.
    fn replace_draft(&self, ruleset: &ScoringRuleset) -> Result<(), StoreError>;

    /// Turns the draft into the committed ruleset, replacing the previous one.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::Invalid`] when no draft exists.
    fn commit_draft(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<ScoringRuleset, StoreError>;
}

/// Persistence of score records.
pub trait ScoreStore {
    /// Loads the entity's current score.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn current_score(&self, entity: &EntityRef) -> Result<Option<ScoringScore>, StoreError>;

    /// Loads every score of the entity, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when loading fails.
    fn score_history(&self, entity: &EntityRef) -> Result<Vec<ScoringScore>, StoreError>;

    /// Inserts a score as the entity's current score, clearing the flag on
    /// the previous one in the same atomic operation.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the write fails.
    fn insert_score(&self, score: ScoringScore) -> Result<ScoringScore, StoreError>;
}

/// Catalog of related-record indexes.
pub trait IndexCatalog {
    /// Returns the state of each requested index, in request order.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be read.
    fn index_states(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<Vec<IndexState>, StoreError>;

    /// Records that creation of the indexes has been requested.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be written.
    fn mark_pending(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError>;

    /// Records that the indexes are usable.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError`] when the catalog cannot be written.
    fn mark_ready(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError>;
}

// ============================================================================
// SECTION: Task Queue
// ============================================================================

/// Asynchronous work item.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "job", rename_all = "snake_case")]
pub enum Job {
    /// Recompute an entity's score from the committed ruleset.
    RecomputeScore(EntityRef),
    /// Create related-record indexes.
    CreateIndexes {
        /// Owning organization.
        organization_id: OrganizationId,
        /// Indexes to create.
        indexes: Vec<IndexSpec>,
    },
}

/// Task queue errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum QueueError {
    /// Queue rejected or could not accept the job.
    #[error("task queue error: {0}")]
    Unavailable(String),
}

/// Fire-and-forget job queue.
pub trait TaskQueue {
    /// Enqueues a job.
    ///
    /// # Errors
    ///
    /// Returns [`QueueError`] when the job cannot be enqueued.
    fn enqueue(&self, job: Job) -> Result<(), QueueError>;
}

// ============================================================================
// SECTION: Entity Data
// ============================================================================

/// Entity data errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum DataError {
    /// Entity does not exist.
    #[error("entity not found: {0}")]
    NotFound(String),
    /// Data source reported an error.
    #[error("entity data error: {0}")]
    Source(String),
}

/// Source of entity existence and evaluation data.
pub trait EntityDataSource {
    /// Returns whether the entity exists.
    ///
    /// # Errors
    ///
    /// Returns [`DataError`] when the source cannot be queried.
    fn entity_exists(&self, entity: &EntityRef) -> Result<bool, DataError>;

    /// Returns the evaluation environment of the entity.
    ///
    /// # Errors
    ///
    /// Returns [`DataError`] when the entity or its data is unavailable.
    fn environment_for(&self, entity: &EntityRef) -> Result<Box<dyn Environment + '_>, DataError>;
}

// ============================================================================
// SECTION: Authorization
// ============================================================================

/// Authorization errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum AuthorizationError {
    /// Actor may not perform the action.
    #[error("actor {actor} is not allowed to {action}")]
    Denied {
        /// Rejected actor.
        actor: ActorId,
        /// Attempted action.
        action: String,
    },
    /// Authorization backend failed.
    #[error("authorization check failed: {0}")]
    Failed(String),
}

/// Authorization check for manual score changes.
pub trait ScoreAuthorizer {
    /// Checks whether `actor` may override the score of `entity`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthorizationError`] when the actor is not allowed.
    fn authorize_override(&self, actor: &ActorId, entity: &EntityRef)
    -> Result<(), AuthorizationError>;
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Source of the current time.
pub trait Clock {
    /// Returns the current time.
    fn now(&self) -> OffsetDateTime;
}

/// Wall-clock time in UTC.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> OffsetDateTime {
        OffsetDateTime::now_utc()
    }
}
