// crates/risk-gate-core/src/runtime/store.rs
// ============================================================================
// Module: Risk Gate In-Memory Backends
// Description: In-memory stores, queue, data source, and helpers.
// Purpose: Deterministic reference implementations for tests and local runs.
// Dependencies: crate::{core, interfaces}, risk-logic, time
// ============================================================================

//! ## Overview
//! Every interface in [`crate::interfaces`] has an in-memory counterpart
//! here. State lives behind `Arc<Mutex<..>>` so clones share it, which lets
//! tests keep a handle while an engine owns another. None of these are
//! intended for production use.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::sync::Arc;
use std::sync::Mutex;

use risk_logic::Environment;
use risk_logic::EnvironmentError;
use risk_logic::MapEnvironment;
use risk_logic::Value;
use time::OffsetDateTime;

use crate::core::ActorId;
use crate::core::EntityRef;
use crate::core::EntityType;
use crate::core::IndexSpec;
use crate::core::IndexState;
use crate::core::OrganizationId;
use crate::core::RulesetStatus;
use crate::core::ScoringRuleset;
use crate::core::ScoringScore;
use crate::interfaces::AuthorizationError;
use crate::interfaces::Clock;
use crate::interfaces::DataError;
use crate::interfaces::EntityDataSource;
use crate::interfaces::IndexCatalog;
use crate::interfaces::InputRecord;
use crate::interfaces::Job;
use crate::interfaces::QueueError;
use crate::interfaces::RulesetStore;
use crate::interfaces::ScoreAuthorizer;
use crate::interfaces::ScoreStore;
use crate::interfaces::StoreError;
use crate::interfaces::TaskQueue;

// ============================================================================
// SECTION: Scoring Store
// ============================================================================

/// Key of a ruleset slot.
type RulesetKey = (OrganizationId, EntityType);

/// Shared state of [`InMemoryScoringStore`].
#[derive(Debug, Default)]
struct ScoringState {
    /// Draft rulesets.
    drafts: BTreeMap<RulesetKey, ScoringRuleset>,
    /// Committed rulesets.
    committed: BTreeMap<RulesetKey, ScoringRuleset>,
    /// Score records per entity, oldest first.
    scores: BTreeMap<EntityRef, Vec<ScoringScore>>,
    /// Index states per organization.
    indexes: BTreeMap<(OrganizationId, IndexSpec), IndexState>,
}

/// In-memory ruleset store, score store, and index catalog.
#[derive(Debug, Default, Clone)]
pub struct InMemoryScoringStore {
    /// Store state protected by a mutex.
    state: Arc<Mutex<ScoringState>>,
}

impl InMemoryScoringStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, ScoringState>, StoreError> {
        self.state
            .lock()
            .map_err(|_| StoreError::Store("scoring store mutex poisoned".to_string()))
    }
}

impl RulesetStore for InMemoryScoringStore {
    fn committed_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<Option<ScoringRuleset>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.committed.get(&(organization_id.clone(), entity_type.clone())).cloned())
    }

    fn draft_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<Option<ScoringRuleset>, StoreError> {
        let guard = self.lock()?;
        Ok(guard.drafts.get(&(organization_id.clone(), entity_type.clone())).cloned())
    }

    fn list_rulesets(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ScoringRuleset>, StoreError> {
        let guard = self.lock()?;
        let mut rulesets: Vec<ScoringRuleset> = guard
            .drafts
            .iter()
            .chain(guard.committed.iter())
            .filter(|((org, _), _)| org == organization_id)
            .map(|(_, ruleset)| ruleset.clone())
            .collect();
        drop(guard);
        rulesets.sort_by(|a, b| {
            a.entity_type.cmp(&b.entity_type).then_with(|| a.status.cmp(&b.status))
        });
        Ok(rulesets)
    }

    fn replace_draft(&self, ruleset: &ScoringRuleset) -> Result<(), StoreError> {
        if ruleset.status != RulesetStatus::Draft {
            return Err(StoreError::Invalid("only draft rulesets can be replaced".to_string()));
        }
        let key = (ruleset.organization_id.clone(), ruleset.entity_type.clone());
        self.lock()?.drafts.insert(key, ruleset.clone());
        Ok(())
    }

    fn commit_draft(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<ScoringRuleset, StoreError> {
        let key = (organization_id.clone(), entity_type.clone());
        let mut guard = self.lock()?;
        let mut ruleset = guard.drafts.remove(&key).ok_or_else(|| {
            StoreError::Invalid(format!("no draft ruleset for {organization_id}/{entity_type}"))
        })?;
        ruleset.status = RulesetStatus::Committed;
        guard.committed.insert(key, ruleset.clone());
        drop(guard);
        Ok(ruleset)
    }
}

impl ScoreStore for InMemoryScoringStore {
    fn current_score(&self, entity: &EntityRef) -> Result<Option<ScoringScore>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .scores
            .get(entity)
            .and_then(|scores| scores.iter().rev().find(|score| score.is_current))
            .cloned())
    }

    fn score_history(&self, entity: &EntityRef) -> Result<Vec<ScoringScore>, StoreError> {
        let guard = self.lock()?;
        Ok(guard
            .scores
            .get(entity)
            .map(|scores| scores.iter().rev().cloned().collect())
            .unwrap_or_default())
    }

    fn insert_score(&self, score: ScoringScore) -> Result<ScoringScore, StoreError> {
        let mut stored = score;
        stored.is_current = true;
        let mut guard = self.lock()?;
        let history = guard.scores.entry(stored.entity.clone()).or_default();
        for previous in history.iter_mut() {
            previous.is_current = false;
        }
        history.push(stored.clone());
        drop(guard);
        Ok(stored)
    }
}

impl IndexCatalog for InMemoryScoringStore {
    fn index_states(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<Vec<IndexState>, StoreError> {
        let guard = self.lock()?;
        Ok(indexes
            .iter()
            .map(|index| {
                guard
                    .indexes
                    .get(&(organization_id.clone(), index.clone()))
                    .copied()
                    .unwrap_or(IndexState::Missing)
            })
            .collect())
    }

    fn mark_pending(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        for index in indexes {
            let state = guard
                .indexes
                .entry((organization_id.clone(), index.clone()))
                .or_insert(IndexState::Pending);
            if *state == IndexState::Missing {
                *state = IndexState::Pending;
            }
        }
        drop(guard);
        Ok(())
    }

    fn mark_ready(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError> {
        let mut guard = self.lock()?;
        for index in indexes {
            guard.indexes.insert((organization_id.clone(), index.clone()), IndexState::Ready);
        }
        drop(guard);
        Ok(())
    }
}

// ============================================================================
// SECTION: Task Queue
// ============================================================================

/// In-memory task queue that records every enqueued job.
#[derive(Debug, Default, Clone)]
pub struct InMemoryTaskQueue {
    /// Enqueued jobs, in order.
    jobs: Arc<Mutex<Vec<Job>>>,
    /// When set, every enqueue fails with this message.
    failure: Option<String>,
}

impl InMemoryTaskQueue {
    /// Creates an accepting queue.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a queue that rejects every job.
    #[must_use]
    pub fn failing(message: impl Into<String>) -> Self {
        Self {
            jobs: Arc::default(),
            failure: Some(message.into()),
        }
    }

    /// Returns the enqueued jobs.
    #[must_use]
    pub fn jobs(&self) -> Vec<Job> {
        self.jobs.lock().map(|jobs| jobs.clone()).unwrap_or_default()
    }

    /// Removes and returns the enqueued jobs.
    #[must_use]
    pub fn drain(&self) -> Vec<Job> {
        self.jobs.lock().map(|mut jobs| std::mem::take(&mut *jobs)).unwrap_or_default()
    }
}

impl TaskQueue for InMemoryTaskQueue {
    fn enqueue(&self, job: Job) -> Result<(), QueueError> {
        if let Some(message) = &self.failure {
            return Err(QueueError::Unavailable(message.clone()));
        }
        self.jobs
            .lock()
            .map_err(|_| QueueError::Unavailable("task queue mutex poisoned".to_string()))?
            .push(job);
        Ok(())
    }
}

// ============================================================================
// SECTION: Entity Data
// ============================================================================

/// Shared state of [`InMemoryEntityData`].
#[derive(Debug, Default)]
struct EntityDataState {
    /// Evaluation data per entity.
    entities: BTreeMap<EntityRef, MapEnvironment>,
    /// Number of environment lookups served.
    lookups: usize,
}

/// In-memory entity data source.
#[derive(Debug, Default, Clone)]
pub struct InMemoryEntityData {
    /// Data state protected by a mutex.
    state: Arc<Mutex<EntityDataState>>,
}

impl InMemoryEntityData {
    /// Creates an empty data source.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers or replaces an entity's data.
    ///
    /// # Errors
    ///
    /// Returns [`DataError::Source`] when the state lock is poisoned.
    pub fn insert(&self, entity: EntityRef, env: MapEnvironment) -> Result<(), DataError> {
        self.lock()?.entities.insert(entity, env);
        Ok(())
    }

    /// Returns how many evaluation environments have been handed out.
    #[must_use]
    pub fn lookups(&self) -> usize {
        self.state.lock().map(|state| state.lookups).unwrap_or_default()
    }

    /// Locks the shared state.
    fn lock(&self) -> Result<std::sync::MutexGuard<'_, EntityDataState>, DataError> {
        self.state
            .lock()
            .map_err(|_| DataError::Source("entity data mutex poisoned".to_string()))
    }
}

impl EntityDataSource for InMemoryEntityData {
    fn entity_exists(&self, entity: &EntityRef) -> Result<bool, DataError> {
        Ok(self.lock()?.entities.contains_key(entity))
    }

    fn environment_for(&self, entity: &EntityRef) -> Result<Box<dyn Environment + '_>, DataError> {
        let mut guard = self.lock()?;
        let env = guard
            .entities
            .get(entity)
            .cloned()
            .ok_or_else(|| DataError::NotFound(entity.to_string()))?;
        guard.lookups = guard.lookups.saturating_add(1);
        drop(guard);
        Ok(Box::new(env))
    }
}

// ============================================================================
// SECTION: Authorization
// ============================================================================

/// Authorizer with a fixed set of actors allowed to override scores.
#[derive(Debug, Default, Clone)]
pub struct StaticAuthorizer {
    /// Allowed actors.
    allowed: BTreeSet<ActorId>,
}

impl StaticAuthorizer {
    /// Allows the given actors.
    #[must_use]
    pub fn allowing(actors: impl IntoIterator<Item = ActorId>) -> Self {
        Self {
            allowed: actors.into_iter().collect(),
        }
    }
}

impl ScoreAuthorizer for StaticAuthorizer {
    fn authorize_override(
        &self,
        actor: &ActorId,
        _entity: &EntityRef,
    ) -> Result<(), AuthorizationError> {
        if self.allowed.contains(actor) {
            Ok(())
        } else {
            Err(AuthorizationError::Denied {
                actor: actor.clone(),
                action: "override score".to_string(),
            })
        }
    }
}

// ============================================================================
// SECTION: Clock
// ============================================================================

/// Settable clock for deterministic tests.
#[derive(Debug, Clone)]
pub struct FixedClock {
    /// Current time.
    now: Arc<Mutex<OffsetDateTime>>,
}

impl FixedClock {
    /// Creates a clock frozen at `now`.
    #[must_use]
    pub fn new(now: OffsetDateTime) -> Self {
        Self {
            now: Arc::new(Mutex::new(now)),
        }
    }

    /// Moves the clock to `now`.
    pub fn set(&self, now: OffsetDateTime) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = now;
        }
    }

    /// Moves the clock forward.
    pub fn advance(&self, by: time::Duration) {
        if let Ok(mut guard) = self.now.lock() {
            *guard = guard.saturating_add(by);
        }
    }
}

impl Clock for FixedClock {
    fn now(&self) -> OffsetDateTime {
        self.now.lock().map_or(OffsetDateTime::UNIX_EPOCH, |guard| *guard)
    }
}

// ============================================================================
// SECTION: Input Records
// ============================================================================

/// Typed in-memory record for scenario evaluation.
#[derive(Debug, Clone)]
pub struct RecordEnvironment {
    /// Record object type.
    object_type: EntityType,
    /// Record data.
    env: MapEnvironment,
}

impl RecordEnvironment {
    /// Wraps record data with its object type.
    #[must_use]
    pub const fn new(object_type: EntityType, env: MapEnvironment) -> Self {
        Self {
            object_type,
            env,
        }
    }
}

impl Environment for RecordEnvironment {
    fn payload_field(&self, name: &str) -> Result<Value, EnvironmentError> {
        self.env.payload_field(name)
    }

    fn list_values(&self, list_id: &str) -> Result<Vec<Value>, EnvironmentError> {
        self.env.list_values(list_id)
    }

    fn related_field(
        &self,
        table: &str,
        field: &str,
        path: &[String],
    ) -> Result<Value, EnvironmentError> {
        self.env.related_field(table, field, path)
    }

    fn variable(&self, name: &str) -> Result<Value, EnvironmentError> {
        self.env.variable(name)
    }
}

impl InputRecord for RecordEnvironment {
    fn object_type(&self) -> &EntityType {
        &self.object_type
    }
}
