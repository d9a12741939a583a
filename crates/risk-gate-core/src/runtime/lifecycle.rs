// crates/risk-gate-core/src/runtime/lifecycle.rs
// ============================================================================
// Module: Score Lifecycle Manager
// Description: Current score lookup, staleness, refresh, and overrides.
// Purpose: Serve an entity's score while keeping it reasonably fresh.
// Dependencies: crate::{core, interfaces, runtime::scoring}, thiserror, time, tracing
// ============================================================================

//! ## Overview
//! [`ScoreManager::get_active_score`] serves the current score of an entity:
//! - no current score: compute synchronously, persist, surface errors;
//! - fresh score: return it without touching the store, data, or queue;
//! - stale score with background refresh: enqueue one recompute job and
//!   return the stale score;
//! - stale score with synchronous refresh: recompute and return the new
//!   score, or log and fall back to the stale one when recomputation fails.
//!
//! A score with an explicit `stale_at` deadline is stale once the deadline
//! is reached. Otherwise it is stale when older than the refresh window.
//! Overrides without a deadline never go stale.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::time::Duration;

use thiserror::Error;
use time::OffsetDateTime;
use tracing::debug;
use tracing::info;
use tracing::warn;

use crate::core::ActorId;
use crate::core::EntityRef;
use crate::core::EntityType;
use crate::core::OrganizationId;
use crate::core::ScoreId;
use crate::core::ScoreSource;
use crate::core::ScoringRuleset;
use crate::core::ScoringScore;
use crate::interfaces::AuthorizationError;
use crate::interfaces::Clock;
use crate::interfaces::DataError;
use crate::interfaces::EntityDataSource;
use crate::interfaces::Job;
use crate::interfaces::QueueError;
use crate::interfaces::RulesetStore;
use crate::interfaces::ScoreAuthorizer;
use crate::interfaces::ScoreStore;
use crate::interfaces::StoreError;
use crate::interfaces::TaskQueue;
use crate::runtime::scoring::ScoringEngine;
use crate::runtime::scoring::ScoringError;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Score lifecycle errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreError {
    /// No committed ruleset exists for the entity type.
    #[error("no committed ruleset for {organization_id}/{entity_type}")]
    NoCommittedRuleset {
        /// Organization.
        organization_id: OrganizationId,
        /// Entity type.
        entity_type: EntityType,
    },
    /// Entity does not exist.
    #[error("entity {0} not found")]
    NotFound(EntityRef),
    /// Actor may not change the score.
    #[error("forbidden: {0}")]
    Forbidden(AuthorizationError),
    /// Request is invalid.
    #[error("bad parameter: {0}")]
    BadParameter(String),
    /// Ruleset execution failed.
    #[error(transparent)]
    Scoring(#[from] ScoringError),
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Queue failure.
    #[error(transparent)]
    Queue(#[from] QueueError),
    /// Entity data failure.
    #[error(transparent)]
    Data(DataError),
}

// ============================================================================
// SECTION: Configuration
// ============================================================================

/// Manager-wide refresh defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ScoreManagerConfig {
    /// Refresh window used when neither the request nor the ruleset sets one.
    pub default_refresh: Duration,
    /// Whether background refresh requests are honored; when `false` every
    /// stale score is refreshed synchronously.
    pub background_refresh: bool,
}

impl Default for ScoreManagerConfig {
    fn default() -> Self {
        Self {
            default_refresh: Duration::from_secs(3600),
            background_refresh: true,
        }
    }
}

/// Per-request refresh policy.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RefreshPolicy {
    /// Maximum score age; falls back to the ruleset cooldown, then the manager default.
    pub refresh_older_than: Option<Duration>,
    /// Refresh stale scores through the task queue instead of inline.
    pub background: bool,
}

impl RefreshPolicy {
    /// Refreshes stale scores inline.
    #[must_use]
    pub const fn synchronous() -> Self {
        Self {
            refresh_older_than: None,
            background: false,
        }
    }

    /// Refreshes stale scores through the task queue.
    #[must_use]
    pub const fn background() -> Self {
        Self {
            refresh_older_than: None,
            background: true,
        }
    }

    /// Sets the maximum score age.
    #[must_use]
    pub const fn older_than(mut self, window: Duration) -> Self {
        self.refresh_older_than = Some(window);
        self
    }
}

impl Default for RefreshPolicy {
    fn default() -> Self {
        Self::background()
    }
}

// ============================================================================
// SECTION: Score Manager
// ============================================================================

/// Serves, refreshes, and overrides entity scores.
pub struct ScoreManager<S, Q, D, A, C> {
    /// Ruleset and score persistence.
    store: S,
    /// Queue for background recomputation.
    queue: Q,
    /// Entity existence and evaluation data.
    data: D,
    /// Override authorization.
    authorizer: A,
    /// Time source.
    clock: C,
    /// Ruleset executor.
    engine: ScoringEngine,
    /// Refresh defaults.
    config: ScoreManagerConfig,
}

impl<S, Q, D, A, C> ScoreManager<S, Q, D, A, C>
where
    S: RulesetStore + ScoreStore,
    Q: TaskQueue,
    D: EntityDataSource,
    A: ScoreAuthorizer,
    C: Clock,
{
    /// Creates a score manager.
    #[must_use]
    pub const fn new(
        store: S,
        queue: Q,
        data: D,
        authorizer: A,
        clock: C,
        engine: ScoringEngine,
        config: ScoreManagerConfig,
    ) -> Self {
        Self {
            store,
            queue,
            data,
            authorizer,
            clock,
            engine,
            config,
        }
    }

    /// Returns the underlying store.
    #[must_use]
    pub const fn store(&self) -> &S {
        &self.store
    }

    /// Returns the entity's current score, refreshing it when stale.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError`] when there is no current score and computing
    /// one fails, or when the stale score cannot be refreshed in the
    /// background. Synchronous refresh failures fall back to the stale score.
    pub fn get_active_score(
        &self,
        entity: &EntityRef,
        policy: RefreshPolicy,
    ) -> Result<ScoringScore, ScoreError> {
        let Some(current) = self.store.current_score(entity)? else {
            return self.compute_score(entity);
        };
        let now = self.clock.now();
        if !self.is_stale(&current, policy, now)? {
            return Ok(current);
        }
        if policy.background && self.config.background_refresh {
            self.queue.enqueue(Job::RecomputeScore(entity.clone()))?;
            debug!(%entity, "score refresh enqueued");
            return Ok(current);
        }
        match self.compute_score(entity) {
            Ok(fresh) => Ok(fresh),
            Err(err) => {
                warn!(%entity, error = %err, "score refresh failed; serving stale score");
                Ok(current)
            }
        }
    }

    /// Recomputes and persists the entity's score from the committed ruleset.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError`] when there is no committed ruleset, the entity
    /// is unknown, or evaluation or persistence fails.
    pub fn refresh_score(&self, entity: &EntityRef) -> Result<ScoringScore, ScoreError> {
        self.compute_score(entity)
    }

    /// Manually sets the entity's score.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::Forbidden`], [`ScoreError::NotFound`],
    /// [`ScoreError::NoCommittedRuleset`], or [`ScoreError::BadParameter`]
    /// before anything is written.
    pub fn override_score(
        &self,
        actor: &ActorId,
        entity: &EntityRef,
        score: i64,
        stale_at: Option<OffsetDateTime>,
    ) -> Result<ScoringScore, ScoreError> {
        self.authorizer.authorize_override(actor, entity).map_err(ScoreError::Forbidden)?;
        if !self.data.entity_exists(entity).map_err(ScoreError::Data)? {
            return Err(ScoreError::NotFound(entity.clone()));
        }
        let ruleset = self.committed_ruleset(entity)?;
        let max_score = ruleset.max_score();
        if !(1 ..= max_score).contains(&score) {
            return Err(ScoreError::BadParameter(format!(
                "score {score} is outside 1..={max_score}"
            )));
        }
        let stored = self.store.insert_score(ScoringScore {
            score_id: ScoreId::generate(),
            entity: entity.clone(),
            score,
            source: ScoreSource::Override,
            ruleset_version: Some(ruleset.version),
            overridden_by: Some(actor.clone()),
            stale_at,
            created_at: self.clock.now(),
            is_current: true,
        })?;
        info!(%entity, %actor, score, "score overridden");
        Ok(stored)
    }

    /// Returns every score of the entity, newest first.
    ///
    /// # Errors
    ///
    /// Returns [`ScoreError::Store`] when loading fails.
    pub fn score_history(&self, entity: &EntityRef) -> Result<Vec<ScoringScore>, ScoreError> {
        Ok(self.store.score_history(entity)?)
    }

    /// Evaluates the committed ruleset and persists the resulting score.
    fn compute_score(&self, entity: &EntityRef) -> Result<ScoringScore, ScoreError> {
        let ruleset = self.committed_ruleset(entity)?;
        let env = self.data.environment_for(entity).map_err(|err| match err {
            DataError::NotFound(_) => ScoreError::NotFound(entity.clone()),
            DataError::Source(_) => ScoreError::Data(err),
        })?;
        let evaluation = self.engine.execute(&ruleset, env.as_ref())?;
        let stored = self.store.insert_score(ScoringScore {
            score_id: ScoreId::generate(),
            entity: entity.clone(),
            score: evaluation.score,
            source: ScoreSource::Ruleset,
            ruleset_version: Some(ruleset.version),
            overridden_by: None,
            stale_at: None,
            created_at: self.clock.now(),
            is_current: true,
        })?;
        debug!(%entity, score = stored.score, version = ruleset.version, "score computed");
        Ok(stored)
    }

    /// Loads the committed ruleset of the entity's type.
    fn committed_ruleset(&self, entity: &EntityRef) -> Result<ScoringRuleset, ScoreError> {
        self.store.committed_ruleset(&entity.organization_id, &entity.entity_type)?.ok_or_else(
            || ScoreError::NoCommittedRuleset {
                organization_id: entity.organization_id.clone(),
                entity_type: entity.entity_type.clone(),
            },
        )
    }

    /// Decides whether `score` needs a refresh at `now`.
    fn is_stale(
        &self,
        score: &ScoringScore,
        policy: RefreshPolicy,
        now: OffsetDateTime,
    ) -> Result<bool, ScoreError> {
        if let Some(deadline) = score.stale_at {
            return Ok(now >= deadline);
        }
        if score.source == ScoreSource::Override {
            return Ok(false);
        }
        let window = match policy.refresh_older_than {
            Some(window) => window,
            None => self.ruleset_window(&score.entity)?,
        };
        let age = now - score.created_at;
        Ok(time::Duration::try_from(window).is_ok_and(|limit| age > limit))
    }

    /// Returns the committed ruleset cooldown, or the manager default when
    /// the ruleset is missing or sets none.
    fn ruleset_window(&self, entity: &EntityRef) -> Result<Duration, ScoreError> {
        let cooldown = self
            .store
            .committed_ruleset(&entity.organization_id, &entity.entity_type)?
            .map(|ruleset| ruleset.cooldown)
            .filter(|cooldown| !cooldown.is_zero());
        Ok(cooldown.unwrap_or(self.config.default_refresh))
    }
}
