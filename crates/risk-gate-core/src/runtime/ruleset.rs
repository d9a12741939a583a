// crates/risk-gate-core/src/runtime/ruleset.rs
// ============================================================================
// Module: Ruleset Versioning Workflow
// Description: Draft creation, index preparation, and commit of rulesets.
// Purpose: Move scoring rulesets from draft to committed safely.
// Dependencies: crate::{core, interfaces, runtime::scoring}, thiserror, tracing
// ============================================================================

//! ## Overview
//! A ruleset goes through three steps:
//! - [`RulesetService::create_ruleset_version`] validates a full rule list and
//!   replaces the draft in one store call. Rules that omit their body carry
//!   the committed body forward by stable id.
//! - [`RulesetService::prepare_ruleset`] requests creation of every missing
//!   related-record index and reports whether the draft is ready.
//! - [`RulesetService::commit_ruleset`] flips a ready draft to committed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::time::Duration;

use risk_logic::Node;
use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::core::EntityType;
use crate::core::IndexSpec;
use crate::core::IndexState;
use crate::core::MAX_THRESHOLD_COUNT;
use crate::core::OrganizationId;
use crate::core::RulesetStatus;
use crate::core::ScoringRule;
use crate::core::ScoringRuleset;
use crate::core::StableRuleId;
use crate::core::validate_thresholds;
use crate::interfaces::IndexCatalog;
use crate::interfaces::Job;
use crate::interfaces::QueueError;
use crate::interfaces::RulesetStore;
use crate::interfaces::StoreError;
use crate::interfaces::TaskQueue;
use crate::runtime::scoring::validate_rule_shape;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Ruleset workflow errors.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RulesetError {
    /// Request is invalid.
    #[error("bad parameter: {0}")]
    BadParameter(String),
    /// No draft exists for the pair.
    #[error("no draft ruleset for {organization_id}/{entity_type}")]
    NoDraft {
        /// Organization.
        organization_id: OrganizationId,
        /// Entity type.
        entity_type: EntityType,
    },
    /// Required indexes are missing or still being created.
    #[error("ruleset is not ready: {} index(es) not ready", pending.len())]
    UnprocessableEntity {
        /// Indexes that are not ready.
        pending: Vec<IndexSpec>,
    },
    /// Store failure.
    #[error(transparent)]
    Store(#[from] StoreError),
    /// Queue failure.
    #[error(transparent)]
    Queue(#[from] QueueError),
}

// ============================================================================
// SECTION: Requests And Reports
// ============================================================================

/// Rule entry of a new ruleset version.
#[derive(Debug, Clone, PartialEq)]
pub struct RuleDraft {
    /// Existing stable id; a fresh one is generated when absent.
    pub stable_id: Option<StableRuleId>,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Rule body; when absent the committed body with the same stable id is reused.
    pub ast: Option<Node>,
}

/// Request to create a new draft version.
#[derive(Debug, Clone, PartialEq)]
pub struct CreateRulesetRequest {
    /// Organization.
    pub organization_id: OrganizationId,
    /// Scored entity type.
    pub entity_type: EntityType,
    /// Display name.
    pub name: String,
    /// Discretization cut points, strictly ascending.
    pub thresholds: Vec<i64>,
    /// Staleness cooldown of scores computed from this ruleset.
    pub cooldown: Duration,
    /// Complete rule list of the new version.
    pub rules: Vec<RuleDraft>,
}

/// Result of a successful preparation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PreparationReport {
    /// Organization.
    pub organization_id: OrganizationId,
    /// Entity type.
    pub entity_type: EntityType,
    /// Draft version.
    pub version: u32,
    /// Required indexes, all ready.
    pub indexes: Vec<IndexSpec>,
}

/// Workflow limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RulesetServiceConfig {
    /// Maximum number of thresholds per ruleset.
    pub max_thresholds: usize,
}

impl Default for RulesetServiceConfig {
    fn default() -> Self {
        Self {
            max_thresholds: 32,
        }
    }
}

// ============================================================================
// SECTION: Ruleset Service
// ============================================================================

/// Draft / prepare / commit workflow over a ruleset store.
pub struct RulesetService<S, C, Q> {
    /// Ruleset persistence.
    store: S,
    /// Index catalog.
    catalog: C,
    /// Job queue for index creation.
    queue: Q,
    /// Workflow limits.
    config: RulesetServiceConfig,
}

impl<S, C, Q> RulesetService<S, C, Q>
where
    S: RulesetStore,
    C: IndexCatalog,
    Q: TaskQueue,
{
    /// Creates a ruleset service.
    #[must_use]
    pub const fn new(store: S, catalog: C, queue: Q, config: RulesetServiceConfig) -> Self {
        Self {
            store,
            catalog,
            queue,
            config,
        }
    }

    /// Validates a request and replaces the draft with it.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetError::BadParameter`] for invalid thresholds, rule
    /// shapes, duplicate ids, or body-less rules without a committed
    /// counterpart.
    pub fn create_ruleset_version(
        &self,
        request: CreateRulesetRequest,
    ) -> Result<ScoringRuleset, RulesetError> {
        self.validate_thresholds(&request.thresholds)?;
        let committed =
            self.store.committed_ruleset(&request.organization_id, &request.entity_type)?;
        let version = match &committed {
            Some(ruleset) => ruleset.version.checked_add(1).ok_or_else(|| {
                RulesetError::BadParameter("ruleset version space exhausted".to_string())
            })?,
            None => 1,
        };

        let mut seen = BTreeSet::new();
        let mut rules = Vec::with_capacity(request.rules.len());
        for draft in request.rules {
            let rule = resolve_rule(draft, committed.as_ref())?;
            if !seen.insert(rule.stable_id.clone()) {
                return Err(RulesetError::BadParameter(format!(
                    "duplicate rule stable id {}",
                    rule.stable_id
                )));
            }
            rules.push(rule);
        }

        let ruleset = ScoringRuleset {
            organization_id: request.organization_id,
            entity_type: request.entity_type,
            version,
            status: RulesetStatus::Draft,
            name: request.name,
            thresholds: request.thresholds,
            cooldown: request.cooldown,
            rules,
        };
        self.store.replace_draft(&ruleset)?;
        info!(
            organization_id = %ruleset.organization_id,
            entity_type = %ruleset.entity_type,
            version = ruleset.version,
            rules = ruleset.rules.len(),
            "ruleset draft replaced"
        );
        Ok(ruleset)
    }

    /// Requests missing indexes and reports whether the draft can be committed.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetError::NoDraft`] without a draft and
    /// [`RulesetError::UnprocessableEntity`] while indexes are not ready.
    pub fn prepare_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<PreparationReport, RulesetError> {
        let draft = self.require_draft(organization_id, entity_type)?;
        let (required, not_ready) = self.index_readiness(organization_id, &draft)?;
        let missing: Vec<IndexSpec> = not_ready
            .iter()
            .filter(|(_, state)| *state == IndexState::Missing)
            .map(|(index, _)| index.clone())
            .collect();
        if !missing.is_empty() {
            // A pending index must always have a queued job behind it.
            self.queue.enqueue(Job::CreateIndexes {
                organization_id: organization_id.clone(),
                indexes: missing.clone(),
            })?;
            self.catalog.mark_pending(organization_id, &missing)?;
            info!(
                %organization_id,
                %entity_type,
                count = missing.len(),
                "index creation requested"
            );
        }
        if !not_ready.is_empty() {
            return Err(RulesetError::UnprocessableEntity {
                pending: not_ready.into_iter().map(|(index, _)| index).collect(),
            });
        }
        Ok(PreparationReport {
            organization_id: organization_id.clone(),
            entity_type: entity_type.clone(),
            version: draft.version,
            indexes: required,
        })
    }

    /// Commits a ready draft, replacing the committed ruleset.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetError::NoDraft`] without a draft and
    /// [`RulesetError::UnprocessableEntity`] while indexes are not ready.
    pub fn commit_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<ScoringRuleset, RulesetError> {
        let draft = self.require_draft(organization_id, entity_type)?;
        let (_, not_ready) = self.index_readiness(organization_id, &draft)?;
        if !not_ready.is_empty() {
            return Err(RulesetError::UnprocessableEntity {
                pending: not_ready.into_iter().map(|(index, _)| index).collect(),
            });
        }
        let committed = self.store.commit_draft(organization_id, entity_type)?;
        info!(
            %organization_id,
            %entity_type,
            version = committed.version,
            "ruleset committed"
        );
        Ok(committed)
    }

    /// Loads the ruleset with the given status.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetError::Store`] when loading fails.
    pub fn get_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
        status: RulesetStatus,
    ) -> Result<Option<ScoringRuleset>, RulesetError> {
        let ruleset = match status {
            RulesetStatus::Draft => self.store.draft_ruleset(organization_id, entity_type)?,
            RulesetStatus::Committed => self.store.committed_ruleset(organization_id, entity_type)?,
        };
        Ok(ruleset)
    }

    /// Lists every ruleset of an organization.
    ///
    /// # Errors
    ///
    /// Returns [`RulesetError::Store`] when loading fails.
    pub fn list_rulesets(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ScoringRuleset>, RulesetError> {
        Ok(self.store.list_rulesets(organization_id)?)
    }

    /// Loads the draft or fails with [`RulesetError::NoDraft`].
    fn require_draft(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<ScoringRuleset, RulesetError> {
        self.store.draft_ruleset(organization_id, entity_type)?.ok_or_else(|| {
            RulesetError::NoDraft {
                organization_id: organization_id.clone(),
                entity_type: entity_type.clone(),
            }
        })
    }

    /// Returns the required indexes and those that are not ready.
    fn index_readiness(
        &self,
        organization_id: &OrganizationId,
        ruleset: &ScoringRuleset,
    ) -> Result<(Vec<IndexSpec>, Vec<(IndexSpec, IndexState)>), RulesetError> {
        let required: Vec<IndexSpec> = ruleset.required_indexes().into_iter().collect();
        if required.is_empty() {
            return Ok((required, Vec::new()));
        }
        let states = self.catalog.index_states(organization_id, &required)?;
        if states.len() != required.len() {
            return Err(RulesetError::Store(StoreError::Invalid(format!(
                "index catalog returned {} states for {} indexes",
                states.len(),
                required.len()
            ))));
        }
        let not_ready = required
            .iter()
            .cloned()
            .zip(states)
            .filter(|(_, state)| *state != IndexState::Ready)
            .collect();
        Ok((required, not_ready))
    }

    /// Rejects threshold lists that are too long or not strictly ascending.
    fn validate_thresholds(&self, thresholds: &[i64]) -> Result<(), RulesetError> {
        let max = self.config.max_thresholds.min(MAX_THRESHOLD_COUNT);
        validate_thresholds(thresholds, max)
            .map_err(|err| RulesetError::BadParameter(err.to_string()))
    }
}

/// Resolves a rule draft into a validated rule.
fn resolve_rule(
    draft: RuleDraft,
    committed: Option<&ScoringRuleset>,
) -> Result<ScoringRule, RulesetError> {
    let (stable_id, ast) = match (draft.stable_id, draft.ast) {
        (Some(stable_id), Some(ast)) => (stable_id, ast),
        (None, Some(ast)) => (StableRuleId::generate(), ast),
        (Some(stable_id), None) => {
            let ast = committed
                .and_then(|ruleset| ruleset.rule(&stable_id))
                .map(|rule| rule.ast.clone())
                .ok_or_else(|| {
                    RulesetError::BadParameter(format!(
                        "rule {stable_id} has no body and no committed rule to copy from"
                    ))
                })?;
            (stable_id, ast)
        }
        (None, None) => {
            return Err(RulesetError::BadParameter(format!(
                "rule `{}` needs a body or a stable id",
                draft.name
            )));
        }
    };
    validate_rule_shape(&ast)
        .map_err(|err| RulesetError::BadParameter(format!("rule {stable_id}: {err}")))?;
    Ok(ScoringRule {
        stable_id,
        name: draft.name,
        description: draft.description,
        ast,
    })
}
