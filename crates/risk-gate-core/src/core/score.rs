// crates/risk-gate-core/src/core/score.rs
// ============================================================================
// Module: Score Records
// Description: Persisted scores and ephemeral scoring evaluations.
// Purpose: Shared record types for the scoring engine, manager, and stores.
// Dependencies: risk-logic, serde, time
// ============================================================================

//! ## Overview
//! [`ScoringScore`] rows are append-only: inserting a new score for an
//! entity clears `is_current` on the previous row. [`ScoringEvaluation`] is
//! the in-memory result of running a ruleset and is never persisted as-is.

// ============================================================================
// SECTION: Imports
// ============================================================================

use risk_logic::NodeEvaluation;
use risk_logic::ScoreComputationResult;
use serde::Deserialize;
use serde::Serialize;
use time::OffsetDateTime;

use crate::core::identifiers::ActorId;
use crate::core::identifiers::EntityRef;
use crate::core::identifiers::ScoreId;
use crate::core::identifiers::StableRuleId;

// ============================================================================
// SECTION: Persisted Scores
// ============================================================================

/// Origin of a score record.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ScoreSource {
    /// Computed from the committed ruleset.
    Ruleset,
    /// Set manually by an actor.
    Override,
}

impl ScoreSource {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Ruleset => "ruleset",
            Self::Override => "override",
        }
    }
}

/// Persisted score of an entity.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScoringScore {
    /// Record identifier.
    pub score_id: ScoreId,
    /// Scored entity.
    pub entity: EntityRef,
    /// Discrete score.
    pub score: i64,
    /// Origin of the score.
    pub source: ScoreSource,
    /// Ruleset version that produced the score.
    pub ruleset_version: Option<u32>,
    /// Actor that set an override.
    pub overridden_by: Option<ActorId>,
    /// Explicit staleness deadline.
    #[serde(with = "time::serde::rfc3339::option")]
    pub stale_at: Option<OffsetDateTime>,
    /// Creation time.
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
    /// Whether this is the entity's current score.
    pub is_current: bool,
}

// ============================================================================
// SECTION: Scoring Evaluation
// ============================================================================

/// Result of one rule during a ruleset execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RuleScoringEvaluation {
    /// Rule identifier.
    pub stable_id: StableRuleId,
    /// Rule name.
    pub name: String,
    /// Rule contribution.
    pub result: ScoreComputationResult,
    /// Full node evaluation for audit.
    pub evaluation: NodeEvaluation,
}

/// Aggregate result of a ruleset execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoringEvaluation {
    /// Sum of triggered modifiers.
    pub modifier: i64,
    /// Highest triggered floor (0 when none).
    pub floor: i64,
    /// Final discrete score.
    pub score: i64,
    /// Per-rule results, in rule order.
    pub rules: Vec<RuleScoringEvaluation>,
}
