// crates/risk-gate-core/src/core/ruleset.rs
// ============================================================================
// Module: Scoring Ruleset Model
// Description: Versioned scoring rulesets, their rules, and index requirements.
// Purpose: Hold the inputs of score computation and the versioning workflow.
// Dependencies: risk-logic, serde, thiserror
// ============================================================================

//! ## Overview
//! A [`ScoringRuleset`] belongs to one (organization, entity type) pair. At
//! most one draft and one committed ruleset exist per pair; the draft is
//! edited as a whole and committed once every related-record index it needs
//! is ready.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeSet;
use std::fmt;
use std::time::Duration;

use risk_logic::Function;
use risk_logic::Node;
use risk_logic::Value;
use risk_logic::args;
use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::identifiers::EntityType;
use crate::core::identifiers::OrganizationId;
use crate::core::identifiers::StableRuleId;

// ============================================================================
// SECTION: Status
// ============================================================================

/// Lifecycle status of a ruleset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RulesetStatus {
    /// Editable, not used for scoring.
    Draft,
    /// Immutable, used for scoring.
    Committed,
}

impl RulesetStatus {
    /// Returns a stable label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Draft => "draft",
            Self::Committed => "committed",
        }
    }
}

impl fmt::Display for RulesetStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

// ============================================================================
// SECTION: Rules And Rulesets
// ============================================================================

/// Scoring rule whose body is a `ScoreComputation` or `Switch` tree.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRule {
    /// Identifier preserved across versions.
    pub stable_id: StableRuleId,
    /// Display name.
    pub name: String,
    /// Free-form description.
    pub description: String,
    /// Rule body.
    pub ast: Node,
}

/// Versioned scoring ruleset.
///
/// # Invariants
/// - `version >= 1`.
/// - `thresholds` is strictly ascending.
/// - `stable_id` values are unique within `rules`.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoringRuleset {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Scored entity type.
    pub entity_type: EntityType,
    /// Version number.
    pub version: u32,
    /// Lifecycle status.
    pub status: RulesetStatus,
    /// Display name.
    pub name: String,
    /// Discretization cut points.
    pub thresholds: Vec<i64>,
    /// Minimum age before a score from this ruleset is considered stale.
    pub cooldown: Duration,
    /// Rules, evaluated in order.
    pub rules: Vec<ScoringRule>,
}

impl ScoringRuleset {
    /// Highest score this ruleset can produce from its thresholds.
    #[must_use]
    pub fn max_score(&self) -> i64 {
        i64::try_from(self.thresholds.len()).map_or(i64::MAX, |count| count.saturating_add(1))
    }

    /// Returns the rule with the given stable identifier.
    #[must_use]
    pub fn rule(&self, stable_id: &StableRuleId) -> Option<&ScoringRule> {
        self.rules.iter().find(|rule| &rule.stable_id == stable_id)
    }

    /// Collects the related-record indexes every rule relies on.
    #[must_use]
    pub fn required_indexes(&self) -> BTreeSet<IndexSpec> {
        let mut indexes = BTreeSet::new();
        for rule in &self.rules {
            collect_indexes(&rule.ast, &mut indexes);
        }
        indexes
    }
}

// ============================================================================
// SECTION: Thresholds
// ============================================================================

/// Upper bound on threshold count accepted anywhere.
pub const MAX_THRESHOLD_COUNT: usize = 1024;

/// Invalid discretization thresholds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ScoreThresholdError {
    /// More thresholds than allowed.
    #[error("too many thresholds: {count} (max {max})")]
    TooMany {
        /// Supplied count.
        count: usize,
        /// Allowed maximum.
        max: usize,
    },
    /// Two neighbours are equal or descending.
    #[error("thresholds must be strictly ascending: {previous} is followed by {next}")]
    NotAscending {
        /// Earlier threshold.
        previous: i64,
        /// Threshold that follows it.
        next: i64,
    },
}

/// Checks that `thresholds` holds at most `max` strictly ascending values.
///
/// # Errors
///
/// Returns [`ScoreThresholdError`] naming the first violation.
pub fn validate_thresholds(thresholds: &[i64], max: usize) -> Result<(), ScoreThresholdError> {
    if thresholds.len() > max {
        return Err(ScoreThresholdError::TooMany {
            count: thresholds.len(),
            max,
        });
    }
    match thresholds.windows(2).find(|pair| pair[0] >= pair[1]) {
        Some(pair) => Err(ScoreThresholdError::NotAscending {
            previous: pair[0],
            next: pair[1],
        }),
        None => Ok(()),
    }
}

// ============================================================================
// SECTION: Index Requirements
// ============================================================================

/// Index over a related table field.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct IndexSpec {
    /// Related table.
    pub table: String,
    /// Indexed field.
    pub field: String,
}

impl IndexSpec {
    /// Creates an index specification.
    #[must_use]
    pub fn new(table: impl Into<String>, field: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            field: field.into(),
        }
    }
}

impl fmt::Display for IndexSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.table, self.field)
    }
}

/// Readiness of a required index.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IndexState {
    /// Index exists and is usable.
    Ready,
    /// Creation has been requested and is in progress.
    Pending,
    /// Index does not exist and nobody asked for it.
    Missing,
}

/// Adds the indexes referenced by `DatabaseAccess` nodes of `root`.
///
/// Only literal table and field names are collected.
pub fn collect_indexes(root: &Node, indexes: &mut BTreeSet<IndexSpec>) {
    root.walk(&mut |node| {
        if node.function() != Function::DatabaseAccess {
            return;
        }
        let literal = |name: &str| {
            node.named(name)
                .and_then(Node::constant)
                .and_then(Value::as_str)
                .map(str::to_string)
        };
        if let (Some(table), Some(field)) = (literal(args::TABLE_NAME), literal(args::FIELD_NAME)) {
            indexes.insert(IndexSpec {
                table,
                field,
            });
        }
    });
}
