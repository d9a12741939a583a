// crates/risk-gate-core/src/core/identifiers.rs
// ============================================================================
// Module: Risk Gate Identifiers
// Description: Opaque identifiers for organizations, rules, entities, actors.
// Purpose: Keep identifier kinds from being mixed up at API boundaries.
// Dependencies: serde, uuid
// ============================================================================

//! ## Overview
//! Identifiers are opaque strings that serialize transparently. They carry
//! no validation; stores and services decide what a well-formed id is.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use uuid::Uuid;

// ============================================================================
// SECTION: Identifier Types
// ============================================================================

/// Declares a transparent string identifier.
macro_rules! string_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(String);

        impl $name {
            /// Creates the identifier from any string.
            #[must_use]
            pub fn new(id: impl Into<String>) -> Self {
                Self(id.into())
            }

            /// Returns the identifier as a string slice.
            #[must_use]
            pub fn as_str(&self) -> &str {
                &self.0
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                self.0.fmt(f)
            }
        }

        impl From<&str> for $name {
            fn from(value: &str) -> Self {
                Self::new(value)
            }
        }

        impl From<String> for $name {
            fn from(value: String) -> Self {
                Self::new(value)
            }
        }
    };
}

string_id!(
    /// Customer organization owning scenarios, rulesets, and scores.
    OrganizationId
);
string_id!(
    /// Kind of record a ruleset scores or a scenario triggers on.
    EntityType
);
string_id!(
    /// Identifier of a single scored entity within its type.
    EntityId
);
string_id!(
    /// Scenario identifier.
    ScenarioId
);
string_id!(
    /// Scenario iteration identifier.
    IterationId
);
string_id!(
    /// Scenario rule identifier.
    RuleId
);
string_id!(
    /// Scoring rule identifier that survives across ruleset versions.
    StableRuleId
);
string_id!(
    /// Human or service account performing an action.
    ActorId
);
string_id!(
    /// Persisted score record identifier.
    ScoreId
);

impl StableRuleId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

impl ScoreId {
    /// Generates a fresh random identifier.
    #[must_use]
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }
}

// ============================================================================
// SECTION: Entity Reference
// ============================================================================

/// Fully qualified reference to a scored entity.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EntityRef {
    /// Owning organization.
    pub organization_id: OrganizationId,
    /// Entity type.
    pub entity_type: EntityType,
    /// Entity identifier.
    pub entity_id: EntityId,
}

impl EntityRef {
    /// Creates an entity reference.
    #[must_use]
    pub fn new(
        organization_id: impl Into<OrganizationId>,
        entity_type: impl Into<EntityType>,
        entity_id: impl Into<EntityId>,
    ) -> Self {
        Self {
            organization_id: organization_id.into(),
            entity_type: entity_type.into(),
            entity_id: entity_id.into(),
        }
    }
}

impl fmt::Display for EntityRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}/{}", self.organization_id, self.entity_type, self.entity_id)
    }
}
