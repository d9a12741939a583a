// crates/risk-logic/src/value.rs
// ============================================================================
// Module: Typed Values
// Description: Closed value union shared by literals and evaluation results.
// Purpose: Keep comparisons and arithmetic statically checkable.
// Dependencies: serde, serde_json, time
// ============================================================================

//! ## Overview
//! Every literal carried by a `Constant` node and every value produced by the
//! evaluator is a [`Value`]. The set is closed: there is no untyped storage.
//! Values serialize adjacently tagged so a literal keeps its type across a
//! wire round trip (a timestamp never degrades into a string).

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;
use time::OffsetDateTime;

// ============================================================================
// SECTION: Score Computation Result
// ============================================================================

/// Result produced by a `ScoreComputation` (or `Switch`) node.
///
/// # Invariants
/// - When `triggered` is false, `modifier` and `floor` are zero.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct ScoreComputationResult {
    /// Whether the rule condition held.
    pub triggered: bool,
    /// Signed contribution toward the aggregate modifier.
    pub modifier: i64,
    /// Minimum final score forced by this rule.
    pub floor: i64,
}

impl ScoreComputationResult {
    /// Result for a rule whose condition did not hold.
    pub const NOT_TRIGGERED: Self = Self {
        triggered: false,
        modifier: 0,
        floor: 0,
    };

    /// Creates a triggered result.
    #[must_use]
    pub const fn triggered(modifier: i64, floor: i64) -> Self {
        Self {
            triggered: true,
            modifier,
            floor,
        }
    }
}

// ============================================================================
// SECTION: Value
// ============================================================================

/// Closed union of literal and return types.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum Value {
    /// Absence of a value (e.g. a payload field that was not sent).
    Null,
    /// Boolean value.
    Bool(bool),
    /// Signed 64-bit integer.
    Int(i64),
    /// 64-bit float.
    Float(f64),
    /// UTF-8 string.
    String(String),
    /// Point in time, serialized as RFC 3339.
    #[serde(with = "time::serde::rfc3339")]
    Timestamp(OffsetDateTime),
    /// Ordered list of values.
    List(Vec<Self>),
    /// Composite result of a score computation.
    Score(ScoreComputationResult),
}

impl Value {
    /// Returns the kind tag of this value.
    #[must_use]
    pub const fn kind(&self) -> ValueKind {
        match self {
            Self::Null => ValueKind::Null,
            Self::Bool(_) => ValueKind::Bool,
            Self::Int(_) => ValueKind::Int,
            Self::Float(_) => ValueKind::Float,
            Self::String(_) => ValueKind::String,
            Self::Timestamp(_) => ValueKind::Timestamp,
            Self::List(_) => ValueKind::List,
            Self::Score(_) => ValueKind::Score,
        }
    }

    /// Returns the boolean payload, if any.
    #[must_use]
    pub const fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Bool(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the integer payload, if any.
    #[must_use]
    pub const fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns the string payload, if any.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Returns the score computation payload, if any.
    #[must_use]
    pub const fn as_score(&self) -> Option<ScoreComputationResult> {
        match self {
            Self::Score(value) => Some(*value),
            _ => None,
        }
    }

    /// Returns true for [`Value::Null`].
    #[must_use]
    pub const fn is_null(&self) -> bool {
        matches!(self, Self::Null)
    }

    /// Builds a list of strings.
    #[must_use]
    pub fn string_list<I, S>(items: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::List(items.into_iter().map(|item| Self::String(item.into())).collect())
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

impl From<i64> for Value {
    fn from(value: i64) -> Self {
        Self::Int(value)
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<OffsetDateTime> for Value {
    fn from(value: OffsetDateTime) -> Self {
        Self::Timestamp(value)
    }
}

// ============================================================================
// SECTION: JSON Conversion
// ============================================================================

/// Errors raised when converting untyped JSON into a [`Value`].
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ValueConversionError {
    /// JSON objects have no counterpart in the closed value set.
    #[error("json objects cannot be converted into a value")]
    ObjectUnsupported,
    /// Number could not be represented as i64 or f64.
    #[error("json number {0} is out of range")]
    NumberOutOfRange(String),
}

impl TryFrom<serde_json::Value> for Value {
    type Error = ValueConversionError;

    fn try_from(json: serde_json::Value) -> Result<Self, Self::Error> {
        match json {
            serde_json::Value::Null => Ok(Self::Null),
            serde_json::Value::Bool(value) => Ok(Self::Bool(value)),
            serde_json::Value::Number(number) => {
                if let Some(value) = number.as_i64() {
                    Ok(Self::Int(value))
                } else if let Some(value) = number.as_f64() {
                    Ok(Self::Float(value))
                } else {
                    Err(ValueConversionError::NumberOutOfRange(number.to_string()))
                }
            }
            serde_json::Value::String(value) => Ok(Self::String(value)),
            serde_json::Value::Array(items) => {
                items.into_iter().map(Self::try_from).collect::<Result<Vec<_>, _>>().map(Self::List)
            }
            serde_json::Value::Object(_) => Err(ValueConversionError::ObjectUnsupported),
        }
    }
}

// ============================================================================
// SECTION: Value Kind
// ============================================================================

/// Type tag of a [`Value`], used in diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ValueKind {
    /// [`Value::Null`].
    Null,
    /// [`Value::Bool`].
    Bool,
    /// [`Value::Int`].
    Int,
    /// [`Value::Float`].
    Float,
    /// [`Value::String`].
    String,
    /// [`Value::Timestamp`].
    Timestamp,
    /// [`Value::List`].
    List,
    /// [`Value::Score`].
    Score,
}

impl ValueKind {
    /// Returns a stable label for the kind.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Null => "null",
            Self::Bool => "bool",
            Self::Int => "int",
            Self::Float => "float",
            Self::String => "string",
            Self::Timestamp => "timestamp",
            Self::List => "list",
            Self::Score => "score",
        }
    }
}

impl fmt::Display for ValueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
