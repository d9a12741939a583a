// crates/risk-logic/src/environment.rs
// ============================================================================
// Module: Evaluation Environment
// Description: Capability trait through which leaf nodes read external data.
// Purpose: Decouple the evaluator from payloads, lists, and related records.
// Dependencies: serde, serde_json, thiserror
// ============================================================================

//! ## Overview
//! Leaf functions (`Payload`, `Variable`, `CustomListAccess`,
//! `DatabaseAccess`) never touch storage directly; they ask an
//! [`Environment`]. [`MapEnvironment`] is a plain in-memory implementation
//! that can be filled programmatically or from JSON documents.
//!
//! Security posture: environment contents are untrusted input; conversion
//! from JSON rejects shapes the value model cannot represent.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::fmt;

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::value::Value;

// ============================================================================
// SECTION: Errors
// ============================================================================

/// Kind of lookup that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LookupKind {
    /// Field of the record being evaluated.
    PayloadField,
    /// Custom list contents.
    List,
    /// Field of a related record.
    RelatedField,
    /// Declared variable.
    Variable,
}

impl fmt::Display for LookupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::PayloadField => "payload field",
            Self::List => "list",
            Self::RelatedField => "related field",
            Self::Variable => "variable",
        };
        f.write_str(label)
    }
}

/// Environment lookup failures.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "error", rename_all = "snake_case")]
pub enum EnvironmentError {
    /// The requested item does not exist.
    #[error("{lookup} `{name}` not found")]
    NotFound {
        /// Kind of lookup.
        lookup: LookupKind,
        /// Requested name.
        name: String,
    },
    /// The item exists but cannot be represented as a value.
    #[error("{lookup} `{name}` is invalid: {reason}")]
    InvalidValue {
        /// Kind of lookup.
        lookup: LookupKind,
        /// Requested name.
        name: String,
        /// Explanation.
        reason: String,
    },
    /// The backing source could not be reached.
    #[error("environment unavailable: {message}")]
    Unavailable {
        /// Backend message.
        message: String,
    },
}

// ============================================================================
// SECTION: Environment Trait
// ============================================================================

/// Read-only data available to a tree evaluation.
pub trait Environment {
    /// Returns a field of the record being evaluated.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError`] when the field is absent or unusable.
    fn payload_field(&self, name: &str) -> Result<Value, EnvironmentError>;

    /// Returns the values of a custom list.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError`] when the list is unknown.
    fn list_values(&self, list_id: &str) -> Result<Vec<Value>, EnvironmentError>;

    /// Returns a field of a record reached by following `path` from the
    /// evaluated record into `table`.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError`] when the relationship or field is absent.
    fn related_field(
        &self,
        table: &str,
        field: &str,
        path: &[String],
    ) -> Result<Value, EnvironmentError>;

    /// Returns a declared variable.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError`] when the variable is not declared.
    fn variable(&self, name: &str) -> Result<Value, EnvironmentError>;
}

impl<T: Environment + ?Sized> Environment for &T {
    fn payload_field(&self, name: &str) -> Result<Value, EnvironmentError> {
        (**self).payload_field(name)
    }

    fn list_values(&self, list_id: &str) -> Result<Vec<Value>, EnvironmentError> {
        (**self).list_values(list_id)
    }

    fn related_field(
        &self,
        table: &str,
        field: &str,
        path: &[String],
    ) -> Result<Value, EnvironmentError> {
        (**self).related_field(table, field, path)
    }

    fn variable(&self, name: &str) -> Result<Value, EnvironmentError> {
        (**self).variable(name)
    }
}

// ============================================================================
// SECTION: Map Environment
// ============================================================================

/// Key of a related-field entry.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
struct RelatedKey {
    /// Target table.
    table: String,
    /// Link names followed from the evaluated record.
    path: Vec<String>,
    /// Field on the target record.
    field: String,
}

/// In-memory environment backed by ordered maps.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MapEnvironment {
    /// Payload fields of the evaluated record.
    payload: BTreeMap<String, Value>,
    /// Custom lists by identifier.
    lists: BTreeMap<String, Vec<Value>>,
    /// Related fields keyed by table, path and field.
    related: BTreeMap<RelatedKey, Value>,
    /// Declared variables.
    variables: BTreeMap<String, Value>,
}

impl MapEnvironment {
    /// Creates an empty environment.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a payload field.
    #[must_use]
    pub fn with_payload_field(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    /// Adds a custom list.
    #[must_use]
    pub fn with_list(mut self, list_id: impl Into<String>, values: Vec<Value>) -> Self {
        self.lists.insert(list_id.into(), values);
        self
    }

    /// Adds a related field reachable through `path`.
    #[must_use]
    pub fn with_related_field<I, S>(
        mut self,
        table: impl Into<String>,
        path: I,
        field: impl Into<String>,
        value: impl Into<Value>,
    ) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let key = RelatedKey {
            table: table.into(),
            path: path.into_iter().map(Into::into).collect(),
            field: field.into(),
        };
        self.related.insert(key, value.into());
        self
    }

    /// Adds a declared variable.
    #[must_use]
    pub fn with_variable(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.variables.insert(name.into(), value.into());
        self
    }

    /// Builds payload fields from a JSON object.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::InvalidValue`] when the document is not an
    /// object or a field cannot be converted.
    pub fn from_json_payload(payload: serde_json::Value) -> Result<Self, EnvironmentError> {
        let serde_json::Value::Object(fields) = payload else {
            return Err(EnvironmentError::InvalidValue {
                lookup: LookupKind::PayloadField,
                name: "$".to_string(),
                reason: "payload must be a json object".to_string(),
            });
        };
        let mut env = Self::new();
        for (name, raw) in fields {
            let value = Value::try_from(raw).map_err(|err| EnvironmentError::InvalidValue {
                lookup: LookupKind::PayloadField,
                name: name.clone(),
                reason: err.to_string(),
            })?;
            env.payload.insert(name, value);
        }
        Ok(env)
    }

    /// Adds custom lists from a JSON object of arrays.
    ///
    /// # Errors
    ///
    /// Returns [`EnvironmentError::InvalidValue`] when the document is not an
    /// object of arrays or an entry cannot be converted.
    pub fn with_json_lists(mut self, lists: serde_json::Value) -> Result<Self, EnvironmentError> {
        let serde_json::Value::Object(entries) = lists else {
            return Err(EnvironmentError::InvalidValue {
                lookup: LookupKind::List,
                name: "$".to_string(),
                reason: "lists must be a json object".to_string(),
            });
        };
        for (list_id, raw) in entries {
            let value = Value::try_from(raw).map_err(|err| EnvironmentError::InvalidValue {
                lookup: LookupKind::List,
                name: list_id.clone(),
                reason: err.to_string(),
            })?;
            let Value::List(values) = value else {
                return Err(EnvironmentError::InvalidValue {
                    lookup: LookupKind::List,
                    name: list_id,
                    reason: "list contents must be a json array".to_string(),
                });
            };
            self.lists.insert(list_id, values);
        }
        Ok(self)
    }
}

impl Environment for MapEnvironment {
    fn payload_field(&self, name: &str) -> Result<Value, EnvironmentError> {
        self.payload.get(name).cloned().ok_or_else(|| EnvironmentError::NotFound {
            lookup: LookupKind::PayloadField,
            name: name.to_string(),
        })
    }

    fn list_values(&self, list_id: &str) -> Result<Vec<Value>, EnvironmentError> {
        self.lists.get(list_id).cloned().ok_or_else(|| EnvironmentError::NotFound {
            lookup: LookupKind::List,
            name: list_id.to_string(),
        })
    }

    fn related_field(
        &self,
        table: &str,
        field: &str,
        path: &[String],
    ) -> Result<Value, EnvironmentError> {
        let key = RelatedKey {
            table: table.to_string(),
            path: path.to_vec(),
            field: field.to_string(),
        };
        self.related.get(&key).cloned().ok_or_else(|| EnvironmentError::NotFound {
            lookup: LookupKind::RelatedField,
            name: format!("{table}.{field}"),
        })
    }

    fn variable(&self, name: &str) -> Result<Value, EnvironmentError> {
        self.variables.get(name).cloned().ok_or_else(|| EnvironmentError::NotFound {
            lookup: LookupKind::Variable,
            name: name.to_string(),
        })
    }
}
