// crates/risk-logic/src/error.rs
// ============================================================================
// Module: Risk Logic Errors
// Description: Construction-time and evaluation-time error taxonomy.
// Purpose: Keep malformed trees and per-node evaluation failures distinct.
// Dependencies: serde, thiserror
// ============================================================================

//! ## Overview
//! [`MalformedTree`] is returned when a tree cannot be built (programmatically
//! or from its wire form) and is always surfaced to whoever attempted the
//! mutation. [`EvaluationError`] is an ordinary per-node result: it is stored
//! in the failing node's evaluation and never unwinds the tree walk.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::environment::EnvironmentError;
use crate::function::Function;
use crate::value::ValueKind;

// ============================================================================
// SECTION: Malformed Tree
// ============================================================================

/// Errors raised while constructing or decoding a node tree.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MalformedTree {
    /// Function is not enabled in the registry used for construction.
    #[error("function {function} is not registered")]
    UnknownFunction {
        /// Function that was requested.
        function: Function,
    },
    /// Wire tag does not name a registered function.
    #[error("unknown function tag `{tag}`")]
    UnknownWireTag {
        /// Tag found in the wire representation.
        tag: String,
    },
    /// A required named argument was not supplied.
    #[error("{function} is missing required argument `{argument}`")]
    MissingArgument {
        /// Function being constructed.
        function: Function,
        /// Missing argument name.
        argument: String,
    },
    /// A named argument not declared by the function was supplied.
    #[error("{function} does not accept argument `{argument}`")]
    UnexpectedArgument {
        /// Function being constructed.
        function: Function,
        /// Undeclared argument name.
        argument: String,
    },
    /// The same named argument was supplied twice.
    #[error("{function} received argument `{argument}` more than once")]
    DuplicateArgument {
        /// Function being constructed.
        function: Function,
        /// Repeated argument name.
        argument: String,
    },
    /// Positional children do not satisfy the function arity.
    #[error("{function} expects {expected} positional children, got {actual}")]
    Arity {
        /// Function being constructed.
        function: Function,
        /// Human-readable arity expectation.
        expected: String,
        /// Number of positional children supplied.
        actual: usize,
    },
    /// A constant node was built without a literal.
    #[error("constant node requires a literal value")]
    MissingConstant,
    /// A literal holds a NaN or infinite float, possibly inside a list.
    #[error("constant literal must not contain NaN or infinite floats")]
    NonFiniteConstant,
    /// A literal was attached to a non-constant node.
    #[error("{function} does not carry a literal value")]
    UnexpectedConstant {
        /// Function being constructed.
        function: Function,
    },
    /// Tree depth exceeds the registry limit.
    #[error("node tree too deep: {actual_depth} levels (max {max_depth})")]
    TooDeep {
        /// Maximum supported depth.
        max_depth: usize,
        /// Depth of the rejected tree.
        actual_depth: usize,
    },
}

// ============================================================================
// SECTION: Evaluation Error
// ============================================================================

/// Failure of a single node evaluation.
///
/// # Invariants
/// - Variants are stable and serializable for audit trails.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum EvaluationError {
    /// Operand types are not compatible with the function.
    #[error("{function}: type mismatch, expected {expected}, found {found}")]
    TypeMismatch {
        /// Function that rejected its operands.
        function: Function,
        /// Expected operand types.
        expected: String,
        /// Operand types actually received.
        found: String,
    },
    /// An operand was null where a value is required.
    #[error("{function}: argument `{argument}` is null")]
    NullValue {
        /// Function that rejected the operand.
        function: Function,
        /// Argument holding the null.
        argument: String,
    },
    /// Division by zero.
    #[error("division by zero")]
    DivisionByZero,
    /// Integer arithmetic overflowed.
    #[error("{function}: integer overflow")]
    Overflow {
        /// Function that overflowed.
        function: Function,
    },
    /// An operand had the right type but an unusable value.
    #[error("{function}: invalid argument `{argument}`: {reason}")]
    InvalidArgument {
        /// Function that rejected the operand.
        function: Function,
        /// Offending argument.
        argument: String,
        /// Explanation.
        reason: String,
    },
    /// A child evaluation failed, so this node cannot be evaluated.
    #[error("{function}: argument `{argument}` failed to evaluate")]
    ArgumentFailed {
        /// Function whose child failed.
        function: Function,
        /// Failed argument name (or `#<index>` for positional children).
        argument: String,
    },
    /// Environment lookup failed.
    #[error("environment lookup failed: {0}")]
    Environment(EnvironmentError),
    /// Function is not enabled in the evaluator's registry.
    #[error("function {function} is not supported by this evaluator")]
    UnsupportedFunction {
        /// Unsupported function.
        function: Function,
    },
    /// Evaluation exceeded the maximum tree depth.
    #[error("node tree too deep to evaluate (max {max_depth})")]
    TooDeep {
        /// Maximum supported depth.
        max_depth: usize,
    },
}

impl EvaluationError {
    /// Builds a type mismatch for a single operand.
    #[must_use]
    pub fn type_mismatch(function: Function, expected: &str, found: ValueKind) -> Self {
        Self::TypeMismatch {
            function,
            expected: expected.to_string(),
            found: found.as_str().to_string(),
        }
    }

    /// Builds a type mismatch for a pair of operands.
    #[must_use]
    pub fn pair_mismatch(function: Function, expected: &str, left: ValueKind, right: ValueKind) -> Self {
        Self::TypeMismatch {
            function,
            expected: expected.to_string(),
            found: format!("{left} and {right}"),
        }
    }
}

impl From<EnvironmentError> for EvaluationError {
    fn from(error: EnvironmentError) -> Self {
        Self::Environment(error)
    }
}
