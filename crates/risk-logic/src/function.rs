// crates/risk-logic/src/function.rs
// ============================================================================
// Module: Function Kinds and Descriptors
// Description: Closed set of evaluable functions and their static metadata.
// Purpose: Single source of truth for argument names used by construction,
//          evaluation, and wire encoding.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! [`Function`] is a closed enumeration; each variant maps to a static
//! [`FunctionDescriptor`] through an exhaustive `match`, so adding a function
//! without describing it (or without teaching the evaluator about it) fails
//! to compile. Descriptors are plain `'static` data and never mutated.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Serialize;

// ============================================================================
// SECTION: Argument Names
// ============================================================================

/// Canonical argument names shared by descriptors and the evaluator.
pub mod args {
    /// Payload field name.
    pub const FIELD_NAME: &str = "fieldName";
    /// Variable name.
    pub const VARNAME: &str = "varname";
    /// Custom list identifier.
    pub const CUSTOM_LIST_ID: &str = "customListId";
    /// Related table name.
    pub const TABLE_NAME: &str = "tableName";
    /// Relationship path (list of link names).
    pub const PATH: &str = "path";
    /// Left operand.
    pub const LEFT: &str = "left";
    /// Right operand.
    pub const RIGHT: &str = "right";
    /// Single operand.
    pub const VALUE: &str = "value";
    /// List operand.
    pub const LIST: &str = "list";
    /// String searched in.
    pub const HAYSTACK: &str = "haystack";
    /// String searched for.
    pub const NEEDLE: &str = "needle";
    /// Timestamp operand.
    pub const TIMESTAMP: &str = "timestamp";
    /// Duration in seconds.
    pub const SECONDS: &str = "seconds";
    /// Interval start.
    pub const START: &str = "start";
    /// Interval end.
    pub const END: &str = "end";
    /// Boolean condition of a score computation.
    pub const CONDITION: &str = "condition";
    /// Score modifier of a score computation.
    pub const MODIFIER: &str = "modifier";
    /// Score floor of a score computation.
    pub const FLOOR: &str = "floor";
}

// ============================================================================
// SECTION: Descriptor Types
// ============================================================================

/// Declared named argument of a function.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgumentSpec {
    /// Argument name as used in the node's named children.
    pub name: &'static str,
    /// Whether the argument must be present.
    pub required: bool,
}

impl ArgumentSpec {
    /// Declares a required argument.
    #[must_use]
    pub const fn required(name: &'static str) -> Self {
        Self {
            name,
            required: true,
        }
    }

    /// Declares an optional argument.
    #[must_use]
    pub const fn optional(name: &'static str) -> Self {
        Self {
            name,
            required: false,
        }
    }
}

/// Static metadata for a function kind.
///
/// # Invariants
/// - `wire_tag` values are unique across all functions.
/// - `arguments` names are unique within a descriptor.
/// - `variadic` is `None` for functions that accept no positional children.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FunctionDescriptor {
    /// Name used in diagnostics only.
    pub debug_name: &'static str,
    /// Discriminator used by the wire representation.
    pub wire_tag: &'static str,
    /// Declared named arguments.
    pub arguments: &'static [ArgumentSpec],
    /// Minimum number of positional children, when positional children are accepted.
    pub variadic: Option<usize>,
}

impl FunctionDescriptor {
    /// Returns the spec for a named argument, if declared.
    #[must_use]
    pub fn argument(&self, name: &str) -> Option<&ArgumentSpec> {
        self.arguments.iter().find(|spec| spec.name == name)
    }
}

// ============================================================================
// SECTION: Function Kinds
// ============================================================================

/// Closed set of evaluable function kinds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Function {
    /// Literal value carried by the node.
    Constant,
    /// Field of the record being evaluated.
    Payload,
    /// Declared variable supplied by the environment.
    Variable,
    /// Contents of a customer-managed list.
    CustomListAccess,
    /// Field reached through a database relationship.
    DatabaseAccess,
    /// Logical conjunction over positional children.
    And,
    /// Logical disjunction over positional children.
    Or,
    /// Logical negation.
    Not,
    /// Equality.
    Equal,
    /// Inequality.
    NotEqual,
    /// Strictly greater.
    Greater,
    /// Greater or equal.
    GreaterOrEqual,
    /// Strictly less.
    Less,
    /// Less or equal.
    LessOrEqual,
    /// Addition.
    Add,
    /// Subtraction.
    Subtract,
    /// Multiplication.
    Multiply,
    /// Division (always produces a float).
    Divide,
    /// Null check.
    IsNull,
    /// List membership.
    IsInList,
    /// Negated list membership.
    IsNotInList,
    /// Substring containment.
    StringContains,
    /// Prefix test.
    StringStartsWith,
    /// Suffix test.
    StringEndsWith,
    /// Lowercase conversion.
    StringLower,
    /// RFC 3339 string to timestamp.
    ParseTimestamp,
    /// Timestamp shifted by a number of seconds.
    TimeAdd,
    /// Signed number of seconds between two timestamps.
    SecondsBetween,
    /// Scoring rule body: condition, modifier, optional floor.
    ScoreComputation,
    /// First triggered score computation among positional children.
    Switch,
}

impl Function {
    /// Every function kind, in declaration order.
    pub const ALL: [Self; 30] = [
        Self::Constant,
        Self::Payload,
        Self::Variable,
        Self::CustomListAccess,
        Self::DatabaseAccess,
        Self::And,
        Self::Or,
        Self::Not,
        Self::Equal,
        Self::NotEqual,
        Self::Greater,
        Self::GreaterOrEqual,
        Self::Less,
        Self::LessOrEqual,
        Self::Add,
        Self::Subtract,
        Self::Multiply,
        Self::Divide,
        Self::IsNull,
        Self::IsInList,
        Self::IsNotInList,
        Self::StringContains,
        Self::StringStartsWith,
        Self::StringEndsWith,
        Self::StringLower,
        Self::ParseTimestamp,
        Self::TimeAdd,
        Self::SecondsBetween,
        Self::ScoreComputation,
        Self::Switch,
    ];

    /// Returns the static descriptor for this function.
    #[must_use]
    pub const fn descriptor(self) -> &'static FunctionDescriptor {
        match self {
            Self::Constant => &CONSTANT,
            Self::Payload => &PAYLOAD,
            Self::Variable => &VARIABLE,
            Self::CustomListAccess => &CUSTOM_LIST_ACCESS,
            Self::DatabaseAccess => &DATABASE_ACCESS,
            Self::And => &AND,
            Self::Or => &OR,
            Self::Not => &NOT,
            Self::Equal => &EQUAL,
            Self::NotEqual => &NOT_EQUAL,
            Self::Greater => &GREATER,
            Self::GreaterOrEqual => &GREATER_OR_EQUAL,
            Self::Less => &LESS,
            Self::LessOrEqual => &LESS_OR_EQUAL,
            Self::Add => &ADD,
            Self::Subtract => &SUBTRACT,
            Self::Multiply => &MULTIPLY,
            Self::Divide => &DIVIDE,
            Self::IsNull => &IS_NULL,
            Self::IsInList => &IS_IN_LIST,
            Self::IsNotInList => &IS_NOT_IN_LIST,
            Self::StringContains => &STRING_CONTAINS,
            Self::StringStartsWith => &STRING_STARTS_WITH,
            Self::StringEndsWith => &STRING_ENDS_WITH,
            Self::StringLower => &STRING_LOWER,
            Self::ParseTimestamp => &PARSE_TIMESTAMP,
            Self::TimeAdd => &TIME_ADD,
            Self::SecondsBetween => &SECONDS_BETWEEN,
            Self::ScoreComputation => &SCORE_COMPUTATION,
            Self::Switch => &SWITCH,
        }
    }

    /// Returns the wire tag for this function.
    #[must_use]
    pub const fn wire_tag(self) -> &'static str {
        self.descriptor().wire_tag
    }
}

impl fmt::Display for Function {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.descriptor().debug_name)
    }
}

// ============================================================================
// SECTION: Descriptor Table
// ============================================================================

/// Arguments of binary operators.
const BINARY: &[ArgumentSpec] =
    &[ArgumentSpec::required(args::LEFT), ArgumentSpec::required(args::RIGHT)];
/// Arguments of unary operators.
const UNARY: &[ArgumentSpec] = &[ArgumentSpec::required(args::VALUE)];
/// Arguments of string search operators.
const SEARCH: &[ArgumentSpec] =
    &[ArgumentSpec::required(args::HAYSTACK), ArgumentSpec::required(args::NEEDLE)];
/// Arguments of list membership operators.
const MEMBERSHIP: &[ArgumentSpec] =
    &[ArgumentSpec::required(args::VALUE), ArgumentSpec::required(args::LIST)];

/// Builds a descriptor without positional children.
const fn named(
    debug_name: &'static str,
    wire_tag: &'static str,
    arguments: &'static [ArgumentSpec],
) -> FunctionDescriptor {
    FunctionDescriptor {
        debug_name,
        wire_tag,
        arguments,
        variadic: None,
    }
}

/// Builds a descriptor that only takes positional children.
const fn positional(
    debug_name: &'static str,
    wire_tag: &'static str,
    min: usize,
) -> FunctionDescriptor {
    FunctionDescriptor {
        debug_name,
        wire_tag,
        arguments: &[],
        variadic: Some(min),
    }
}

/// Descriptor for [`Function::Constant`].
const CONSTANT: FunctionDescriptor = named("Constant", "Constant", &[]);
/// Descriptor for [`Function::Payload`].
const PAYLOAD: FunctionDescriptor =
    named("Payload", "Payload", &[ArgumentSpec::required(args::FIELD_NAME)]);
/// Descriptor for [`Function::Variable`].
const VARIABLE: FunctionDescriptor =
    named("Variable", "Variable", &[ArgumentSpec::required(args::VARNAME)]);
/// Descriptor for [`Function::CustomListAccess`].
const CUSTOM_LIST_ACCESS: FunctionDescriptor = named(
    "CustomListAccess",
    "CustomListAccess",
    &[ArgumentSpec::required(args::CUSTOM_LIST_ID)],
);
/// Descriptor for [`Function::DatabaseAccess`].
const DATABASE_ACCESS: FunctionDescriptor = named(
    "DatabaseAccess",
    "DatabaseAccess",
    &[
        ArgumentSpec::required(args::TABLE_NAME),
        ArgumentSpec::required(args::FIELD_NAME),
        ArgumentSpec::required(args::PATH),
    ],
);
/// Descriptor for [`Function::And`].
const AND: FunctionDescriptor = positional("And", "And", 1);
/// Descriptor for [`Function::Or`].
const OR: FunctionDescriptor = positional("Or", "Or", 1);
/// Descriptor for [`Function::Not`].
const NOT: FunctionDescriptor = named("Not", "Not", UNARY);
/// Descriptor for [`Function::Equal`].
const EQUAL: FunctionDescriptor = named("Equal", "=", BINARY);
/// Descriptor for [`Function::NotEqual`].
const NOT_EQUAL: FunctionDescriptor = named("NotEqual", "≠", BINARY);
/// Descriptor for [`Function::Greater`].
const GREATER: FunctionDescriptor = named("Greater", ">", BINARY);
/// Descriptor for [`Function::GreaterOrEqual`].
const GREATER_OR_EQUAL: FunctionDescriptor = named("GreaterOrEqual", "≥", BINARY);
/// Descriptor for [`Function::Less`].
const LESS: FunctionDescriptor = named("Less", "<", BINARY);
/// Descriptor for [`Function::LessOrEqual`].
const LESS_OR_EQUAL: FunctionDescriptor = named("LessOrEqual", "≤", BINARY);
/// Descriptor for [`Function::Add`].
const ADD: FunctionDescriptor = named("Add", "+", BINARY);
/// Descriptor for [`Function::Subtract`].
const SUBTRACT: FunctionDescriptor = named("Subtract", "-", BINARY);
/// Descriptor for [`Function::Multiply`].
const MULTIPLY: FunctionDescriptor = named("Multiply", "*", BINARY);
/// Descriptor for [`Function::Divide`].
const DIVIDE: FunctionDescriptor = named("Divide", "/", BINARY);
/// Descriptor for [`Function::IsNull`].
const IS_NULL: FunctionDescriptor = named("IsNull", "IsNull", UNARY);
/// Descriptor for [`Function::IsInList`].
const IS_IN_LIST: FunctionDescriptor = named("IsInList", "IsInList", MEMBERSHIP);
/// Descriptor for [`Function::IsNotInList`].
const IS_NOT_IN_LIST: FunctionDescriptor = named("IsNotInList", "IsNotInList", MEMBERSHIP);
/// Descriptor for [`Function::StringContains`].
const STRING_CONTAINS: FunctionDescriptor = named("StringContains", "StringContains", SEARCH);
/// Descriptor for [`Function::StringStartsWith`].
const STRING_STARTS_WITH: FunctionDescriptor =
    named("StringStartsWith", "StringStartsWith", SEARCH);
/// Descriptor for [`Function::StringEndsWith`].
const STRING_ENDS_WITH: FunctionDescriptor = named("StringEndsWith", "StringEndsWith", SEARCH);
/// Descriptor for [`Function::StringLower`].
const STRING_LOWER: FunctionDescriptor = named("StringLower", "StringLower", UNARY);
/// Descriptor for [`Function::ParseTimestamp`].
const PARSE_TIMESTAMP: FunctionDescriptor = named("ParseTimestamp", "ParseTimestamp", UNARY);
/// Descriptor for [`Function::TimeAdd`].
const TIME_ADD: FunctionDescriptor = named(
    "TimeAdd",
    "TimeAdd",
    &[ArgumentSpec::required(args::TIMESTAMP), ArgumentSpec::required(args::SECONDS)],
);
/// Descriptor for [`Function::SecondsBetween`].
const SECONDS_BETWEEN: FunctionDescriptor = named(
    "SecondsBetween",
    "SecondsBetween",
    &[ArgumentSpec::required(args::START), ArgumentSpec::required(args::END)],
);
/// Descriptor for [`Function::ScoreComputation`].
const SCORE_COMPUTATION: FunctionDescriptor = named(
    "ScoreComputation",
    "ScoreComputation",
    &[
        ArgumentSpec::required(args::CONDITION),
        ArgumentSpec::required(args::MODIFIER),
        ArgumentSpec::optional(args::FLOOR),
    ],
);
/// Descriptor for [`Function::Switch`].
const SWITCH: FunctionDescriptor = positional("Switch", "Switch", 0);
