// crates/risk-logic/src/evaluator.rs
// ============================================================================
// Module: Tree Evaluator
// Description: Strict, failure-isolating walk over validated node trees.
// Purpose: Produce a per-node evaluation record for audit and scoring.
// Dependencies: time, crate::{environment, error, function, node, registry, value}
// ============================================================================

//! ## Overview
//! [`Evaluator::evaluate`] evaluates every child (positional first, then
//! named) before dispatching on the node's [`Function`]. A failing child is
//! recorded in its own [`NodeEvaluation`]; a parent that needs the value
//! fails with [`EvaluationError::ArgumentFailed`]. There is no
//! short-circuiting, so `And(false, <error>)` fails.
//!
//! Numeric policy:
//! - `Int` and `Float` compare numerically for equality and ordering.
//! - Any other cross-type equality is `false`; cross-type ordering is a
//!   type mismatch.
//! - `Int` with `Int` uses checked integer math except `Divide`, which always
//!   yields a `Float`. Any float operand yields a `Float`.
//! - `Null` in arithmetic or ordering is a [`EvaluationError::NullValue`];
//!   `Null == Null` is true.
//!
//! The evaluator holds no mutable state; one instance can serve any number
//! of concurrent evaluations.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::Arc;

use serde::Deserialize;
use serde::Serialize;
use time::Duration;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

use crate::environment::Environment;
use crate::error::EvaluationError;
use crate::function::Function;
use crate::function::args;
use crate::node::Node;
use crate::registry::FunctionRegistry;
use crate::value::ScoreComputationResult;
use crate::value::Value;

// ============================================================================
// SECTION: Node Evaluation
// ============================================================================

/// Evaluation record of one node and its subtree.
///
/// # Invariants
/// - Exactly one of `return_value` and `error` is set.
/// - `children` and `named_children` mirror the evaluated node's shape.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NodeEvaluation {
    /// Function evaluated at this node.
    pub function: Function,
    /// Produced value, when evaluation succeeded.
    pub return_value: Option<Value>,
    /// Failure, when evaluation failed.
    pub error: Option<EvaluationError>,
    /// Evaluations of the positional children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Self>,
    /// Evaluations of the named children.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_children: BTreeMap<String, Self>,
}

/// Value reported for a record that carries neither a value nor an error.
static NULL_VALUE: Value = Value::Null;

impl NodeEvaluation {
    /// Builds a record from an outcome and child records.
    fn from_outcome(
        function: Function,
        outcome: Result<Value, EvaluationError>,
        children: Vec<Self>,
        named_children: BTreeMap<String, Self>,
    ) -> Self {
        let (return_value, error) = match outcome {
            Ok(value) => (Some(value), None),
            Err(error) => (None, Some(error)),
        };
        Self {
            function,
            return_value,
            error,
            children,
            named_children,
        }
    }

    /// Returns the node outcome.
    ///
    /// # Errors
    ///
    /// Returns the recorded [`EvaluationError`] when the node failed.
    pub fn result(&self) -> Result<&Value, &EvaluationError> {
        match (&self.return_value, &self.error) {
            (_, Some(error)) => Err(error),
            (Some(value), None) => Ok(value),
            (None, None) => Ok(&NULL_VALUE),
        }
    }

    /// Returns true when the node succeeded.
    #[must_use]
    pub const fn is_ok(&self) -> bool {
        self.error.is_none()
    }

    /// Collects every error recorded in the subtree, in pre-order.
    #[must_use]
    pub fn errors(&self) -> Vec<&EvaluationError> {
        let mut collected = Vec::new();
        self.collect_errors(&mut collected);
        collected
    }

    /// Pre-order error collection helper.
    fn collect_errors<'a>(&'a self, collected: &mut Vec<&'a EvaluationError>) {
        if let Some(error) = &self.error {
            collected.push(error);
        }
        for child in &self.children {
            child.collect_errors(collected);
        }
        for child in self.named_children.values() {
            child.collect_errors(collected);
        }
    }
}

// ============================================================================
// SECTION: Evaluator
// ============================================================================

/// Stateless tree evaluator bound to a function registry.
#[derive(Debug, Clone)]
pub struct Evaluator {
    /// Functions this evaluator is allowed to run.
    registry: Arc<FunctionRegistry>,
}

impl Evaluator {
    /// Creates an evaluator over the given registry.
    #[must_use]
    pub const fn new(registry: Arc<FunctionRegistry>) -> Self {
        Self {
            registry,
        }
    }

    /// Returns the registry backing this evaluator.
    #[must_use]
    pub fn registry(&self) -> &FunctionRegistry {
        &self.registry
    }

    /// Evaluates a tree against an environment.
    #[must_use]
    pub fn evaluate(&self, node: &Node, env: &dyn Environment) -> NodeEvaluation {
        self.evaluate_at(node, env, 1)
    }

    /// Evaluates `node` located at `level` (the root is level 1).
    fn evaluate_at(&self, node: &Node, env: &dyn Environment, level: usize) -> NodeEvaluation {
        let function = node.function();
        if level > self.registry.max_depth() {
            return NodeEvaluation::from_outcome(
                function,
                Err(EvaluationError::TooDeep {
                    max_depth: self.registry.max_depth(),
                }),
                Vec::new(),
                BTreeMap::new(),
            );
        }
        let children: Vec<NodeEvaluation> =
            node.children().iter().map(|child| self.evaluate_at(child, env, level + 1)).collect();
        let named_children: BTreeMap<String, NodeEvaluation> = node
            .named_children()
            .iter()
            .map(|(name, child)| (name.clone(), self.evaluate_at(child, env, level + 1)))
            .collect();
        let outcome = if self.registry.contains(function) {
            let arguments = Arguments {
                function,
                children: &children,
                named: &named_children,
            };
            dispatch(node, &arguments, env)
        } else {
            Err(EvaluationError::UnsupportedFunction {
                function,
            })
        };
        NodeEvaluation::from_outcome(function, outcome, children, named_children)
    }
}

// ============================================================================
// SECTION: Argument Access
// ============================================================================

/// Evaluated arguments of the node being dispatched.
struct Arguments<'a> {
    /// Function being evaluated.
    function: Function,
    /// Positional child records.
    children: &'a [NodeEvaluation],
    /// Named child records.
    named: &'a BTreeMap<String, NodeEvaluation>,
}

impl<'a> Arguments<'a> {
    /// Returns a named argument value, failing when the child failed.
    fn value(&self, name: &str) -> Result<&'a Value, EvaluationError> {
        self.optional(name)?.ok_or_else(|| EvaluationError::InvalidArgument {
            function: self.function,
            argument: name.to_string(),
            reason: "argument is missing".to_string(),
        })
    }

    /// Returns an optional named argument value.
    fn optional(&self, name: &str) -> Result<Option<&'a Value>, EvaluationError> {
        self.named.get(name).map_or(Ok(None), |record| {
            record.result().map(Some).map_err(|_| EvaluationError::ArgumentFailed {
                function: self.function,
                argument: name.to_string(),
            })
        })
    }

    /// Returns every positional value, failing on the first failed child.
    fn positional(&self) -> Result<Vec<&'a Value>, EvaluationError> {
        self.children
            .iter()
            .enumerate()
            .map(|(index, record)| {
                record.result().map_err(|_| EvaluationError::ArgumentFailed {
                    function: self.function,
                    argument: positional_name(index),
                })
            })
            .collect()
    }

    /// Returns a named boolean argument.
    fn bool(&self, name: &str) -> Result<bool, EvaluationError> {
        expect_bool(self.function, name, self.value(name)?)
    }

    /// Returns a named integer argument.
    fn int(&self, name: &str) -> Result<i64, EvaluationError> {
        expect_int(self.function, name, self.value(name)?)
    }

    /// Returns a named string argument.
    fn string(&self, name: &str) -> Result<&'a str, EvaluationError> {
        expect_str(self.function, name, self.value(name)?)
    }

    /// Returns a named timestamp argument.
    fn timestamp(&self, name: &str) -> Result<OffsetDateTime, EvaluationError> {
        match self.value(name)? {
            Value::Timestamp(value) => Ok(*value),
            other => Err(mismatch_or_null(self.function, name, "timestamp", other)),
        }
    }

    /// Returns a named list argument.
    fn list(&self, name: &str) -> Result<&'a [Value], EvaluationError> {
        match self.value(name)? {
            Value::List(items) => Ok(items),
            other => Err(mismatch_or_null(self.function, name, "list", other)),
        }
    }
}

/// Argument label used for positional children.
fn positional_name(index: usize) -> String {
    format!("#{index}")
}

/// Builds a null or type-mismatch error for an unexpected operand.
fn mismatch_or_null(
    function: Function,
    argument: &str,
    expected: &str,
    found: &Value,
) -> EvaluationError {
    if found.is_null() {
        EvaluationError::NullValue {
            function,
            argument: argument.to_string(),
        }
    } else {
        EvaluationError::type_mismatch(function, expected, found.kind())
    }
}

/// Extracts a boolean operand.
fn expect_bool(function: Function, argument: &str, value: &Value) -> Result<bool, EvaluationError> {
    value.as_bool().ok_or_else(|| mismatch_or_null(function, argument, "bool", value))
}

/// Extracts an integer operand.
fn expect_int(function: Function, argument: &str, value: &Value) -> Result<i64, EvaluationError> {
    value.as_int().ok_or_else(|| mismatch_or_null(function, argument, "int", value))
}

/// Extracts a string operand.
fn expect_str<'a>(
    function: Function,
    argument: &str,
    value: &'a Value,
) -> Result<&'a str, EvaluationError> {
    value.as_str().ok_or_else(|| mismatch_or_null(function, argument, "string", value))
}

// ============================================================================
// SECTION: Dispatch
// ============================================================================

/// Evaluates a node whose children have already been evaluated.
fn dispatch(
    node: &Node,
    arguments: &Arguments<'_>,
    env: &dyn Environment,
) -> Result<Value, EvaluationError> {
    let function = arguments.function;
    match function {
        Function::Constant => {
            node.constant().cloned().ok_or_else(|| EvaluationError::InvalidArgument {
                function,
                argument: "constant".to_string(),
                reason: "literal is missing".to_string(),
            })
        }
        Function::Payload => Ok(env.payload_field(arguments.string(args::FIELD_NAME)?)?),
        Function::Variable => Ok(env.variable(arguments.string(args::VARNAME)?)?),
        Function::CustomListAccess => {
            Ok(Value::List(env.list_values(arguments.string(args::CUSTOM_LIST_ID)?)?))
        }
        Function::DatabaseAccess => {
            let table = arguments.string(args::TABLE_NAME)?;
            let field = arguments.string(args::FIELD_NAME)?;
            let path = arguments
                .list(args::PATH)?
                .iter()
                .map(|link| expect_str(function, args::PATH, link).map(str::to_string))
                .collect::<Result<Vec<_>, _>>()?;
            Ok(env.related_field(table, field, &path)?)
        }
        Function::And | Function::Or => {
            let mut operands = Vec::with_capacity(arguments.children.len());
            for (index, value) in arguments.positional()?.into_iter().enumerate() {
                operands.push(expect_bool(function, &positional_name(index), value)?);
            }
            let result = if function == Function::And {
                operands.iter().all(|operand| *operand)
            } else {
                operands.iter().any(|operand| *operand)
            };
            Ok(Value::Bool(result))
        }
        Function::Not => Ok(Value::Bool(!arguments.bool(args::VALUE)?)),
        Function::Equal | Function::NotEqual => {
            let equal = values_equal(arguments.value(args::LEFT)?, arguments.value(args::RIGHT)?);
            Ok(Value::Bool(if function == Function::Equal { equal } else { !equal }))
        }
        Function::Greater
        | Function::GreaterOrEqual
        | Function::Less
        | Function::LessOrEqual => {
            let ordering =
                compare(function, arguments.value(args::LEFT)?, arguments.value(args::RIGHT)?)?;
            let result = match function {
                Function::Greater => ordering == Ordering::Greater,
                Function::GreaterOrEqual => ordering != Ordering::Less,
                Function::Less => ordering == Ordering::Less,
                _ => ordering != Ordering::Greater,
            };
            Ok(Value::Bool(result))
        }
        Function::Add | Function::Subtract | Function::Multiply | Function::Divide => {
            arithmetic(function, arguments.value(args::LEFT)?, arguments.value(args::RIGHT)?)
        }
        Function::IsNull => Ok(Value::Bool(arguments.value(args::VALUE)?.is_null())),
        Function::IsInList | Function::IsNotInList => {
            let needle = arguments.value(args::VALUE)?;
            let found = arguments.list(args::LIST)?.iter().any(|item| values_equal(needle, item));
            Ok(Value::Bool(if function == Function::IsInList { found } else { !found }))
        }
        Function::StringContains | Function::StringStartsWith | Function::StringEndsWith => {
            let haystack = arguments.string(args::HAYSTACK)?;
            let needle = arguments.string(args::NEEDLE)?;
            let result = match function {
                Function::StringContains => haystack.contains(needle),
                Function::StringStartsWith => haystack.starts_with(needle),
                _ => haystack.ends_with(needle),
            };
            Ok(Value::Bool(result))
        }
        Function::StringLower => Ok(Value::String(arguments.string(args::VALUE)?.to_lowercase())),
        Function::ParseTimestamp => {
            let raw = arguments.string(args::VALUE)?;
            OffsetDateTime::parse(raw, &Rfc3339).map(Value::Timestamp).map_err(|err| {
                EvaluationError::InvalidArgument {
                    function,
                    argument: args::VALUE.to_string(),
                    reason: err.to_string(),
                }
            })
        }
        Function::TimeAdd => {
            let timestamp = arguments.timestamp(args::TIMESTAMP)?;
            let seconds = arguments.int(args::SECONDS)?;
            timestamp
                .checked_add(Duration::seconds(seconds))
                .map(Value::Timestamp)
                .ok_or(EvaluationError::Overflow {
                    function,
                })
        }
        Function::SecondsBetween => {
            let start = arguments.timestamp(args::START)?;
            let end = arguments.timestamp(args::END)?;
            Ok(Value::Int((end - start).whole_seconds()))
        }
        Function::ScoreComputation => {
            let condition = arguments.bool(args::CONDITION)?;
            let modifier = arguments.int(args::MODIFIER)?;
            let floor = match arguments.optional(args::FLOOR)? {
                Some(value) => expect_int(function, args::FLOOR, value)?,
                None => 0,
            };
            Ok(Value::Score(if condition {
                ScoreComputationResult::triggered(modifier, floor)
            } else {
                ScoreComputationResult::NOT_TRIGGERED
            }))
        }
        Function::Switch => {
            let mut selected = ScoreComputationResult::NOT_TRIGGERED;
            for (index, value) in arguments.positional()?.into_iter().enumerate() {
                let branch = value.as_score().ok_or_else(|| {
                    mismatch_or_null(function, &positional_name(index), "score", value)
                })?;
                if branch.triggered && !selected.triggered {
                    selected = branch;
                }
            }
            Ok(Value::Score(selected))
        }
    }
}

// ============================================================================
// SECTION: Numeric Policy
// ============================================================================

/// Widens an integer for mixed arithmetic.
#[allow(clippy::cast_precision_loss, reason = "Mixed int/float arithmetic is defined on f64.")]
const fn widen(value: i64) -> f64 {
    value as f64
}

/// `2^63`, the first float above every `i64`.
const I64_UPPER_BOUND: f64 = 9_223_372_036_854_775_808.0;

/// Exact ordering of an integer against a float; `None` for NaN.
fn compare_int_float(int: i64, float: f64) -> Option<Ordering> {
    if float.is_nan() {
        return None;
    }
    if float >= I64_UPPER_BOUND {
        return Some(Ordering::Less);
    }
    if float < -I64_UPPER_BOUND {
        return Some(Ordering::Greater);
    }
    let whole = float.trunc();
    #[allow(
        clippy::cast_possible_truncation,
        reason = "`whole` is integral and within i64 range."
    )]
    let whole_int = whole as i64;
    let fraction = if float > whole {
        Ordering::Less
    } else if float < whole {
        Ordering::Greater
    } else {
        Ordering::Equal
    };
    Some(int.cmp(&whole_int).then(fraction))
}

/// Equality under the cross-type policy, applied element-wise to lists.
fn values_equal(left: &Value, right: &Value) -> bool {
    match (left, right) {
        (Value::Int(int), Value::Float(float)) | (Value::Float(float), Value::Int(int)) => {
            compare_int_float(*int, *float) == Some(Ordering::Equal)
        }
        (Value::List(left), Value::List(right)) => {
            left.len() == right.len()
                && left.iter().zip(right).all(|(left, right)| values_equal(left, right))
        }
        _ => left == right,
    }
}

/// Ordering under the cross-type policy.
fn compare(function: Function, left: &Value, right: &Value) -> Result<Ordering, EvaluationError> {
    let ordering = match (left, right) {
        (Value::Null, _) => {
            return Err(EvaluationError::NullValue {
                function,
                argument: args::LEFT.to_string(),
            });
        }
        (_, Value::Null) => {
            return Err(EvaluationError::NullValue {
                function,
                argument: args::RIGHT.to_string(),
            });
        }
        (Value::Int(a), Value::Int(b)) => Some(a.cmp(b)),
        (Value::Float(a), Value::Float(b)) => a.partial_cmp(b),
        (Value::Int(a), Value::Float(b)) => compare_int_float(*a, *b),
        (Value::Float(a), Value::Int(b)) => compare_int_float(*b, *a).map(Ordering::reverse),
        (Value::String(a), Value::String(b)) => Some(a.cmp(b)),
        (Value::Timestamp(a), Value::Timestamp(b)) => Some(a.cmp(b)),
        _ => {
            return Err(EvaluationError::pair_mismatch(
                function,
                "comparable operands of the same type",
                left.kind(),
                right.kind(),
            ));
        }
    };
    ordering.ok_or_else(|| EvaluationError::InvalidArgument {
        function,
        argument: args::LEFT.to_string(),
        reason: "NaN is not ordered".to_string(),
    })
}

/// Numeric operand after type checking.
#[derive(Clone, Copy)]
enum Number {
    /// Integer operand.
    Int(i64),
    /// Float operand.
    Float(f64),
}

impl Number {
    /// Returns the operand as a float.
    const fn as_f64(self) -> f64 {
        match self {
            Self::Int(value) => widen(value),
            Self::Float(value) => value,
        }
    }
}

/// Extracts a numeric operand.
fn number(function: Function, argument: &str, value: &Value) -> Result<Number, EvaluationError> {
    match value {
        Value::Int(value) => Ok(Number::Int(*value)),
        Value::Float(value) => Ok(Number::Float(*value)),
        other => Err(mismatch_or_null(function, argument, "number", other)),
    }
}

/// Applies an arithmetic operator.
fn arithmetic(function: Function, left: &Value, right: &Value) -> Result<Value, EvaluationError> {
    let lhs = number(function, args::LEFT, left)?;
    let rhs = number(function, args::RIGHT, right)?;
    if function == Function::Divide {
        let divisor = rhs.as_f64();
        if divisor == 0.0 {
            return Err(EvaluationError::DivisionByZero);
        }
        return finite(function, lhs.as_f64() / divisor);
    }
    match (lhs, rhs) {
        (Number::Int(a), Number::Int(b)) => {
            let result = match function {
                Function::Add => a.checked_add(b),
                Function::Subtract => a.checked_sub(b),
                _ => a.checked_mul(b),
            };
            result.map(Value::Int).ok_or(EvaluationError::Overflow {
                function,
            })
        }
        _ => {
            let (a, b) = (lhs.as_f64(), rhs.as_f64());
            let result = match function {
                Function::Add => a + b,
                Function::Subtract => a - b,
                _ => a * b,
            };
            finite(function, result)
        }
    }
}

/// Rejects non-finite float results.
fn finite(function: Function, value: f64) -> Result<Value, EvaluationError> {
    if value.is_finite() {
        Ok(Value::Float(value))
    } else {
        Err(EvaluationError::Overflow {
            function,
        })
    }
}
