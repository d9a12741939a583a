// crates/risk-logic/src/registry.rs
// ============================================================================
// Module: Function Registry
// Description: Immutable set of enabled functions and tree construction.
// Purpose: Validate node shape against static descriptors at build time.
// Dependencies: crate::{error, function, node, value}
// ============================================================================

//! ## Overview
//! A [`FunctionRegistry`] is built once, explicitly, and handed to whoever
//! constructs, decodes, or evaluates trees. There is no global table: two
//! registries with different enabled sets can coexist in one process (for
//! example a scenario editor that hides scoring-only functions).
//!
//! Construction rules:
//! - The function must be enabled.
//! - `Constant` requires a literal; every other function forbids one.
//! - Every required named argument is present and no undeclared one is.
//! - Positional children only for variadic functions, at least the minimum.
//! - The resulting tree is no deeper than the registry limit.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::collections::BTreeSet;

use crate::error::MalformedTree;
use crate::function::Function;
use crate::function::FunctionDescriptor;
use crate::function::args;
use crate::node::Node;
use crate::value::Value;

// ============================================================================
// SECTION: Limits
// ============================================================================

/// Default maximum tree depth accepted by construction and evaluation.
pub const MAX_TREE_DEPTH: usize = 64;

// ============================================================================
// SECTION: Registry
// ============================================================================

/// Immutable registry of enabled functions.
///
/// # Invariants
/// - `by_wire_tag` indexes exactly the functions in `enabled`.
/// - `max_depth` is at least 1.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FunctionRegistry {
    /// Functions accepted by this registry.
    enabled: BTreeSet<Function>,
    /// Wire tag index over the enabled functions.
    by_wire_tag: BTreeMap<&'static str, Function>,
    /// Maximum accepted tree depth.
    max_depth: usize,
}

impl FunctionRegistry {
    /// Registry with every function enabled and the default depth limit.
    #[must_use]
    pub fn standard() -> Self {
        Self::with_functions(Function::ALL)
    }

    /// Registry restricted to the given functions.
    #[must_use]
    pub fn with_functions(functions: impl IntoIterator<Item = Function>) -> Self {
        let enabled: BTreeSet<Function> = functions.into_iter().collect();
        let by_wire_tag =
            enabled.iter().map(|function| (function.wire_tag(), *function)).collect();
        Self {
            enabled,
            by_wire_tag,
            max_depth: MAX_TREE_DEPTH,
        }
    }

    /// Returns a copy of the registry with a different depth limit.
    ///
    /// A limit of zero is raised to one.
    #[must_use]
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth.max(1);
        self
    }

    /// Returns the maximum accepted tree depth.
    #[must_use]
    pub const fn max_depth(&self) -> usize {
        self.max_depth
    }

    /// Returns true when the function is enabled.
    #[must_use]
    pub fn contains(&self, function: Function) -> bool {
        self.enabled.contains(&function)
    }

    /// Returns the descriptor of an enabled function.
    #[must_use]
    pub fn descriptor(&self, function: Function) -> Option<&'static FunctionDescriptor> {
        self.contains(function).then(|| function.descriptor())
    }

    /// Iterates over the enabled functions in declaration order.
    pub fn functions(&self) -> impl Iterator<Item = Function> + '_ {
        self.enabled.iter().copied()
    }

    /// Resolves a wire tag to an enabled function.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTree::UnknownWireTag`] when no enabled function
    /// carries the tag.
    pub fn resolve_wire_tag(&self, tag: &str) -> Result<Function, MalformedTree> {
        self.by_wire_tag.get(tag).copied().ok_or_else(|| MalformedTree::UnknownWireTag {
            tag: tag.to_string(),
        })
    }

    // ------------------------------------------------------------------------
    // Construction
    // ------------------------------------------------------------------------

    /// Builds a node after validating it against the function descriptor.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTree`] when any construction rule is violated.
    pub fn build(
        &self,
        function: Function,
        constant: Option<Value>,
        children: Vec<Node>,
        named_children: BTreeMap<String, Node>,
    ) -> Result<Node, MalformedTree> {
        let descriptor = self.descriptor(function).ok_or(MalformedTree::UnknownFunction {
            function,
        })?;
        match (function, constant.is_some()) {
            (Function::Constant, false) => return Err(MalformedTree::MissingConstant),
            (Function::Constant, true) | (_, false) => {}
            (_, true) => return Err(MalformedTree::UnexpectedConstant { function }),
        }
        if constant.as_ref().is_some_and(|value| !finite_literal(value)) {
            return Err(MalformedTree::NonFiniteConstant);
        }
        check_arity(function, descriptor, children.len())?;
        for spec in descriptor.arguments {
            if spec.required && !named_children.contains_key(spec.name) {
                return Err(MalformedTree::MissingArgument {
                    function,
                    argument: spec.name.to_string(),
                });
            }
        }
        if let Some(extra) = named_children.keys().find(|name| descriptor.argument(name).is_none())
        {
            return Err(MalformedTree::UnexpectedArgument {
                function,
                argument: extra.clone(),
            });
        }
        let node = Node::from_validated(function, constant, children, named_children);
        if node.depth() > self.max_depth {
            return Err(MalformedTree::TooDeep {
                max_depth: self.max_depth,
                actual_depth: node.depth(),
            });
        }
        Ok(node)
    }

    /// Builds a `Constant` node.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTree::UnknownFunction`] when `Constant` is disabled.
    pub fn constant(&self, value: impl Into<Value>) -> Result<Node, MalformedTree> {
        self.build(Function::Constant, Some(value.into()), Vec::new(), BTreeMap::new())
    }

    /// Builds a node from named arguments.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTree`] when an argument repeats or the shape is invalid.
    pub fn call<I, K>(&self, function: Function, arguments: I) -> Result<Node, MalformedTree>
    where
        I: IntoIterator<Item = (K, Node)>,
        K: Into<String>,
    {
        let mut named_children = BTreeMap::new();
        for (name, node) in arguments {
            let name = name.into();
            if named_children.contains_key(&name) {
                return Err(MalformedTree::DuplicateArgument {
                    function,
                    argument: name,
                });
            }
            named_children.insert(name, node);
        }
        self.build(function, None, Vec::new(), named_children)
    }

    /// Builds a node from positional children.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTree`] when the function is not variadic or the
    /// arity is too small.
    pub fn variadic(&self, function: Function, children: Vec<Node>) -> Result<Node, MalformedTree> {
        self.build(function, None, children, BTreeMap::new())
    }

    /// Builds a binary operator node from `left` and `right`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTree`] when the function does not take `left`/`right`.
    pub fn binary(&self, function: Function, left: Node, right: Node) -> Result<Node, MalformedTree> {
        self.call(function, [(args::LEFT, left), (args::RIGHT, right)])
    }

    /// Builds a `Payload` lookup of `field`.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTree`] when `Payload` or `Constant` is disabled.
    pub fn payload(&self, field: &str) -> Result<Node, MalformedTree> {
        self.call(Function::Payload, [(args::FIELD_NAME, self.constant(field)?)])
    }
}

impl Default for FunctionRegistry {
    fn default() -> Self {
        Self::standard()
    }
}

/// Returns false when a float in `value`, or in any nested list, is not finite.
fn finite_literal(value: &Value) -> bool {
    match value {
        Value::Float(float) => float.is_finite(),
        Value::List(items) => items.iter().all(finite_literal),
        _ => true,
    }
}

/// Validates the positional child count against the descriptor.
fn check_arity(
    function: Function,
    descriptor: &FunctionDescriptor,
    actual: usize,
) -> Result<(), MalformedTree> {
    match descriptor.variadic {
        Some(min) if actual < min => Err(MalformedTree::Arity {
            function,
            expected: format!("at least {min}"),
            actual,
        }),
        None if actual > 0 => Err(MalformedTree::Arity {
            function,
            expected: "no".to_string(),
            actual,
        }),
        _ => Ok(()),
    }
}
