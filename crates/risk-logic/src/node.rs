// crates/risk-logic/src/node.rs
// ============================================================================
// Module: Node Tree
// Description: Immutable expression tree of typed function nodes.
// Purpose: Hold validated trees that the evaluator can walk without checks.
// Dependencies: crate::{function, value}
// ============================================================================

//! ## Overview
//! A [`Node`] can only be obtained from a
//! [`FunctionRegistry`](crate::FunctionRegistry), which validates the
//! function's argument shape before handing the node out. Once built a node
//! never changes; children are owned by value so a tree can be cloned into
//! many rules or evaluated concurrently without shared mutable state.
//!
//! Invariants:
//! - `constant` is present if and only if the function is `Constant`.
//! - `named_children` keys exactly satisfy the function's descriptor.
//! - `children` is empty unless the descriptor is variadic.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use crate::function::Function;
use crate::function::FunctionDescriptor;
use crate::value::Value;

// ============================================================================
// SECTION: Node
// ============================================================================

/// Validated node of an expression tree.
#[derive(Debug, Clone, PartialEq)]
pub struct Node {
    /// Function evaluated at this node.
    function: Function,
    /// Literal for `Constant` nodes.
    constant: Option<Value>,
    /// Positional children (variadic functions only).
    children: Vec<Self>,
    /// Named children keyed by argument name.
    named_children: BTreeMap<String, Self>,
    /// Height of the subtree rooted here (a leaf has depth 1).
    depth: usize,
}

impl Node {
    /// Assembles a node from already validated parts.
    pub(crate) fn from_validated(
        function: Function,
        constant: Option<Value>,
        children: Vec<Self>,
        named_children: BTreeMap<String, Self>,
    ) -> Self {
        let deepest_child = children
            .iter()
            .chain(named_children.values())
            .map(Self::depth)
            .max()
            .unwrap_or(0);
        Self {
            function,
            constant,
            children,
            named_children,
            depth: deepest_child + 1,
        }
    }

    /// Returns the node's function.
    #[must_use]
    pub const fn function(&self) -> Function {
        self.function
    }

    /// Returns the node's static descriptor.
    #[must_use]
    pub const fn descriptor(&self) -> &'static FunctionDescriptor {
        self.function.descriptor()
    }

    /// Returns the literal of a `Constant` node.
    #[must_use]
    pub const fn constant(&self) -> Option<&Value> {
        self.constant.as_ref()
    }

    /// Returns the positional children.
    #[must_use]
    pub fn children(&self) -> &[Self] {
        &self.children
    }

    /// Returns the named children.
    #[must_use]
    pub const fn named_children(&self) -> &BTreeMap<String, Self> {
        &self.named_children
    }

    /// Returns a named child by argument name.
    #[must_use]
    pub fn named(&self, argument: &str) -> Option<&Self> {
        self.named_children.get(argument)
    }

    /// Returns the height of this subtree.
    #[must_use]
    pub const fn depth(&self) -> usize {
        self.depth
    }

    /// Visits every node of the subtree in pre-order.
    pub fn walk<'a>(&'a self, visit: &mut impl FnMut(&'a Self)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
        for child in self.named_children.values() {
            child.walk(visit);
        }
    }
}
