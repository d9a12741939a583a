// crates/risk-logic/src/wire.rs
// ============================================================================
// Module: Node Wire Representation
// Description: Serializable mirror of the node tree keyed by wire tags.
// Purpose: Persist and exchange trees without bypassing construction checks.
// Dependencies: serde, crate::{registry, node, value}
// ============================================================================

//! ## Overview
//! [`NodeDto`] is the only serialized form of a tree. Encoding is infallible;
//! decoding goes through [`FunctionRegistry::decode`], which applies the same
//! validation as programmatic construction plus an early depth check so a
//! hostile document cannot force unbounded recursion.
//! Security posture: decoded documents are untrusted and fail closed.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;

use serde::Deserialize;
use serde::Serialize;

use crate::error::MalformedTree;
use crate::node::Node;
use crate::registry::FunctionRegistry;
use crate::value::Value;

// ============================================================================
// SECTION: Wire Node
// ============================================================================

/// Serialized node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NodeDto {
    /// Wire tag of the node's function.
    pub name: String,
    /// Literal for constant nodes.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub constant: Option<Value>,
    /// Positional children.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<Self>,
    /// Named children keyed by argument name.
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub named_children: BTreeMap<String, Self>,
}

impl From<&Node> for NodeDto {
    fn from(node: &Node) -> Self {
        Self {
            name: node.function().wire_tag().to_string(),
            constant: node.constant().cloned(),
            children: node.children().iter().map(Self::from).collect(),
            named_children: node
                .named_children()
                .iter()
                .map(|(name, child)| (name.clone(), Self::from(child)))
                .collect(),
        }
    }
}

// ============================================================================
// SECTION: Decoding
// ============================================================================

impl FunctionRegistry {
    /// Decodes a wire node into a validated tree.
    ///
    /// # Errors
    ///
    /// Returns [`MalformedTree`] for unknown tags, shape violations, or trees
    /// deeper than the registry limit.
    pub fn decode(&self, dto: &NodeDto) -> Result<Node, MalformedTree> {
        self.decode_at(dto, 1)
    }

    /// Decodes `dto` located at `level` (the root is level 1).
    fn decode_at(&self, dto: &NodeDto, level: usize) -> Result<Node, MalformedTree> {
        if level > self.max_depth() {
            return Err(MalformedTree::TooDeep {
                max_depth: self.max_depth(),
                actual_depth: level,
            });
        }
        let function = self.resolve_wire_tag(&dto.name)?;
        let children = dto
            .children
            .iter()
            .map(|child| self.decode_at(child, level + 1))
            .collect::<Result<Vec<_>, _>>()?;
        let named_children = dto
            .named_children
            .iter()
            .map(|(name, child)| Ok((name.clone(), self.decode_at(child, level + 1)?)))
            .collect::<Result<BTreeMap<_, _>, MalformedTree>>()?;
        self.build(function, dto.constant.clone(), children, named_children)
    }
}
