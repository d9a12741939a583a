// crates/risk-logic/src/lib.rs
// ============================================================================
// Module: Risk Logic Root
// Description: Public API surface for typed expression trees.
// Purpose: Wire together values, functions, registry, wire codec, and evaluator.
// Dependencies: crate::{environment, error, evaluator, function, node, registry, value, wire}
// ============================================================================

//! ## Overview
//! Risk logic is the expression language underneath scenarios and scoring
//! rulesets. Trees are built (or decoded) through a [`FunctionRegistry`],
//! then walked by an [`Evaluator`] against an [`Environment`]. The crate has
//! no knowledge of scenarios, rulesets, or scores.

// ============================================================================
// SECTION: Core Modules
// ============================================================================

pub mod environment;
pub mod error;
pub mod evaluator;
pub mod function;
pub mod node;
pub mod registry;
pub mod value;
pub mod wire;

#[cfg(test)]
mod tests;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use environment::Environment;
pub use environment::EnvironmentError;
pub use environment::LookupKind;
pub use environment::MapEnvironment;
pub use error::EvaluationError;
pub use error::MalformedTree;
pub use evaluator::Evaluator;
pub use evaluator::NodeEvaluation;
pub use function::ArgumentSpec;
pub use function::Function;
pub use function::FunctionDescriptor;
pub use function::args;
pub use node::Node;
pub use registry::FunctionRegistry;
pub use registry::MAX_TREE_DEPTH;
pub use value::ScoreComputationResult;
pub use value::Value;
pub use value::ValueConversionError;
pub use value::ValueKind;
pub use wire::NodeDto;
