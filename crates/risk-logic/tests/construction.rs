// crates/risk-logic/tests/construction.rs
// ============================================================================
// Module: Node Construction Tests
// Description: Registry validation of argument shape, arity, and depth.
// ============================================================================
//! ## Overview
//! Integration tests for building trees through the function registry.

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

mod support;

use std::collections::BTreeMap;

use risk_logic::Function;
use risk_logic::FunctionRegistry;
use risk_logic::MalformedTree;
use risk_logic::Value;
use risk_logic::args;
use support::TestResult;
use support::ensure;
use support::registry;

// ============================================================================
// SECTION: Named Arguments
// ============================================================================

#[test]
fn binary_operator_requires_both_operands() -> TestResult {
    let registry = registry();
    let left = registry.constant(1_i64)?;
    let result = registry.call(Function::Greater, [(args::LEFT, left)]);
    ensure(
        result
            == Err(MalformedTree::MissingArgument {
                function: Function::Greater,
                argument: args::RIGHT.to_string(),
            }),
        format!("expected missing right operand, got {result:?}"),
    )
}

#[test]
fn undeclared_argument_is_rejected() -> TestResult {
    let registry = registry();
    let result = registry.call(
        Function::Not,
        [(args::VALUE, registry.constant(true)?), ("extra", registry.constant(false)?)],
    );
    ensure(
        result
            == Err(MalformedTree::UnexpectedArgument {
                function: Function::Not,
                argument: "extra".to_string(),
            }),
        format!("expected unexpected argument, got {result:?}"),
    )
}

#[test]
fn repeated_argument_is_rejected() -> TestResult {
    let registry = registry();
    let result = registry.call(
        Function::Not,
        [(args::VALUE, registry.constant(true)?), (args::VALUE, registry.constant(false)?)],
    );
    ensure(
        matches!(result, Err(MalformedTree::DuplicateArgument { .. })),
        format!("expected duplicate argument, got {result:?}"),
    )
}

#[test]
fn optional_floor_may_be_omitted_or_supplied() -> TestResult {
    let registry = registry();
    let without_floor = registry.call(
        Function::ScoreComputation,
        [(args::CONDITION, registry.constant(true)?), (args::MODIFIER, registry.constant(5_i64)?)],
    )?;
    ensure(without_floor.named(args::FLOOR).is_none(), "floor should be absent")?;
    let with_floor = registry.call(
        Function::ScoreComputation,
        [
            (args::CONDITION, registry.constant(true)?),
            (args::MODIFIER, registry.constant(5_i64)?),
            (args::FLOOR, registry.constant(3_i64)?),
        ],
    )?;
    ensure(with_floor.named(args::FLOOR).is_some(), "floor should be present")
}

// ============================================================================
// SECTION: Positional Children
// ============================================================================

#[test]
fn and_requires_at_least_one_child() -> TestResult {
    let result = registry().variadic(Function::And, Vec::new());
    ensure(
        matches!(result, Err(MalformedTree::Arity { function: Function::And, actual: 0, .. })),
        format!("expected arity error, got {result:?}"),
    )
}

#[test]
fn switch_accepts_zero_children_at_construction() -> TestResult {
    let node = registry().variadic(Function::Switch, Vec::new())?;
    ensure(node.children().is_empty(), "switch should have no children")
}

#[test]
fn non_variadic_function_rejects_positional_children() -> TestResult {
    let registry = registry();
    let result = registry.build(
        Function::Not,
        None,
        vec![registry.constant(true)?],
        BTreeMap::from([(args::VALUE.to_string(), registry.constant(true)?)]),
    );
    ensure(
        matches!(result, Err(MalformedTree::Arity { function: Function::Not, actual: 1, .. })),
        format!("expected arity error, got {result:?}"),
    )
}

// ============================================================================
// SECTION: Constants
// ============================================================================

#[test]
fn constant_requires_literal() -> TestResult {
    let result = registry().build(Function::Constant, None, Vec::new(), BTreeMap::new());
    ensure(
        result == Err(MalformedTree::MissingConstant),
        format!("expected missing constant, got {result:?}"),
    )
}

#[test]
fn literal_on_non_constant_is_rejected() -> TestResult {
    let registry = registry();
    let result = registry.build(
        Function::Not,
        Some(Value::Bool(true)),
        Vec::new(),
        BTreeMap::from([(args::VALUE.to_string(), registry.constant(true)?)]),
    );
    ensure(
        result
            == Err(MalformedTree::UnexpectedConstant {
                function: Function::Not,
            }),
        format!("expected unexpected constant, got {result:?}"),
    )
}

// ============================================================================
// SECTION: Registry Scope
// ============================================================================

#[test]
fn disabled_function_cannot_be_built() -> TestResult {
    let registry = FunctionRegistry::with_functions([Function::Constant, Function::Not]);
    let left = registry.constant(1_i64)?;
    let right = registry.constant(2_i64)?;
    let result = registry.binary(Function::Add, left, right);
    ensure(
        result
            == Err(MalformedTree::UnknownFunction {
                function: Function::Add,
            }),
        format!("expected unknown function, got {result:?}"),
    )
}

#[test]
fn wire_tags_resolve_only_enabled_functions() -> TestResult {
    let standard = registry();
    ensure(standard.resolve_wire_tag("≥")? == Function::GreaterOrEqual, "≥ should resolve")?;
    let restricted = FunctionRegistry::with_functions([Function::Constant]);
    ensure(restricted.resolve_wire_tag("≥").is_err(), "disabled tag should not resolve")
}

#[test]
fn depth_limit_is_enforced_at_construction() -> TestResult {
    let registry = FunctionRegistry::standard().with_max_depth(3);
    let leaf = registry.constant(true)?;
    let one = registry.call(Function::Not, [(args::VALUE, leaf)])?;
    let two = registry.call(Function::Not, [(args::VALUE, one)])?;
    ensure(two.depth() == 3, format!("unexpected depth {}", two.depth()))?;
    let result = registry.call(Function::Not, [(args::VALUE, two)]);
    ensure(
        result
            == Err(MalformedTree::TooDeep {
                max_depth: 3,
                actual_depth: 4,
            }),
        format!("expected too deep, got {result:?}"),
    )
}

#[test]
fn walk_visits_every_node() -> TestResult {
    let registry = registry();
    let tree = registry.variadic(
        Function::Or,
        vec![
            registry.binary(Function::Equal, registry.payload("country")?, registry.constant("FR")?)?,
            registry.constant(false)?,
        ],
    )?;
    let mut visited = Vec::new();
    tree.walk(&mut |node| visited.push(node.function()));
    ensure(
        visited
            == vec![
                Function::Or,
                Function::Equal,
                Function::Payload,
                Function::Constant,
                Function::Constant,
                Function::Constant,
            ],
        format!("unexpected walk order {visited:?}"),
    )
}
