// crates/risk-logic/tests/support/mod.rs
// ============================================================================
// Module: Test Support
// Description: Shared helpers for risk-logic integration tests.
// ============================================================================
//! ## Overview
//! Result-based assertions plus tree-building shortcuts over the standard
//! registry.

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
    dead_code,
    reason = "Test-only helpers; not every test binary uses every helper."
)]

use std::error::Error;
use std::fmt;
use std::sync::Arc;

use risk_logic::Environment;
use risk_logic::Evaluator;
use risk_logic::FunctionRegistry;
use risk_logic::Node;
use risk_logic::NodeEvaluation;

// ========================================================================
// Test Result Helpers
// ========================================================================

/// Standard result type used across risk-logic integration tests.
pub type TestResult<T = ()> = Result<T, Box<dyn Error>>;

/// Assertion failure raised by [`ensure`].
#[derive(Debug)]
struct TestError {
    /// Failure message.
    message: String,
}

impl fmt::Display for TestError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(&self.message)
    }
}

impl Error for TestError {}

/// Returns an error when a test condition fails.
///
/// # Errors
/// Returns a `TestError` when the condition is false.
pub fn ensure(condition: bool, message: impl Into<String>) -> TestResult {
    if condition {
        Ok(())
    } else {
        Err(Box::new(TestError {
            message: message.into(),
        }))
    }
}

// ========================================================================
// Tree Helpers
// ========================================================================

/// Registry with every function enabled.
pub fn registry() -> FunctionRegistry {
    FunctionRegistry::standard()
}

/// Evaluates a tree with an evaluator over the standard registry.
pub fn evaluate(node: &Node, env: &dyn Environment) -> NodeEvaluation {
    Evaluator::new(Arc::new(registry())).evaluate(node, env)
}
