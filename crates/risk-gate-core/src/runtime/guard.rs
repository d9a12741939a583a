// crates/risk-gate-core/src/runtime/guard.rs
// ============================================================================
// Module: Fault Guard
// Description: Converts panics at evaluation boundaries into errors.
// Purpose: Keep one faulty tree from taking down the calling service.
// Dependencies: std::panic
// ============================================================================

//! ## Overview
//! Scenario and ruleset executions run inside [`guarded`]. Any panic raised
//! below that point is caught once and reported as a message; callers turn
//! it into their `InternalEvaluationFailure` variant and log it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::any::Any;
use std::panic::AssertUnwindSafe;
use std::panic::catch_unwind;

// ============================================================================
// SECTION: Guard
// ============================================================================

/// Runs `operation`, converting a panic into its message.
pub(crate) fn guarded<T>(operation: impl FnOnce() -> T) -> Result<T, String> {
    catch_unwind(AssertUnwindSafe(operation)).map_err(|payload| panic_message(payload.as_ref()))
}

/// Extracts a readable message from a panic payload.
fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = payload.downcast_ref::<String>() {
        message.clone()
    } else {
        "non-string panic payload".to_string()
    }
}
