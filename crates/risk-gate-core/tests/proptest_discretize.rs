// crates/risk-gate-core/tests/proptest_discretize.rs
// ============================================================================
// Module: Discretization Property Tests
// Description: Bucket bounds and monotonicity of score discretization.
// ============================================================================
//! ## Overview
//! Property tests for [`risk_gate_core::runtime::discretize`].

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

use std::collections::BTreeSet;

use proptest::prelude::*;
use risk_gate_core::runtime::discretize;
use risk_gate_core::runtime::final_score;

/// Strictly ascending threshold lists of up to eight entries.
fn thresholds() -> impl Strategy<Value = Vec<i64>> {
    proptest::collection::btree_set(-1000_i64 .. 1000, 0 .. 8)
        .prop_map(|set: BTreeSet<i64>| set.into_iter().collect())
}

proptest! {
    #[test]
    fn bucket_is_within_bounds(thresholds in thresholds(), modifier in -2000_i64 .. 2000) {
        let bucket = discretize(modifier, &thresholds);
        let max = i64::try_from(thresholds.len()).unwrap() + 1;
        prop_assert!((1 ..= max).contains(&bucket));
    }

    #[test]
    fn bucket_is_monotonic(thresholds in thresholds(), a in -2000_i64 .. 2000, b in -2000_i64 .. 2000) {
        let (low, high) = if a <= b { (a, b) } else { (b, a) };
        prop_assert!(discretize(low, &thresholds) <= discretize(high, &thresholds));
    }

    #[test]
    fn bucket_counts_thresholds_at_or_below_modifier(
        thresholds in thresholds(),
        modifier in -2000_i64 .. 2000,
    ) {
        let passed = thresholds.iter().filter(|threshold| **threshold <= modifier).count();
        prop_assert_eq!(discretize(modifier, &thresholds), i64::try_from(passed).unwrap() + 1);
    }

    #[test]
    fn floor_is_a_lower_bound(
        thresholds in thresholds(),
        modifier in -2000_i64 .. 2000,
        floor in 0_i64 .. 10,
    ) {
        let score = final_score(modifier, floor, &thresholds);
        prop_assert!(score >= floor);
        prop_assert!(score >= discretize(modifier, &thresholds));
    }
}
