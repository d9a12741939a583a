// crates/risk-gate-store-sqlite/src/lib.rs
// ============================================================================
// Module: SQLite Scoring Store
// Description: Durable ruleset, score, and index catalog backend using SQLite.
// Purpose: Provide production persistence for the risk gate scoring workflow.
// Dependencies: risk-gate-core, risk-logic, rusqlite
// ============================================================================

//! ## Overview
//! This crate provides [`SqliteScoringStore`], a single `SQLite` database that
//! implements the ruleset store, the score store, and the index catalog of
//! `risk-gate-core`. Every multi-row write runs in one transaction, and rule
//! bodies are decoded through a function registry on load so a database
//! edited out of band fails closed.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod store;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use store::MAX_AST_BYTES;
pub use store::SqliteScoringStore;
pub use store::SqliteStoreConfig;
pub use store::SqliteStoreError;
pub use store::SqliteStoreMode;
pub use store::SqliteSyncMode;
