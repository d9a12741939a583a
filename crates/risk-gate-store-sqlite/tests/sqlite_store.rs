// crates/risk-gate-store-sqlite/tests/sqlite_store.rs
// ============================================================================
// Module: SQLite Store Tests
// Description: Validate SQLite ruleset, score, and index persistence.
// Purpose: Ensure durable, transactional persistence that fails closed.
// Dependencies: risk-gate-store-sqlite, risk-gate-core, risk-logic, rusqlite, tempfile
// ============================================================================

//! ## Overview
//! Conformance tests for the SQLite-backed scoring store, including
//! persistence across instances and corruption written out of band.

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
    reason = "Test-only assertions and helpers are permitted."
)]

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use risk_gate_core::ActorId;
use risk_gate_core::CreateRulesetRequest;
use risk_gate_core::EntityRef;
use risk_gate_core::EntityType;
use risk_gate_core::IndexCatalog;
use risk_gate_core::IndexSpec;
use risk_gate_core::IndexState;
use risk_gate_core::InMemoryTaskQueue;
use risk_gate_core::OrganizationId;
use risk_gate_core::RuleDraft;
use risk_gate_core::RulesetError;
use risk_gate_core::RulesetService;
use risk_gate_core::RulesetServiceConfig;
use risk_gate_core::RulesetStatus;
use risk_gate_core::RulesetStore;
use risk_gate_core::ScoreId;
use risk_gate_core::ScoreSource;
use risk_gate_core::ScoreStore;
use risk_gate_core::ScoringRule;
use risk_gate_core::ScoringRuleset;
use risk_gate_core::ScoringScore;
use risk_gate_core::StableRuleId;
use risk_gate_core::StoreError;
use risk_gate_store_sqlite::SqliteScoringStore;
use risk_gate_store_sqlite::SqliteStoreConfig;
use risk_logic::Function;
use risk_logic::FunctionRegistry;
use risk_logic::Node;
use risk_logic::args;
use tempfile::TempDir;
use time::macros::datetime;

// ============================================================================
// SECTION: Helpers
// ============================================================================

fn store_for(path: &Path) -> SqliteScoringStore {
    let mut config = SqliteStoreConfig::new(path);
    config.busy_timeout_ms = 1_000;
    SqliteScoringStore::new(&config, Arc::new(FunctionRegistry::standard())).expect("store init")
}

fn score_body(modifier: i64) -> Node {
    let registry = FunctionRegistry::standard();
    let condition = registry
        .binary(
            Function::Greater,
            registry.payload("volume").unwrap(),
            registry.constant(100_i64).unwrap(),
        )
        .unwrap();
    registry
        .call(Function::ScoreComputation, [
            (args::CONDITION, condition),
            (args::MODIFIER, registry.constant(modifier).unwrap()),
        ])
        .unwrap()
}

fn draft(version: u32, modifier: i64) -> ScoringRuleset {
    ScoringRuleset {
        organization_id: OrganizationId::new("acme"),
        entity_type: EntityType::new("account"),
        version,
        status: RulesetStatus::Draft,
        name: "accounts".to_string(),
        thresholds: vec![10, 20, 30],
        cooldown: Duration::from_secs(900),
        rules: vec![ScoringRule {
            stable_id: StableRuleId::new("volume"),
            name: "High volume".to_string(),
            description: "volume above 100".to_string(),
            ast: score_body(modifier),
        }],
    }
}

fn org() -> OrganizationId {
    OrganizationId::new("acme")
}

fn account() -> EntityType {
    EntityType::new("account")
}

fn entity() -> EntityRef {
    EntityRef::new("acme", "account", "acc-1")
}

fn score(value: i64, minute: u8) -> ScoringScore {
    ScoringScore {
        score_id: ScoreId::generate(),
        entity: entity(),
        score: value,
        source: ScoreSource::Ruleset,
        ruleset_version: Some(1),
        overridden_by: None,
        stale_at: None,
        created_at: datetime!(2026-03-01 12:00 UTC) + time::Duration::minutes(i64::from(minute)),
        is_current: true,
    }
}

// ============================================================================
// SECTION: Rulesets
// ============================================================================

#[test]
fn sqlite_draft_roundtrip_preserves_rules() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let ruleset = draft(1, 15);
    store.replace_draft(&ruleset).unwrap();
    assert_eq!(store.draft_ruleset(&org(), &account()).unwrap(), Some(ruleset));
    assert!(store.committed_ruleset(&org(), &account()).unwrap().is_none());
}

#[test]
fn sqlite_replace_draft_overwrites_previous_draft() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.replace_draft(&draft(1, 15)).unwrap();
    let mut replacement = draft(1, 40);
    replacement.rules.push(ScoringRule {
        stable_id: StableRuleId::new("second"),
        name: "Second".to_string(),
        description: String::new(),
        ast: score_body(5),
    });
    store.replace_draft(&replacement).unwrap();
    assert_eq!(store.draft_ruleset(&org(), &account()).unwrap(), Some(replacement));
}

#[test]
fn sqlite_commit_replaces_committed_and_consumes_draft() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    store.replace_draft(&draft(1, 15)).unwrap();
    store.commit_draft(&org(), &account()).unwrap();
    store.replace_draft(&draft(2, 25)).unwrap();
    let committed = store.commit_draft(&org(), &account()).unwrap();

    assert_eq!(committed.version, 2);
    assert_eq!(committed.status, RulesetStatus::Committed);
    assert_eq!(store.committed_ruleset(&org(), &account()).unwrap(), Some(committed));
    assert!(store.draft_ruleset(&org(), &account()).unwrap().is_none());
    assert_eq!(store.list_rulesets(&org()).unwrap().len(), 1);
}

#[test]
fn sqlite_commit_without_draft_is_invalid() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let result = store.commit_draft(&org(), &account());
    assert!(matches!(result, Err(StoreError::Invalid(_))));
}

#[test]
fn sqlite_rulesets_persist_across_instances() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("nested").join("store.sqlite");
    {
        let store = store_for(&path);
        store.replace_draft(&draft(1, 15)).unwrap();
        store.commit_draft(&org(), &account()).unwrap();
        store.replace_draft(&draft(2, 20)).unwrap();
    }
    let store = store_for(&path);
    let listed: Vec<(u32, RulesetStatus)> = store
        .list_rulesets(&org())
        .unwrap()
        .into_iter()
        .map(|ruleset| (ruleset.version, ruleset.status))
        .collect();
    assert_eq!(listed, vec![(2, RulesetStatus::Draft), (1, RulesetStatus::Committed)]);
}

#[test]
fn sqlite_detects_malformed_rule_body() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    store.replace_draft(&draft(1, 15)).unwrap();
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection
            .execute(
                "UPDATE scoring_rules SET ast_json = ?1",
                rusqlite::params![r#"{"name":"NoSuchFunction"}"#],
            )
            .unwrap();
    }
    let result = store.draft_ruleset(&org(), &account());
    assert!(matches!(result, Err(StoreError::Corrupt(_))));
}

#[test]
fn sqlite_rejects_unknown_schema_version() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    drop(store_for(&path));
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection.execute("UPDATE store_meta SET version = 99", rusqlite::params![]).unwrap();
    }
    let mut config = SqliteStoreConfig::new(&path);
    config.busy_timeout_ms = 1_000;
    let result = SqliteScoringStore::new(&config, Arc::new(FunctionRegistry::standard()));
    assert!(result.is_err());
}

// ============================================================================
// SECTION: Scores
// ============================================================================

#[test]
fn sqlite_insert_score_demotes_previous_current() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let first = store.insert_score(score(2, 0)).unwrap();
    let mut manual = score(4, 5);
    manual.source = ScoreSource::Override;
    manual.overridden_by = Some(ActorId::new("analyst"));
    manual.stale_at = Some(datetime!(2026-03-02 00:00 UTC));
    let second = store.insert_score(manual).unwrap();

    assert_eq!(store.current_score(&entity()).unwrap(), Some(second.clone()));
    let history = store.score_history(&entity()).unwrap();
    assert_eq!(history.len(), 2);
    assert_eq!(history[0], second);
    assert_eq!(history[1].score_id, first.score_id);
    assert!(!history[1].is_current);
}

#[test]
fn sqlite_missing_entity_has_no_scores() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    assert!(store.current_score(&entity()).unwrap().is_none());
    assert!(store.score_history(&entity()).unwrap().is_empty());
}

#[test]
fn sqlite_detects_corrupt_score_source() {
    let temp = TempDir::new().unwrap();
    let path = temp.path().join("store.sqlite");
    let store = store_for(&path);
    store.insert_score(score(2, 0)).unwrap();
    {
        let connection = rusqlite::Connection::open(&path).unwrap();
        connection.execute("UPDATE scores SET source = 'oracle'", rusqlite::params![]).unwrap();
    }
    assert!(matches!(store.current_score(&entity()), Err(StoreError::Corrupt(_))));
}

// ============================================================================
// SECTION: Index Catalog
// ============================================================================

#[test]
fn sqlite_index_states_follow_pending_then_ready() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let index = IndexSpec::new("companies", "country");
    let other = IndexSpec::new("companies", "name");
    let both = [index.clone(), other.clone()];
    assert_eq!(store.index_states(&org(), &both).unwrap(), vec![
        IndexState::Missing,
        IndexState::Missing
    ]);
    store.mark_ready(&org(), &[other]).unwrap();
    store.mark_pending(&org(), &both).unwrap();
    assert_eq!(store.index_states(&org(), &both).unwrap(), vec![
        IndexState::Pending,
        IndexState::Ready
    ]);
    store.mark_ready(&org(), &[index]).unwrap();
    assert_eq!(store.index_states(&org(), &both).unwrap(), vec![
        IndexState::Ready,
        IndexState::Ready
    ]);
}

#[test]
fn sqlite_backs_the_ruleset_workflow() {
    let temp = TempDir::new().unwrap();
    let store = store_for(&temp.path().join("store.sqlite"));
    let service = RulesetService::new(
        store.clone(),
        store.clone(),
        InMemoryTaskQueue::new(),
        RulesetServiceConfig::default(),
    );
    let request = CreateRulesetRequest {
        organization_id: org(),
        entity_type: account(),
        name: "accounts".to_string(),
        thresholds: vec![10, 20],
        cooldown: Duration::from_secs(60),
        rules: vec![RuleDraft {
            stable_id: Some(StableRuleId::new("volume")),
            name: "High volume".to_string(),
            description: String::new(),
            ast: Some(score_body(15)),
        }],
    };
    service.create_ruleset_version(request).unwrap();
    service.commit_ruleset(&org(), &account()).unwrap();
    let missing = service.prepare_ruleset(&org(), &account());
    assert!(matches!(missing, Err(RulesetError::NoDraft { .. })));
    let committed = store.committed_ruleset(&org(), &account()).unwrap().unwrap();
    assert_eq!(committed.version, 1);
    assert_eq!(committed.rules[0].ast, score_body(15));
}
