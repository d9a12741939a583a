// crates/risk-gate-core/tests/ruleset.rs
// ============================================================================
// Module: Ruleset Workflow Tests
// Description: Draft creation, copy-forward, index preparation, and commit.
// ============================================================================
//! ## Overview
//! Integration tests for [`risk_gate_core::RulesetService`].

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

use std::cell::Cell;
use std::time::Duration;

use risk_gate_core::CreateRulesetRequest;
use risk_gate_core::DefinitionError;
use risk_gate_core::EntityType;
use risk_gate_core::IndexCatalog;
use risk_gate_core::IndexSpec;
use risk_gate_core::IndexState;
use risk_gate_core::InMemoryScoringStore;
use risk_gate_core::InMemoryTaskQueue;
use risk_gate_core::Job;
use risk_gate_core::OrganizationId;
use risk_gate_core::RuleDraft;
use risk_gate_core::RulesetDefinition;
use risk_gate_core::RulesetError;
use risk_gate_core::RulesetService;
use risk_gate_core::RulesetServiceConfig;
use risk_gate_core::RulesetStatus;
use risk_gate_core::ScoreThresholdError;
use risk_gate_core::StableRuleId;
use risk_gate_core::StoreError;
use risk_logic::Function;
use risk_logic::Node;
use support::TestResult;
use support::ensure;
use support::fixed_score;
use support::payload_greater;
use support::registry;
use support::related;
use support::score_computation;

/// Service type wired with in-memory backends.
type Service = RulesetService<InMemoryScoringStore, InMemoryScoringStore, InMemoryTaskQueue>;

/// Builds a service and returns handles on its store and queue.
fn service() -> (Service, InMemoryScoringStore, InMemoryTaskQueue) {
    let store = InMemoryScoringStore::new();
    let queue = InMemoryTaskQueue::new();
    let service =
        RulesetService::new(store.clone(), store.clone(), queue.clone(), RulesetServiceConfig {
            max_thresholds: 4,
        });
    (service, store, queue)
}

/// The organization used by workflow tests.
fn org() -> OrganizationId {
    OrganizationId::new("acme")
}

/// The entity type used by workflow tests.
fn account() -> EntityType {
    EntityType::new("account")
}

/// Rule draft with an explicit id and body.
fn draft(stable_id: Option<&str>, ast: Option<Node>) -> RuleDraft {
    RuleDraft {
        stable_id: stable_id.map(StableRuleId::new),
        name: stable_id.unwrap_or("generated").to_string(),
        description: String::new(),
        ast,
    }
}

/// Request for `acme/account` with the given rules.
fn request(thresholds: Vec<i64>, rules: Vec<RuleDraft>) -> CreateRulesetRequest {
    CreateRulesetRequest {
        organization_id: org(),
        entity_type: account(),
        name: "accounts".to_string(),
        thresholds,
        cooldown: Duration::from_secs(600),
        rules,
    }
}

/// Rule body that reads `companies.country` through the `owner` link.
fn related_rule() -> TestResult<Node> {
    let registry = registry();
    let country = related("companies", "country", &["owner"])?;
    let condition =
        registry.binary(Function::Equal, country, registry.constant("XX")?)?;
    score_computation(condition, 30, None)
}

// ============================================================================
// SECTION: Draft Creation
// ============================================================================

#[test]
fn first_version_is_one_and_next_is_committed_plus_one() -> TestResult {
    let (service, _, _) = service();
    let v1 = service.create_ruleset_version(request(vec![10, 20], vec![draft(
        Some("volume"),
        Some(fixed_score(true, 5, None)?),
    )]))?;
    ensure(v1.version == 1, format!("unexpected version {}", v1.version))?;
    ensure(v1.status == RulesetStatus::Draft, "new versions are drafts")?;
    service.commit_ruleset(&org(), &account())?;

    let v2 = service.create_ruleset_version(request(vec![10, 20], vec![draft(
        Some("volume"),
        Some(fixed_score(true, 7, None)?),
    )]))?;
    ensure(v2.version == 2, format!("unexpected version {}", v2.version))?;
    let committed = service.get_ruleset(&org(), &account(), RulesetStatus::Committed)?;
    ensure(
        committed.map(|ruleset| ruleset.version) == Some(1),
        "committed version must stay at 1 until the draft is committed",
    )
}

#[test]
fn omitted_bodies_are_copied_from_the_committed_rule() -> TestResult {
    let (service, _, _) = service();
    let body = score_computation(payload_greater("volume", 100)?, 15, None)?;
    service.create_ruleset_version(request(vec![10], vec![draft(Some("volume"), Some(body.clone()))]))?;
    service.commit_ruleset(&org(), &account())?;

    let v2 = service.create_ruleset_version(request(vec![10], vec![
        draft(Some("volume"), None),
        draft(None, Some(fixed_score(true, 1, None)?)),
    ]))?;
    ensure(v2.rules.len() == 2, "both rules kept")?;
    ensure(v2.rules[0].ast == body, "body should be copied forward")?;
    ensure(
        v2.rules[1].stable_id.as_str() != "volume" && !v2.rules[1].stable_id.as_str().is_empty(),
        "new rules receive a generated id",
    )
}

#[test]
fn bodyless_rule_without_committed_counterpart_is_rejected() -> TestResult {
    let (service, _, _) = service();
    let result = service.create_ruleset_version(request(vec![10], vec![draft(Some("ghost"), None)]));
    ensure(matches!(result, Err(RulesetError::BadParameter(_))), format!("unexpected {result:?}"))?;
    ensure(service.get_ruleset(&org(), &account(), RulesetStatus::Draft)?.is_none(), "no draft")
}

#[test]
fn invalid_requests_leave_the_draft_untouched() -> TestResult {
    let (service, _, _) = service();
    let original = service.create_ruleset_version(request(vec![10, 20], vec![draft(
        Some("volume"),
        Some(fixed_score(true, 5, None)?),
    )]))?;

    let cases = vec![
        request(vec![20, 10], vec![]),
        request(vec![10, 10], vec![]),
        request(vec![1, 2, 3, 4, 5], vec![]),
        request(vec![10], vec![draft(Some("bad"), Some(payload_greater("volume", 1)?))]),
        request(vec![10], vec![
            draft(Some("dup"), Some(fixed_score(true, 1, None)?)),
            draft(Some("dup"), Some(fixed_score(true, 2, None)?)),
        ]),
    ];
    for case in cases {
        let result = service.create_ruleset_version(case);
        ensure(
            matches!(result, Err(RulesetError::BadParameter(_))),
            format!("expected bad parameter, got {result:?}"),
        )?;
    }
    let draft = service.get_ruleset(&org(), &account(), RulesetStatus::Draft)?;
    ensure(draft == Some(original), "draft must be unchanged after rejected requests")
}

// ============================================================================
// SECTION: Preparation And Commit
// ============================================================================

#[test]
fn prepare_enqueues_missing_indexes_once() -> TestResult {
    let (service, store, queue) = service();
    service.create_ruleset_version(request(vec![10], vec![draft(Some("country"), Some(related_rule()?))]))?;
    let index = IndexSpec::new("companies", "country");

    let first = service.prepare_ruleset(&org(), &account());
    ensure(
        first
            == Err(RulesetError::UnprocessableEntity {
                pending: vec![index.clone()],
            }),
        format!("unexpected result {first:?}"),
    )?;
    let second = service.prepare_ruleset(&org(), &account());
    ensure(matches!(second, Err(RulesetError::UnprocessableEntity { .. })), "still pending")?;
    ensure(
        queue.jobs()
            == vec![Job::CreateIndexes {
                organization_id: org(),
                indexes: vec![index.clone()],
            }],
        format!("unexpected jobs {:?}", queue.jobs()),
    )?;
    ensure(
        store.index_states(&org(), &[index.clone()])? == vec![IndexState::Pending],
        "index should be pending",
    )?;

    store.mark_ready(&org(), &[index.clone()])?;
    let report = service.prepare_ruleset(&org(), &account())?;
    ensure(report.indexes == vec![index], "report lists ready indexes")?;
    ensure(queue.jobs().len() == 1, "no further jobs once ready")
}

#[test]
fn commit_requires_ready_indexes() -> TestResult {
    let (service, store, queue) = service();
    service.create_ruleset_version(request(vec![10], vec![draft(Some("country"), Some(related_rule()?))]))?;
    let result = service.commit_ruleset(&org(), &account());
    ensure(matches!(result, Err(RulesetError::UnprocessableEntity { .. })), format!("{result:?}"))?;
    ensure(queue.jobs().is_empty(), "commit never enqueues index jobs")?;

    store.mark_ready(&org(), &[IndexSpec::new("companies", "country")])?;
    let committed = service.commit_ruleset(&org(), &account())?;
    ensure(committed.status == RulesetStatus::Committed, "status flips to committed")?;
    ensure(
        service.get_ruleset(&org(), &account(), RulesetStatus::Draft)?.is_none(),
        "draft is consumed by commit",
    )
}

#[test]
fn prepare_and_commit_without_draft_fail() -> TestResult {
    let (service, _, _) = service();
    let expected = RulesetError::NoDraft {
        organization_id: org(),
        entity_type: account(),
    };
    ensure(service.prepare_ruleset(&org(), &account()) == Err(expected.clone()), "prepare")?;
    ensure(service.commit_ruleset(&org(), &account()).map(|_| ()) == Err(expected), "commit")
}

#[test]
fn list_returns_drafts_and_committed_rulesets() -> TestResult {
    let (service, _, _) = service();
    service.create_ruleset_version(request(vec![10], vec![draft(
        Some("volume"),
        Some(fixed_score(true, 5, None)?),
    )]))?;
    service.commit_ruleset(&org(), &account())?;
    service.create_ruleset_version(request(vec![10], vec![draft(Some("volume"), None)]))?;
    let listed: Vec<(u32, RulesetStatus)> = service
        .list_rulesets(&org())?
        .into_iter()
        .map(|ruleset| (ruleset.version, ruleset.status))
        .collect();
    ensure(
        listed == vec![(2, RulesetStatus::Draft), (1, RulesetStatus::Committed)],
        format!("unexpected listing {listed:?}"),
    )
}

#[test]
fn failed_pending_mark_is_retried_on_next_prepare() -> TestResult {
    let store = InMemoryScoringStore::new();
    let queue = InMemoryTaskQueue::new();
    let catalog = FlakyCatalog {
        inner: store.clone(),
        failures_left: Cell::new(1),
    };
    let service = RulesetService::new(store.clone(), catalog, queue.clone(), RulesetServiceConfig {
        max_thresholds: 4,
    });
    service.create_ruleset_version(request(vec![10], vec![draft(Some("country"), Some(related_rule()?))]))?;
    let index = IndexSpec::new("companies", "country");

    let first = service.prepare_ruleset(&org(), &account());
    ensure(matches!(first, Err(RulesetError::Store(_))), format!("unexpected result {first:?}"))?;
    ensure(
        store.index_states(&org(), &[index.clone()])? == vec![IndexState::Missing],
        "index stays missing when marking fails",
    )?;

    let second = service.prepare_ruleset(&org(), &account());
    ensure(matches!(second, Err(RulesetError::UnprocessableEntity { .. })), format!("{second:?}"))?;
    ensure(queue.jobs().len() == 2, format!("expected a second job, got {:?}", queue.jobs()))?;
    ensure(
        store.index_states(&org(), &[index])? == vec![IndexState::Pending],
        "index is pending after the retry",
    )
}

/// Catalog whose first `mark_pending` calls fail.
struct FlakyCatalog {
    /// Backing catalog.
    inner: InMemoryScoringStore,
    /// Remaining failing calls.
    failures_left: Cell<u32>,
}

impl IndexCatalog for FlakyCatalog {
    fn index_states(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<Vec<IndexState>, StoreError> {
        self.inner.index_states(organization_id, indexes)
    }

    fn mark_pending(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError> {
        let left = self.failures_left.get();
        if left > 0 {
            self.failures_left.set(left - 1);
            return Err(StoreError::Io("catalog unavailable".to_string()));
        }
        self.inner.mark_pending(organization_id, indexes)
    }

    fn mark_ready(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError> {
        self.inner.mark_ready(organization_id, indexes)
    }
}

// ============================================================================
// SECTION: Definitions
// ============================================================================

/// Ruleset document for `acme/account` with one always-firing rule.
fn definition(thresholds: &[i64]) -> TestResult<RulesetDefinition> {
    let document = serde_json::json!({
        "organization_id": "acme",
        "entity_type": "account",
        "name": "accounts",
        "thresholds": thresholds,
        "rules": [{
            "stable_id": "always",
            "name": "always",
            "ast": risk_logic::NodeDto::from(&fixed_score(true, 25, None)?)
        }]
    });
    Ok(serde_json::from_value(document)?)
}

#[test]
fn definition_build_rejects_unordered_thresholds() -> TestResult {
    let registry = registry();
    let result = definition(&[40, 10, 20, 30])?.build(&registry);
    ensure(
        result
            == Err(DefinitionError::ScoreThresholds(ScoreThresholdError::NotAscending {
                previous: 40,
                next: 10,
            })),
        format!("unexpected result {result:?}"),
    )?;
    let duplicate = definition(&[10, 10])?.build(&registry);
    ensure(
        matches!(duplicate, Err(DefinitionError::ScoreThresholds(_))),
        format!("unexpected result {duplicate:?}"),
    )?;
    let ruleset = definition(&[10, 20, 30])?.build(&registry)?;
    ensure(ruleset.thresholds == vec![10, 20, 30], "valid thresholds are kept")
}

#[test]
fn definition_build_rejects_too_many_thresholds() -> TestResult {
    let thresholds: Vec<i64> = (0 .. 1025).collect();
    let result = definition(&thresholds)?.build(&registry());
    ensure(
        result
            == Err(DefinitionError::ScoreThresholds(ScoreThresholdError::TooMany {
                count: 1025,
                max: 1024,
            })),
        format!("unexpected result {result:?}"),
    )
}
