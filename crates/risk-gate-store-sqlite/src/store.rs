// crates/risk-gate-store-sqlite/src/store.rs
// ============================================================================
// Module: SQLite Scoring Store
// Description: Durable RulesetStore, ScoreStore, and IndexCatalog on SQLite.
// Purpose: Persist rulesets, score history, and index states transactionally.
// Dependencies: risk-gate-core, risk-logic, rusqlite, serde, serde_json, thiserror, time
// ============================================================================

//! ## Overview
//! Tables:
//! - `rulesets`: one header row per (organization, entity type, status);
//! - `scoring_rules`: ordered rule rows of each ruleset, bodies as wire JSON;
//! - `scores`: append-only score history with at most one current row per
//!   entity, enforced by a partial unique index;
//! - `indexes`: requested and ready related-record indexes.
//!
//! Draft replacement, commit, and score insertion each run in a single
//! transaction. Loads validate every column and decode rule bodies through
//! the configured [`FunctionRegistry`], failing closed on corruption.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::path::Path;
use std::path::PathBuf;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::MutexGuard;
use std::time::Duration;

use risk_gate_core::ActorId;
use risk_gate_core::EntityRef;
use risk_gate_core::EntityType;
use risk_gate_core::IndexCatalog;
use risk_gate_core::IndexSpec;
use risk_gate_core::IndexState;
use risk_gate_core::OrganizationId;
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
use risk_logic::FunctionRegistry;
use risk_logic::NodeDto;
use rusqlite::Connection;
use rusqlite::OpenFlags;
use rusqlite::OptionalExtension;
use rusqlite::Row;
use rusqlite::params;
use serde::Deserialize;
use thiserror::Error;
use time::OffsetDateTime;
use time::format_description::well_known::Rfc3339;

// ============================================================================
// SECTION: Constants
// ============================================================================

/// `SQLite` schema version for the store.
const SCHEMA_VERSION: i64 = 1;
/// Default busy timeout (ms).
const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;
/// Maximum length of a single path component.
const MAX_PATH_COMPONENT_LENGTH: usize = 255;
/// Maximum total path length.
const MAX_TOTAL_PATH_LENGTH: usize = 4096;
/// Maximum serialized rule body size accepted by the store.
pub const MAX_AST_BYTES: usize = 1024 * 1024;
/// Columns selected for score rows, in [`score_from_row`] order.
const SCORE_COLUMNS: &str = "score_id, organization_id, entity_type, entity_id, score, source, \
                             ruleset_version, overridden_by, stale_at, created_at, is_current";

// ============================================================================
// SECTION: Config
// ============================================================================

/// `SQLite` journal mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteStoreMode {
    /// WAL journal mode (recommended).
    #[default]
    Wal,
    /// Delete journal mode.
    Delete,
}

impl SqliteStoreMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Wal => "wal",
            Self::Delete => "delete",
        }
    }
}

/// `SQLite` sync mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SqliteSyncMode {
    /// Full synchronous mode.
    #[default]
    Full,
    /// Normal synchronous mode.
    Normal,
}

impl SqliteSyncMode {
    /// Returns the `SQLite` pragma value.
    #[must_use]
    pub const fn pragma_value(self) -> &'static str {
        match self {
            Self::Full => "full",
            Self::Normal => "normal",
        }
    }
}

/// Configuration for the `SQLite` scoring store.
#[derive(Debug, Clone, Deserialize)]
pub struct SqliteStoreConfig {
    /// Path to the `SQLite` database file.
    pub path: PathBuf,
    /// Busy timeout in milliseconds.
    #[serde(default = "default_busy_timeout_ms")]
    pub busy_timeout_ms: u64,
    /// `SQLite` journal mode.
    #[serde(default)]
    pub journal_mode: SqliteStoreMode,
    /// `SQLite` sync mode.
    #[serde(default)]
    pub sync_mode: SqliteSyncMode,
}

impl SqliteStoreConfig {
    /// Creates a config with default pragmas for `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            busy_timeout_ms: DEFAULT_BUSY_TIMEOUT_MS,
            journal_mode: SqliteStoreMode::default(),
            sync_mode: SqliteSyncMode::default(),
        }
    }
}

/// Returns the default busy timeout for `SQLite` connections.
const fn default_busy_timeout_ms() -> u64 {
    DEFAULT_BUSY_TIMEOUT_MS
}

// ============================================================================
// SECTION: Errors
// ============================================================================

/// `SQLite` store errors.
#[derive(Debug, Error)]
pub enum SqliteStoreError {
    /// Store I/O error.
    #[error("sqlite store io error: {0}")]
    Io(String),
    /// `SQLite` engine error.
    #[error("sqlite store db error: {0}")]
    Db(String),
    /// Stored data failed validation or decoding.
    #[error("sqlite store corruption: {0}")]
    Corrupt(String),
    /// Store schema version mismatch.
    #[error("sqlite store version mismatch: {0}")]
    VersionMismatch(String),
    /// Request is invalid for the store.
    #[error("sqlite store invalid data: {0}")]
    Invalid(String),
    /// Stored payload exceeded size limits.
    #[error("sqlite store payload too large: {actual_bytes} bytes (max {max_bytes})")]
    TooLarge {
        /// Maximum allowed bytes.
        max_bytes: usize,
        /// Actual payload size in bytes.
        actual_bytes: usize,
    },
}

impl From<SqliteStoreError> for StoreError {
    fn from(error: SqliteStoreError) -> Self {
        match error {
            SqliteStoreError::Io(message) => Self::Io(message),
            SqliteStoreError::Db(message) => Self::Store(message),
            SqliteStoreError::Corrupt(message) | SqliteStoreError::VersionMismatch(message) => {
                Self::Corrupt(message)
            }
            SqliteStoreError::Invalid(message) => Self::Invalid(message),
            SqliteStoreError::TooLarge {
                max_bytes,
                actual_bytes,
            } => Self::Corrupt(format!(
                "rule body exceeds size limit: {actual_bytes} bytes (max {max_bytes})"
            )),
        }
    }
}

/// Wraps a `SQLite` engine error.
#[allow(clippy::needless_pass_by_value, reason = "Used directly as a map_err adapter.")]
fn db_error(err: rusqlite::Error) -> SqliteStoreError {
    SqliteStoreError::Db(err.to_string())
}

// ============================================================================
// SECTION: Store
// ============================================================================

/// `SQLite`-backed ruleset store, score store, and index catalog.
#[derive(Clone)]
pub struct SqliteScoringStore {
    /// Registry used to decode stored rule bodies.
    registry: Arc<FunctionRegistry>,
    /// Shared `SQLite` connection guarded by a mutex.
    connection: Arc<Mutex<Connection>>,
}

impl SqliteScoringStore {
    /// Opens an `SQLite`-backed scoring store.
    ///
    /// # Errors
    ///
    /// Returns [`SqliteStoreError`] when the database cannot be opened or
    /// initialized.
    pub fn new(
        config: &SqliteStoreConfig,
        registry: Arc<FunctionRegistry>,
    ) -> Result<Self, SqliteStoreError> {
        validate_store_path(&config.path)?;
        ensure_parent_dir(&config.path)?;
        let mut connection = open_connection(config)?;
        initialize_schema(&mut connection)?;
        Ok(Self {
            registry,
            connection: Arc::new(Mutex::new(connection)),
        })
    }

    /// Locks the shared connection.
    fn lock(&self) -> Result<MutexGuard<'_, Connection>, SqliteStoreError> {
        self.connection.lock().map_err(|_| SqliteStoreError::Db("mutex poisoned".to_string()))
    }

    /// Loads one ruleset slot.
    fn load_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
        status: RulesetStatus,
    ) -> Result<Option<ScoringRuleset>, SqliteStoreError> {
        let guard = self.lock()?;
        let ruleset = read_ruleset(&guard, &self.registry, organization_id, entity_type, status)?;
        drop(guard);
        Ok(ruleset)
    }

    /// Lists every ruleset of an organization.
    fn list_all(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ScoringRuleset>, SqliteStoreError> {
        let guard = self.lock()?;
        let slots = {
            let mut statement = guard
                .prepare(
                    "SELECT entity_type, status FROM rulesets WHERE organization_id = ?1 ORDER BY \
                     entity_type, CASE status WHEN 'draft' THEN 0 ELSE 1 END",
                )
                .map_err(db_error)?;
            let rows = statement
                .query_map(params![organization_id.as_str()], |row| {
                    Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?))
                })
                .map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
        };
        let mut rulesets = Vec::with_capacity(slots.len());
        for (entity_type, status) in slots {
            let entity_type = EntityType::new(entity_type);
            let status = parse_status(&status)?;
            if let Some(ruleset) =
                read_ruleset(&guard, &self.registry, organization_id, &entity_type, status)?
            {
                rulesets.push(ruleset);
            }
        }
        drop(guard);
        Ok(rulesets)
    }

    /// Replaces the draft header and rules in one transaction.
    fn write_draft(&self, ruleset: &ScoringRuleset) -> Result<(), SqliteStoreError> {
        if ruleset.status != RulesetStatus::Draft {
            return Err(SqliteStoreError::Invalid(
                "only draft rulesets can be replaced".to_string(),
            ));
        }
        let thresholds = serde_json::to_string(&ruleset.thresholds)
            .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
        let cooldown = i64::try_from(ruleset.cooldown.as_secs())
            .map_err(|_| SqliteStoreError::Invalid("cooldown too large".to_string()))?;
        let mut bodies = Vec::with_capacity(ruleset.rules.len());
        for rule in &ruleset.rules {
            let body = serde_json::to_string(&NodeDto::from(&rule.ast))
                .map_err(|err| SqliteStoreError::Invalid(err.to_string()))?;
            if body.len() > MAX_AST_BYTES {
                return Err(SqliteStoreError::Invalid(format!(
                    "rule {} body exceeds size limit: {} bytes (max {MAX_AST_BYTES})",
                    rule.stable_id,
                    body.len()
                )));
            }
            bodies.push(body);
        }

        let org = ruleset.organization_id.as_str();
        let entity_type = ruleset.entity_type.as_str();
        let draft = RulesetStatus::Draft.as_str();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        delete_slot(&tx, org, entity_type, draft)?;
        tx.execute(
            "INSERT INTO rulesets (organization_id, entity_type, status, version, name, \
             thresholds_json, cooldown_seconds) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                org,
                entity_type,
                draft,
                i64::from(ruleset.version),
                ruleset.name,
                thresholds,
                cooldown
            ],
        )
        .map_err(db_error)?;
        for (position, (rule, body)) in ruleset.rules.iter().zip(&bodies).enumerate() {
            let position = i64::try_from(position)
                .map_err(|_| SqliteStoreError::Invalid("too many rules".to_string()))?;
            tx.execute(
                "INSERT INTO scoring_rules (organization_id, entity_type, status, position, \
                 stable_id, name, description, ast_json) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    org,
                    entity_type,
                    draft,
                    position,
                    rule.stable_id.as_str(),
                    rule.name,
                    rule.description,
                    body
                ],
            )
            .map_err(db_error)?;
        }
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }

    /// Promotes the draft to committed in one transaction.
    fn promote_draft(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<ScoringRuleset, SqliteStoreError> {
        let org = organization_id.as_str();
        let et = entity_type.as_str();
        let draft = RulesetStatus::Draft.as_str();
        let committed = RulesetStatus::Committed.as_str();
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        let exists: Option<i64> = tx
            .query_row(
                "SELECT version FROM rulesets WHERE organization_id = ?1 AND entity_type = ?2 \
                 AND status = ?3",
                params![org, et, draft],
                |row| row.get(0),
            )
            .optional()
            .map_err(db_error)?;
        if exists.is_none() {
            return Err(SqliteStoreError::Invalid(format!(
                "no draft ruleset for {organization_id}/{entity_type}"
            )));
        }
        delete_slot(&tx, org, et, committed)?;
        tx.execute(
            "UPDATE rulesets SET status = ?3 WHERE organization_id = ?1 AND entity_type = ?2 AND \
             status = ?4",
            params![org, et, committed, draft],
        )
        .map_err(db_error)?;
        tx.execute(
            "UPDATE scoring_rules SET status = ?3 WHERE organization_id = ?1 AND entity_type = ?2 \
             AND status = ?4",
            params![org, et, committed, draft],
        )
        .map_err(db_error)?;
        let ruleset = read_ruleset(
            &tx,
            &self.registry,
            organization_id,
            entity_type,
            RulesetStatus::Committed,
        )?
        .ok_or_else(|| SqliteStoreError::Corrupt("committed ruleset vanished".to_string()))?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(ruleset)
    }

    /// Loads the current score row of an entity.
    fn load_current(&self, entity: &EntityRef) -> Result<Option<ScoringScore>, SqliteStoreError> {
        let guard = self.lock()?;
        let raw = guard
            .query_row(
                &format!(
                    "SELECT {SCORE_COLUMNS} FROM scores WHERE organization_id = ?1 AND \
                     entity_type = ?2 AND entity_id = ?3 AND is_current = 1"
                ),
                params![
                    entity.organization_id.as_str(),
                    entity.entity_type.as_str(),
                    entity.entity_id.as_str()
                ],
                RawScore::from_row,
            )
            .optional()
            .map_err(db_error)?;
        drop(guard);
        raw.map(score_from_row).transpose()
    }

    /// Loads every score row of an entity, newest first.
    fn load_history(&self, entity: &EntityRef) -> Result<Vec<ScoringScore>, SqliteStoreError> {
        let guard = self.lock()?;
        let raws = {
            let mut statement = guard
                .prepare(&format!(
                    "SELECT {SCORE_COLUMNS} FROM scores WHERE organization_id = ?1 AND \
                     entity_type = ?2 AND entity_id = ?3 ORDER BY seq DESC"
                ))
                .map_err(db_error)?;
            let rows = statement
                .query_map(
                    params![
                        entity.organization_id.as_str(),
                        entity.entity_type.as_str(),
                        entity.entity_id.as_str()
                    ],
                    RawScore::from_row,
                )
                .map_err(db_error)?;
            rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
        };
        drop(guard);
        raws.into_iter().map(score_from_row).collect()
    }

    /// Demotes the current score and inserts the new one in one transaction.
    fn write_score(&self, score: ScoringScore) -> Result<ScoringScore, SqliteStoreError> {
        let mut stored = score;
        stored.is_current = true;
        let stale_at = stored.stale_at.map(format_timestamp).transpose()?;
        let created_at = format_timestamp(stored.created_at)?;
        let entity = &stored.entity;
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        tx.execute(
            "UPDATE scores SET is_current = 0 WHERE organization_id = ?1 AND entity_type = ?2 AND \
             entity_id = ?3 AND is_current = 1",
            params![
                entity.organization_id.as_str(),
                entity.entity_type.as_str(),
                entity.entity_id.as_str()
            ],
        )
        .map_err(db_error)?;
        tx.execute(
            "INSERT INTO scores (score_id, organization_id, entity_type, entity_id, score, \
             source, ruleset_version, overridden_by, stale_at, created_at, is_current) VALUES \
             (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, 1)",
            params![
                stored.score_id.as_str(),
                entity.organization_id.as_str(),
                entity.entity_type.as_str(),
                entity.entity_id.as_str(),
                stored.score,
                stored.source.as_str(),
                stored.ruleset_version.map(i64::from),
                stored.overridden_by.as_ref().map(ActorId::as_str),
                stale_at,
                created_at
            ],
        )
        .map_err(db_error)?;
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(stored)
    }

    /// Reads the state of each index.
    fn read_index_states(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<Vec<IndexState>, SqliteStoreError> {
        let guard = self.lock()?;
        let mut states = Vec::with_capacity(indexes.len());
        for index in indexes {
            let state: Option<String> = guard
                .query_row(
                    "SELECT state FROM indexes WHERE organization_id = ?1 AND table_name = ?2 AND \
                     field_name = ?3",
                    params![organization_id.as_str(), index.table, index.field],
                    |row| row.get(0),
                )
                .optional()
                .map_err(db_error)?;
            states.push(match state.as_deref() {
                None => IndexState::Missing,
                Some("pending") => IndexState::Pending,
                Some("ready") => IndexState::Ready,
                Some(other) => {
                    return Err(SqliteStoreError::Corrupt(format!("unknown index state: {other}")));
                }
            });
        }
        drop(guard);
        Ok(states)
    }

    /// Records index states; `overwrite` decides whether existing rows change.
    fn write_index_states(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
        state: &str,
        overwrite: bool,
    ) -> Result<(), SqliteStoreError> {
        let sql = if overwrite {
            "INSERT INTO indexes (organization_id, table_name, field_name, state) VALUES (?1, ?2, \
             ?3, ?4) ON CONFLICT(organization_id, table_name, field_name) DO UPDATE SET state = \
             excluded.state"
        } else {
            "INSERT OR IGNORE INTO indexes (organization_id, table_name, field_name, state) \
             VALUES (?1, ?2, ?3, ?4)"
        };
        let mut guard = self.lock()?;
        let tx = guard.transaction().map_err(db_error)?;
        for index in indexes {
            tx.execute(sql, params![organization_id.as_str(), index.table, index.field, state])
                .map_err(db_error)?;
        }
        tx.commit().map_err(db_error)?;
        drop(guard);
        Ok(())
    }
}

impl RulesetStore for SqliteScoringStore {
    fn committed_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<Option<ScoringRuleset>, StoreError> {
        self.load_ruleset(organization_id, entity_type, RulesetStatus::Committed)
            .map_err(StoreError::from)
    }

    fn draft_ruleset(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<Option<ScoringRuleset>, StoreError> {
        self.load_ruleset(organization_id, entity_type, RulesetStatus::Draft)
            .map_err(StoreError::from)
    }

    fn list_rulesets(
        &self,
        organization_id: &OrganizationId,
    ) -> Result<Vec<ScoringRuleset>, StoreError> {
        self.list_all(organization_id).map_err(StoreError::from)
    }

    fn replace_draft(&self, ruleset: &ScoringRuleset) -> Result<(), StoreError> {
        self.write_draft(ruleset).map_err(StoreError::from)
    }

    fn commit_draft(
        &self,
        organization_id: &OrganizationId,
        entity_type: &EntityType,
    ) -> Result<ScoringRuleset, StoreError> {
        self.promote_draft(organization_id, entity_type).map_err(StoreError::from)
    }
}

impl ScoreStore for SqliteScoringStore {
    fn current_score(&self, entity: &EntityRef) -> Result<Option<ScoringScore>, StoreError> {
        self.load_current(entity).map_err(StoreError::from)
    }

    fn score_history(&self, entity: &EntityRef) -> Result<Vec<ScoringScore>, StoreError> {
        self.load_history(entity).map_err(StoreError::from)
    }

    fn insert_score(&self, score: ScoringScore) -> Result<ScoringScore, StoreError> {
        self.write_score(score).map_err(StoreError::from)
    }
}

impl IndexCatalog for SqliteScoringStore {
    fn index_states(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<Vec<IndexState>, StoreError> {
        self.read_index_states(organization_id, indexes).map_err(StoreError::from)
    }

    fn mark_pending(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError> {
        self.write_index_states(organization_id, indexes, "pending", false)
            .map_err(StoreError::from)
    }

    fn mark_ready(
        &self,
        organization_id: &OrganizationId,
        indexes: &[IndexSpec],
    ) -> Result<(), StoreError> {
        self.write_index_states(organization_id, indexes, "ready", true).map_err(StoreError::from)
    }
}

// ============================================================================
// SECTION: Row Decoding
// ============================================================================

/// Score row as read from `SQLite`, before validation.
struct RawScore {
    /// `score_id` column.
    score_id: String,
    /// `organization_id` column.
    organization_id: String,
    /// `entity_type` column.
    entity_type: String,
    /// `entity_id` column.
    entity_id: String,
    /// `score` column.
    score: i64,
    /// `source` column.
    source: String,
    /// `ruleset_version` column.
    ruleset_version: Option<i64>,
    /// `overridden_by` column.
    overridden_by: Option<String>,
    /// `stale_at` column.
    stale_at: Option<String>,
    /// `created_at` column.
    created_at: String,
    /// `is_current` column.
    is_current: i64,
}

impl RawScore {
    /// Reads a row selected with [`SCORE_COLUMNS`].
    fn from_row(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            score_id: row.get(0)?,
            organization_id: row.get(1)?,
            entity_type: row.get(2)?,
            entity_id: row.get(3)?,
            score: row.get(4)?,
            source: row.get(5)?,
            ruleset_version: row.get(6)?,
            overridden_by: row.get(7)?,
            stale_at: row.get(8)?,
            created_at: row.get(9)?,
            is_current: row.get(10)?,
        })
    }
}

/// Validates a raw score row.
fn score_from_row(raw: RawScore) -> Result<ScoringScore, SqliteStoreError> {
    let source = match raw.source.as_str() {
        "ruleset" => ScoreSource::Ruleset,
        "override" => ScoreSource::Override,
        other => return Err(SqliteStoreError::Corrupt(format!("unknown score source: {other}"))),
    };
    let ruleset_version = raw
        .ruleset_version
        .map(|version| {
            u32::try_from(version).map_err(|_| {
                SqliteStoreError::Corrupt(format!("invalid ruleset version {version}"))
            })
        })
        .transpose()?;
    Ok(ScoringScore {
        score_id: ScoreId::new(raw.score_id),
        entity: EntityRef::new(raw.organization_id, raw.entity_type, raw.entity_id),
        score: raw.score,
        source,
        ruleset_version,
        overridden_by: raw.overridden_by.map(ActorId::new),
        stale_at: raw.stale_at.as_deref().map(parse_timestamp).transpose()?,
        created_at: parse_timestamp(&raw.created_at)?,
        is_current: raw.is_current != 0,
    })
}

/// Reads a ruleset header and its rules.
fn read_ruleset(
    connection: &Connection,
    registry: &FunctionRegistry,
    organization_id: &OrganizationId,
    entity_type: &EntityType,
    status: RulesetStatus,
) -> Result<Option<ScoringRuleset>, SqliteStoreError> {
    let header = connection
        .query_row(
            "SELECT version, name, thresholds_json, cooldown_seconds FROM rulesets WHERE \
             organization_id = ?1 AND entity_type = ?2 AND status = ?3",
            params![organization_id.as_str(), entity_type.as_str(), status.as_str()],
            |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, i64>(3)?,
                ))
            },
        )
        .optional()
        .map_err(db_error)?;
    let Some((version, name, thresholds, cooldown)) = header else {
        return Ok(None);
    };
    let version = u32::try_from(version)
        .map_err(|_| SqliteStoreError::Corrupt(format!("invalid ruleset version {version}")))?;
    let thresholds: Vec<i64> = serde_json::from_str(&thresholds)
        .map_err(|err| SqliteStoreError::Corrupt(format!("invalid thresholds: {err}")))?;
    let cooldown = u64::try_from(cooldown)
        .map_err(|_| SqliteStoreError::Corrupt(format!("invalid cooldown {cooldown}")))?;

    let rows = {
        let mut statement = connection
            .prepare(
                "SELECT stable_id, name, description, ast_json FROM scoring_rules WHERE \
                 organization_id = ?1 AND entity_type = ?2 AND status = ?3 ORDER BY position",
            )
            .map_err(db_error)?;
        let rows = statement
            .query_map(
                params![organization_id.as_str(), entity_type.as_str(), status.as_str()],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                    ))
                },
            )
            .map_err(db_error)?;
        rows.collect::<Result<Vec<_>, _>>().map_err(db_error)?
    };
    let mut rules = Vec::with_capacity(rows.len());
    for (stable_id, rule_name, description, body) in rows {
        if body.len() > MAX_AST_BYTES {
            return Err(SqliteStoreError::TooLarge {
                max_bytes: MAX_AST_BYTES,
                actual_bytes: body.len(),
            });
        }
        let dto: NodeDto = serde_json::from_str(&body).map_err(|err| {
            SqliteStoreError::Corrupt(format!("rule {stable_id} body is not valid json: {err}"))
        })?;
        let ast = registry.decode(&dto).map_err(|err| {
            SqliteStoreError::Corrupt(format!("rule {stable_id} body is malformed: {err}"))
        })?;
        rules.push(ScoringRule {
            stable_id: StableRuleId::new(stable_id),
            name: rule_name,
            description,
            ast,
        });
    }
    Ok(Some(ScoringRuleset {
        organization_id: organization_id.clone(),
        entity_type: entity_type.clone(),
        version,
        status,
        name,
        thresholds,
        cooldown: Duration::from_secs(cooldown),
        rules,
    }))
}

/// Deletes a ruleset slot and its rules.
fn delete_slot(
    connection: &Connection,
    organization_id: &str,
    entity_type: &str,
    status: &str,
) -> Result<(), SqliteStoreError> {
    connection
        .execute(
            "DELETE FROM scoring_rules WHERE organization_id = ?1 AND entity_type = ?2 AND status \
             = ?3",
            params![organization_id, entity_type, status],
        )
        .map_err(db_error)?;
    connection
        .execute(
            "DELETE FROM rulesets WHERE organization_id = ?1 AND entity_type = ?2 AND status = ?3",
            params![organization_id, entity_type, status],
        )
        .map_err(db_error)?;
    Ok(())
}

/// Parses a stored ruleset status label.
fn parse_status(label: &str) -> Result<RulesetStatus, SqliteStoreError> {
    match label {
        "draft" => Ok(RulesetStatus::Draft),
        "committed" => Ok(RulesetStatus::Committed),
        other => Err(SqliteStoreError::Corrupt(format!("unknown ruleset status: {other}"))),
    }
}

/// Formats a timestamp as RFC 3339.
fn format_timestamp(timestamp: OffsetDateTime) -> Result<String, SqliteStoreError> {
    timestamp.format(&Rfc3339).map_err(|err| SqliteStoreError::Invalid(err.to_string()))
}

/// Parses a stored RFC 3339 timestamp.
fn parse_timestamp(raw: &str) -> Result<OffsetDateTime, SqliteStoreError> {
    OffsetDateTime::parse(raw, &Rfc3339)
        .map_err(|err| SqliteStoreError::Corrupt(format!("invalid timestamp {raw}: {err}")))
}

// ============================================================================
// SECTION: Connection Setup
// ============================================================================

/// Ensures the parent directory for the store exists.
fn ensure_parent_dir(path: &Path) -> Result<(), SqliteStoreError> {
    let Some(parent) = path.parent() else {
        return Err(SqliteStoreError::Io("store path missing parent directory".to_string()));
    };
    if parent.as_os_str().is_empty() {
        return Ok(());
    }
    std::fs::create_dir_all(parent).map_err(|err| SqliteStoreError::Io(err.to_string()))
}

/// Validates store paths for safety limits.
fn validate_store_path(path: &Path) -> Result<(), SqliteStoreError> {
    let path_string = path.display().to_string();
    if path_string.len() > MAX_TOTAL_PATH_LENGTH {
        return Err(SqliteStoreError::Invalid("store path exceeds length limit".to_string()));
    }
    for component in path.components() {
        let name = component.as_os_str().to_string_lossy();
        if name.len() > MAX_PATH_COMPONENT_LENGTH {
            return Err(SqliteStoreError::Invalid(
                "store path contains an overlong component".to_string(),
            ));
        }
    }
    if path.is_dir() {
        return Err(SqliteStoreError::Invalid(
            "store path must be a file, not a directory".to_string(),
        ));
    }
    Ok(())
}

/// Opens an `SQLite` connection with the configured pragmas.
fn open_connection(config: &SqliteStoreConfig) -> Result<Connection, SqliteStoreError> {
    let flags = OpenFlags::SQLITE_OPEN_READ_WRITE
        | OpenFlags::SQLITE_OPEN_CREATE
        | OpenFlags::SQLITE_OPEN_FULL_MUTEX;
    let connection = Connection::open_with_flags(&config.path, flags).map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA journal_mode = {};", config.journal_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .execute_batch(&format!("PRAGMA synchronous = {};", config.sync_mode.pragma_value()))
        .map_err(db_error)?;
    connection
        .busy_timeout(Duration::from_millis(config.busy_timeout_ms))
        .map_err(db_error)?;
    Ok(connection)
}

/// Initializes the `SQLite` schema or validates the existing version.
fn initialize_schema(connection: &mut Connection) -> Result<(), SqliteStoreError> {
    let tx = connection.transaction().map_err(db_error)?;
    tx.execute_batch("CREATE TABLE IF NOT EXISTS store_meta (version INTEGER NOT NULL);")
        .map_err(db_error)?;
    let version: Option<i64> = tx
        .query_row("SELECT version FROM store_meta LIMIT 1", params![], |row| row.get(0))
        .optional()
        .map_err(db_error)?;
    match version {
        None => {
            tx.execute("INSERT INTO store_meta (version) VALUES (?1)", params![SCHEMA_VERSION])
                .map_err(db_error)?;
            tx.execute_batch(
                "CREATE TABLE IF NOT EXISTS rulesets (
                    organization_id TEXT NOT NULL,
                    entity_type TEXT NOT NULL,
                    status TEXT NOT NULL,
                    version INTEGER NOT NULL,
                    name TEXT NOT NULL,
                    thresholds_json TEXT NOT NULL,
                    cooldown_seconds INTEGER NOT NULL,
                    PRIMARY KEY (organization_id, entity_type, status)
                );
                CREATE TABLE IF NOT EXISTS scoring_rules (
                    organization_id TEXT NOT NULL,
                    entity_type TEXT NOT NULL,
                    status TEXT NOT NULL,
                    position INTEGER NOT NULL,
                    stable_id TEXT NOT NULL,
                    name TEXT NOT NULL,
                    description TEXT NOT NULL,
                    ast_json TEXT NOT NULL,
                    PRIMARY KEY (organization_id, entity_type, status, position),
                    UNIQUE (organization_id, entity_type, status, stable_id)
                );
                CREATE TABLE IF NOT EXISTS scores (
                    seq INTEGER PRIMARY KEY AUTOINCREMENT,
                    score_id TEXT NOT NULL UNIQUE,
                    organization_id TEXT NOT NULL,
                    entity_type TEXT NOT NULL,
                    entity_id TEXT NOT NULL,
                    score INTEGER NOT NULL,
                    source TEXT NOT NULL,
                    ruleset_version INTEGER,
                    overridden_by TEXT,
                    stale_at TEXT,
                    created_at TEXT NOT NULL,
                    is_current INTEGER NOT NULL
                );
                CREATE UNIQUE INDEX IF NOT EXISTS idx_scores_current
                    ON scores (organization_id, entity_type, entity_id) WHERE is_current = 1;
                CREATE INDEX IF NOT EXISTS idx_scores_entity
                    ON scores (organization_id, entity_type, entity_id, seq);
                CREATE TABLE IF NOT EXISTS indexes (
                    organization_id TEXT NOT NULL,
                    table_name TEXT NOT NULL,
                    field_name TEXT NOT NULL,
                    state TEXT NOT NULL,
                    PRIMARY KEY (organization_id, table_name, field_name)
                );",
            )
            .map_err(db_error)?;
        }
        Some(value) if value == SCHEMA_VERSION => {}
        Some(value) => {
            return Err(SqliteStoreError::VersionMismatch(format!(
                "unsupported schema version: {value}"
            )));
        }
    }
    tx.commit().map_err(db_error)?;
    Ok(())
}
