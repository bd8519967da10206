//! SQLite database layer

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction, TransactionBehavior};
use tracing::debug;

use super::{check_lineage, SkillEvent, SkillEventKind, SkillFilter, SkillStore, SkillUpdate};
use crate::context::{normalize_domain, ContextHash};
use crate::core::{Skill, SkillId, SkillStatus};
use crate::error::{DsrError, Result};
use crate::storage::migrations;

const SKILL_COLUMNS: &str = "id, domain, context_hash, status, created_at, last_used_at, \
     last_verified_at, archived_at, generation_count, previous_version_id, size_bytes, \
     dependency_versions_json, knowledge_gaps_json, revision";

const EVENT_COLUMNS: &str =
    "seq, skill_id, kind, from_status, to_status, at, generation_count";

/// SQLite-backed skill store.
///
/// One connection behind a mutex; each mutation runs in an `IMMEDIATE`
/// transaction so the guard check, the write and its audit event commit
/// together. Other processes sharing the file serialize on SQLite's lock.
pub struct Database {
    conn: Mutex<Connection>,
    schema_version: u32,
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database")
            .field("schema_version", &self.schema_version)
            .finish_non_exhaustive()
    }
}

impl Database {
    /// Open database at the given path
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();

        // Ensure parent directory exists
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let conn = Connection::open(path).map_err(classify)?;
        Self::from_connection(conn)
    }

    /// Private in-memory database, mostly for tests.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(classify)?;
        Self::from_connection(conn)
    }

    fn from_connection(conn: Connection) -> Result<Self> {
        Self::configure_pragmas(&conn)?;
        let schema_version = migrations::run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
            schema_version,
        })
    }

    /// Current schema version after migrations.
    pub const fn schema_version(&self) -> u32 {
        self.schema_version
    }

    /// Add `deltas` to the persisted metric totals.
    pub fn add_metric_totals(&self, deltas: &[(&str, u64)]) -> Result<()> {
        self.with_tx(|tx| {
            let mut stmt = tx.prepare_cached(
                "INSERT INTO metrics_totals (name, value) VALUES (?1, ?2) \
                 ON CONFLICT(name) DO UPDATE SET value = value + excluded.value",
            )?;
            for (name, delta) in deltas {
                if *delta > 0 {
                    stmt.execute(params![name, to_sql_int(*delta)?])?;
                }
            }
            Ok(())
        })
    }

    /// Persisted metric totals, by name.
    pub fn metric_totals(&self) -> Result<BTreeMap<String, u64>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare("SELECT name, value FROM metrics_totals ORDER BY name")?;
        let rows = stmt.query_map([], |row| {
            Ok((row.get::<_, String>(0)?, from_sql_int(row, 1)?))
        })?;
        let mut totals = BTreeMap::new();
        for row in rows {
            let (name, value) = row?;
            totals.insert(name, value);
        }
        Ok(totals)
    }

    fn configure_pragmas(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;
             PRAGMA temp_store = MEMORY;
             PRAGMA foreign_keys = ON;",
        )
        .map_err(classify)?;
        Ok(())
    }

    fn with_tx<T>(&self, f: impl FnOnce(&Transaction<'_>) -> Result<T>) -> Result<T> {
        let mut conn = self.conn.lock();
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(classify)?;
        let value = f(&tx).map_err(|err| match err {
            DsrError::Database(inner) => classify(inner),
            other => other,
        })?;
        tx.commit().map_err(classify)?;
        Ok(value)
    }
}

impl SkillStore for Database {
    fn put(&self, skill: &Skill) -> Result<()> {
        self.with_tx(|tx| {
            if load_skill(tx, &skill.id)?.is_some() {
                return Err(DsrError::Conflict(skill.id.to_string()));
            }
            let ancestor = match &skill.previous_version_id {
                Some(prior) => load_skill(tx, prior)?,
                None => None,
            };
            check_lineage(skill, ancestor.as_ref())?;

            let next_seq: i64 = tx.query_row(
                "SELECT COALESCE(MAX(inserted_seq), 0) + 1 FROM skills",
                [],
                |row| row.get(0),
            )?;

            tx.execute(
                "INSERT INTO skills (id, domain, context_hash, status, created_at, last_used_at, \
                 last_verified_at, archived_at, generation_count, previous_version_id, size_bytes, \
                 dependency_versions_json, knowledge_gaps_json, revision, inserted_seq) \
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15)",
                params![
                    skill.id.as_str(),
                    skill.domain,
                    skill.context_hash.to_hex(),
                    skill.status.as_str(),
                    format_ts(skill.created_at),
                    skill.last_used_at.map(format_ts),
                    skill.last_verified_at.map(format_ts),
                    skill.archived_at.map(format_ts),
                    to_sql_int(skill.generation_count)?,
                    skill.previous_version_id.as_ref().map(SkillId::as_str),
                    to_sql_int(skill.size_bytes)?,
                    serde_json::to_string(&skill.dependency_versions)?,
                    serde_json::to_string(&skill.knowledge_gaps)?,
                    to_sql_int(skill.revision)?,
                    next_seq,
                ],
            )?;

            insert_event(
                tx,
                &skill.id,
                SkillEventKind::Created,
                None,
                skill.status,
                skill.created_at,
                skill.generation_count,
            )?;
            debug!(skill_id = %skill.id, domain = %skill.domain, "inserted skill");
            Ok(())
        })
    }

    fn get_by_id(&self, id: &SkillId) -> Result<Option<Skill>> {
        let conn = self.conn.lock();
        load_skill(&conn, id)
    }

    fn get_by_hash(&self, domain: &str, hash: &ContextHash) -> Result<Option<Skill>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SKILL_COLUMNS} FROM skills WHERE domain = ?1 AND context_hash = ?2 \
             ORDER BY created_at DESC, inserted_seq DESC LIMIT 1"
        ))?;
        let skill = stmt
            .query_row(params![normalize_domain(domain), hash.to_hex()], skill_from_row)
            .optional()?;
        Ok(skill)
    }

    fn latest_with_tools(
        &self,
        domain: &str,
        tool_names: &BTreeSet<String>,
    ) -> Result<Option<Skill>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {SKILL_COLUMNS} FROM skills WHERE domain = ?1 \
             ORDER BY created_at DESC, inserted_seq DESC"
        ))?;
        let rows = stmt.query_map([normalize_domain(domain)], skill_from_row)?;
        for row in rows {
            let skill = row?;
            if skill.has_tool_names(tool_names) {
                return Ok(Some(skill));
            }
        }
        Ok(None)
    }

    fn list(&self, filter: &SkillFilter) -> Result<Vec<Skill>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(&format!(
            "SELECT {SKILL_COLUMNS} FROM skills \
             WHERE (?1 IS NULL OR status = ?1) AND (?2 IS NULL OR domain = ?2) \
             ORDER BY created_at ASC, inserted_seq ASC"
        ))?;
        let rows = stmt.query_map(
            params![
                filter.status.map(SkillStatus::as_str),
                filter.domain.as_deref()
            ],
            skill_from_row,
        )?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }

    fn guarded_update(&self, id: &SkillId, update: &SkillUpdate) -> Result<bool> {
        self.with_tx(|tx| {
            let expected_revision = update.expected_revision.map(to_sql_int).transpose()?;
            let changed = tx.execute(
                "UPDATE skills SET \
                     status = COALESCE(?1, status), \
                     last_used_at = COALESCE(?2, last_used_at), \
                     last_verified_at = COALESCE(?3, last_verified_at), \
                     archived_at = COALESCE(?4, archived_at), \
                     generation_count = generation_count + ?5, \
                     revision = revision + 1 \
                 WHERE id = ?6 AND status = ?7 AND (?8 IS NULL OR revision = ?8)",
                params![
                    update.new_status.map(SkillStatus::as_str),
                    update.last_used_at.map(format_ts),
                    update.last_verified_at.map(format_ts),
                    update.archived_at.map(format_ts),
                    i64::from(update.bump_generation),
                    id.as_str(),
                    update.expected_status.as_str(),
                    expected_revision,
                ],
            )?;

            if changed == 0 {
                if load_skill(tx, id)?.is_none() {
                    return Err(DsrError::NotFound(id.to_string()));
                }
                return Ok(false);
            }

            let generation: i64 = tx.query_row(
                "SELECT generation_count FROM skills WHERE id = ?1",
                [id.as_str()],
                |row| row.get(0),
            )?;
            insert_event(
                tx,
                id,
                update.event,
                Some(update.expected_status),
                update.resulting_status(),
                update.at,
                from_i64(generation)?,
            )?;
            Ok(true)
        })
    }

    fn events(&self, id: &SkillId) -> Result<Vec<SkillEvent>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare_cached(&format!(
            "SELECT {EVENT_COLUMNS} FROM skill_events WHERE skill_id = ?1 ORDER BY seq ASC"
        ))?;
        let rows = stmt.query_map([id.as_str()], event_from_row)?;
        let mut results = Vec::new();
        for row in rows {
            results.push(row?);
        }
        Ok(results)
    }
}

fn load_skill(conn: &Connection, id: &SkillId) -> Result<Option<Skill>> {
    let mut stmt = conn.prepare_cached(&format!("SELECT {SKILL_COLUMNS} FROM skills WHERE id = ?1"))?;
    Ok(stmt.query_row([id.as_str()], skill_from_row).optional()?)
}

fn insert_event(
    conn: &Connection,
    skill_id: &SkillId,
    kind: SkillEventKind,
    from_status: Option<SkillStatus>,
    to_status: SkillStatus,
    at: DateTime<Utc>,
    generation_count: u64,
) -> Result<()> {
    conn.execute(
        "INSERT INTO skill_events (skill_id, kind, from_status, to_status, at, generation_count) \
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        params![
            skill_id.as_str(),
            kind.as_str(),
            from_status.map(SkillStatus::as_str),
            to_status.as_str(),
            format_ts(at),
            to_sql_int(generation_count)?,
        ],
    )?;
    Ok(())
}

fn skill_from_row(row: &Row<'_>) -> rusqlite::Result<Skill> {
    let dependency_json: String = row.get(11)?;
    let gaps_json: String = row.get(12)?;
    let dependency_versions: BTreeMap<String, String> =
        serde_json::from_str(&dependency_json).map_err(|err| conversion_err(11, err))?;
    let knowledge_gaps: BTreeSet<String> =
        serde_json::from_str(&gaps_json).map_err(|err| conversion_err(12, err))?;

    Ok(Skill {
        id: SkillId::from(row.get::<_, String>(0)?),
        domain: row.get(1)?,
        context_hash: parse_col(row, 2)?,
        status: parse_col(row, 3)?,
        created_at: ts_col(row, 4)?,
        last_used_at: opt_ts_col(row, 5)?,
        last_verified_at: opt_ts_col(row, 6)?,
        archived_at: opt_ts_col(row, 7)?,
        generation_count: from_sql_int(row, 8)?,
        previous_version_id: row.get::<_, Option<String>>(9)?.map(SkillId::from),
        size_bytes: from_sql_int(row, 10)?,
        dependency_versions,
        knowledge_gaps,
        revision: from_sql_int(row, 13)?,
    })
}

fn event_from_row(row: &Row<'_>) -> rusqlite::Result<SkillEvent> {
    let from_status = match row.get::<_, Option<String>>(3)? {
        Some(raw) => Some(raw.parse().map_err(|err| conversion_err(3, err))?),
        None => None,
    };
    Ok(SkillEvent {
        seq: from_sql_int(row, 0)?,
        skill_id: SkillId::from(row.get::<_, String>(1)?),
        kind: parse_col(row, 2)?,
        from_status,
        to_status: parse_col(row, 4)?,
        at: ts_col(row, 5)?,
        generation_count: from_sql_int(row, 6)?,
    })
}

/// Busy, locked and unopenable databases are transient; everything else is
/// a plain database error.
fn classify(err: rusqlite::Error) -> DsrError {
    use rusqlite::ErrorCode;
    match err.sqlite_error_code() {
        Some(ErrorCode::DatabaseBusy | ErrorCode::DatabaseLocked | ErrorCode::CannotOpen) => {
            DsrError::StoreUnavailable(err.to_string())
        }
        _ => DsrError::Database(err),
    }
}

fn format_ts(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Nanos, true)
}

fn conversion_err<E>(idx: usize, err: E) -> rusqlite::Error
where
    E: std::error::Error + Send + Sync + 'static,
{
    rusqlite::Error::FromSqlConversionFailure(idx, Type::Text, Box::new(err))
}

fn parse_col<T>(row: &Row<'_>, idx: usize) -> rusqlite::Result<T>
where
    T: std::str::FromStr<Err = DsrError>,
{
    let raw: String = row.get(idx)?;
    raw.parse().map_err(|err| conversion_err(idx, err))
}

fn ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<DateTime<Utc>> {
    let raw: String = row.get(idx)?;
    DateTime::parse_from_rfc3339(&raw)
        .map(|ts| ts.with_timezone(&Utc))
        .map_err(|err| conversion_err(idx, err))
}

fn opt_ts_col(row: &Row<'_>, idx: usize) -> rusqlite::Result<Option<DateTime<Utc>>> {
    match row.get::<_, Option<String>>(idx)? {
        Some(raw) => DateTime::parse_from_rfc3339(&raw)
            .map(|ts| Some(ts.with_timezone(&Utc)))
            .map_err(|err| conversion_err(idx, err)),
        None => Ok(None),
    }
}

fn from_sql_int(row: &Row<'_>, idx: usize) -> rusqlite::Result<u64> {
    let value: i64 = row.get(idx)?;
    u64::try_from(value).map_err(|_| rusqlite::Error::IntegralValueOutOfRange(idx, value))
}

fn from_i64(value: i64) -> Result<u64> {
    u64::try_from(value)
        .map_err(|_| DsrError::Serialization(format!("negative counter {value} in database")))
}

fn to_sql_int(value: u64) -> Result<i64> {
    i64::try_from(value)
        .map_err(|_| DsrError::Serialization(format!("counter {value} exceeds SQLite range")))
}
