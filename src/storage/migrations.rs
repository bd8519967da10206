//! Database migrations

use rusqlite::Connection;

use crate::error::{DsrError, Result};

const MIGRATIONS: [&str; 2] = [
    include_str!("../../migrations/001_initial_schema.sql"),
    include_str!("../../migrations/002_add_metrics_totals.sql"),
];

pub const SCHEMA_VERSION: u32 = MIGRATIONS.len() as u32;

/// Bring the schema up to [`SCHEMA_VERSION`], tracked in `PRAGMA user_version`.
pub fn run_migrations(conn: &Connection) -> Result<u32> {
    let current_version: u32 = conn
        .query_row("PRAGMA user_version;", [], |row| row.get(0))
        .map_err(|err| DsrError::StoreUnavailable(err.to_string()))?;

    if current_version > SCHEMA_VERSION {
        return Err(DsrError::StoreUnavailable(format!(
            "database schema version {current_version} is newer than supported {SCHEMA_VERSION}"
        )));
    }

    for (idx, sql) in MIGRATIONS.iter().enumerate() {
        let target_version = (idx + 1) as u32;
        if current_version >= target_version {
            continue;
        }

        conn.execute_batch(sql).map_err(|err| {
            DsrError::StoreUnavailable(format!("migration {target_version} failed: {err}"))
        })?;
        conn.pragma_update(None, "user_version", target_version)
            .map_err(|err| {
                DsrError::StoreUnavailable(format!(
                    "failed to set user_version {target_version}: {err}"
                ))
            })?;
        tracing::debug!(version = target_version, "applied migration");
    }

    Ok(SCHEMA_VERSION)
}
