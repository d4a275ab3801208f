//! KB schema steps and the upgrade runner.
//!
//! Step `n` (1-based) in [`SCHEMA_STEPS`] moves `user_version` from `n - 1`
//! to `n`. Steps are append-only: never edit one that has shipped.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};

const SCHEMA_STEPS: &[&str] = &[include_str!("0001_kb_init.sql")];

/// Schema version a fully upgraded knowledge base reports.
pub fn schema_version() -> u32 {
    u32::try_from(SCHEMA_STEPS.len()).unwrap_or(u32::MAX)
}

/// Brings `conn` up to [`schema_version`] in one transaction.
///
/// # Errors
/// - `SchemaTooNew` when the file is ahead of this build.
/// - `Migration` naming the step that failed.
pub fn migrate(conn: &mut Connection) -> DbResult<()> {
    let found: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let supported = schema_version();
    if found > supported {
        return Err(DbError::SchemaTooNew { found, supported });
    }
    if found == supported {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for (version, sql) in (1..).zip(SCHEMA_STEPS).skip(found as usize) {
        run_step(&tx, version, sql).map_err(|source| {
            error!("event=db_migrate module=db status=error version={version} error={source}");
            DbError::Migration { version, source }
        })?;
    }
    tx.commit()?;

    info!("event=db_migrate module=db status=ok from_version={found} to_version={supported}");
    Ok(())
}

fn run_step(tx: &Transaction<'_>, version: u32, sql: &str) -> rusqlite::Result<()> {
    tx.execute_batch(sql)?;
    tx.pragma_update(None, "user_version", version)
}
