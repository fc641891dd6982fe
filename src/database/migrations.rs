//! Schema migrations for the settings database.
//!
//! Every applied step is recorded in `schema_version`; steps already
//! recorded are skipped, so [`run_all`] runs on every open.

use rusqlite::{params, Connection};

/// One schema step: version, description, SQL.
type Migration = (i32, &'static str, &'static str);

const MIGRATIONS: &[Migration] = &[(
    1,
    "Flat key-value settings table",
    "CREATE TABLE IF NOT EXISTS settings (
         key TEXT PRIMARY KEY,
         value TEXT NOT NULL,
         updated_at INTEGER NOT NULL
     );",
)];

/// Highest version in the migration list.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Applied schema version, 0 for a fresh file.
pub fn get_schema_version(conn: &Connection) -> i32 {
    conn.query_row(
        "SELECT COALESCE(MAX(version), 0) FROM schema_version",
        [],
        |row| row.get(0),
    )
    .unwrap_or(0)
}

pub fn run_all(conn: &Connection) -> Result<(), rusqlite::Error> {
    conn.execute_batch(
        "PRAGMA journal_mode = WAL;
         CREATE TABLE IF NOT EXISTS schema_version (
             version INTEGER PRIMARY KEY,
             applied_at INTEGER NOT NULL,
             description TEXT NOT NULL
         );",
    )?;

    let applied = get_schema_version(conn);
    for &(version, description, sql) in MIGRATIONS.iter().filter(|m| m.0 > applied) {
        let tx = conn.unchecked_transaction()?;
        tx.execute_batch(sql)?;
        tx.execute(
            "INSERT OR IGNORE INTO schema_version (version, applied_at, description)
             VALUES (?1, strftime('%s', 'now'), ?2)",
            params![version, description],
        )?;
        tx.commit()?;
        tracing::debug!(version, description, "Schema migration applied");
    }
    Ok(())
}
