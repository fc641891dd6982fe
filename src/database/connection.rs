use std::path::Path;
use std::time::Duration;

use rusqlite::Connection;

use super::migrations;

/// SQLite connection holding the settings table, migrated on open.
pub struct Database {
    conn: Connection,
}

impl Database {
    /// Opens or creates the database file, creating missing parent
    /// directories first.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, rusqlite::Error> {
        let path = path.as_ref();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            if let Err(e) = std::fs::create_dir_all(parent) {
                tracing::warn!(dir = %parent.display(), error = %e, "Could not create data directory");
            }
        }
        Self::prepare(Connection::open(path)?)
    }

    /// Throwaway database, discarded on drop.
    pub fn open_in_memory() -> Result<Self, rusqlite::Error> {
        Self::prepare(Connection::open_in_memory()?)
    }

    fn prepare(conn: Connection) -> Result<Self, rusqlite::Error> {
        conn.busy_timeout(Duration::from_secs(5))?;
        migrations::run_all(&conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &Connection {
        &self.conn
    }
}
