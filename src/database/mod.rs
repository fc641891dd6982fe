//! SQLite persistence for the settings store.
//!
//! One flat `settings` table maps each key to its JSON-encoded value:
//!
//! ```no_run
//! use ticketwatch::database::Database;
//!
//! let db = Database::open("/tmp/ticketwatch/settings.db").expect("open settings db");
//! let rows: i64 = db
//!     .connection()
//!     .query_row("SELECT COUNT(*) FROM settings", [], |row| row.get(0))
//!     .expect("count");
//! ```

pub mod connection;
pub mod migrations;

pub use connection::Database;
