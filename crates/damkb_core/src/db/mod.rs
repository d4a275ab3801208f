//! Knowledge-base storage: connection bootstrap and schema upgrades.
//!
//! # Responsibility
//! - Hand out SQLite connections that already carry the KB schema.
//! - Report schema problems as [`DbError`] rather than raw SQLite codes.
//!
//! # Invariants
//! - The schema step count is mirrored in `PRAGMA user_version`.
//! - Class definitions live in rows, so adding a class never needs a step.

use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod migrations;
mod open;

pub use open::{open_db, open_db_in_memory};
pub use rusqlite::Connection;

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// The file was written by a build that knows more schema steps.
    SchemaTooNew { found: u32, supported: u32 },
    /// A schema step failed; the upgrade transaction was rolled back.
    Migration { version: u32, source: rusqlite::Error },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::SchemaTooNew { found, supported } => write!(
                f,
                "knowledge base schema version {found} is newer than this build ({supported})"
            ),
            Self::Migration { version, source } => {
                write!(f, "schema step {version} failed: {source}")
            }
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) | Self::Migration { source: err, .. } => Some(err),
            Self::SchemaTooNew { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
