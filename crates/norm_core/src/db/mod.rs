//! SQLite connection bootstrap.
//!
//! # Responsibility
//! - Open file or in-memory connections configured by `StoreConfig`.
//!
//! # Invariants
//! - Returned connections have the requested `foreign_keys` and busy timeout.
//! - File connections run in the requested journal mode, or opening fails.

use std::error::Error;
use std::fmt::{Display, Formatter};

mod open;

pub use open::{open_db, open_db_in_memory};

pub type DbResult<T> = Result<T, DbError>;

#[derive(Debug)]
pub enum DbError {
    Sqlite(rusqlite::Error),
    /// SQLite refused to switch to the requested journal mode.
    JournalMode {
        requested: &'static str,
        actual: String,
    },
}

impl Display for DbError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Sqlite(err) => write!(f, "{err}"),
            Self::JournalMode { requested, actual } => write!(
                f,
                "database refused journal mode `{requested}`, stayed in `{actual}`"
            ),
        }
    }
}

impl Error for DbError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Sqlite(err) => Some(err),
            Self::JournalMode { .. } => None,
        }
    }
}

impl From<rusqlite::Error> for DbError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Sqlite(value)
    }
}
