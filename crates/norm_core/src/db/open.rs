//! Connection bootstrap utilities for SQLite.

use super::{DbError, DbResult};
use crate::config::{JournalMode, StoreConfig};
use log::{error, info};
use rusqlite::Connection;
use std::path::Path;
use std::time::{Duration, Instant};

/// Opens a SQLite database file configured by `config`.
///
/// # Side effects
/// - Emits `db_open` logging events with duration and status.
pub fn open_db(path: impl AsRef<Path>, config: &StoreConfig) -> DbResult<Connection> {
    open_with("file", config, Some(config.journal_mode), || {
        Connection::open(path)
    })
}

/// Opens a private in-memory database configured by `config`.
///
/// `journal_mode` is not applied; in-memory databases always journal in memory.
pub fn open_db_in_memory(config: &StoreConfig) -> DbResult<Connection> {
    open_with("memory", config, None, Connection::open_in_memory)
}

fn open_with(
    mode: &str,
    config: &StoreConfig,
    journal_mode: Option<JournalMode>,
    open: impl FnOnce() -> rusqlite::Result<Connection>,
) -> DbResult<Connection> {
    let started_at = Instant::now();
    info!("event=db_open module=db status=start mode={mode}");

    let conn = match open() {
        Ok(conn) => conn,
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_open_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            return Err(err.into());
        }
    };

    match bootstrap_connection(&conn, config, journal_mode) {
        Ok(()) => {
            info!(
                "event=db_open module=db status=ok mode={mode} duration_ms={}",
                started_at.elapsed().as_millis()
            );
            Ok(conn)
        }
        Err(err) => {
            error!(
                "event=db_open module=db status=error mode={mode} duration_ms={} error_code=db_bootstrap_failed error={}",
                started_at.elapsed().as_millis(),
                err
            );
            Err(err)
        }
    }
}

fn bootstrap_connection(
    conn: &Connection,
    config: &StoreConfig,
    journal_mode: Option<JournalMode>,
) -> DbResult<()> {
    conn.pragma_update(None, "foreign_keys", config.foreign_keys)?;
    conn.busy_timeout(Duration::from_millis(config.busy_timeout_ms))?;

    if let Some(requested) = journal_mode {
        let actual: String =
            conn.pragma_update_and_check(None, "journal_mode", requested.as_str(), |row| {
                row.get(0)
            })?;
        if !actual.eq_ignore_ascii_case(requested.as_str()) {
            return Err(DbError::JournalMode {
                requested: requested.as_str(),
                actual,
            });
        }
    }

    Ok(())
}
