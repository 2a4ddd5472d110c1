//! SQLite realization of the capability contracts.
//!
//! # Responsibility
//! - Run the per-operation pipeline: resolve scope, compile template,
//!   prepare, execute, scan.
//! - Build composites from one template per capability.
//!
//! # Invariants
//! - An ambient transaction on the context always wins over the shared
//!   connection; the adapter never begins, commits or rolls it back.
//! - Writes against `{M, A}`, reads against `{A}`; delete uses `M::default()`.
//! - Zero affected rows is `NotAffected`; a scalar read without rows is
//!   `NotFound`.
//!
//! # See also
//! - `crate::template` for the marker syntax.

mod reader;
mod writer;

pub use reader::SqlReader;
pub use writer::{SqlCreator, SqlDeleter, SqlUpdater};

use crate::capability::{ImmutableObject, Object, PersistentObject, View};
use crate::context::Context;
use crate::error::NormResult;
use crate::scan::ScanShape;
use log::{debug, warn};
use rusqlite::Connection;
use serde::Serialize;
use std::time::Instant;

pub type SqlObject<'conn, M, A> = Object<
    SqlCreator<'conn, M, A>,
    SqlReader<'conn, M, A>,
    SqlUpdater<'conn, M, A>,
    SqlDeleter<'conn, M, A>,
>;

pub type SqlPersistentObject<'conn, M, A> =
    PersistentObject<SqlCreator<'conn, M, A>, SqlReader<'conn, M, A>, SqlUpdater<'conn, M, A>>;

pub type SqlImmutableObject<'conn, M, A> =
    ImmutableObject<SqlCreator<'conn, M, A>, SqlReader<'conn, M, A>>;

pub type SqlView<'conn, M, A> = View<SqlReader<'conn, M, A>>;

/// Builds a full CRUD object over `conn`.
///
/// `shape` declares whether `M` is one row or a sequence of rows.
pub fn new_object<'conn, M, A>(
    conn: &'conn Connection,
    shape: ScanShape,
    create: impl Into<String>,
    read: impl Into<String>,
    update: impl Into<String>,
    delete: impl Into<String>,
) -> SqlObject<'conn, M, A> {
    Object::new(
        SqlCreator::new(conn, create),
        SqlReader::new(conn, read, shape),
        SqlUpdater::new(conn, update),
        SqlDeleter::new(conn, delete),
    )
}

/// Builds a create/read/update object over `conn`.
pub fn new_persistent_object<'conn, M, A>(
    conn: &'conn Connection,
    shape: ScanShape,
    create: impl Into<String>,
    read: impl Into<String>,
    update: impl Into<String>,
) -> SqlPersistentObject<'conn, M, A> {
    PersistentObject::new(
        SqlCreator::new(conn, create),
        SqlReader::new(conn, read, shape),
        SqlUpdater::new(conn, update),
    )
}

/// Builds a create/read object over `conn`.
pub fn new_immutable_object<'conn, M, A>(
    conn: &'conn Connection,
    shape: ScanShape,
    create: impl Into<String>,
    read: impl Into<String>,
) -> SqlImmutableObject<'conn, M, A> {
    ImmutableObject::new(
        SqlCreator::new(conn, create),
        SqlReader::new(conn, read, shape),
    )
}

/// Builds a read-only view over `conn`.
pub fn new_view<'conn, M, A>(
    conn: &'conn Connection,
    shape: ScanShape,
    read: impl Into<String>,
) -> SqlView<'conn, M, A> {
    View::new(SqlReader::new(conn, read, shape))
}

#[derive(Serialize)]
struct WriteEnvelope<'a, M, A> {
    #[serde(rename = "M")]
    model: &'a M,
    #[serde(rename = "A")]
    args: &'a A,
}

#[derive(Serialize)]
struct ReadEnvelope<'a, A> {
    #[serde(rename = "A")]
    args: &'a A,
}

/// Picks the ambient transaction when present, else the shared connection.
fn resolve<'c>(conn: &'c Connection, ctx: &'c Context<'_>) -> &'c Connection {
    ctx.transaction().unwrap_or(conn)
}

fn log_outcome<T>(op: &str, ctx: &Context<'_>, started_at: Instant, result: &NormResult<T>) {
    let duration_ms = started_at.elapsed().as_millis();
    let in_tx = ctx.transaction().is_some();

    match result {
        Ok(_) => debug!(
            "event=norm_{op} module=adapter status=ok scope={} in_tx={in_tx} duration_ms={duration_ms}",
            ctx.scope_id()
        ),
        // Expected outcomes, the caller decides what they mean.
        Err(err) if err.is_not_found() || err.is_not_affected() => debug!(
            "event=norm_{op} module=adapter status=miss scope={} in_tx={in_tx} duration_ms={duration_ms} error_kind={}",
            ctx.scope_id(),
            err.kind().as_str()
        ),
        Err(err) => warn!(
            "event=norm_{op} module=adapter status=error scope={} in_tx={in_tx} duration_ms={duration_ms} error_kind={} error={}",
            ctx.scope_id(),
            err.kind().as_str(),
            err
        ),
    }
}
