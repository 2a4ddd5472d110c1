//! Request-scoped execution context.
//!
//! # Responsibility
//! - Carry cancellation for one logical unit of work across every call it makes.
//! - Carry the optional ambient transaction the adapters execute against.
//!
//! # Invariants
//! - A context never begins, commits or rolls back the transaction it carries.
//! - Cancelling a token interrupts every statement currently registered with it.
//! - Derived contexts share the cancellation token and scope id of their parent.

use crate::error::{NormError, NormResult};
use rusqlite::{Connection, InterruptHandle, Transaction};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use uuid::Uuid;

/// Cloneable, thread-safe cancellation flag.
#[derive(Clone, Default)]
pub struct CancelToken {
    inner: Arc<CancelState>,
}

#[derive(Default)]
struct CancelState {
    cancelled: AtomicBool,
    next_id: AtomicU64,
    running: Mutex<Vec<(u64, InterruptHandle)>>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// Marks the token cancelled and interrupts in-flight statements.
    ///
    /// Safe to call from any thread, any number of times.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
        for (_, handle) in self.running().iter() {
            handle.interrupt();
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
    }

    /// Registers `conn` so that `cancel()` interrupts whatever it is running.
    ///
    /// The registration is removed when the returned guard drops.
    pub(crate) fn register(&self, conn: &Connection) -> InterruptRegistration<'_> {
        let id = self.inner.next_id.fetch_add(1, Ordering::Relaxed);
        self.running().push((id, conn.get_interrupt_handle()));
        InterruptRegistration { token: self, id }
    }

    fn running(&self) -> MutexGuard<'_, Vec<(u64, InterruptHandle)>> {
        match self.inner.running.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

impl std::fmt::Debug for CancelToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CancelToken")
            .field("cancelled", &self.is_cancelled())
            .finish()
    }
}

pub(crate) struct InterruptRegistration<'t> {
    token: &'t CancelToken,
    id: u64,
}

impl Drop for InterruptRegistration<'_> {
    fn drop(&mut self) {
        let id = self.id;
        self.token.running().retain(|(entry, _)| *entry != id);
    }
}

/// Execution scope threaded through every capability and aggregation call.
///
/// Holds the cancellation token, a scope id used to correlate log events, and
/// optionally a caller-owned transaction that adapters must execute against
/// instead of their default connection.
#[derive(Clone, Debug)]
pub struct Context<'tx> {
    scope_id: Uuid,
    cancel: CancelToken,
    tx: Option<&'tx Connection>,
}

impl Context<'static> {
    /// Creates a fresh scope with its own cancellation token and no transaction.
    pub fn new() -> Self {
        Self::with_cancel(CancelToken::new())
    }

    /// Creates a scope observing an existing cancellation token.
    pub fn with_cancel(cancel: CancelToken) -> Self {
        Self {
            scope_id: Uuid::new_v4(),
            cancel,
            tx: None,
        }
    }
}

impl Default for Context<'static> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'tx> Context<'tx> {
    /// Derives a scope whose operations run inside `tx`.
    ///
    /// The caller keeps ownership of `tx` and decides when to commit or roll
    /// it back.
    pub fn with_transaction<'t>(&self, tx: &'t Transaction<'_>) -> Context<'t> {
        let conn: &'t Connection = tx;
        Context {
            scope_id: self.scope_id,
            cancel: self.cancel.clone(),
            tx: Some(conn),
        }
    }

    /// Derives a scope with the ambient transaction removed.
    pub fn without_transaction(&self) -> Context<'static> {
        Context {
            scope_id: self.scope_id,
            cancel: self.cancel.clone(),
            tx: None,
        }
    }

    /// Returns the ambient transaction, or `None` when none was attached.
    pub fn transaction(&self) -> Option<&'tx Connection> {
        self.tx
    }

    pub fn scope_id(&self) -> Uuid {
        self.scope_id
    }

    pub fn cancel_token(&self) -> &CancelToken {
        &self.cancel
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }

    /// Fails with `Cancelled` once the token has been cancelled.
    pub fn check(&self) -> NormResult<()> {
        if self.is_cancelled() {
            return Err(NormError::Cancelled);
        }
        Ok(())
    }
}
