//! Transactional write batching.
//!
//! A [`BatchSession`] belongs to one [`crate::Database`]. While a scope is
//! open, writes do not reach the backend: their statements are appended to
//! the session buffer and the resulting block rows are kept in a pending
//! overlay, so reads and later writes inside the same scope observe them.
//! When the outermost scope exits, the buffer is flushed in one transaction.
//!
//! ```text
//! Idle --scope--> Active --outermost exit--> Flushing --> Idle
//!                   ^  |
//!                   +--+ nested scope
//! ```
//!
//! The session uses `Cell`/`RefCell` and is therefore not `Sync`: it is
//! meant to live on one worker.

use std::{
    cell::{Cell, RefCell},
    collections::{BTreeMap, HashMap},
    fmt,
};

use tracing::{debug, warn};

use crate::{
    backend::{Backend, BackendError, Statement, run_statements, with_transaction},
    period::BlockIndex,
    planner::{BlockPatch, StoredBlocks},
    value::Value,
};

/// Observable session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BatchState {
    /// Writes run immediately.
    Idle,
    /// Writes are buffered.
    Active,
    /// The outermost scope is sending the buffer.
    Flushing,
}

/// Identity of one owner's rows in one table.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct FrameKey {
    /// Table name.
    pub table: String,
    /// Owner type name.
    pub owner_type: String,
    /// Owner id.
    pub owner_id: i64,
}

#[derive(Debug, Clone)]
enum PendingBlock {
    Stored(Vec<Value>),
    Deleted,
}

/// Buffers statements and pending rows for the duration of a batch scope.
#[derive(Default)]
pub struct BatchSession {
    active: Cell<bool>,
    flushing: Cell<bool>,
    buffer: RefCell<Vec<Statement>>,
    pending: RefCell<HashMap<FrameKey, BTreeMap<BlockIndex, PendingBlock>>>,
    flushes: Cell<u64>,
}

impl fmt::Debug for BatchSession {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchSession")
            .field("state", &self.state())
            .field("buffered", &self.buffered())
            .field("flushes", &self.flushes.get())
            .finish()
    }
}

impl BatchSession {
    /// An idle session.
    pub fn new() -> Self {
        Self::default()
    }

    /// Current state.
    pub fn state(&self) -> BatchState {
        if self.flushing.get() {
            BatchState::Flushing
        } else if self.active.get() {
            BatchState::Active
        } else {
            BatchState::Idle
        }
    }

    /// Whether writes are currently buffered.
    pub fn is_active(&self) -> bool {
        self.active.get()
    }

    /// Statements waiting for the outermost scope to exit.
    pub fn buffered(&self) -> usize {
        self.buffer.borrow().len()
    }

    /// Flushes that reached the backend since the session was created.
    pub fn flush_count(&self) -> u64 {
        self.flushes.get()
    }

    /// Run `body` with writes buffered.
    ///
    /// Scopes nest; only the outermost exit flushes. The flush runs whether
    /// `body` succeeded or not, and the session is back to idle afterwards
    /// even if `body` panics. When both `body` and the flush fail, the
    /// body's error is returned and the flush error is logged.
    pub fn scope<B, T, E>(&self, backend: &B, body: impl FnOnce() -> Result<T, E>) -> Result<T, E>
    where
        B: Backend + ?Sized,
        E: From<BackendError> + fmt::Display,
    {
        let guard = ScopeGuard {
            session: self,
            was_active: self.active.replace(true),
        };
        if guard.was_active {
            return body();
        }

        let result = body();
        let flushed = self.flush(backend);
        drop(guard);

        match (result, flushed) {
            (Ok(value), Ok(())) => Ok(value),
            (Ok(_), Err(flush_err)) => Err(flush_err.into()),
            (Err(err), Ok(())) => Err(err),
            (Err(err), Err(flush_err)) => {
                warn!(error = %flush_err, original = %err, "batch flush failed after body error");
                Err(err)
            }
        }
    }

    fn flush<B>(&self, backend: &B) -> Result<(), BackendError>
    where
        B: Backend + ?Sized,
    {
        let statements = std::mem::take(&mut *self.buffer.borrow_mut());
        if statements.is_empty() {
            return Ok(());
        }
        self.flushing.set(true);
        debug!(statements = statements.len(), "flushing batch");
        let result = with_transaction(backend, |b| run_statements(b, &statements));
        self.flushing.set(false);
        self.flushes.set(self.flushes.get() + 1);
        result
    }

    pub(crate) fn enqueue(&self, statements: Vec<Statement>) {
        self.buffer.borrow_mut().extend(statements);
    }

    /// Remember the rows a buffered write leaves behind.
    pub(crate) fn record_rows<'a>(&self, key: &FrameKey, patches: impl Iterator<Item = &'a BlockPatch>) {
        let mut pending = self.pending.borrow_mut();
        let blocks = pending.entry(key.clone()).or_default();
        for patch in patches {
            blocks.insert(patch.block_index, PendingBlock::Stored(patch.values.clone()));
        }
    }

    /// Remember blocks removed by a buffered delete.
    pub(crate) fn record_deleted(&self, key: &FrameKey, block_indices: &[BlockIndex]) {
        let mut pending = self.pending.borrow_mut();
        let blocks = pending.entry(key.clone()).or_default();
        for &block_index in block_indices {
            blocks.insert(block_index, PendingBlock::Deleted);
        }
    }

    /// Apply pending rows for blocks `first..=last` on top of stored rows.
    pub(crate) fn overlay(&self, key: &FrameKey, first: BlockIndex, last: BlockIndex, blocks: &mut StoredBlocks) {
        if last < first {
            return;
        }
        let pending = self.pending.borrow();
        let Some(pending) = pending.get(key) else {
            return;
        };
        for (&block_index, block) in pending.range(first..=last) {
            match block {
                PendingBlock::Stored(values) => {
                    blocks.insert(block_index, values.clone());
                }
                PendingBlock::Deleted => {
                    blocks.remove(&block_index);
                }
            }
        }
    }
}

/// Restores the previous flag; the outermost guard also drops buffered work.
struct ScopeGuard<'a> {
    session: &'a BatchSession,
    was_active: bool,
}

impl Drop for ScopeGuard<'_> {
    fn drop(&mut self) {
        self.session.active.set(self.was_active);
        if !self.was_active {
            self.session.flushing.set(false);
            self.session.buffer.borrow_mut().clear();
            self.session.pending.borrow_mut().clear();
        }
    }
}
