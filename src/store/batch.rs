use std::sync::Arc;

use bytes::Bytes;

use crate::db::{Op, Value, WriteOptions};
use crate::error::TierError;
use crate::store::Store;

/// Ordered log of puts and deletes bound to a store.
///
/// The batch is finalized by a successful [`WriteBatch::write`] or by
/// [`WriteBatch::discard`]; after that every mutation fails with
/// [`TierError::UseAfterClose`]. A failed write leaves the batch open so it can
/// be retried or kept queued.
pub struct WriteBatch<S: Store> {
    store: Arc<S>,
    ops: Vec<Op>,
    approximate_bytes: usize,
    closed: bool,
}

impl<S: Store> WriteBatch<S> {
    pub fn new(store: Arc<S>) -> Self {
        Self {
            store,
            ops: Vec::new(),
            approximate_bytes: 0,
            closed: false,
        }
    }

    pub fn put(&mut self, key: impl Into<Bytes>, value: impl Into<Value>) -> anyhow::Result<()> {
        self.push(Op::put(key, value))
    }

    pub fn delete(&mut self, key: impl Into<Bytes>) -> anyhow::Result<()> {
        self.push(Op::delete(key))
    }

    pub fn push(&mut self, op: Op) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.approximate_bytes += op.approximate_bytes();
        self.ops.push(op);
        Ok(())
    }

    pub fn extend(&mut self, ops: impl IntoIterator<Item = Op>) -> anyhow::Result<()> {
        for op in ops {
            self.push(op)?;
        }
        Ok(())
    }

    pub fn ops(&self) -> &[Op] {
        &self.ops
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    pub fn approximate_bytes(&self) -> usize {
        self.approximate_bytes
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Applies every op atomically, then finalizes the batch.
    pub fn write(&mut self, opts: WriteOptions) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.store.write(&self.ops, opts)?;
        self.discard();
        Ok(())
    }

    /// Drops the recorded ops and finalizes the batch. Idempotent.
    pub fn discard(&mut self) {
        self.ops = Vec::new();
        self.approximate_bytes = 0;
        self.closed = true;
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        if self.closed {
            return Err(TierError::UseAfterClose { what: "write batch" }.into());
        }
        Ok(())
    }
}

impl<S: Store> std::fmt::Debug for WriteBatch<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WriteBatch")
            .field("store", &self.store.name())
            .field("ops", &self.ops.len())
            .field("closed", &self.closed)
            .finish()
    }
}
