use bytes::Bytes;

use crate::cache::TieredCache;
use crate::db::{Op, Value};
use crate::error::TierError;
use crate::store::Store;

/// Batch staged only in the cache's current generation.
///
/// Its writes never enter the pending batch, so they are not made durable by a
/// generation advance; they disappear from reads once the generation they were
/// written in has been rotated out of the prior map.
pub struct ScopedBatch<'a, S: Store> {
    cache: &'a TieredCache<S>,
    ops: Vec<Op>,
    closed: bool,
}

impl<'a, S: Store> ScopedBatch<'a, S> {
    pub(super) fn new(cache: &'a TieredCache<S>) -> Self {
        Self {
            cache,
            ops: Vec::new(),
            closed: false,
        }
    }

    pub fn put(&mut self, key: impl Into<Bytes>, value: impl Into<Value>) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.ops.push(Op::put(key, value));
        Ok(())
    }

    pub fn delete(&mut self, key: impl Into<Bytes>) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.ops.push(Op::delete(key));
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.ops.len()
    }

    pub fn is_empty(&self) -> bool {
        self.ops.is_empty()
    }

    /// Applies the staged ops to the current generation and closes the batch.
    pub fn write(&mut self) -> anyhow::Result<()> {
        self.ensure_open()?;
        self.cache.apply_to_current(&self.ops)?;
        self.close();
        Ok(())
    }

    /// Drops staged ops. Idempotent.
    pub fn close(&mut self) {
        self.ops = Vec::new();
        self.closed = true;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn ensure_open(&self) -> anyhow::Result<()> {
        if self.closed {
            return Err(TierError::UseAfterClose { what: "scoped batch" }.into());
        }
        Ok(())
    }
}
