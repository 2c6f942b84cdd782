//! Two-generation write cache over a persistent store.
//!
//! Writes accepted during a generation live in the *current* map and in a
//! pending batch. [`TieredCache::advance`] promotes them: the batches queued by
//! the previous advance are applied durably, the pending batch is queued in
//! their place, the current map becomes the *prior* map and a fresh current
//! map is started. A generation's writes therefore reach the store only once
//! the generation after it has been finalized, and at most two generations are
//! ever buffered.
//!
//! Reads resolve current, then prior, then store. Deletes are tombstones in the
//! current map, so a deleted key is never resurrected from a lower tier.

use std::collections::VecDeque;
use std::io::Write;
use std::sync::Arc;

use anyhow::Context;
use bytes::Bytes;
use parking_lot::{Mutex, RwLock};
use tracing::{debug, error, warn};

use crate::db::{CacheOptions, Direction, Op, Range, Value, WriteOptions};
use crate::error::TierError;
use crate::memtable::MemTable;
use crate::merge::{MergeIterator, Tombstones};
use crate::store::{Store, WriteBatch};

mod scoped;
mod stats;

pub use scoped::ScopedBatch;
pub use stats::{CacheStats, GenerationStats};

pub struct TieredCache<S: Store> {
    store: Arc<S>,
    options: CacheOptions,
    state: RwLock<Generations<S>>,
}

struct Generations<S: Store> {
    current: Arc<MemTable>,
    prior: Arc<MemTable>,
    /// Taken before touching `current` so the map and the batch agree on
    /// write order.
    pending: Mutex<WriteBatch<S>>,
    /// Promoted batches awaiting durable apply. Only touched under the write
    /// lock.
    queue: VecDeque<WriteBatch<S>>,
    generation: u64,
    poisoned: Option<String>,
}

impl<S: Store> Generations<S> {
    fn ensure_healthy(&self) -> anyhow::Result<()> {
        match &self.poisoned {
            Some(reason) => Err(TierError::Poisoned(reason.clone()).into()),
            None => Ok(()),
        }
    }
}

impl<S: Store> TieredCache<S> {
    pub fn new(store: Arc<S>, options: CacheOptions) -> Self {
        let pending = WriteBatch::new(store.clone());
        Self {
            store,
            options,
            state: RwLock::new(Generations {
                current: Arc::new(MemTable::new()),
                prior: Arc::new(MemTable::new()),
                pending: Mutex::new(pending),
                queue: VecDeque::new(),
                generation: 0,
                poisoned: None,
            }),
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn options(&self) -> &CacheOptions {
        &self.options
    }

    pub fn get(&self, key: impl AsRef<[u8]>) -> anyhow::Result<Option<Value>> {
        let key = key.as_ref();
        let state = self.state.read();
        if let Some(resolved) = state.current.lookup(key).resolved() {
            return Ok(resolved);
        }
        if let Some(resolved) = state.prior.lookup(key).resolved() {
            return Ok(resolved);
        }
        self.store.get(key).context("store get")
    }

    pub fn has(&self, key: impl AsRef<[u8]>) -> anyhow::Result<bool> {
        let key = key.as_ref();
        let state = self.state.read();
        if let Some(resolved) = state.current.lookup(key).resolved() {
            return Ok(resolved.is_some());
        }
        if let Some(resolved) = state.prior.lookup(key).resolved() {
            return Ok(resolved.is_some());
        }
        self.store.has(key).context("store has")
    }

    /// Buffers a write in the current generation.
    ///
    /// Keys in the persistent set are also written to the store synchronously
    /// right away. That write failing is logged and does not stop the cache
    /// write.
    pub fn put(&self, key: impl Into<Bytes>, value: impl Into<Value>) -> anyhow::Result<()> {
        let key = key.into();
        let value = value.into();
        let state = self.state.read();
        state.ensure_healthy()?;

        if self.options.is_persistent_key(&key) {
            if let Err(err) = self.store.force_put(key.clone(), value.clone()) {
                warn!(
                    store = self.store.name(),
                    error = %err,
                    "durable write of persistent key failed"
                );
            }
        }

        let mut pending = state.pending.lock();
        pending.put(key.clone(), value.clone())?;
        state.current.put(key, value);
        Ok(())
    }

    /// Writes straight to the store with sync, skipping the cache entirely.
    pub fn force_put(&self, key: impl Into<Bytes>, value: impl Into<Value>) -> anyhow::Result<()> {
        self.store
            .force_put(key.into(), value.into())
            .context("store force put")
    }

    /// Deletes `key`: queues the delete, drops it from the prior generation and
    /// leaves a tombstone in the current one.
    pub fn delete(&self, key: impl Into<Bytes>) -> anyhow::Result<()> {
        let key = key.into();
        let state = self.state.read();
        state.ensure_healthy()?;

        let mut pending = state.pending.lock();
        pending.delete(key.clone())?;
        state.prior.remove(&key);
        state.current.tombstone(key);
        Ok(())
    }

    /// Finalizes the current generation.
    ///
    /// Runs under the exclusive lock: queued batches are applied in order with
    /// sync writes, which a [`ZonedStore`](crate::store::ZonedStore) never
    /// defers, then the pending batch is queued and the generation maps are
    /// rotated. If a queued batch fails to apply, the error is returned and the
    /// engine is poisoned; every later mutation fails with
    /// [`TierError::Poisoned`].
    pub fn advance(&self) -> anyhow::Result<()> {
        let mut guard = self.state.write();
        let state = &mut *guard;
        state.ensure_healthy()?;

        let flushed = state.queue.len();
        while let Some(batch) = state.queue.front_mut() {
            let ops = batch.len();
            if let Err(err) = batch.write(WriteOptions::SYNC) {
                let reason = format!("{err:#}");
                error!(
                    store = self.store.name(),
                    generation = state.generation,
                    ops,
                    error = %reason,
                    "durable flush of queued batch failed"
                );
                state.poisoned = Some(reason);
                return Err(err.context(format!(
                    "flush queued batch before advancing generation {}",
                    state.generation
                )));
            }
            state.queue.pop_front();
        }

        let promoted = std::mem::replace(
            state.pending.get_mut(),
            WriteBatch::new(self.store.clone()),
        );
        let promoted_ops = promoted.len();
        state.queue.push_back(promoted);
        state.prior = std::mem::replace(&mut state.current, Arc::new(MemTable::new()));
        state.generation += 1;

        debug!(
            store = self.store.name(),
            generation = state.generation,
            flushed,
            promoted_ops,
            "advanced generation"
        );
        Ok(())
    }

    /// Batch whose writes land only in the current generation map.
    pub fn scoped_batch(&self) -> ScopedBatch<'_, S> {
        ScopedBatch::new(self)
    }

    /// Iterator over `range` across all three tiers.
    ///
    /// Tiers are drained in a fixed priority order rather than merged by key;
    /// see [`MergeIterator`]. Keys deleted in a generation are hidden from
    /// the tiers below it. Every tier is captured at the same instant, so
    /// later writes and advances are not observed.
    pub fn iter(&self, range: Range, direction: Direction) -> MergeIterator {
        let state = self.state.read();
        let current = state.current.cursor(&range, direction);
        let prior = state.prior.cursor(&range, direction);
        let tombstones = Tombstones {
            current: state.current.tombstones_in(&range),
            prior: state.prior.tombstones_in(&range),
        };
        let store = self.store.cursor(&range, direction);
        drop(state);
        MergeIterator::new(
            range,
            direction,
            Box::new(current),
            Box::new(prior),
            store,
            tombstones,
        )
    }

    /// Number of finalized generations.
    pub fn generation(&self) -> u64 {
        self.state.read().generation
    }

    /// Promoted batches not yet applied to the store.
    pub fn queued_batches(&self) -> usize {
        self.state.read().queue.len()
    }

    /// Ops recorded for the current generation.
    pub fn pending_ops(&self) -> usize {
        self.state.read().pending.lock().len()
    }

    pub fn is_poisoned(&self) -> bool {
        self.state.read().poisoned.is_some()
    }

    pub fn stats(&self) -> std::collections::BTreeMap<String, String> {
        let mut out = self.cache_stats().to_map();
        out.extend(self.store.stats());
        out
    }

    pub fn cache_stats(&self) -> CacheStats {
        let state = self.state.read();
        let pending = state.pending.lock();
        CacheStats {
            generation: state.generation,
            current: GenerationStats::of(&state.current),
            prior: GenerationStats::of(&state.prior),
            pending_ops: pending.len(),
            pending_bytes: pending.approximate_bytes(),
            queued_batches: state.queue.len(),
            queued_ops: state.queue.iter().map(|b| b.len()).sum(),
            poisoned: state.poisoned.is_some(),
        }
    }

    /// Human-readable listing of every tier.
    pub fn dump(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        let (current, prior) = {
            let state = self.state.read();
            (state.current.clone(), state.prior.clone())
        };
        writeln!(out, "Cache --")?;
        stats::dump_generation(out, &current)?;
        writeln!(out, "Prior --")?;
        stats::dump_generation(out, &prior)?;
        writeln!(out, "DB --")?;
        self.store.dump(out)
    }

    /// Applies every queued batch and consumes the engine.
    ///
    /// The unfinished current generation is not written.
    pub fn close(self) -> anyhow::Result<()> {
        let mut state = self.state.into_inner();
        state.ensure_healthy()?;
        for mut batch in state.queue.drain(..) {
            batch.write(WriteOptions::SYNC).context("flush queued batch on close")?;
        }
        state.pending.get_mut().discard();
        Ok(())
    }

    pub(crate) fn apply_to_current(&self, ops: &[Op]) -> anyhow::Result<()> {
        let state = self.state.read();
        state.ensure_healthy()?;
        for op in ops {
            state.current.apply(op);
        }
        Ok(())
    }
}

#[cfg(feature = "rocksdb")]
impl TieredCache<crate::store::RocksStore> {
    /// Opens (or creates) `<dir>/<name>.db` and wraps it in a cache.
    pub fn open(
        name: &str,
        dir: impl AsRef<std::path::Path>,
        store_options: crate::db::StoreOptions,
        options: CacheOptions,
    ) -> anyhow::Result<Self> {
        let store = crate::store::RocksStore::open(name, dir, store_options)?;
        Ok(Self::new(Arc::new(store), options))
    }
}

impl<S: Store> std::fmt::Debug for TieredCache<S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let state = self.state.read();
        f.debug_struct("TieredCache")
            .field("store", &self.store.name())
            .field("generation", &state.generation)
            .field("current", &state.current.len())
            .field("prior", &state.prior.len())
            .field("queued_batches", &state.queue.len())
            .finish()
    }
}
