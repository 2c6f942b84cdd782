use std::collections::{BTreeMap, VecDeque};
use std::io::Write;
use std::sync::Arc;

use bytes::Bytes;
use parking_lot::Mutex;
use tracing::{error, info};

use crate::db::{Cursor, Direction, Op, Range, Value, WriteOptions};
use crate::error::TierError;
use crate::store::{Store, WriteBatch};

/// Store wrapper with deferred durability for direct writers.
///
/// While a critical zone is open, point writes and non-sync batch writes are
/// captured in the zone batch instead of reaching the inner store. Releasing
/// the zone durably applies the batches captured by the *previous* zone and
/// queues the one just closed, so a zone's writes land only once the next zone
/// has been released. Reads always go straight to the inner store.
/// [`Store::force_put`] and sync batch writes are never deferred.
pub struct ZonedStore<S: Store> {
    inner: Arc<S>,
    zone: Mutex<ZoneState<S>>,
}

struct ZoneState<S: Store> {
    active: Option<WriteBatch<S>>,
    waiting: VecDeque<WriteBatch<S>>,
}

impl<S: Store> ZonedStore<S> {
    pub fn new(inner: Arc<S>) -> Self {
        Self {
            inner,
            zone: Mutex::new(ZoneState {
                active: None,
                waiting: VecDeque::new(),
            }),
        }
    }

    pub fn inner(&self) -> &Arc<S> {
        &self.inner
    }

    /// Opens a fresh zone batch. Entering twice without a release is an
    /// invariant violation, since the open batch would otherwise be lost.
    pub fn enter_zone(&self) -> anyhow::Result<()> {
        let mut zone = self.zone.lock();
        if zone.active.is_some() {
            return Err(TierError::InvariantViolation(format!(
                "critical zone already open on {}",
                self.inner.name()
            ))
            .into());
        }
        zone.active = Some(WriteBatch::new(self.inner.clone()));
        info!(store = self.inner.name(), "entered critical zone");
        Ok(())
    }

    /// Flushes the previous zone's batches and queues the current one.
    ///
    /// On a flush failure the zone stays open and unflushed batches stay
    /// queued; the error is returned as-is.
    pub fn release_zone(&self) -> anyhow::Result<()> {
        let mut zone = self.zone.lock();
        let zone = &mut *zone;
        info!(
            store = self.inner.name(),
            batches = zone.waiting.len(),
            "releasing critical zone"
        );

        while let Some(batch) = zone.waiting.front_mut() {
            if let Err(err) = batch.write(WriteOptions::SYNC) {
                error!(
                    store = self.inner.name(),
                    error = %err,
                    "durable flush of critical zone batch failed"
                );
                return Err(err);
            }
            zone.waiting.pop_front();
        }

        if let Some(batch) = zone.active.take() {
            zone.waiting.push_back(batch);
        }
        Ok(())
    }

    pub fn in_zone(&self) -> bool {
        self.zone.lock().active.is_some()
    }

    /// Batches closed by earlier zones and not yet durable.
    pub fn waiting_batches(&self) -> usize {
        self.zone.lock().waiting.len()
    }

    /// Ops captured by the open zone.
    pub fn zone_ops(&self) -> usize {
        self.zone
            .lock()
            .active
            .as_ref()
            .map_or(0, |batch| batch.len())
    }
}

impl<S: Store> Store for ZonedStore<S> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Value>> {
        self.inner.get(key)
    }

    fn has(&self, key: &[u8]) -> anyhow::Result<bool> {
        self.inner.has(key)
    }

    fn put(&self, key: Bytes, value: Value, opts: WriteOptions) -> anyhow::Result<()> {
        let mut zone = self.zone.lock();
        match zone.active.as_mut() {
            Some(batch) => batch.put(key, value),
            None => self.inner.put(key, value, opts),
        }
    }

    fn delete(&self, key: Bytes, opts: WriteOptions) -> anyhow::Result<()> {
        let mut zone = self.zone.lock();
        match zone.active.as_mut() {
            Some(batch) => batch.delete(key),
            None => self.inner.delete(key, opts),
        }
    }

    fn force_put(&self, key: Bytes, value: Value) -> anyhow::Result<()> {
        self.inner.force_put(key, value)
    }

    fn write(&self, ops: &[Op], opts: WriteOptions) -> anyhow::Result<()> {
        if !opts.sync {
            let mut zone = self.zone.lock();
            if let Some(batch) = zone.active.as_mut() {
                return batch.extend(ops.iter().cloned());
            }
        }
        self.inner.write(ops, opts)
    }

    fn cursor(&self, range: &Range, direction: Direction) -> Box<dyn Cursor> {
        self.inner.cursor(range, direction)
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = self.inner.stats();
        let zone = self.zone.lock();
        stats.insert("zone.active".to_string(), zone.active.is_some().to_string());
        stats.insert("zone.waiting_batches".to_string(), zone.waiting.len().to_string());
        stats
    }

    fn dump(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        self.inner.dump(out)
    }
}
