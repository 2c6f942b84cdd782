use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering};

use bytes::Bytes;
use parking_lot::RwLock;

use crate::db::{Cursor, Direction, Op, OpKind, Range, Value, VecCursor, WriteOptions};
use crate::memtable::{bounds_as_slices, is_empty_range};
use crate::store::{write_hex_entry, Store};

/// Ordered in-memory store.
///
/// Batches are applied under one write lock, so readers never observe a
/// partially applied batch. Nothing survives the process.
#[derive(Debug)]
pub struct MemStore {
    name: String,
    map: RwLock<BTreeMap<Bytes, Value>>,
    writes: AtomicU64,
    synced_writes: AtomicU64,
    batches: AtomicU64,
}

impl MemStore {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            map: RwLock::new(BTreeMap::new()),
            writes: AtomicU64::new(0),
            synced_writes: AtomicU64::new(0),
            batches: AtomicU64::new(0),
        }
    }

    pub fn len(&self) -> usize {
        self.map.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.read().is_empty()
    }

    /// Number of writes (point or batch) issued with `sync = true`.
    pub fn synced_writes(&self) -> u64 {
        self.synced_writes.load(Ordering::Relaxed)
    }

    fn record_write(&self, opts: WriteOptions) {
        self.writes.fetch_add(1, Ordering::Relaxed);
        if opts.sync {
            self.synced_writes.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl Store for MemStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Value>> {
        Ok(self.map.read().get(key).cloned())
    }

    fn put(&self, key: Bytes, value: Value, opts: WriteOptions) -> anyhow::Result<()> {
        self.map.write().insert(key, value);
        self.record_write(opts);
        Ok(())
    }

    fn delete(&self, key: Bytes, opts: WriteOptions) -> anyhow::Result<()> {
        self.map.write().remove(&key);
        self.record_write(opts);
        Ok(())
    }

    fn write(&self, ops: &[Op], opts: WriteOptions) -> anyhow::Result<()> {
        let mut map = self.map.write();
        for op in ops {
            match op.kind {
                OpKind::Put => {
                    map.insert(op.key.clone(), op.value.clone());
                }
                OpKind::Del => {
                    map.remove(&op.key);
                }
            }
        }
        drop(map);
        self.batches.fetch_add(1, Ordering::Relaxed);
        self.record_write(opts);
        Ok(())
    }

    fn cursor(&self, range: &Range, direction: Direction) -> Box<dyn Cursor> {
        let bounds = bounds_as_slices(&range.start, &range.end);
        if is_empty_range(&bounds) {
            return Box::new(VecCursor::empty());
        }
        let entries = self
            .map
            .read()
            .range::<[u8], (Bound<&[u8]>, Bound<&[u8]>)>(bounds)
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect();
        Box::new(VecCursor::new(entries, direction))
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();
        stats.insert("memstore.keys".to_string(), self.len().to_string());
        stats.insert(
            "memstore.writes".to_string(),
            self.writes.load(Ordering::Relaxed).to_string(),
        );
        stats.insert(
            "memstore.batches".to_string(),
            self.batches.load(Ordering::Relaxed).to_string(),
        );
        stats
    }

    fn dump(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        for (key, value) in self.map.read().iter() {
            write_hex_entry(out, key, value)?;
        }
        Ok(())
    }
}
