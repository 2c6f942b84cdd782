#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io::Write;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use bytes::Bytes;

use tierdb::db::VecCursor;
use tierdb::{Cursor, Direction, MemStore, Op, Range, Store, TierError, Value, WriteOptions};

/// `MemStore` with switchable failures.
pub struct FaultyStore {
    inner: MemStore,
    pub fail_batches: AtomicBool,
    pub fail_force_put: AtomicBool,
    pub fail_scans: AtomicBool,
}

impl FaultyStore {
    pub fn new(name: &str) -> Arc<Self> {
        Arc::new(Self {
            inner: MemStore::new(name),
            fail_batches: AtomicBool::new(false),
            fail_force_put: AtomicBool::new(false),
            fail_scans: AtomicBool::new(false),
        })
    }

    pub fn set(flag: &AtomicBool, on: bool) {
        flag.store(on, Ordering::SeqCst);
    }
}

impl Store for FaultyStore {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Value>> {
        self.inner.get(key)
    }

    fn put(&self, key: Bytes, value: Value, opts: WriteOptions) -> anyhow::Result<()> {
        self.inner.put(key, value, opts)
    }

    fn delete(&self, key: Bytes, opts: WriteOptions) -> anyhow::Result<()> {
        self.inner.delete(key, opts)
    }

    fn force_put(&self, key: Bytes, value: Value) -> anyhow::Result<()> {
        if self.fail_force_put.load(Ordering::SeqCst) {
            anyhow::bail!("injected force put failure");
        }
        self.inner.force_put(key, value)
    }

    fn write(&self, ops: &[Op], opts: WriteOptions) -> anyhow::Result<()> {
        if self.fail_batches.load(Ordering::SeqCst) {
            return Err(TierError::Store("injected batch failure".into()).into());
        }
        self.inner.write(ops, opts)
    }

    fn cursor(&self, range: &Range, direction: Direction) -> Box<dyn Cursor> {
        if self.fail_scans.load(Ordering::SeqCst) {
            return Box::new(VecCursor::with_error(
                Vec::new(),
                direction,
                anyhow::anyhow!("injected scan failure"),
            ));
        }
        self.inner.cursor(range, direction)
    }

    fn stats(&self) -> BTreeMap<String, String> {
        self.inner.stats()
    }

    fn dump(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        self.inner.dump(out)
    }
}

pub fn key(s: &str) -> Bytes {
    Bytes::copy_from_slice(s.as_bytes())
}

pub fn keys_of(iter: tierdb::MergeIterator) -> Vec<String> {
    iter.map(|(k, _)| String::from_utf8_lossy(&k).into_owned())
        .collect()
}
