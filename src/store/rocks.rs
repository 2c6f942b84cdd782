use std::collections::BTreeMap;
use std::io::Write;
use std::ops::Bound;
use std::path::{Path, PathBuf};

use anyhow::Context;
use bytes::Bytes;
use rocksdb::{
    IteratorMode, Options as RocksOptions, ReadOptions as RocksReadOptions,
    WriteBatch as RocksWriteBatch, WriteOptions as RocksWriteOptions, DB as RocksDb,
};
use tracing::info;

use crate::db::{
    Cursor, Direction, Op, OpKind, Range, StoreOptions, Value, VecCursor, WriteOptions,
};
use crate::error::TierError;
use crate::memtable::{bounds_as_slices, is_empty_range};
use crate::store::{write_hex_entry, Store};

const STAT_PROPERTIES: &[&str] = &[
    "rocksdb.stats",
    "rocksdb.estimate-num-keys",
    "rocksdb.num-files-at-level0",
    "rocksdb.num-files-at-level1",
    "rocksdb.total-sst-files-size",
    "rocksdb.cur-size-all-mem-tables",
    "rocksdb.num-snapshots",
    "rocksdb.num-live-versions",
];

/// RocksDB-backed store living at `<dir>/<name>.db`.
///
/// A second writable open of the same path fails on the RocksDB directory
/// lock; read-only handles may coexist.
pub struct RocksStore {
    name: String,
    path: PathBuf,
    options: StoreOptions,
    db: RocksDb,
}

impl RocksStore {
    pub fn open(name: &str, dir: impl AsRef<Path>, options: StoreOptions) -> anyhow::Result<Self> {
        let path = dir.as_ref().join(format!("{name}.db"));
        if options.create_if_missing && !options.read_only {
            std::fs::create_dir_all(dir.as_ref())
                .with_context(|| format!("create dir {}", dir.as_ref().display()))?;
        }

        let mut opts = RocksOptions::default();
        opts.create_if_missing(options.create_if_missing);
        let db = if options.read_only {
            RocksDb::open_for_read_only(&opts, &path, false)
        } else {
            RocksDb::open(&opts, &path)
        }
        .map_err(store_error)
        .with_context(|| format!("open rocksdb {}", path.display()))?;

        info!(
            store = name,
            path = %path.display(),
            read_only = options.read_only,
            "opened store"
        );
        Ok(Self {
            name: name.to_string(),
            path,
            options,
            db,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn options(&self) -> &StoreOptions {
        &self.options
    }

    fn read_options(range: &Range) -> RocksReadOptions {
        let mut ro = RocksReadOptions::default();
        match &range.start {
            Bound::Included(k) => ro.set_iterate_lower_bound(k.to_vec()),
            Bound::Excluded(k) => ro.set_iterate_lower_bound(successor(k)),
            Bound::Unbounded => {}
        }
        match &range.end {
            Bound::Included(k) => ro.set_iterate_upper_bound(successor(k)),
            Bound::Excluded(k) => ro.set_iterate_upper_bound(k.to_vec()),
            Bound::Unbounded => {}
        }
        ro
    }
}

/// Smallest key strictly greater than `key`.
fn successor(key: &[u8]) -> Vec<u8> {
    let mut next = Vec::with_capacity(key.len() + 1);
    next.extend_from_slice(key);
    next.push(0);
    next
}

fn store_error(err: rocksdb::Error) -> TierError {
    TierError::Store(err.into_string())
}

fn write_options(opts: WriteOptions) -> RocksWriteOptions {
    let mut wo = RocksWriteOptions::default();
    wo.set_sync(opts.sync);
    wo
}

impl Store for RocksStore {
    fn name(&self) -> &str {
        &self.name
    }

    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Value>> {
        let value = self
            .db
            .get(key)
            .map_err(store_error)
            .with_context(|| format!("rocksdb get on {}", self.name))?;
        Ok(value.map(Bytes::from))
    }

    fn put(&self, key: Bytes, value: Value, opts: WriteOptions) -> anyhow::Result<()> {
        self.db
            .put_opt(&key, &value, &write_options(opts))
            .map_err(store_error)
            .with_context(|| format!("rocksdb put on {}", self.name))
    }

    fn delete(&self, key: Bytes, opts: WriteOptions) -> anyhow::Result<()> {
        self.db
            .delete_opt(&key, &write_options(opts))
            .map_err(store_error)
            .with_context(|| format!("rocksdb delete on {}", self.name))
    }

    fn write(&self, ops: &[Op], opts: WriteOptions) -> anyhow::Result<()> {
        let mut batch = RocksWriteBatch::default();
        for op in ops {
            match op.kind {
                OpKind::Put => batch.put(&op.key, &op.value),
                OpKind::Del => batch.delete(&op.key),
            }
        }
        self.db
            .write_opt(batch, &write_options(opts))
            .map_err(store_error)
            .with_context(|| format!("rocksdb batch write on {} ({} ops)", self.name, ops.len()))
    }

    fn cursor(&self, range: &Range, direction: Direction) -> Box<dyn Cursor> {
        if is_empty_range(&bounds_as_slices(&range.start, &range.end)) {
            return Box::new(VecCursor::empty());
        }

        let mut entries = Vec::new();
        for item in self
            .db
            .iterator_opt(IteratorMode::Start, Self::read_options(range))
        {
            match item {
                Ok((key, value)) => {
                    entries.push((Bytes::from(key.into_vec()), Bytes::from(value.into_vec())));
                }
                Err(err) => {
                    let err = anyhow::Error::new(store_error(err))
                        .context(format!("rocksdb scan on {}", self.name));
                    return Box::new(VecCursor::with_error(entries, direction, err));
                }
            }
        }
        Box::new(VecCursor::new(entries, direction))
    }

    fn stats(&self) -> BTreeMap<String, String> {
        let mut stats = BTreeMap::new();
        for property in STAT_PROPERTIES {
            if let Ok(Some(value)) = self.db.property_value(*property) {
                stats.insert((*property).to_string(), value);
            }
        }
        stats
    }

    fn dump(&self, out: &mut dyn Write) -> anyhow::Result<()> {
        if let Some(stats) = self.db.property_value("rocksdb.stats").map_err(store_error)? {
            writeln!(out, "{stats}")?;
        }
        for item in self.db.iterator(IteratorMode::Start) {
            let (key, value) = item
                .map_err(store_error)
                .with_context(|| format!("rocksdb dump on {}", self.name))?;
            write_hex_entry(out, &key, &value)?;
        }
        Ok(())
    }
}

impl std::fmt::Debug for RocksStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RocksStore")
            .field("name", &self.name)
            .field("path", &self.path)
            .field("read_only", &self.options.read_only)
            .finish()
    }
}
