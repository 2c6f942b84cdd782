//! Persistent store boundary.
//!
//! The cache engine only needs point reads, point writes, atomically applied
//! batches and bounded range scans from the durable layer. [`Store`] captures
//! exactly that; on-disk layout, compaction and locking belong to the adapter.

use std::collections::BTreeMap;
use std::io::Write;

use bytes::Bytes;

use crate::db::{Cursor, Direction, Op, Range, Value, WriteOptions};

mod batch;
mod memory;
#[cfg(feature = "rocksdb")]
mod rocks;
mod zone;

pub use batch::WriteBatch;
pub use memory::MemStore;
#[cfg(feature = "rocksdb")]
pub use rocks::RocksStore;
pub use zone::ZonedStore;

pub trait Store: Send + Sync + 'static {
    fn name(&self) -> &str;

    fn get(&self, key: &[u8]) -> anyhow::Result<Option<Value>>;

    fn has(&self, key: &[u8]) -> anyhow::Result<bool> {
        Ok(self.get(key)?.is_some())
    }

    fn put(&self, key: Bytes, value: Value, opts: WriteOptions) -> anyhow::Result<()>;

    fn delete(&self, key: Bytes, opts: WriteOptions) -> anyhow::Result<()>;

    /// Synchronous write that is never deferred by the adapter.
    fn force_put(&self, key: Bytes, value: Value) -> anyhow::Result<()> {
        self.put(key, value, WriteOptions::SYNC)
    }

    /// Applies `ops` in order as one atomic unit.
    fn write(&self, ops: &[Op], opts: WriteOptions) -> anyhow::Result<()>;

    /// Cursor over `range` as of this call. Scan failures are reported
    /// through [`Cursor::error`].
    fn cursor(&self, range: &Range, direction: Direction) -> Box<dyn Cursor>;

    fn stats(&self) -> BTreeMap<String, String>;

    fn dump(&self, out: &mut dyn Write) -> anyhow::Result<()>;
}

pub(crate) fn write_hex_entry(out: &mut dyn Write, key: &[u8], value: &[u8]) -> std::io::Result<()> {
    writeln!(out, "[{}]:\t[{}]", hex_upper(key), hex_upper(value))
}

pub(crate) fn hex_upper(bytes: &[u8]) -> String {
    use std::fmt::Write as _;
    let mut out = String::with_capacity(bytes.len() * 2);
    for b in bytes {
        let _ = write!(out, "{b:02X}");
    }
    out
}
