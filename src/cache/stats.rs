use std::collections::BTreeMap;
use std::io::Write;

use crate::memtable::MemTable;
use crate::store::{hex_upper, write_hex_entry};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct GenerationStats {
    /// Keys held, tombstones included.
    pub entries: usize,
    pub tombstones: usize,
    pub approximate_bytes: u64,
}

impl GenerationStats {
    pub(super) fn of(table: &MemTable) -> Self {
        Self {
            entries: table.len(),
            tombstones: table.tombstone_count(),
            approximate_bytes: table.approximate_bytes(),
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub generation: u64,
    pub current: GenerationStats,
    pub prior: GenerationStats,
    pub pending_ops: usize,
    pub pending_bytes: usize,
    pub queued_batches: usize,
    pub queued_ops: usize,
    pub poisoned: bool,
}

impl CacheStats {
    pub fn to_map(&self) -> BTreeMap<String, String> {
        let mut out = BTreeMap::new();
        let mut put = |k: &str, v: String| {
            out.insert(format!("cache.{k}"), v);
        };
        put("generation", self.generation.to_string());
        put("current.entries", self.current.entries.to_string());
        put("current.tombstones", self.current.tombstones.to_string());
        put("current.bytes", self.current.approximate_bytes.to_string());
        put("prior.entries", self.prior.entries.to_string());
        put("prior.tombstones", self.prior.tombstones.to_string());
        put("prior.bytes", self.prior.approximate_bytes.to_string());
        put("pending.ops", self.pending_ops.to_string());
        put("pending.bytes", self.pending_bytes.to_string());
        put("queue.batches", self.queued_batches.to_string());
        put("queue.ops", self.queued_ops.to_string());
        put("poisoned", self.poisoned.to_string());
        out
    }
}

pub(super) fn dump_generation(out: &mut dyn Write, table: &MemTable) -> std::io::Result<()> {
    for (key, value) in table.entries() {
        match value {
            Some(value) => write_hex_entry(out, &key, &value)?,
            None => writeln!(out, "[{}]:\t<deleted>", hex_upper(&key))?,
        }
    }
    Ok(())
}
