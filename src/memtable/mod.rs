//! Generation maps.
//!
//! A [`MemTable`] is the in-memory ordered map behind both cache generations.
//! It is a lock-free skiplist, so point reads and writes need no external
//! locking; swapping whole generations is the engine's job.

use std::collections::BTreeSet;
use std::ops::Bound;
use std::sync::atomic::{AtomicU64, Ordering as AtomicOrdering};

use bytes::Bytes;
use crossbeam_skiplist::SkipMap;

use crate::db::{Direction, Op, OpKind, Range, Value, VecCursor};

mod iter;

pub use iter::bounds_as_slices;
pub(crate) use iter::is_empty_range;

/// What a generation map knows about a key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Lookup {
    /// Never written in this generation; lower tiers decide.
    Absent,
    /// Deleted in this generation; shadows every lower tier.
    Deleted,
    Present(Value),
}

impl Lookup {
    /// `Some(result)` when this generation is authoritative for the key.
    pub fn resolved(self) -> Option<Option<Value>> {
        match self {
            Lookup::Absent => None,
            Lookup::Deleted => Some(None),
            Lookup::Present(v) => Some(Some(v)),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum Slot {
    Value(Value),
    Tombstone,
}

#[derive(Debug, Default)]
pub struct MemTable {
    map: SkipMap<Bytes, Slot>,
    approximate_bytes: AtomicU64,
}

impl MemTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn put(&self, key: Bytes, value: Value) {
        self.account(&key, value.len());
        self.map.insert(key, Slot::Value(value));
    }

    /// Records a delete that must shadow older tiers.
    pub fn tombstone(&self, key: Bytes) {
        self.account(&key, 0);
        self.map.insert(key, Slot::Tombstone);
    }

    /// Forgets the key entirely, value or tombstone.
    pub fn remove(&self, key: &[u8]) -> bool {
        self.map.remove(key).is_some()
    }

    pub fn apply(&self, op: &Op) {
        match op.kind {
            OpKind::Put => self.put(op.key.clone(), op.value.clone()),
            OpKind::Del => self.tombstone(op.key.clone()),
        }
    }

    pub fn lookup(&self, key: &[u8]) -> Lookup {
        match self.map.get(key) {
            None => Lookup::Absent,
            Some(entry) => match entry.value() {
                Slot::Value(v) => Lookup::Present(v.clone()),
                Slot::Tombstone => Lookup::Deleted,
            },
        }
    }

    /// Number of keys, tombstones included.
    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    pub fn tombstone_count(&self) -> usize {
        self.map
            .iter()
            .filter(|e| matches!(e.value(), Slot::Tombstone))
            .count()
    }

    pub fn approximate_bytes(&self) -> u64 {
        self.approximate_bytes.load(AtomicOrdering::Relaxed)
    }

    /// Live entries inside `range`, ascending. Tombstones are skipped.
    pub fn collect_range(&self, range: &Range) -> Vec<(Bytes, Value)> {
        let bounds = bounds_as_slices(&range.start, &range.end);
        if is_empty_range(&bounds) {
            return Vec::new();
        }
        self.map
            .range::<[u8], (Bound<&[u8]>, Bound<&[u8]>)>(bounds)
            .filter_map(|entry| match entry.value() {
                Slot::Value(v) => Some((entry.key().clone(), v.clone())),
                Slot::Tombstone => None,
            })
            .collect()
    }

    /// Keys inside `range` deleted in this generation.
    pub fn tombstones_in(&self, range: &Range) -> BTreeSet<Bytes> {
        let bounds = bounds_as_slices(&range.start, &range.end);
        if is_empty_range(&bounds) {
            return BTreeSet::new();
        }
        self.map
            .range::<[u8], (Bound<&[u8]>, Bound<&[u8]>)>(bounds)
            .filter(|entry| matches!(entry.value(), Slot::Tombstone))
            .map(|entry| entry.key().clone())
            .collect()
    }

    /// Snapshot cursor over the live entries of `range`.
    pub fn cursor(&self, range: &Range, direction: Direction) -> VecCursor {
        VecCursor::new(self.collect_range(range), direction)
    }

    /// Every entry in key order; `None` marks a tombstone.
    pub fn entries(&self) -> Vec<(Bytes, Option<Value>)> {
        self.map
            .iter()
            .map(|entry| {
                let value = match entry.value() {
                    Slot::Value(v) => Some(v.clone()),
                    Slot::Tombstone => None,
                };
                (entry.key().clone(), value)
            })
            .collect()
    }

    fn account(&self, key: &[u8], value_len: usize) {
        let bytes = key.len() as u64 + value_len as u64 + 16;
        self.approximate_bytes
            .fetch_add(bytes, AtomicOrdering::Relaxed);
    }
}
