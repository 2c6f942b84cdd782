mod options;

use std::ops::Bound;

pub use options::{CacheOptions, StoreOptions, WriteOptions, DEFAULT_PERSISTENT_PREFIX};

pub mod iterator;

pub use iterator::{Cursor, VecCursor};

pub type Value = bytes::Bytes;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpKind {
    Put,
    Del,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Op {
    pub kind: OpKind,
    pub key: bytes::Bytes,
    pub value: bytes::Bytes,
}

impl Op {
    pub fn put(key: impl Into<bytes::Bytes>, value: impl Into<bytes::Bytes>) -> Self {
        Self {
            kind: OpKind::Put,
            key: key.into(),
            value: value.into(),
        }
    }

    pub fn delete(key: impl Into<bytes::Bytes>) -> Self {
        Self {
            kind: OpKind::Del,
            key: key.into(),
            value: bytes::Bytes::new(),
        }
    }

    pub(crate) fn approximate_bytes(&self) -> usize {
        self.key.len() + self.value.len()
    }
}

/// Iteration direction over a [`Range`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Direction {
    #[default]
    Forward,
    Reverse,
}

impl Direction {
    pub fn is_reverse(self) -> bool {
        matches!(self, Direction::Reverse)
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Range {
    pub start: Bound<bytes::Bytes>,
    pub end: Bound<bytes::Bytes>,
}

impl Range {
    /// `[start, end)`.
    pub fn new(start: impl Into<bytes::Bytes>, end: impl Into<bytes::Bytes>) -> Self {
        Self {
            start: Bound::Included(start.into()),
            end: Bound::Excluded(end.into()),
        }
    }

    /// `[start, ..)`.
    pub fn starting_at(start: impl Into<bytes::Bytes>) -> Self {
        Self {
            start: Bound::Included(start.into()),
            end: Bound::Unbounded,
        }
    }

    pub fn all() -> Self {
        Self {
            start: Bound::Unbounded,
            end: Bound::Unbounded,
        }
    }

    pub fn contains(&self, key: &[u8]) -> bool {
        iterator::range_contains(&self.start, &self.end, key)
    }
}
