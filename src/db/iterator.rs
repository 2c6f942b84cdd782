use std::ops::Bound;

use bytes::Bytes;

use crate::db::{Direction, Value};
use crate::error::TierError;

/// Positioned cursor over an ordered key range.
///
/// A cursor starts positioned at its first entry (or invalid when the range is
/// empty). `key`/`value` return `None` once the cursor is exhausted or closed.
pub trait Cursor: Send {
    fn valid(&self) -> bool;

    fn key(&self) -> Option<&Bytes>;

    fn value(&self) -> Option<&Value>;

    /// Moves to the next entry. Advancing an exhausted cursor is a no-op;
    /// advancing a closed one is an error.
    fn advance(&mut self) -> anyhow::Result<()>;

    /// First error hit while producing entries, if any.
    fn error(&self) -> Option<&anyhow::Error>;

    /// Releases the cursor. Idempotent.
    fn close(&mut self);

    fn is_closed(&self) -> bool;
}

/// Cursor over entries collected up front.
///
/// Entries are captured when the cursor is built, so later writes to the
/// source are not observed.
pub struct VecCursor {
    entries: Vec<(Bytes, Value)>,
    index: usize,
    closed: bool,
    error: Option<anyhow::Error>,
}

impl VecCursor {
    /// `entries` must be in ascending key order; they are reversed for
    /// [`Direction::Reverse`].
    pub fn new(mut entries: Vec<(Bytes, Value)>, direction: Direction) -> Self {
        if direction.is_reverse() {
            entries.reverse();
        }
        Self {
            entries,
            index: 0,
            closed: false,
            error: None,
        }
    }

    /// Cursor over the entries read before `error` interrupted the scan.
    pub fn with_error(entries: Vec<(Bytes, Value)>, direction: Direction, error: anyhow::Error) -> Self {
        let mut cursor = Self::new(entries, direction);
        cursor.error = Some(error);
        cursor
    }

    pub fn empty() -> Self {
        Self::new(Vec::new(), Direction::Forward)
    }

    pub fn remaining(&self) -> usize {
        self.entries.len().saturating_sub(self.index)
    }

    fn current(&self) -> Option<&(Bytes, Value)> {
        if self.closed {
            return None;
        }
        self.entries.get(self.index)
    }
}

impl Cursor for VecCursor {
    fn valid(&self) -> bool {
        self.current().is_some()
    }

    fn key(&self) -> Option<&Bytes> {
        self.current().map(|(k, _)| k)
    }

    fn value(&self) -> Option<&Value> {
        self.current().map(|(_, v)| v)
    }

    fn advance(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Err(TierError::UseAfterClose { what: "cursor" }.into());
        }
        if self.index < self.entries.len() {
            self.index += 1;
        }
        Ok(())
    }

    fn error(&self) -> Option<&anyhow::Error> {
        self.error.as_ref()
    }

    fn close(&mut self) {
        if !self.closed {
            self.closed = true;
            self.entries = Vec::new();
        }
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

pub fn range_contains(start: &Bound<Bytes>, end: &Bound<Bytes>, key: &[u8]) -> bool {
    let start_ok = match start {
        Bound::Unbounded => true,
        Bound::Included(k) => key >= k.as_ref(),
        Bound::Excluded(k) => key > k.as_ref(),
    };
    let end_ok = match end {
        Bound::Unbounded => true,
        Bound::Included(k) => key <= k.as_ref(),
        Bound::Excluded(k) => key < k.as_ref(),
    };
    start_ok && end_ok
}
