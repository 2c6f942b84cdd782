//! Iteration across the cache tiers.
//!
//! [`MergeIterator`] does not compare keys across tiers. It always emits from
//! the highest-priority tier that still has entries, and only moves that tier
//! forward. Forward iteration prefers current, then prior, then store; reverse
//! iteration prefers store, then prior, then current.
//!
//! The output is sorted and duplicate-free only while the tiers hold disjoint
//! key ranges. Overlapping ranges yield misordered (and possibly repeated)
//! keys, and in reverse an older tier's value can be emitted ahead of a newer
//! one. Point reads through the cache are unaffected.
//!
//! Deletes do shadow across tiers: an entry from the prior tier or the store
//! is skipped when a newer generation holds a tombstone for its key.

use std::collections::BTreeSet;

use bytes::Bytes;

use crate::db::{Cursor, Direction, Range, Value};
use crate::error::TierError;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tier {
    Current,
    Prior,
    Store,
}

impl Tier {
    const FORWARD: [Tier; 3] = [Tier::Current, Tier::Prior, Tier::Store];
    const REVERSE: [Tier; 3] = [Tier::Store, Tier::Prior, Tier::Current];
    /// Order in which tier errors are reported, whatever the direction.
    const ERROR_ORDER: [Tier; 3] = [Tier::Current, Tier::Prior, Tier::Store];

    pub fn priority(direction: Direction) -> [Tier; 3] {
        match direction {
            Direction::Forward => Self::FORWARD,
            Direction::Reverse => Self::REVERSE,
        }
    }
}

/// Keys deleted by each generation, captured with the tier cursors.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tombstones {
    pub current: BTreeSet<Bytes>,
    /// Shadows the store only; a newer write in current wins over it.
    pub prior: BTreeSet<Bytes>,
}

impl Tombstones {
    fn shadows(&self, tier: Tier, key: &[u8]) -> bool {
        match tier {
            Tier::Current => false,
            Tier::Prior => self.current.contains(key),
            Tier::Store => self.current.contains(key) || self.prior.contains(key),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MergeState {
    /// Every tier is exhausted (or the iterator was closed).
    Invalid,
    /// Emitting from this tier.
    Positioned(Tier),
}

pub struct MergeIterator {
    range: Range,
    direction: Direction,
    current: Box<dyn Cursor>,
    prior: Box<dyn Cursor>,
    store: Box<dyn Cursor>,
    tombstones: Tombstones,
    state: MergeState,
    /// Failure while skipping shadowed entries.
    fault: Option<anyhow::Error>,
    closed: bool,
}

impl MergeIterator {
    pub fn new(
        range: Range,
        direction: Direction,
        current: Box<dyn Cursor>,
        prior: Box<dyn Cursor>,
        store: Box<dyn Cursor>,
        tombstones: Tombstones,
    ) -> Self {
        let mut iter = Self {
            range,
            direction,
            current,
            prior,
            store,
            tombstones,
            state: MergeState::Invalid,
            fault: None,
            closed: false,
        };
        if let Err(err) = iter.reposition() {
            iter.state = MergeState::Invalid;
            iter.fault = Some(err);
        }
        iter
    }

    /// Bounds the iterator was opened with.
    pub fn domain(&self) -> &Range {
        &self.range
    }

    pub fn direction(&self) -> Direction {
        self.direction
    }

    pub fn state(&self) -> MergeState {
        self.state
    }

    fn tier(&self, tier: Tier) -> &(dyn Cursor + 'static) {
        match tier {
            Tier::Current => self.current.as_ref(),
            Tier::Prior => self.prior.as_ref(),
            Tier::Store => self.store.as_ref(),
        }
    }

    fn tier_mut(&mut self, tier: Tier) -> &mut (dyn Cursor + 'static) {
        match tier {
            Tier::Current => self.current.as_mut(),
            Tier::Prior => self.prior.as_mut(),
            Tier::Store => self.store.as_mut(),
        }
    }

    /// Picks the highest-priority tier with an unshadowed entry, stepping
    /// lower tiers past keys a newer generation deleted.
    fn reposition(&mut self) -> anyhow::Result<()> {
        for tier in Tier::priority(self.direction) {
            while let Some(key) = self.tier(tier).key() {
                if !self.tombstones.shadows(tier, key) {
                    self.state = MergeState::Positioned(tier);
                    return Ok(());
                }
                self.tier_mut(tier).advance()?;
            }
        }
        self.state = MergeState::Invalid;
        Ok(())
    }
}

impl Cursor for MergeIterator {
    fn valid(&self) -> bool {
        matches!(self.state, MergeState::Positioned(_))
    }

    fn key(&self) -> Option<&Bytes> {
        match self.state {
            MergeState::Positioned(tier) => self.tier(tier).key(),
            MergeState::Invalid => None,
        }
    }

    fn value(&self) -> Option<&Value> {
        match self.state {
            MergeState::Positioned(tier) => self.tier(tier).value(),
            MergeState::Invalid => None,
        }
    }

    fn advance(&mut self) -> anyhow::Result<()> {
        if self.closed {
            return Err(TierError::UseAfterClose {
                what: "merge iterator",
            }
            .into());
        }
        if let MergeState::Positioned(tier) = self.state {
            self.tier_mut(tier).advance()?;
            if let Err(err) = self.reposition() {
                self.state = MergeState::Invalid;
                return Err(err);
            }
        }
        Ok(())
    }

    fn error(&self) -> Option<&anyhow::Error> {
        Tier::ERROR_ORDER
            .into_iter()
            .find_map(|tier| self.tier(tier).error())
            .or(self.fault.as_ref())
    }

    fn close(&mut self) {
        self.current.close();
        self.prior.close();
        self.store.close();
        self.state = MergeState::Invalid;
        self.closed = true;
    }

    fn is_closed(&self) -> bool {
        self.closed
    }
}

impl Iterator for MergeIterator {
    type Item = (Bytes, Value);

    fn next(&mut self) -> Option<Self::Item> {
        let item = (self.key()?.clone(), self.value()?.clone());
        self.advance().ok()?;
        Some(item)
    }
}
