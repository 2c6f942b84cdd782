//! `tierdb` buffers writes for state machines whose durability is tied to an
//! external finality signal (a block height, an epoch boundary).
//!
//! - Writes land in an in-memory *current generation* and a pending batch.
//! - [`TieredCache::advance`] promotes them to the *prior generation* and
//!   durably applies the batch promoted by the advance before it, so writes
//!   become durable one generation late.
//! - Reads resolve current, then prior, then the persistent [`Store`].
//!
//! The persistent layer is pluggable through [`Store`]; [`MemStore`] is an
//! in-memory adapter and, with the `rocksdb` feature, [`RocksStore`] keeps data
//! on disk. [`ZonedStore`] offers the same one-generation-late durability to
//! callers that write to a store directly.

pub mod cache;
pub mod db;
pub mod error;
pub mod memtable;
pub mod merge;
pub mod store;

pub use cache::{CacheStats, GenerationStats, ScopedBatch, TieredCache};
pub use db::{CacheOptions, Cursor, Direction, Op, OpKind, Range, StoreOptions, Value, WriteOptions};
pub use error::TierError;
pub use merge::{MergeIterator, MergeState, Tier, Tombstones};
#[cfg(feature = "rocksdb")]
pub use store::RocksStore;
pub use store::{MemStore, Store, WriteBatch, ZonedStore};
