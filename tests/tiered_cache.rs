mod common;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use bytes::Bytes;

use common::{key, FaultyStore};
use tierdb::{CacheOptions, MemStore, Store, TierError, TieredCache, WriteOptions};

fn memory_cache() -> (Arc<MemStore>, TieredCache<MemStore>) {
    let store = Arc::new(MemStore::new("application"));
    let cache = TieredCache::new(store.clone(), CacheOptions::default());
    (store, cache)
}

#[test]
fn read_your_own_write() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    cache.put(key("k"), key("v"))?;
    assert_eq!(cache.get(b"k")?, Some(key("v")));
    assert!(cache.has(b"k")?);
    assert_eq!(store.get(b"k")?, None);
    assert_eq!(cache.pending_ops(), 1);
    Ok(())
}

#[test]
fn current_shadows_prior_shadows_store() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    store.put(key("k"), key("store"), WriteOptions::SYNC)?;
    assert_eq!(cache.get(b"k")?, Some(key("store")));

    cache.put(key("k"), key("prior"))?;
    cache.advance()?;
    assert_eq!(cache.get(b"k")?, Some(key("prior")));
    assert_eq!(store.get(b"k")?, Some(key("store")));

    cache.put(key("k"), key("current"))?;
    assert_eq!(cache.get(b"k")?, Some(key("current")));
    Ok(())
}

#[test]
fn delete_shadows_lower_tiers() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    store.put(key("gone"), key("durable"), WriteOptions::SYNC)?;
    cache.put(key("also-gone"), key("v"))?;
    cache.advance()?;

    cache.delete(key("gone"))?;
    cache.delete(key("also-gone"))?;
    assert_eq!(cache.get(b"gone")?, None);
    assert!(!cache.has(b"gone")?);
    assert_eq!(cache.get(b"also-gone")?, None);
    assert!(!cache.has(b"also-gone")?);

    // The tombstone moves to the prior generation and keeps shadowing.
    cache.advance()?;
    assert_eq!(cache.get(b"gone")?, None);
    assert_eq!(store.get(b"gone")?, Some(key("durable")));

    // The delete becomes durable once its generation is flushed.
    cache.advance()?;
    assert_eq!(store.get(b"gone")?, None);
    assert_eq!(store.get(b"also-gone")?, None);
    assert_eq!(cache.get(b"gone")?, None);
    Ok(())
}

#[test]
fn put_after_delete_in_same_generation_wins() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    cache.delete(key("k"))?;
    cache.put(key("k"), key("back"))?;
    assert_eq!(cache.get(b"k")?, Some(key("back")));
    cache.advance()?;
    cache.advance()?;
    assert_eq!(store.get(b"k")?, Some(key("back")));
    Ok(())
}

#[test]
fn commit_queue_never_exceeds_one_batch() -> anyhow::Result<()> {
    let (_store, cache) = memory_cache();
    assert_eq!(cache.queued_batches(), 0);
    for generation in 1..=10u64 {
        cache.put(Bytes::from(format!("k{generation}")), key("v"))?;
        cache.advance()?;
        assert_eq!(cache.queued_batches(), 1);
        assert_eq!(cache.generation(), generation);
        assert_eq!(cache.pending_ops(), 0);
    }
    Ok(())
}

#[test]
fn writes_become_durable_one_generation_late() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    for k in ["k1", "k2", "k3"] {
        cache.put(key(k), key(k))?;
    }
    cache.advance()?;
    for k in ["k1", "k2", "k3"] {
        assert_eq!(store.get(k.as_bytes())?, None);
    }

    for k in ["k4", "k5", "k6"] {
        cache.put(key(k), key(k))?;
    }
    cache.advance()?;
    for k in ["k1", "k2", "k3"] {
        assert_eq!(store.get(k.as_bytes())?, Some(key(k)));
    }
    for k in ["k4", "k5", "k6"] {
        assert_eq!(store.get(k.as_bytes())?, None);
        assert_eq!(cache.get(k.as_bytes())?, Some(key(k)));
    }
    Ok(())
}

#[test]
fn flush_always_uses_sync_writes() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    cache.put(key("k"), key("v"))?;
    cache.advance()?;
    cache.advance()?;
    assert_eq!(store.synced_writes(), 1);
    Ok(())
}

#[test]
fn persistent_keys_are_durable_immediately() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    cache.put(key("validatorsKey/set"), key("v1"))?;
    assert_eq!(store.get(b"validatorsKey/set")?, Some(key("v1")));
    assert_eq!(cache.get(b"validatorsKey/set")?, Some(key("v1")));
    // Still mirrored into the generation's batch.
    assert_eq!(cache.pending_ops(), 1);

    cache.put(key("validators"), key("not-a-match"))?;
    assert_eq!(store.get(b"validators")?, None);
    Ok(())
}

#[test]
fn custom_persistent_prefix() -> anyhow::Result<()> {
    let store = Arc::new(MemStore::new("app"));
    let options = CacheOptions::default().with_persistent_prefix(&b"meta/"[..]);
    let cache = TieredCache::new(store.clone(), options);
    cache.put(key("meta/height"), key("7"))?;
    assert_eq!(store.get(b"meta/height")?, Some(key("7")));
    Ok(())
}

#[test]
fn failed_persistent_write_keeps_cache_write() -> anyhow::Result<()> {
    let store = FaultyStore::new("app");
    FaultyStore::set(&store.fail_force_put, true);
    let cache = TieredCache::new(store.clone(), CacheOptions::default());

    cache.put(key("validatorsKey"), key("v"))?;
    assert_eq!(store.get(b"validatorsKey")?, None);
    assert_eq!(cache.get(b"validatorsKey")?, Some(key("v")));
    Ok(())
}

#[test]
fn failed_flush_poisons_the_engine() -> anyhow::Result<()> {
    let store = FaultyStore::new("app");
    let cache = TieredCache::new(store.clone(), CacheOptions::default());
    cache.put(key("a"), key("1"))?;
    cache.advance()?;

    store.fail_batches.store(true, Ordering::SeqCst);
    cache.put(key("b"), key("2"))?;
    let err = cache.advance().expect_err("flush must fail");
    assert!(format!("{err:#}").contains("injected batch failure"));
    assert!(matches!(
        err.downcast_ref::<TierError>(),
        Some(TierError::Store(_))
    ));
    assert!(cache.is_poisoned());
    assert_eq!(cache.queued_batches(), 1);

    let err = cache.put(key("c"), key("3")).expect_err("poisoned put");
    assert!(matches!(
        err.downcast_ref::<TierError>(),
        Some(TierError::Poisoned(_))
    ));
    let err = cache.advance().expect_err("poisoned advance");
    assert!(matches!(
        err.downcast_ref::<TierError>(),
        Some(TierError::Poisoned(_))
    ));

    // Reads still resolve through the cache.
    assert_eq!(cache.get(b"a")?, Some(key("1")));
    assert_eq!(cache.get(b"b")?, Some(key("2")));
    Ok(())
}

#[test]
fn scoped_batch_stays_out_of_the_durable_path() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    store.put(key("drop"), key("durable"), WriteOptions::SYNC)?;

    let mut batch = cache.scoped_batch();
    batch.put(key("scratch"), key("v"))?;
    batch.delete(key("drop"))?;
    assert_eq!(cache.get(b"scratch")?, None);
    batch.write()?;

    assert_eq!(cache.get(b"scratch")?, Some(key("v")));
    assert_eq!(cache.get(b"drop")?, None);
    assert_eq!(cache.pending_ops(), 0);

    let err = batch.put(key("late"), key("v")).expect_err("write after close");
    assert!(matches!(
        err.downcast_ref::<TierError>(),
        Some(TierError::UseAfterClose { .. })
    ));
    batch.close();
    batch.close();

    cache.advance()?;
    assert_eq!(cache.get(b"scratch")?, Some(key("v")));
    cache.advance()?;
    assert_eq!(cache.get(b"scratch")?, None);
    assert_eq!(store.get(b"scratch")?, None);
    assert_eq!(cache.get(b"drop")?, Some(key("durable")));
    Ok(())
}

#[test]
fn empty_key_and_value_are_ordinary() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    cache.put(Bytes::new(), Bytes::new())?;
    assert_eq!(cache.get(b"")?, Some(Bytes::new()));
    assert!(cache.has(b"")?);
    cache.advance()?;
    cache.advance()?;
    assert_eq!(store.get(b"")?, Some(Bytes::new()));
    Ok(())
}

#[test]
fn close_flushes_queued_batches_only() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    cache.put(key("finalized"), key("v"))?;
    cache.advance()?;
    cache.put(key("unfinished"), key("v"))?;
    cache.close()?;

    assert_eq!(store.get(b"finalized")?, Some(key("v")));
    assert_eq!(store.get(b"unfinished")?, None);
    Ok(())
}

#[test]
fn concurrent_writers_and_advances_lose_nothing() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    let cache = Arc::new(cache);

    std::thread::scope(|scope| {
        for writer in 0..4 {
            let cache = cache.clone();
            scope.spawn(move || {
                for i in 0..200 {
                    let k = Bytes::from(format!("w{writer}-{i:04}"));
                    cache.put(k.clone(), k.clone()).expect("put");
                    assert_eq!(cache.get(&k).expect("get"), Some(k));
                }
            });
        }
        let cache = cache.clone();
        scope.spawn(move || {
            for _ in 0..20 {
                cache.advance().expect("advance");
                assert!(cache.queued_batches() <= 1);
                std::thread::yield_now();
            }
        });
    });

    cache.advance()?;
    cache.advance()?;
    assert_eq!(store.len(), 800);
    for writer in 0..4 {
        for i in 0..200 {
            let k = format!("w{writer}-{i:04}");
            assert_eq!(store.get(k.as_bytes())?, Some(Bytes::from(k.clone())));
        }
    }
    Ok(())
}

#[test]
fn stats_and_dump_cover_every_tier() -> anyhow::Result<()> {
    let (store, cache) = memory_cache();
    store.put(key("k9"), key("v"), WriteOptions::NO_SYNC)?;
    cache.put(key("k4"), key("v"))?;
    cache.advance()?;
    cache.put(key("k1"), key("v"))?;
    cache.delete(key("k2"))?;

    let stats = cache.stats();
    assert_eq!(stats.get("cache.generation").map(String::as_str), Some("1"));
    assert_eq!(stats.get("cache.current.entries").map(String::as_str), Some("2"));
    assert_eq!(stats.get("cache.current.tombstones").map(String::as_str), Some("1"));
    assert_eq!(stats.get("cache.prior.entries").map(String::as_str), Some("1"));
    assert_eq!(stats.get("cache.queue.batches").map(String::as_str), Some("1"));
    assert_eq!(stats.get("memstore.keys").map(String::as_str), Some("1"));

    let typed = cache.cache_stats();
    assert_eq!(typed.pending_ops, 2);
    assert!(!typed.poisoned);

    let mut out = Vec::new();
    cache.dump(&mut out)?;
    let text = String::from_utf8(out)?;
    assert!(text.contains("Cache --"));
    assert!(text.contains("Prior --"));
    assert!(text.contains("DB --"));
    // hex("k1") and hex("k9")
    assert!(text.contains("[6B31]"));
    assert!(text.contains("[6B39]"));
    assert!(text.contains("[6B32]:\t<deleted>"));
    Ok(())
}
