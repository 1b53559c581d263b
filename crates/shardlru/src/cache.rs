//! LruCache: sharded facade over independent LRU partitions
//!
//! Every keyed operation is routed to exactly one shard by
//! [`shard_index`](crate::router::shard_index) and forwarded unchanged.
//! Whole-cache operations (`len`, `traverse`, `clear`) visit shards one at
//! a time in index order and are not atomic across shards.

use std::borrow::Borrow;
use std::hash::Hash;

use once_cell::sync::OnceCell;
use tracing::{debug, trace};

use crate::config::{Layout, Options};
use crate::error::Result;
use crate::list::Direction;
use crate::router::{self, RouteKey};
use crate::shard::{AddOutcome, Shard};
use crate::stats::CacheStats;

/// Sharded, thread-safe LRU cache
///
/// ```
/// use shardlru::{Direction, LruCache, Options};
///
/// let cache = LruCache::new(Options::new().with_capacity(3)).unwrap();
/// for k in 1..=4u32 {
///     cache.add(k, k * 10).unwrap();
/// }
///
/// assert_eq!(cache.get(&1).unwrap(), None);
/// assert_eq!(cache.get(&4).unwrap(), Some(40));
///
/// let mut keys = Vec::new();
/// cache.traverse(Direction::MostRecentFirst, |k, _| {
///     keys.push(*k);
///     true
/// });
/// assert_eq!(keys, vec![4, 3, 2]);
/// ```
///
/// A cache built with [`Default`] or [`LruCache::lazy`] has no shards until
/// first use, when it becomes a single-shard cache:
///
/// ```
/// use shardlru::LruCache;
///
/// static SESSIONS: LruCache<u64, String> = LruCache::lazy(1024);
///
/// SESSIONS.add(7, "alice".to_string()).unwrap();
/// assert_eq!(SESSIONS.shard_count(), 1);
/// ```
pub struct LruCache<K, V> {
    /// Configured total capacity (0 = unbounded)
    capacity: usize,

    /// Set once, at construction or on first use
    shards: OnceCell<Box<[Shard<K, V>]>>,

    stats: CacheStats,
}

impl<K, V> LruCache<K, V> {
    /// Create a zero-value cache that materializes on first use
    ///
    /// The cache becomes a single shard holding up to `capacity` entries
    /// (0 = unbounded). Safe to race on from several threads.
    pub const fn lazy(capacity: usize) -> Self {
        Self {
            capacity,
            shards: OnceCell::new(),
            stats: CacheStats::new(),
        }
    }

    /// Configured total capacity (0 = unbounded)
    ///
    /// Shards hold `capacity / shard_count` entries each, so the usable
    /// total can be slightly lower.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Hit/miss/eviction counters
    pub fn stats(&self) -> &CacheStats {
        &self.stats
    }
}

impl<K, V> Default for LruCache<K, V> {
    /// Unbounded zero-value cache
    fn default() -> Self {
        Self::lazy(0)
    }
}

impl<K, V> LruCache<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create a cache with the given options
    ///
    /// A bounded `capacity` smaller than the resolved shard count is rejected
    /// with [`Error::Config`](crate::Error::Config) rather than leaving every
    /// shard with capacity 0, which would make the cache unbounded.
    ///
    /// # Arguments
    /// * `options` - Total capacity and shard count
    ///
    /// # Returns
    /// * `Result<LruCache>` - `Error::Config` if the options do not resolve
    pub fn new(options: Options) -> Result<Self> {
        let layout = options.resolve()?;
        debug!(
            shards = layout.shard_count,
            shard_capacity = layout.shard_capacity,
            lost_capacity = layout.lost_capacity,
            "lru cache constructed"
        );

        Ok(Self {
            capacity: options.capacity,
            shards: OnceCell::with_value(build_shards(&layout)),
            stats: CacheStats::new(),
        })
    }

    fn shards(&self) -> &[Shard<K, V>] {
        self.shards.get_or_init(|| {
            debug!(capacity = self.capacity, "materializing zero-value lru cache");
            build_shards(&Layout::single(self.capacity))
        })
    }

    fn shard_for<Q>(&self, key: &Q) -> Result<(usize, &Shard<K, V>)>
    where
        Q: RouteKey + ?Sized,
    {
        let shards = self.shards();
        let idx = router::shard_index(key, shards.len())?;
        Ok((idx, &shards[idx]))
    }

    /// Number of shards (a power of two)
    pub fn shard_count(&self) -> usize {
        self.shards().len()
    }

    /// Insert a key/value pair, or overwrite and refresh an existing key
    ///
    /// If the key's shard is over capacity afterwards, its least recently
    /// used entry is evicted.
    ///
    /// # Returns
    /// * `Result<()>` - `Error::Encoding` if the key could not be routed
    pub fn add(&self, key: K, value: V) -> Result<()>
    where
        K: RouteKey,
    {
        let (idx, shard) = self.shard_for(&key)?;

        match shard.add(key, value) {
            AddOutcome::Inserted => self.stats.record_insert(),
            AddOutcome::Updated => self.stats.record_update(),
            AddOutcome::Evicted(..) => {
                self.stats.record_insert();
                self.stats.record_eviction();
                trace!(shard = idx, "evicted least recently used entry");
            }
        }
        Ok(())
    }

    /// Look up a key, marking it most recently used on a hit
    pub fn get<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + RouteKey + ?Sized,
        V: Clone,
    {
        let (_, shard) = self.shard_for(key)?;
        let value = shard.get(key);

        if value.is_some() {
            self.stats.record_hit();
        } else {
            self.stats.record_miss();
        }
        Ok(value)
    }

    /// Look up a key without touching recency or stats
    pub fn peek<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + RouteKey + ?Sized,
        V: Clone,
    {
        let (_, shard) = self.shard_for(key)?;
        Ok(shard.peek(key))
    }

    /// Check for a key without touching recency
    pub fn contains<Q>(&self, key: &Q) -> Result<bool>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + RouteKey + ?Sized,
    {
        let (_, shard) = self.shard_for(key)?;
        Ok(shard.contains(key))
    }

    /// Remove a key; absent keys are not an error
    ///
    /// # Returns
    /// * `Result<Option<V>>` - The removed value, if the key was present
    pub fn remove<Q>(&self, key: &Q) -> Result<Option<V>>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + RouteKey + ?Sized,
    {
        let (_, shard) = self.shard_for(key)?;
        Ok(shard.remove_key(key))
    }

    /// Most recently used entry of the first non-empty shard
    ///
    /// This is the first entry a [`Direction::MostRecentFirst`] traversal
    /// would visit. With a single shard it is the most recently used entry
    /// of the whole cache. Recency is not changed.
    pub fn front(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        self.shards().iter().find_map(Shard::front)
    }

    /// Least recently used entry of the first non-empty shard
    ///
    /// This is the first entry a [`Direction::LeastRecentFirst`] traversal
    /// would visit. Recency is not changed.
    pub fn back(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        self.shards().iter().find_map(Shard::back)
    }

    /// Total number of entries
    ///
    /// Sums per-shard counters without locking; under concurrent writes the
    /// result is approximate.
    pub fn len(&self) -> usize {
        self.shards().iter().map(Shard::len).sum()
    }

    /// Check if the cache holds no entries
    pub fn is_empty(&self) -> bool {
        self.shards().iter().all(|shard| shard.len() == 0)
    }

    /// Visit entries shard by shard until `visitor` returns false
    ///
    /// Shards are walked in index order; within a shard, entries follow
    /// `direction`. The result is a concatenation of per-shard recency
    /// orders, not a global recency order. Each shard is locked while it is
    /// visited, so the visitor must not call back into this cache.
    pub fn traverse<F>(&self, direction: Direction, mut visitor: F)
    where
        F: FnMut(&K, &V) -> bool,
    {
        for shard in self.shards() {
            if !shard.for_each(direction, &mut visitor) {
                return;
            }
        }
    }

    /// Remove every entry, one shard at a time
    pub fn clear(&self) {
        for shard in self.shards() {
            shard.clear();
        }
    }
}

fn build_shards<K, V>(layout: &Layout) -> Box<[Shard<K, V>]>
where
    K: Hash + Eq + Clone,
{
    (0..layout.shard_count)
        .map(|_| Shard::new(layout.shard_capacity))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;
    use crate::router::Structural;
    use std::sync::Arc;
    use std::thread;

    fn collect(cache: &LruCache<u32, u32>, direction: Direction) -> Vec<u32> {
        let mut keys = Vec::new();
        cache.traverse(direction, |k, _| {
            keys.push(*k);
            true
        });
        keys
    }

    #[test]
    fn test_empty_value_cache() {
        let cache = LruCache::default();

        for i in 0..10u32 {
            cache.add(i, i).unwrap();
            assert_eq!(cache.len(), i as usize + 1);
        }
        assert_eq!(cache.shard_count(), 1);
        assert_eq!(cache.capacity(), 0);
    }

    #[test]
    fn test_lazy_keeps_preset_capacity() {
        let cache = LruCache::lazy(3);

        for i in 0..10u32 {
            cache.add(i, i).unwrap();
        }

        assert_eq!(cache.len(), 3);
        assert_eq!(collect(&cache, Direction::MostRecentFirst), vec![9, 8, 7]);
    }

    #[test]
    fn test_new_cap() {
        let cache = LruCache::new(Options::new().with_capacity(10)).unwrap();

        for i in 0..20u32 {
            cache.add(i, i).unwrap();
            assert!(cache.len() <= 10);
        }
        assert_eq!(cache.len(), 10);
        assert_eq!(cache.stats().evictions(), 10);
    }

    #[test]
    fn test_add_overwrite() {
        let cache = LruCache::default();

        cache.add(1, 1).unwrap();
        cache.add(2, 2).unwrap();
        cache.add(3, 3).unwrap();
        assert_eq!(cache.len(), 3);

        cache.add(2, 10).unwrap();
        assert_eq!(cache.len(), 3);
        assert_eq!(cache.get(&2).unwrap(), Some(10));
        assert_eq!(cache.stats().updates(), 1);
    }

    #[test]
    fn test_recency_and_front() {
        let cache = LruCache::new(Options::new()).unwrap();

        for k in 1..=5u32 {
            cache.add(k, k).unwrap();
        }
        assert_eq!(cache.front(), Some((5, 5)));
        assert_eq!(cache.back(), Some((1, 1)));

        cache.get(&1).unwrap();
        assert_eq!(cache.front(), Some((1, 1)));
        assert_eq!(cache.back(), Some((2, 2)));
    }

    #[test]
    fn test_front_empty() {
        let cache: LruCache<u32, u32> = LruCache::new(Options::new().with_shards(4)).unwrap();
        assert_eq!(cache.front(), None);
        assert_eq!(cache.back(), None);
        assert!(cache.is_empty());
    }

    #[test]
    fn test_front_is_first_traversed_entry() {
        let cache = LruCache::new(Options::new().with_shards(8)).unwrap();
        for k in 0..100u32 {
            cache.add(k, k).unwrap();
        }

        let first = collect(&cache, Direction::MostRecentFirst)[0];
        assert_eq!(cache.front().map(|(k, _)| k), Some(first));

        let oldest = collect(&cache, Direction::LeastRecentFirst)[0];
        assert_eq!(cache.back().map(|(k, _)| k), Some(oldest));
    }

    #[test]
    fn test_peek_does_not_touch() {
        let cache = LruCache::lazy(2);

        cache.add(1u32, 1u32).unwrap();
        cache.add(2, 2).unwrap();
        assert_eq!(cache.peek(&1).unwrap(), Some(1));
        cache.add(3, 3).unwrap();

        assert!(!cache.contains(&1).unwrap());
        assert!(cache.contains(&2).unwrap());
        assert_eq!(cache.stats().hits(), 0);
    }

    #[test]
    fn test_remove() {
        let cache = LruCache::new(Options::new().with_shards(4)).unwrap();

        cache.add("a".to_string(), 1).unwrap();
        cache.add("b".to_string(), 2).unwrap();

        assert_eq!(cache.remove("a").unwrap(), Some(1));
        assert_eq!(cache.remove("a").unwrap(), None);
        assert_eq!(cache.get("a").unwrap(), None);
        assert_eq!(cache.get("b").unwrap(), Some(2));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_stats_hits_and_misses() {
        let cache = LruCache::default();

        cache.add(1u8, "one").unwrap();
        cache.get(&1).unwrap();
        cache.get(&2).unwrap();

        assert_eq!(cache.stats().hits(), 1);
        assert_eq!(cache.stats().misses(), 1);
        assert_eq!(cache.stats().inserts(), 1);
    }

    #[test]
    fn test_traverse_per_shard_concatenation() {
        let cache = LruCache::new(Options::new().with_shards(4)).unwrap();
        for k in 0..64u32 {
            cache.add(k, k).unwrap();
        }

        let mut expected = Vec::new();
        for shard in 0..4 {
            let mut keys: Vec<u32> = (0..64u32)
                .filter(|k| router::shard_index(k, 4).unwrap() == shard)
                .collect();
            keys.reverse();
            expected.extend(keys);
        }

        assert_eq!(collect(&cache, Direction::MostRecentFirst), expected);
    }

    #[test]
    fn test_traverse_reverse_single_shard() {
        let cache = LruCache::default();
        for k in 0..5u32 {
            cache.add(k, k).unwrap();
        }
        cache.get(&0).unwrap();

        assert_eq!(collect(&cache, Direction::LeastRecentFirst), vec![1, 2, 3, 4, 0]);
    }

    #[test]
    fn test_traverse_stops_across_shards() {
        let cache = LruCache::new(Options::new().with_shards(8)).unwrap();
        for k in 0..100u32 {
            cache.add(k, k).unwrap();
        }

        for limit in [1, 7, 13, 50, 99] {
            let mut visited = 0;
            cache.traverse(Direction::MostRecentFirst, |_, _| {
                visited += 1;
                visited < limit
            });
            assert_eq!(visited, limit);
        }
    }

    #[test]
    fn test_clear() {
        let cache = LruCache::new(Options::new().with_shards(4)).unwrap();
        for k in 0..20u32 {
            cache.add(k, k).unwrap();
        }

        cache.clear();

        assert_eq!(cache.len(), 0);
        assert!(cache.is_empty());
        assert_eq!(cache.get(&3).unwrap(), None);
    }

    #[test]
    fn test_config_error_surfaces_at_construction() {
        let result = LruCache::<u32, u32>::new(Options::new().with_capacity(2).with_shards(8));
        assert!(matches!(result, Err(Error::Config(_))));

        // Shards round up to 8, so 7 is still below the shard count
        let result = LruCache::<u32, u32>::new(Options::new().with_capacity(7).with_shards(5));
        assert!(matches!(result, Err(Error::Config(_))));

        let cache = LruCache::<u32, u32>::new(Options::new().with_capacity(8).with_shards(5)).unwrap();
        assert_eq!(cache.shard_count(), 8);
    }

    #[test]
    fn test_huge_capacity_constructs_and_fills_lazily() {
        let cache = LruCache::new(Options::new().with_capacity(usize::MAX).with_shards(4)).unwrap();

        for k in 0..16u32 {
            cache.add(k, k * 2).unwrap();
        }

        assert_eq!(cache.capacity(), usize::MAX);
        assert_eq!(cache.len(), 16);
        assert_eq!(cache.get(&3).unwrap(), Some(6));
        assert_eq!(cache.stats().evictions(), 0);

        let lazy = LruCache::lazy(usize::MAX);
        lazy.add(1u32, 1u32).unwrap();
        assert_eq!(lazy.get(&1).unwrap(), Some(1));
    }

    #[test]
    fn test_encoding_error_aborts_operation() {
        #[derive(Hash, PartialEq, Eq, Clone)]
        struct Opaque;

        impl serde::Serialize for Opaque {
            fn serialize<S: serde::Serializer>(&self, _: S) -> std::result::Result<S::Ok, S::Error> {
                Err(<S::Error as serde::ser::Error>::custom("no structure"))
            }
        }

        let cache = LruCache::new(Options::new().with_shards(4)).unwrap();

        let err = cache.add(Structural(Opaque), 1).unwrap_err();
        assert!(matches!(err, Error::Encoding { .. }));
        assert!(cache.get(&Structural(Opaque)).is_err());
        assert!(cache.remove(&Structural(Opaque)).is_err());
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn test_structural_keys() {
        let cache = LruCache::new(Options::new().with_shards(4)).unwrap();

        cache.add(Structural((1u32, "x".to_string())), "first").unwrap();
        cache.add(Structural((2u32, "y".to_string())), "second").unwrap();

        assert_eq!(cache.get(&Structural((1u32, "x".to_string()))).unwrap(), Some("first"));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    fn test_lazy_init_races_once() {
        static CACHE: LruCache<u64, u64> = LruCache::lazy(64);

        let handles: Vec<_> = (0..8u64)
            .map(|t| {
                thread::spawn(move || {
                    for i in 0..100 {
                        CACHE.add(t * 1_000 + i, i).unwrap();
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(CACHE.shard_count(), 1);
        assert_eq!(CACHE.len(), 64);
    }

    #[test]
    fn test_concurrent_mixed_ops() {
        let cache = Arc::new(
            LruCache::new(Options::new().with_capacity(256).with_shards(8)).unwrap(),
        );

        let handles: Vec<_> = (0..8u32)
            .map(|t| {
                let cache = Arc::clone(&cache);
                thread::spawn(move || {
                    for i in 0..2_000u32 {
                        let key = (t * 7 + i) % 512;
                        match i % 4 {
                            0 | 1 => cache.add(key, i).unwrap(),
                            2 => {
                                cache.get(&key).unwrap();
                            }
                            _ => {
                                cache.remove(&key).unwrap();
                            }
                        }
                    }
                })
            })
            .collect();

        for handle in handles {
            handle.join().unwrap();
        }

        assert!(cache.len() <= 256);
        let mut walked = 0;
        cache.traverse(Direction::MostRecentFirst, |_, _| {
            walked += 1;
            true
        });
        assert_eq!(walked, cache.len());
    }
}
