//! One independently locked LRU partition
//!
//! Every operation, lookups included, takes the shard's mutex for its whole
//! duration: a hit reorders the recency list, so there are no pure reads.
//! The entry count is mirrored in an atomic so [`Shard::len`] never waits on
//! the lock. It is updated under the lock and may trail an operation that is
//! still in flight, but matches the list once that operation returns.

use std::borrow::Borrow;
use std::hash::Hash;
use std::sync::atomic::{AtomicUsize, Ordering};

use parking_lot::Mutex;

use crate::list::{Direction, RecencyList};

/// What an [`Shard::add`] did
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum AddOutcome<K, V> {
    /// Key was new
    Inserted,
    /// Key existed; value replaced, position refreshed
    Updated,
    /// Key was new and the least recently used entry was dropped
    Evicted(K, V),
}

pub(crate) struct Shard<K, V> {
    capacity: usize,
    len: AtomicUsize,
    list: Mutex<RecencyList<K, V>>,
}

impl<K, V> Shard<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty shard (`capacity` 0 = unbounded)
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            len: AtomicUsize::new(0),
            list: Mutex::new(RecencyList::with_capacity(capacity)),
        }
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::Relaxed)
    }

    /// Insert or overwrite, evicting at most one entry
    pub fn add(&self, key: K, value: V) -> AddOutcome<K, V> {
        let mut list = self.list.lock();

        if list.insert(key, value).is_some() {
            return AddOutcome::Updated;
        }
        self.len.fetch_add(1, Ordering::Relaxed);

        if self.capacity > 0 && list.len() > self.capacity {
            if let Some((key, value)) = self.remove_oldest_locked(&mut list) {
                return AddOutcome::Evicted(key, value);
            }
        }
        AddOutcome::Inserted
    }

    /// Look up a value and mark it most recently used
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.list.lock().get(key).cloned()
    }

    pub fn peek<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
        V: Clone,
    {
        self.list.lock().peek(key).cloned()
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.list.lock().contains(key)
    }

    /// Most recently used entry, order untouched
    pub fn front(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        let list = self.list.lock();
        list.front().map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Least recently used entry, order untouched
    pub fn back(&self) -> Option<(K, V)>
    where
        V: Clone,
    {
        let list = self.list.lock();
        list.back().map(|(k, v)| (k.clone(), v.clone()))
    }

    /// Remove a key; absent keys are a no-op
    pub fn remove_key<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let mut list = self.list.lock();
        let (_, value) = list.remove(key)?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(value)
    }

    #[cfg(test)]
    pub fn remove_oldest(&self) -> Option<(K, V)> {
        let mut list = self.list.lock();
        self.remove_oldest_locked(&mut list)
    }

    fn remove_oldest_locked(&self, list: &mut RecencyList<K, V>) -> Option<(K, V)> {
        let entry = list.pop_back()?;
        self.len.fetch_sub(1, Ordering::Relaxed);
        Some(entry)
    }

    pub fn clear(&self) {
        let mut list = self.list.lock();
        list.clear();
        self.len.store(0, Ordering::Relaxed);
    }

    /// Visit entries in `direction` while holding the lock
    ///
    /// # Returns
    /// * `bool` - false if the visitor asked to stop
    pub fn for_each<F>(&self, direction: Direction, visitor: &mut F) -> bool
    where
        F: FnMut(&K, &V) -> bool,
    {
        let list = self.list.lock();
        list.iter(direction).all(|(k, v)| visitor(k, v))
    }

    #[cfg(test)]
    fn assert_consistent(&self) {
        let list = self.list.lock();
        list.assert_consistent();
        assert_eq!(list.len(), self.len());
        if self.capacity > 0 {
            assert!(list.len() <= self.capacity);
        }
    }
}
