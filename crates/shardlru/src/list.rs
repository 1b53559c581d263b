//! Recency list: slot arena + key index
//!
//! Entries live in a `Vec` of slots linked by index into a doubly-linked
//! list (head = most recently used, tail = least recently used). Vacated
//! slots go on a free list and are reused, so positions stay stable and the
//! key index stores plain `usize` handles.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::mem;

use ahash::RandomState;

/// Upper bound on up-front allocation; larger lists grow on demand
const PREALLOC_LIMIT: usize = 1024;

/// Walk order over recency lists
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub enum Direction {
    /// Most recently used entry first
    #[default]
    MostRecentFirst,
    /// Least recently used entry first
    LeastRecentFirst,
}

/// Slot in the arena
struct Node<K, V> {
    key: K,
    value: V,
    prev: Option<usize>,
    next: Option<usize>,
}

/// Unbounded LRU ordering over a key index
///
/// Capacity is enforced by the owner through [`RecencyList::pop_back`].
pub(crate) struct RecencyList<K, V> {
    map: HashMap<K, usize, RandomState>,
    nodes: Vec<Option<Node<K, V>>>,
    head: Option<usize>,
    tail: Option<usize>,
    free_list: Vec<usize>,
}

impl<K, V> RecencyList<K, V>
where
    K: Hash + Eq + Clone,
{
    /// Create an empty list, preallocating for up to `capacity` entries
    ///
    /// The hint is clamped to `PREALLOC_LIMIT`, so any `capacity` is valid.
    pub fn with_capacity(capacity: usize) -> Self {
        let hint = capacity.min(PREALLOC_LIMIT);
        Self {
            map: HashMap::with_capacity_and_hasher(hint, RandomState::new()),
            nodes: Vec::with_capacity(hint),
            head: None,
            tail: None,
            free_list: Vec::new(),
        }
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    /// Look up a value and mark it most recently used
    pub fn get<Q>(&mut self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.move_to_front(idx);
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    /// Look up a value without touching its position
    pub fn peek<Q>(&self, key: &Q) -> Option<&V>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = *self.map.get(key)?;
        self.nodes[idx].as_ref().map(|node| &node.value)
    }

    pub fn contains<Q>(&self, key: &Q) -> bool
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        self.map.contains_key(key)
    }

    /// Insert at the front, or overwrite and move to the front
    ///
    /// # Returns
    /// * `Option<V>` - Previous value if the key was already present
    pub fn insert(&mut self, key: K, value: V) -> Option<V> {
        if let Some(&idx) = self.map.get(&key) {
            let old = self.nodes[idx]
                .as_mut()
                .map(|node| mem::replace(&mut node.value, value));
            self.move_to_front(idx);
            return old;
        }

        let idx = self.alloc_node();
        self.nodes[idx] = Some(Node {
            key: key.clone(),
            value,
            prev: None,
            next: None,
        });
        self.push_front(idx);
        self.map.insert(key, idx);
        None
    }

    /// Remove a key from the list
    pub fn remove<Q>(&mut self, key: &Q) -> Option<(K, V)>
    where
        K: Borrow<Q>,
        Q: Hash + Eq + ?Sized,
    {
        let idx = self.map.remove(key)?;
        self.release(idx)
    }

    /// Remove the least recently used entry
    pub fn pop_back(&mut self) -> Option<(K, V)> {
        let idx = self.tail?;
        let entry = self.release(idx)?;
        self.map.remove(&entry.0);
        Some(entry)
    }

    pub fn front(&self) -> Option<(&K, &V)> {
        self.entry_at(self.head?)
    }

    pub fn back(&self) -> Option<(&K, &V)> {
        self.entry_at(self.tail?)
    }

    pub fn clear(&mut self) {
        self.map.clear();
        self.nodes.clear();
        self.free_list.clear();
        self.head = None;
        self.tail = None;
    }

    /// Iterate without touching recency
    pub fn iter(&self, direction: Direction) -> Iter<'_, K, V> {
        let cursor = match direction {
            Direction::MostRecentFirst => self.head,
            Direction::LeastRecentFirst => self.tail,
        };
        Iter {
            nodes: &self.nodes,
            cursor,
            direction,
            remaining: self.map.len(),
        }
    }

    fn entry_at(&self, idx: usize) -> Option<(&K, &V)> {
        self.nodes[idx].as_ref().map(|node| (&node.key, &node.value))
    }

    /// Unlink a slot, empty it and put it on the free list
    fn release(&mut self, idx: usize) -> Option<(K, V)> {
        self.unlink(idx);
        let node = self.nodes[idx].take()?;
        self.free_list.push(idx);
        Some((node.key, node.value))
    }

    fn push_front(&mut self, idx: usize) {
        if let Some(node) = &mut self.nodes[idx] {
            node.prev = None;
            node.next = self.head;
        }

        if let Some(head_idx) = self.head {
            if let Some(head) = &mut self.nodes[head_idx] {
                head.prev = Some(idx);
            }
        }

        self.head = Some(idx);
        if self.tail.is_none() {
            self.tail = Some(idx);
        }
    }

    fn move_to_front(&mut self, idx: usize) {
        if self.head == Some(idx) {
            return;
        }

        self.unlink(idx);
        self.push_front(idx);
    }

    fn unlink(&mut self, idx: usize) {
        let (prev, next) = match &mut self.nodes[idx] {
            Some(node) => (node.prev.take(), node.next.take()),
            None => return,
        };

        match prev {
            Some(prev_idx) => {
                if let Some(prev_node) = &mut self.nodes[prev_idx] {
                    prev_node.next = next;
                }
            }
            None => self.head = next,
        }

        match next {
            Some(next_idx) => {
                if let Some(next_node) = &mut self.nodes[next_idx] {
                    next_node.prev = prev;
                }
            }
            None => self.tail = prev,
        }
    }

    fn alloc_node(&mut self) -> usize {
        if let Some(idx) = self.free_list.pop() {
            idx
        } else {
            let idx = self.nodes.len();
            self.nodes.push(None);
            idx
        }
    }

    /// Panics if the index and the linked order disagree
    #[cfg(test)]
    pub fn assert_consistent(&self) {
        let forward: Vec<&K> = self.iter(Direction::MostRecentFirst).map(|(k, _)| k).collect();
        let mut backward: Vec<&K> = self.iter(Direction::LeastRecentFirst).map(|(k, _)| k).collect();
        backward.reverse();

        assert_eq!(forward.len(), self.map.len());
        assert!(forward == backward, "forward and backward links disagree");
        for (key, &idx) in &self.map {
            let node = self.nodes[idx].as_ref().expect("indexed slot is vacant");
            assert!(node.key == *key, "index points at the wrong slot");
        }
        assert_eq!(
            self.nodes.iter().filter(|slot| slot.is_none()).count(),
            self.free_list.len()
        );
    }
}

/// Iterator over `(key, value)` pairs in recency order
pub(crate) struct Iter<'a, K, V> {
    nodes: &'a [Option<Node<K, V>>],
    cursor: Option<usize>,
    direction: Direction,
    remaining: usize,
}

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<Self::Item> {
        let nodes = self.nodes;
        let node = nodes[self.cursor?].as_ref()?;
        self.cursor = match self.direction {
            Direction::MostRecentFirst => node.next,
            Direction::LeastRecentFirst => node.prev,
        };
        self.remaining = self.remaining.saturating_sub(1);
        Some((&node.key, &node.value))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}
