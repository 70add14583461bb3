//! Frequency buckets for O(1) LFU tracking.
//!
//! Tracks the access count of every cached key, grouped into one bucket per
//! frequency level. Levels start at `0` (a freshly inserted key has never been
//! read) and each level keeps its keys in arrival order, so the eviction
//! candidate is always the oldest key of the lowest level.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        FrequencyBuckets<K>                              │
//! │                                                                         │
//! │   index: FxHashMap<K, SlotId>        nodes: SlotArena<Node<K>>          │
//! │   ┌──────────────┬────────┐          ┌──────┬─────────────────────┐     │
//! │   │ "u1|jan|feb" │  id_0  │ ───────► │ id_0 │ freq:2, prev/next   │     │
//! │   │ "u2|jan|feb" │  id_1  │ ───────► │ id_1 │ freq:0, prev/next   │     │
//! │   │ "u1|mar|apr" │  id_2  │ ───────► │ id_2 │ freq:0, prev/next   │     │
//! │   └──────────────┴────────┘          └──────┴─────────────────────┘     │
//! │                                                                         │
//! │   buckets: FxHashMap<u64, Bucket>    min_freq = Some(0)                 │
//! │                                                                         │
//! │   freq=0: head ──► [id_2] ◄──► [id_1] ◄── tail   (tail evicted first)   │
//! │   freq=2: head ──► [id_0] ◄── tail                                      │
//! │                                                                         │
//! │   level links: 0 ──next──► 2,  2 ──prev──► 0                            │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Operations
//!
//! | Operation   | Time | Notes                                          |
//! |-------------|------|------------------------------------------------|
//! | `insert`    | O(1) | New key joins level 0 as its newest member     |
//! | `touch`     | O(1) | Move to level `f + 1`, newest member there     |
//! | `remove`    | O(1) | Drops the key; empty levels are unlinked       |
//! | `pop_min`   | O(1) | Oldest key of the lowest non-empty level       |
//! | `peek_min`  | O(1) | Same candidate, not removed                    |
//!
//! ## Example
//!
//! ```
//! use budget_cache::ds::FrequencyBuckets;
//!
//! let mut freq = FrequencyBuckets::new();
//! freq.insert("jan");
//! freq.insert("feb");
//! freq.insert("mar");
//!
//! freq.touch(&"jan");
//! assert_eq!(freq.frequency(&"jan"), Some(1));
//!
//! // "feb" is the oldest key still at level 0.
//! assert_eq!(freq.pop_min(), Some(("feb", 0)));
//! assert_eq!(freq.pop_min(), Some(("mar", 0)));
//! assert_eq!(freq.pop_min(), Some(("jan", 1)));
//! assert_eq!(freq.pop_min(), None);
//! ```

use std::hash::Hash;

use rustc_hash::FxHashMap;

use crate::ds::slot_arena::{SlotArena, SlotId};
use crate::error::InvariantError;

#[derive(Debug)]
struct Node<K> {
    prev: Option<SlotId>,
    next: Option<SlotId>,
    freq: u64,
    key: K,
}

/// One frequency level. `head` is the newest arrival, `tail` the oldest.
#[derive(Debug, Default)]
struct Bucket {
    head: Option<SlotId>,
    tail: Option<SlotId>,
    prev: Option<u64>,
    next: Option<u64>,
}

/// Result of unlinking a node from its level.
#[derive(Debug, Clone, Copy)]
struct Detached {
    below: Option<u64>,
    above: Option<u64>,
    emptied: bool,
}

/// O(1) LFU metadata tracker with FIFO tie-breaking within a level.
///
/// Every tracked key sits in exactly one level, and that level equals the
/// key's frequency. Levels with no keys are removed immediately.
#[derive(Debug)]
pub struct FrequencyBuckets<K> {
    nodes: SlotArena<Node<K>>,
    index: FxHashMap<K, SlotId>,
    buckets: FxHashMap<u64, Bucket>,
    min_freq: Option<u64>,
}

impl<K> FrequencyBuckets<K>
where
    K: Eq + Hash + Clone,
{
    /// Creates an empty tracker.
    pub fn new() -> Self {
        Self::with_capacity(0)
    }

    /// Creates an empty tracker with room for `capacity` keys.
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            nodes: SlotArena::with_capacity(capacity),
            index: FxHashMap::with_capacity_and_hasher(capacity, Default::default()),
            buckets: FxHashMap::default(),
            min_freq: None,
        }
    }

    /// Number of tracked keys.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Number of non-empty frequency levels.
    pub fn level_count(&self) -> usize {
        self.buckets.len()
    }

    #[inline]
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Current frequency of `key`, or `None` if it is not tracked.
    pub fn frequency(&self, key: &K) -> Option<u64> {
        let id = *self.index.get(key)?;
        self.nodes.get(id).map(|node| node.freq)
    }

    /// Lowest non-empty level, `None` when empty.
    ///
    /// ```
    /// use budget_cache::ds::FrequencyBuckets;
    ///
    /// let mut freq = FrequencyBuckets::new();
    /// assert_eq!(freq.min_freq(), None);
    /// freq.insert("a");
    /// freq.touch(&"a");
    /// assert_eq!(freq.min_freq(), Some(1));
    /// ```
    pub fn min_freq(&self) -> Option<u64> {
        self.min_freq
    }

    /// Peeks the eviction candidate `(key, freq)` without removing it.
    pub fn peek_min(&self) -> Option<(&K, u64)> {
        let freq = self.min_freq?;
        let id = self.buckets.get(&freq)?.tail?;
        let node = self.nodes.get(id)?;
        Some((&node.key, freq))
    }

    /// Non-empty levels in ascending order.
    pub fn levels(&self) -> Vec<u64> {
        let mut levels = Vec::with_capacity(self.buckets.len());
        let mut cursor = self.min_freq;
        while let Some(freq) = cursor {
            levels.push(freq);
            cursor = self.buckets.get(&freq).and_then(|bucket| bucket.next);
        }
        levels
    }

    /// Keys at `freq`, oldest arrival first (eviction order).
    ///
    /// ```
    /// use budget_cache::ds::FrequencyBuckets;
    ///
    /// let mut freq = FrequencyBuckets::new();
    /// freq.insert("a");
    /// freq.insert("b");
    /// freq.insert("c");
    /// freq.touch(&"b");
    ///
    /// let level0: Vec<_> = freq.iter_level(0).copied().collect();
    /// assert_eq!(level0, vec!["a", "c"]);
    /// ```
    pub fn iter_level(&self, freq: u64) -> LevelIter<'_, K> {
        LevelIter {
            nodes: &self.nodes,
            cursor: self.buckets.get(&freq).and_then(|bucket| bucket.tail),
        }
    }

    /// Starts tracking `key` at level 0. Returns `false` if already tracked.
    pub fn insert(&mut self, key: K) -> bool {
        if self.index.contains_key(&key) {
            return false;
        }

        let id = self.nodes.insert(Node {
            prev: None,
            next: None,
            freq: 0,
            key: key.clone(),
        });
        self.index.insert(key, id);

        if !self.buckets.contains_key(&0) {
            // Level 0 is always the lowest possible level.
            self.insert_bucket(0, None, self.min_freq);
        }
        self.list_push_front(0, id);
        true
    }

    /// Increments the frequency of `key` and returns the new value.
    ///
    /// The key becomes the newest member of its new level. A key already at
    /// `u64::MAX` stays there and only moves to the newest position.
    pub fn touch(&mut self, key: &K) -> Option<u64> {
        let id = *self.index.get(key)?;
        let current = self.nodes.get(id)?.freq;

        let Some(next_freq) = current.checked_add(1) else {
            self.list_remove(current, id)?;
            self.list_push_front(current, id);
            return Some(current);
        };

        let detached = self.detach(id)?;
        if !self.buckets.contains_key(&next_freq) {
            let below = if detached.emptied {
                detached.below
            } else {
                Some(current)
            };
            self.insert_bucket(next_freq, below, detached.above);
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.freq = next_freq;
        }
        self.list_push_front(next_freq, id);
        Some(next_freq)
    }

    /// Stops tracking `key`; returns the frequency it had.
    pub fn remove(&mut self, key: &K) -> Option<u64> {
        let id = *self.index.get(key)?;
        self.detach(id)?;
        self.index.remove(key);
        self.nodes.remove(id).map(|node| node.freq)
    }

    /// Removes and returns the eviction candidate `(key, freq)`.
    pub fn pop_min(&mut self) -> Option<(K, u64)> {
        let freq = self.min_freq?;
        let id = self.buckets.get(&freq)?.tail?;
        self.detach(id)?;
        let node = self.nodes.remove(id)?;
        self.index.remove(&node.key);
        Some((node.key, node.freq))
    }

    /// Verifies index, level and list bookkeeping.
    pub fn check_invariants(&self) -> Result<(), InvariantError> {
        if self.nodes.len() != self.index.len() {
            return Err(InvariantError::new(format!(
                "node count {} does not match index size {}",
                self.nodes.len(),
                self.index.len()
            )));
        }

        if self.is_empty() {
            if !self.buckets.is_empty() || self.min_freq.is_some() {
                return Err(InvariantError::new("empty tracker still has levels"));
            }
            return Ok(());
        }

        let Some(min) = self.min_freq else {
            return Err(InvariantError::new("non-empty tracker has no min level"));
        };
        match self.buckets.get(&min) {
            Some(bucket) if bucket.prev.is_none() => {},
            _ => return Err(InvariantError::new(format!("min level {min} is not the first level"))),
        }

        let mut visited_levels = 0usize;
        let mut visited_nodes = 0usize;
        let mut previous_level: Option<u64> = None;
        let mut cursor = Some(min);

        while let Some(freq) = cursor {
            let bucket = self
                .buckets
                .get(&freq)
                .ok_or_else(|| InvariantError::new(format!("level {freq} is linked but missing")))?;
            if bucket.prev != previous_level {
                return Err(InvariantError::new(format!("level {freq} has a stale prev link")));
            }
            if previous_level.is_some_and(|prev| prev >= freq) {
                return Err(InvariantError::new(format!("level {freq} is out of order")));
            }
            if bucket.head.is_none() || bucket.tail.is_none() {
                return Err(InvariantError::new(format!("level {freq} is empty")));
            }

            let mut last = None;
            let mut node_cursor = bucket.head;
            while let Some(id) = node_cursor {
                let node = self
                    .nodes
                    .get(id)
                    .ok_or_else(|| InvariantError::new(format!("level {freq} links a free slot")))?;
                if node.freq != freq {
                    return Err(InvariantError::new(format!(
                        "key with frequency {} filed under level {freq}",
                        node.freq
                    )));
                }
                if node.prev != last {
                    return Err(InvariantError::new(format!("broken back link in level {freq}")));
                }
                if self.index.get(&node.key) != Some(&id) {
                    return Err(InvariantError::new(format!("level {freq} holds an unindexed key")));
                }
                last = Some(id);
                node_cursor = node.next;
                visited_nodes += 1;
            }
            if bucket.tail != last {
                return Err(InvariantError::new(format!("level {freq} tail is stale")));
            }

            visited_levels += 1;
            previous_level = Some(freq);
            cursor = bucket.next;
        }

        if visited_levels != self.buckets.len() {
            return Err(InvariantError::new(format!(
                "{} levels reachable from min, {} stored",
                visited_levels,
                self.buckets.len()
            )));
        }
        if visited_nodes != self.nodes.len() {
            return Err(InvariantError::new(format!(
                "{} keys reachable through levels, {} stored",
                visited_nodes,
                self.nodes.len()
            )));
        }
        Ok(())
    }

    /// Unlinks `id` from its level, dropping the level if it empties.
    fn detach(&mut self, id: SlotId) -> Option<Detached> {
        let freq = self.nodes.get(id)?.freq;
        let (below, above) = {
            let bucket = self.buckets.get(&freq)?;
            (bucket.prev, bucket.next)
        };

        self.list_remove(freq, id)?;
        let emptied = self
            .buckets
            .get(&freq)
            .is_none_or(|bucket| bucket.head.is_none());
        if emptied {
            self.remove_bucket(freq, below, above);
            if self.min_freq == Some(freq) {
                self.min_freq = above;
            }
        }

        Some(Detached {
            below,
            above,
            emptied,
        })
    }

    fn insert_bucket(&mut self, freq: u64, prev: Option<u64>, next: Option<u64>) {
        self.buckets.insert(
            freq,
            Bucket {
                head: None,
                tail: None,
                prev,
                next,
            },
        );

        if let Some(prev) = prev
            && let Some(bucket) = self.buckets.get_mut(&prev)
        {
            bucket.next = Some(freq);
        }
        if let Some(next) = next
            && let Some(bucket) = self.buckets.get_mut(&next)
        {
            bucket.prev = Some(freq);
        }
        if prev.is_none() {
            self.min_freq = Some(freq);
        }
    }

    fn remove_bucket(&mut self, freq: u64, prev: Option<u64>, next: Option<u64>) {
        if let Some(prev) = prev
            && let Some(bucket) = self.buckets.get_mut(&prev)
        {
            bucket.next = next;
        }
        if let Some(next) = next
            && let Some(bucket) = self.buckets.get_mut(&next)
        {
            bucket.prev = prev;
        }
        self.buckets.remove(&freq);
    }

    fn list_push_front(&mut self, freq: u64, id: SlotId) {
        let Some(bucket) = self.buckets.get_mut(&freq) else {
            debug_assert!(false, "push into missing level {freq}");
            return;
        };

        let old_head = bucket.head;
        bucket.head = Some(id);
        if old_head.is_none() {
            bucket.tail = Some(id);
        }
        if let Some(node) = self.nodes.get_mut(id) {
            node.prev = None;
            node.next = old_head;
        }
        if let Some(old_head) = old_head
            && let Some(node) = self.nodes.get_mut(old_head)
        {
            node.prev = Some(id);
        }
    }

    fn list_remove(&mut self, freq: u64, id: SlotId) -> Option<()> {
        let (prev, next) = {
            let node = self.nodes.get(id)?;
            (node.prev, node.next)
        };

        let bucket = self.buckets.get_mut(&freq)?;
        match prev {
            Some(prev) => {
                if let Some(node) = self.nodes.get_mut(prev) {
                    node.next = next;
                }
            },
            None => bucket.head = next,
        }
        match next {
            Some(next) => {
                if let Some(node) = self.nodes.get_mut(next) {
                    node.prev = prev;
                }
            },
            None => bucket.tail = prev,
        }

        if let Some(node) = self.nodes.get_mut(id) {
            node.prev = None;
            node.next = None;
        }
        Some(())
    }
}

impl<K> Default for FrequencyBuckets<K>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

/// Iterator over the keys of one level, oldest first.
#[derive(Debug)]
pub struct LevelIter<'a, K> {
    nodes: &'a SlotArena<Node<K>>,
    cursor: Option<SlotId>,
}

impl<'a, K> Iterator for LevelIter<'a, K> {
    type Item = &'a K;

    fn next(&mut self) -> Option<Self::Item> {
        let node = self.nodes.get(self.cursor?)?;
        self.cursor = node.prev;
        Some(&node.key)
    }
}
