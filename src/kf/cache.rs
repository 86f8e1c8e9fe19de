//! Bounded least-recently-used caches.

use std::hash::Hash;

use indexmap::IndexMap;

#[cfg(test)]
#[path = "cache_tests.rs"]
mod cache_tests;

/// A key-value cache holding at most `capacity` entries.
///
/// Entries are kept in recency order: the front of the underlying map is the least recently used
/// entry and is the one evicted when a new entry would exceed the capacity. A capacity of zero
/// disables caching entirely.
#[derive(Clone, Debug)]
pub struct BoundedCache<K, V> {
    entries: IndexMap<K, V>,
    capacity: usize,
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq,
{
    /// Creates an empty cache holding at most `capacity` entries.
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: IndexMap::with_capacity(capacity),
            capacity,
        }
    }

    /// The maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The current number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Checks if the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Checks if `key` is cached, without updating its recency.
    pub fn contains_key(&self, key: &K) -> bool {
        self.entries.contains_key(key)
    }

    /// Retrieves the value for `key` and marks it as most recently used.
    pub fn get(&mut self, key: &K) -> Option<&V> {
        let (key, value) = self.entries.shift_remove_entry(key)?;
        self.entries.insert(key, value);
        self.entries.last().map(|(_, value)| value)
    }

    /// Inserts `value` for `key` as the most recently used entry, evicting the least recently
    /// used entry if the cache is full.
    pub fn insert(&mut self, key: K, value: V) {
        if self.capacity == 0 {
            return;
        }
        self.entries.shift_remove(&key);
        while self.entries.len() >= self.capacity {
            self.entries.shift_remove_index(0);
        }
        self.entries.insert(key, value);
    }

    /// Drops all entries.
    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

impl<K, V> BoundedCache<K, V>
where
    K: Hash + Eq,
    V: Clone,
{
    /// Retrieves the value for `key`, computing and caching it with `f` on a miss.
    ///
    /// Errors from `f` are propagated and nothing is cached.
    pub fn get_or_try_insert_with<F, E>(&mut self, key: K, f: F) -> Result<V, E>
    where
        F: FnOnce() -> Result<V, E>,
    {
        if let Some(value) = self.get(&key) {
            return Ok(value.clone());
        }
        let value = f()?;
        self.insert(key, value.clone());
        Ok(value)
    }
}
