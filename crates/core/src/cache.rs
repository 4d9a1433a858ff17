//! In-memory memoization cache for constructed domain objects.
//!
//! Construction stays with the caller: on a miss the caller builds the
//! value and inserts it. The cache itself is a plain map behind one
//! coarse mutex. There is no eviction, expiry, or size bound.

use std::borrow::Borrow;
use std::collections::HashMap;
use std::hash::Hash;
use std::sync::{Mutex, MutexGuard, PoisonError};

/// Thread-safe map from identifier to previously constructed value.
///
/// One instance caches one value type. Callers that share stored values
/// across threads use `Arc<T>` as the value type, so `get` clones a
/// handle rather than the object itself.
///
/// `put` and `get` serialize on a single mutex covering the whole map,
/// so a reader never observes a half-applied insert. `is_empty` and
/// `len` take the same mutex and are linearized with them.
#[derive(Debug)]
pub struct Cache<K, V> {
    map: Mutex<HashMap<K, V>>,
}

impl<K, V> Cache<K, V> {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self { map: Mutex::new(HashMap::new()) }
    }
}

impl<K, V> Default for Cache<K, V> {
    fn default() -> Self {
        Self::new()
    }
}

impl<K, V> Cache<K, V>
where
    K: Eq + Hash,
    V: Clone,
{
    /// Insert or overwrite the value for `key`. Last writer wins.
    pub fn put(&self, key: K, value: V) {
        self.lock().insert(key, value);
    }

    /// Look up `key`, cloning the stored value out. `None` on a miss.
    pub fn get<Q>(&self, key: &Q) -> Option<V>
    where
        K: Borrow<Q>,
        Q: Eq + Hash + ?Sized,
    {
        self.lock().get(key).cloned()
    }

    /// Whether the cache currently holds no entries.
    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    /// Number of cached entries.
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    // A poisoned mutex only records that some caller panicked while
    // holding it; no map operation can leave the HashMap torn, so the
    // contents are still coherent.
    fn lock(&self) -> MutexGuard<'_, HashMap<K, V>> {
        self.map.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
