use std::{hash::Hash, sync::Arc};

use once_cell::sync::OnceCell;
use parking_lot::Mutex;

use crate::util::typedefs::FastHashMap;

/// Map from key to a lazily created, shared resource.
///
/// Each key is created at most once, even when many threads ask for it at the same
/// time: the first caller runs the constructor while the others wait on the same
/// cell. A failed construction is not cached, the next caller tries again. Entries
/// live as long as the cache.
pub struct ResourceCache<K, V> {
    entries: Mutex<FastHashMap<K, Arc<OnceCell<Arc<V>>>>>,
}

impl<K, V> ResourceCache<K, V>
where
    K: Eq + Hash + Clone,
{
    pub fn new() -> Self {
        Self {
            entries: Mutex::new(FastHashMap::default()),
        }
    }

    /// Returns the resource for `key`, running `create` if it does not exist yet.
    ///
    /// The map lock is only held while looking up the cell, never while `create` runs.
    pub fn get_or_try_create<E>(&self, key: &K, create: impl FnOnce() -> Result<V, E>) -> Result<Arc<V>, E> {
        let cell = {
            let mut entries = self.entries.lock();
            match entries.get(key) {
                Some(cell) => Arc::clone(cell),
                None => Arc::clone(entries.entry(key.clone()).or_default()),
            }
        };

        cell.get_or_try_init(|| create().map(Arc::new)).map(Arc::clone)
    }

    /// Returns the resource for `key` if it was already created.
    pub fn get(&self, key: &K) -> Option<Arc<V>> {
        let entries = self.entries.lock();
        entries.get(key).and_then(|cell| cell.get()).map(Arc::clone)
    }

    /// Stores an already created resource. If `key` already has a value, that value is kept and returned.
    pub fn insert(&self, key: K, value: V) -> Arc<V> {
        let cell = Arc::clone(self.entries.lock().entry(key).or_default());
        let value = Arc::new(value);
        match cell.set(Arc::clone(&value)) {
            Ok(()) => value,
            Err(_) => {
                log::warn!("Resource inserted under a key that already exists, keeping the existing value");
                cell.get().map(Arc::clone).unwrap_or(value)
            }
        }
    }

    /// Number of successfully created resources.
    pub fn len(&self) -> usize {
        self.entries.lock().values().filter(|cell| cell.get().is_some()).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl<K, V> Default for ResourceCache<K, V>
where
    K: Eq + Hash + Clone,
{
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::ResourceCache;

    #[test]
    fn failures_are_not_cached() {
        let cache = ResourceCache::<String, u32>::new();
        let key = String::from("missing.dds");

        let failed: Result<_, &str> = cache.get_or_try_create(&key, || Err("not found"));
        assert!(failed.is_err());
        assert!(cache.get(&key).is_none());
        assert!(cache.is_empty());

        let created = cache.get_or_try_create::<&str>(&key, || Ok(7)).unwrap();
        assert_eq!(*created, 7);
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn insert_keeps_first_value() {
        let cache = ResourceCache::<&str, u32>::new();
        let calls = AtomicUsize::new(0);
        let first = cache.insert("a", 1);
        let second = cache.insert("a", 2);
        assert_eq!(*first, 1);
        assert_eq!(*second, 1);

        let fetched = cache
            .get_or_try_create::<()>(&"a", || {
                calls.fetch_add(1, Ordering::SeqCst);
                Ok(3)
            })
            .unwrap();
        assert_eq!(*fetched, 1);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }
}
