use crate::core::Result;
use crate::persist::Object;
use lru::LruCache;
use std::cell::RefCell;
use std::num::NonZeroUsize;

/// Bounded id → object cache with least-recently-used eviction.
///
/// A capacity of zero turns the cache into a pass-through: every lookup runs
/// the loader and nothing is retained.
pub struct ObjectCache {
    entries: RefCell<Option<LruCache<String, Object>>>,
}

impl ObjectCache {
    pub fn new(capacity: usize) -> Self {
        Self {
            entries: RefCell::new(NonZeroUsize::new(capacity).map(LruCache::new)),
        }
    }

    /// Returns the cached object for `id`, or runs `loader` and caches its result.
    ///
    /// The cache is not borrowed while `loader` runs, so loaders may resolve
    /// nested references through the same cache.
    pub fn get_or_load<F>(&self, id: &str, loader: F) -> Result<Object>
    where
        F: FnOnce() -> Result<Object>,
    {
        if let Some(hit) = self.get(id) {
            return Ok(hit);
        }

        let loaded = loader()?;
        self.put(id, loaded.clone());
        Ok(loaded)
    }

    pub fn get(&self, id: &str) -> Option<Object> {
        self.entries
            .borrow_mut()
            .as_mut()
            .and_then(|cache| cache.get(id).cloned())
    }

    pub fn put(&self, id: &str, object: Object) {
        if let Some(cache) = self.entries.borrow_mut().as_mut() {
            cache.put(id.to_string(), object);
        }
    }

    pub fn evict(&self, id: &str) -> Option<Object> {
        self.entries
            .borrow_mut()
            .as_mut()
            .and_then(|cache| cache.pop(id))
    }

    pub fn clear(&self) {
        if let Some(cache) = self.entries.borrow_mut().as_mut() {
            cache.clear();
        }
    }

    pub fn len(&self) -> usize {
        self.entries.borrow().as_ref().map_or(0, |cache| cache.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn capacity(&self) -> usize {
        self.entries
            .borrow()
            .as_ref()
            .map_or(0, |cache| cache.cap().get())
    }
}
