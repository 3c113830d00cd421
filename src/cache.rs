use crate::byteview::ByteView;
use crate::lru::LruStore;
use crate::metrics::Metrics;

use std::sync::atomic::Ordering;
use std::sync::Arc;

use parking_lot::Mutex;

/// Mutex-guarded facade over the LRU store used as a group's main cache.
///
/// The store itself is built lazily on the first insert: constructing a
/// group (and registering many never-used groups) stays allocation-free.
pub(crate) struct MainCache {
  capacity: u64,
  store: Mutex<Option<LruStore<ByteView>>>,
  metrics: Arc<Metrics>,
}

impl MainCache {
  pub(crate) fn new(capacity: u64, metrics: Arc<Metrics>) -> Self {
    Self {
      capacity,
      store: Mutex::new(None),
      metrics,
    }
  }

  /// Looks up `key`, returning a clone of the cached view on a hit.
  /// Returns `None` without allocating when the store was never written.
  pub(crate) fn get(&self, key: &str) -> Option<ByteView> {
    let mut guard = self.store.lock();
    let view = guard.as_mut().and_then(|store| store.get(key).cloned());
    match view {
      Some(view) => {
        self.metrics.hits.fetch_add(1, Ordering::Relaxed);
        Some(view)
      }
      None => {
        self.metrics.misses.fetch_add(1, Ordering::Relaxed);
        None
      }
    }
  }

  /// Inserts `key`, building the store on first use. Capacity evictions run
  /// inside the same critical section.
  pub(crate) fn add(&self, key: &str, value: ByteView) {
    let mut guard = self.store.lock();
    let store = guard.get_or_insert_with(|| {
      let metrics = self.metrics.clone();
      LruStore::new(self.capacity).evict_handler(Box::new(move |key: &str, _value: &ByteView| {
        metrics.evictions.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(key, "evicted from main cache");
      }))
    });
    store.add(key, value);
  }

  #[cfg(test)]
  pub(crate) fn is_initialized(&self) -> bool {
    self.store.lock().is_some()
  }
}
