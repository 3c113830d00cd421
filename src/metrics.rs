use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use crossbeam_utils::CachePadded;

/// Thread-safe counters for a single group. All fields are atomic so the
/// hot paths update them without locks.
#[derive(Debug, Default)]
pub(crate) struct Metrics {
  pub(crate) hits: CachePadded<AtomicU64>,
  pub(crate) misses: CachePadded<AtomicU64>,
  pub(crate) local_loads: CachePadded<AtomicU64>,
  pub(crate) peer_loads: CachePadded<AtomicU64>,
  pub(crate) peer_failures: CachePadded<AtomicU64>,
  pub(crate) evictions: CachePadded<AtomicU64>,
}

impl Metrics {
  pub(crate) fn snapshot(&self) -> MetricsSnapshot {
    let hits = self.hits.load(Ordering::Relaxed);
    let misses = self.misses.load(Ordering::Relaxed);
    let total_lookups = hits + misses;

    MetricsSnapshot {
      hits,
      misses,
      hit_ratio: if total_lookups == 0 {
        0.0
      } else {
        hits as f64 / total_lookups as f64
      },
      local_loads: self.local_loads.load(Ordering::Relaxed),
      peer_loads: self.peer_loads.load(Ordering::Relaxed),
      peer_failures: self.peer_failures.load(Ordering::Relaxed),
      evictions: self.evictions.load(Ordering::Relaxed),
    }
  }
}

/// A point-in-time, public-facing snapshot of a group's counters.
#[derive(Clone)]
pub struct MetricsSnapshot {
  /// Lookups answered from the main cache.
  pub hits: u64,
  /// Lookups that had to run a fill.
  pub misses: u64,
  /// hits / (hits + misses).
  pub hit_ratio: f64,
  /// Fills answered by the local origin loader.
  pub local_loads: u64,
  /// Fills answered by a remote peer.
  pub peer_loads: u64,
  /// Peer fetches that failed and fell back to the origin.
  pub peer_failures: u64,
  /// Entries evicted from the main cache by capacity pressure.
  pub evictions: u64,
}

impl fmt::Debug for MetricsSnapshot {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("MetricsSnapshot")
      .field("hits", &self.hits)
      .field("misses", &self.misses)
      .field("hit_ratio", &format!("{:.2}%", self.hit_ratio * 100.0))
      .field("local_loads", &self.local_loads)
      .field("peer_loads", &self.peer_loads)
      .field("peer_failures", &self.peer_failures)
      .field("evictions", &self.evictions)
      .finish()
  }
}
