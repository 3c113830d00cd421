use crate::byteview::ByteView;
use crate::cache::MainCache;
use crate::error::{BoxError, GetError};
use crate::metrics::{Metrics, MetricsSnapshot};
use crate::peer::{FetchRequest, PeerFetcher, PeerPicker};
use crate::singleflight::FlightGroup;

use std::collections::HashMap;
use std::sync::atomic::Ordering;
use std::sync::Arc;

use once_cell::sync::{Lazy, OnceCell};
use parking_lot::RwLock;

/// The origin a group loads missing keys from.
///
/// Invoked at most once per key per coalesced fill; the returned bytes are
/// owned by the cache from then on. Any closure of the right shape is a
/// loader.
pub trait Loader: Send + Sync {
  fn load(&self, key: &str) -> Result<Vec<u8>, BoxError>;
}

impl<F> Loader for F
where
  F: Fn(&str) -> Result<Vec<u8>, BoxError> + Send + Sync,
{
  fn load(&self, key: &str) -> Result<Vec<u8>, BoxError> {
    self(key)
  }
}

// Every registered group, by name. Written on registration, read on every
// peer-served request.
static GROUPS: Lazy<RwLock<HashMap<String, Arc<Group>>>> =
  Lazy::new(|| RwLock::new(HashMap::new()));

/// Constructs a group and registers it process-wide under `name`.
///
/// `cache_bytes` bounds the group's main cache (`0` = unbounded).
/// Registering a name twice replaces the previous group; callers should not
/// rely on that.
pub fn new_group(
  name: impl Into<String>,
  cache_bytes: u64,
  loader: impl Loader + 'static,
) -> Arc<Group> {
  let name = name.into();
  let metrics = Arc::new(Metrics::default());
  let group = Arc::new(Group {
    name: name.clone(),
    loader: Box::new(loader),
    main_cache: MainCache::new(cache_bytes, metrics.clone()),
    peers: OnceCell::new(),
    flights: FlightGroup::new(),
    metrics,
  });

  GROUPS.write().insert(name, group.clone());
  group
}

/// Looks up a previously registered group.
pub fn get_group(name: &str) -> Option<Arc<Group>> {
  GROUPS.read().get(name).cloned()
}

/// A named namespace of cached keys bound to one origin loader and,
/// optionally, one peer picker.
///
/// Lookups are read-through: a cache miss triggers a coalesced fill that
/// consults the owning peer first (when a picker is registered) and falls
/// back to the local origin loader.
pub struct Group {
  name: String,
  loader: Box<dyn Loader>,
  main_cache: MainCache,
  peers: OnceCell<Arc<dyn PeerPicker>>,
  flights: FlightGroup<Result<ByteView, GetError>>,
  metrics: Arc<Metrics>,
}

impl Group {
  pub fn name(&self) -> &str {
    &self.name
  }

  /// Registers the picker that routes keys to remote peers.
  ///
  /// May be called at most once per group; a second call is a programming
  /// error and panics.
  pub fn register_peers(&self, peers: Arc<dyn PeerPicker>) {
    if self.peers.set(peers).is_err() {
      panic!("register_peers called more than once for group {:?}", self.name);
    }
  }

  /// Looks up `key`, filling the cache on a miss.
  ///
  /// Concurrent callers for the same key share a single fill. Origin
  /// failures surface as [`GetError::Origin`]; peer failures are masked by
  /// the origin fallback.
  pub fn get(&self, key: &str) -> Result<ByteView, GetError> {
    if key.is_empty() {
      return Err(GetError::EmptyKey);
    }

    if let Some(view) = self.main_cache.get(key) {
      tracing::debug!(group = %self.name, key, "cache hit");
      return Ok(view);
    }

    self.load(key)
  }

  /// A point-in-time snapshot of the group's counters.
  pub fn metrics(&self) -> MetricsSnapshot {
    self.metrics.snapshot()
  }

  // A fill runs at most once per key across all concurrent callers,
  // whether it is answered by a peer or by the origin.
  fn load(&self, key: &str) -> Result<ByteView, GetError> {
    self.flights.run(key, || {
      if let Some(picker) = self.peers.get() {
        if let Some(peer) = picker.pick_peer(key) {
          match self.fetch_from_peer(peer.as_ref(), key) {
            Ok(view) => {
              self.metrics.peer_loads.fetch_add(1, Ordering::Relaxed);
              return Ok(view);
            }
            Err(err) => {
              self.metrics.peer_failures.fetch_add(1, Ordering::Relaxed);
              tracing::warn!(
                group = %self.name,
                key,
                error = %err,
                "peer fetch failed, falling back to origin"
              );
            }
          }
        }
      }

      self.load_locally(key)
    })
  }

  fn fetch_from_peer(&self, peer: &dyn PeerFetcher, key: &str) -> Result<ByteView, crate::peer::FetchError> {
    let request = FetchRequest {
      group: self.name.clone(),
      key: key.to_owned(),
    };
    let response = peer.fetch(&request)?;
    // The transport buffer is ours to keep; wrap it without another copy.
    Ok(ByteView::from(response.value))
  }

  fn load_locally(&self, key: &str) -> Result<ByteView, GetError> {
    let bytes = self
      .loader
      .load(key)
      .map_err(|err| GetError::Origin(Arc::from(err)))?;

    let view = ByteView::from(bytes);
    self.main_cache.add(key, view.clone());
    self.metrics.local_loads.fetch_add(1, Ordering::Relaxed);
    Ok(view)
  }
}

impl std::fmt::Debug for Group {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("Group")
      .field("name", &self.name)
      .field("has_peers", &self.peers.get().is_some())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  fn echo_loader() -> impl Loader {
    |key: &str| -> Result<Vec<u8>, BoxError> { Ok(key.as_bytes().to_vec()) }
  }

  #[test]
  fn registry_finds_registered_groups() {
    let group = new_group("registry-lookup", 1024, echo_loader());
    let found = get_group("registry-lookup").expect("group was registered");
    assert_eq!(found.name(), group.name());
    assert!(get_group("registry-never-registered").is_none());
  }

  #[test]
  fn empty_key_is_rejected() {
    let group = new_group("registry-empty-key", 1024, echo_loader());
    assert!(matches!(group.get(""), Err(GetError::EmptyKey)));
  }
}
