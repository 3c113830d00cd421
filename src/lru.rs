use std::collections::HashMap;

use generational_arena::{Arena, Index};

/// Values stored in an [`LruStore`] report their size so the store can do
/// cost-based accounting and eviction.
pub trait Costed {
  /// Size of the value in bytes (or any non-negative unit the capacity is
  /// expressed in).
  fn cost(&self) -> u64;
}

/// Handler invoked once per evicted entry, with the key and the value being
/// dropped.
pub type EvictHandler<V> = Box<dyn FnMut(&str, &V) + Send>;

#[derive(Debug)]
struct Node<V> {
  key: String,
  value: V,
  next: Option<Index>,
  prev: Option<Index>,
}

/// A bounded, cost-based LRU store.
///
/// Entries live in an arena-backed doubly linked list, most-recently-used at
/// the head, with a map from key to arena index for O(1) lookup. Each entry
/// is charged `key.len() + value.cost()` against the capacity; inserts evict
/// from the tail until the store fits again.
///
/// Not safe for concurrent use; callers must serialize access.
pub struct LruStore<V: Costed> {
  // Capacity in cost units. Zero means unbounded.
  capacity: u64,
  nodes: Arena<Node<V>>,
  lookup: HashMap<String, Index>,
  // Head is the most-recently-used entry, tail the least.
  head: Option<Index>,
  tail: Option<Index>,
  current_cost: u64,
  on_evict: Option<EvictHandler<V>>,
}

fn entry_cost<V: Costed>(key: &str, value: &V) -> u64 {
  key.len() as u64 + value.cost()
}

impl<V: Costed> LruStore<V> {
  pub fn new(capacity: u64) -> Self {
    Self {
      capacity,
      nodes: Arena::new(),
      lookup: HashMap::new(),
      head: None,
      tail: None,
      current_cost: 0,
      on_evict: None,
    }
  }

  /// Installs a handler called once per evicted entry, before the entry is
  /// dropped.
  pub fn evict_handler(mut self, handler: EvictHandler<V>) -> Self {
    self.on_evict = Some(handler);
    self
  }

  pub fn len(&self) -> usize {
    self.lookup.len()
  }

  pub fn is_empty(&self) -> bool {
    self.lookup.is_empty()
  }

  pub fn capacity(&self) -> u64 {
    self.capacity
  }

  /// Sum of `key.len() + value.cost()` over all resident entries.
  pub fn current_cost(&self) -> u64 {
    self.current_cost
  }

  // Unlink a node from the list without touching the arena or the lookup
  // map.
  fn unlink(&mut self, index: Index) {
    let node = &self.nodes[index];
    let prev_idx = node.prev;
    let next_idx = node.next;

    if let Some(prev) = prev_idx {
      self.nodes[prev].next = next_idx;
    } else {
      self.head = next_idx;
    }

    if let Some(next) = next_idx {
      self.nodes[next].prev = prev_idx;
    } else {
      self.tail = prev_idx;
    }
  }

  // Make an already-allocated node the new head.
  fn push_front_node(&mut self, index: Index) {
    let old_head = self.head;
    self.nodes[index].next = old_head;
    self.nodes[index].prev = None;
    self.head = Some(index);

    if let Some(old_head) = old_head {
      self.nodes[old_head].prev = Some(index);
    }

    if self.tail.is_none() {
      self.tail = Some(index);
    }
  }

  fn move_to_front(&mut self, index: Index) {
    if self.head != Some(index) {
      self.unlink(index);
      self.push_front_node(index);
    }
  }

  /// Looks up `key`, promoting the entry to most-recently-used on a hit.
  pub fn get(&mut self, key: &str) -> Option<&V> {
    let index = *self.lookup.get(key)?;
    self.move_to_front(index);
    Some(&self.nodes[index].value)
  }

  /// Inserts or updates `key`, then evicts from the tail while the store is
  /// over capacity.
  ///
  /// An existing entry is updated in place (its cost delta applied) and
  /// promoted; a new entry is charged in full and becomes the head. An
  /// entry whose cost alone exceeds the capacity is evicted by the same
  /// call that admitted it; one costing exactly the capacity stays.
  pub fn add(&mut self, key: &str, value: V) {
    if let Some(&index) = self.lookup.get(key) {
      let node = &mut self.nodes[index];
      let old_cost = node.value.cost();
      let new_cost = value.cost();
      node.value = value;
      self.current_cost = self.current_cost - old_cost + new_cost;
      self.move_to_front(index);
    } else {
      let cost = entry_cost(key, &value);
      let index = self.nodes.insert(Node {
        key: key.to_owned(),
        value,
        next: None,
        prev: None,
      });
      self.lookup.insert(key.to_owned(), index);
      self.current_cost += cost;
      self.push_front_node(index);
    }

    while self.capacity != 0 && self.current_cost > self.capacity {
      self.remove_oldest();
    }
  }

  /// Evicts the least-recently-used entry, invoking the evict handler if one
  /// is installed. No-op on an empty store.
  pub fn remove_oldest(&mut self) {
    let Some(tail_index) = self.tail else {
      return;
    };

    self.unlink(tail_index);
    let node = self
      .nodes
      .remove(tail_index)
      .expect("tail index must be live");
    self.lookup.remove(&node.key);
    self.current_cost -= entry_cost(&node.key, &node.value);

    if let Some(handler) = self.on_evict.as_mut() {
      handler(&node.key, &node.value);
    }
  }

  // Test helper: keys from head (most recent) to tail.
  #[cfg(test)]
  fn keys_as_vec(&self) -> Vec<String> {
    let mut keys = Vec::new();
    let mut current = self.head;
    while let Some(index) = current {
      keys.push(self.nodes[index].key.clone());
      current = self.nodes[index].next;
    }
    keys
  }
}

impl Costed for String {
  fn cost(&self) -> u64 {
    self.len() as u64
  }
}

#[cfg(test)]
mod test {
  use super::*;

  use std::sync::atomic::{AtomicUsize, Ordering};
  use std::sync::Arc;

  fn store(capacity: u64) -> LruStore<String> {
    LruStore::new(capacity)
  }

  #[test]
  fn get_on_empty_store_misses() {
    let mut s = store(0);
    assert!(s.get("missing").is_none());
    assert_eq!(s.len(), 0);
    assert_eq!(s.current_cost(), 0);
  }

  #[test]
  fn add_then_get_roundtrips() {
    let mut s = store(0);
    s.add("key1", "1234".to_owned());
    assert_eq!(s.get("key1").map(String::as_str), Some("1234"));
    assert_eq!(s.current_cost(), 8, "4 key bytes + 4 value bytes");
    assert_eq!(s.len(), 1);
  }

  #[test]
  fn insert_over_capacity_evicts_the_oldest() {
    // k1 and k2 fill the store exactly; k3 forces k1 out.
    let mut s = store(10);
    s.add("k1", "v1".to_owned());
    s.add("k2", "v2".to_owned());
    assert_eq!(s.current_cost(), 8);

    s.add("k3", "v3".to_owned());
    assert!(s.get("k1").is_none(), "k1 was least recently used");
    assert_eq!(s.get("k2").map(String::as_str), Some("v2"));
    assert_eq!(s.get("k3").map(String::as_str), Some("v3"));
    assert_eq!(s.len(), 2);
  }

  #[test]
  fn get_promotes_against_eviction() {
    let mut s = store(10);
    s.add("k1", "v1".to_owned());
    s.add("k2", "v2".to_owned());

    // Touch k1 so k2 becomes the eviction candidate.
    assert!(s.get("k1").is_some());
    s.add("k3", "v3".to_owned());

    assert!(s.get("k2").is_none(), "k2 was least recently used");
    assert!(s.get("k1").is_some());
    assert!(s.get("k3").is_some());
    assert_eq!(s.keys_as_vec(), vec!["k3", "k1"]);
  }

  #[test]
  fn update_adjusts_cost_and_promotes() {
    let mut s = store(0);
    s.add("k1", "v1".to_owned());
    s.add("k2", "v2".to_owned());
    assert_eq!(s.current_cost(), 8);

    s.add("k1", "longer".to_owned());
    assert_eq!(s.current_cost(), 12, "2 + 6 for k1, 2 + 2 for k2");
    assert_eq!(s.len(), 2);
    assert_eq!(s.keys_as_vec(), vec!["k1", "k2"]);
  }

  #[test]
  fn evict_handler_sees_every_victim() {
    let evicted = Arc::new(AtomicUsize::new(0));
    let seen = Arc::new(parking_lot::Mutex::new(Vec::new()));
    let handler = {
      let evicted = evicted.clone();
      let seen = seen.clone();
      Box::new(move |key: &str, _value: &String| {
        evicted.fetch_add(1, Ordering::SeqCst);
        seen.lock().push(key.to_owned());
      })
    };

    let mut s = LruStore::new(10).evict_handler(handler);
    s.add("k1", "v1".to_owned());
    s.add("k2", "v2".to_owned());
    s.add("k3", "v3".to_owned());
    s.add("k4", "v4".to_owned());

    assert_eq!(evicted.load(Ordering::SeqCst), 2);
    assert_eq!(*seen.lock(), vec!["k1", "k2"]);
  }

  #[test]
  fn entry_costing_exactly_capacity_stays() {
    let mut s = store(8);
    s.add("key1", "1234".to_owned());
    assert_eq!(s.current_cost(), 8);
    assert_eq!(s.len(), 1, "an entry at exactly capacity is resident");
  }

  #[test]
  fn entry_over_capacity_is_evicted_by_its_own_insert() {
    let mut s = store(8);
    s.add("key1", "12345".to_owned());
    assert_eq!(s.len(), 0, "a lone over-budget entry cannot stay");
    assert_eq!(s.current_cost(), 0);
    assert!(s.get("key1").is_none());
  }

  #[test]
  fn unbounded_store_never_evicts() {
    let mut s = store(0);
    for i in 0..100 {
      s.add(&format!("key-{i}"), "x".repeat(64));
    }
    assert_eq!(s.len(), 100);
  }
}
