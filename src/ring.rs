use std::collections::HashMap;
use std::fmt;

/// Hash function mapping bytes to a 32-bit ring position.
pub type RingHasher = Box<dyn Fn(&[u8]) -> u32 + Send + Sync>;

/// A consistent-hash ring with virtual nodes.
///
/// Each peer is projected onto `replicas` positions so load spreads evenly
/// and membership changes remap only a fraction of the key space. Positions
/// are 32-bit hashes kept in a sorted vector (widened to `u64` so lookups
/// never overflow when comparing); a key is owned by the peer at the first
/// position at or after `hash(key)`, wrapping around at the top.
///
/// A built ring is read-only: membership changes swap in a new ring rather
/// than mutating one that readers may hold.
pub struct HashRing {
  replicas: usize,
  hash: RingHasher,
  // Sorted ascending. Parallel source of truth for `owners` keys.
  positions: Vec<u64>,
  owners: HashMap<u64, String>,
}

impl HashRing {
  /// An empty ring hashing with CRC-32 (IEEE), the wire-stable default all
  /// nodes of a cluster must share.
  pub fn new(replicas: usize) -> Self {
    Self::with_hasher(replicas, Box::new(|data| crc32fast::hash(data)))
  }

  /// An empty ring with a caller-chosen hash function.
  pub fn with_hasher(replicas: usize, hash: RingHasher) -> Self {
    Self {
      replicas,
      hash,
      positions: Vec::new(),
      owners: HashMap::new(),
    }
  }

  pub fn is_empty(&self) -> bool {
    self.positions.is_empty()
  }

  /// Number of positions on the ring (`replicas` per added peer).
  pub fn len(&self) -> usize {
    self.positions.len()
  }

  /// Adds peers to the ring, projecting each onto `replicas` virtual nodes.
  ///
  /// The virtual-node key for peer `p`, replica `i` is the ASCII decimal of
  /// `i` concatenated with `p`; this exact byte layout keeps assignments
  /// stable across implementations. Positions are sorted once at the end of
  /// the call. Adding a peer twice is not meaningful; callers deduplicate.
  /// If two virtual nodes collide on a position the later write owns it.
  pub fn add<I, S>(&mut self, peers: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    for peer in peers {
      let peer = peer.into();
      for i in 0..self.replicas {
        let vnode_key = format!("{i}{peer}");
        let position = (self.hash)(vnode_key.as_bytes()) as u64;
        self.positions.push(position);
        self.owners.insert(position, peer.clone());
      }
    }
    self.positions.sort_unstable();
  }

  /// Returns the peer owning `key`, or `None` on an empty ring.
  pub fn get(&self, key: &str) -> Option<&str> {
    if self.positions.is_empty() {
      return None;
    }

    let hash = (self.hash)(key.as_bytes()) as u64;
    // First position at or after the key's hash, wrapping to the start.
    let idx = match self.positions.binary_search(&hash) {
      Ok(idx) => idx,
      Err(idx) => idx,
    };
    let position = self.positions[idx % self.positions.len()];
    self.owners.get(&position).map(String::as_str)
  }
}

impl fmt::Debug for HashRing {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.debug_struct("HashRing")
      .field("replicas", &self.replicas)
      .field("positions", &self.positions.len())
      .finish_non_exhaustive()
  }
}

#[cfg(test)]
mod test {
  use super::*;

  // A ring whose hash parses its input as decimal, making assignments easy
  // to reason about: peer "6" lands on 06/16/26, and so on.
  fn decimal_ring() -> HashRing {
    let mut ring = HashRing::with_hasher(
      3,
      Box::new(|data| {
        std::str::from_utf8(data)
          .expect("test keys are ascii")
          .parse()
          .expect("test keys are decimal")
      }),
    );
    ring.add(["6", "4", "2"]);
    ring
  }

  #[test]
  fn empty_ring_owns_nothing() {
    let ring = HashRing::new(50);
    assert!(ring.is_empty());
    assert_eq!(ring.get("any"), None);
  }

  #[test]
  fn keys_map_to_the_next_position_clockwise() {
    let ring = decimal_ring();
    assert_eq!(ring.len(), 9);

    for (key, peer) in [("2", "2"), ("11", "2"), ("23", "4"), ("27", "2")] {
      assert_eq!(ring.get(key), Some(peer), "key {key}");
    }
  }

  #[test]
  fn adding_a_peer_remaps_only_adjacent_keys() {
    let mut ring = decimal_ring();
    ring.add(["8"]);

    // 27 now belongs to 8's virtual node at 28; the rest are untouched.
    assert_eq!(ring.get("27"), Some("8"));
    for (key, peer) in [("2", "2"), ("11", "2"), ("23", "4")] {
      assert_eq!(ring.get(key), Some(peer), "key {key}");
    }
  }

  #[test]
  fn default_hash_is_deterministic() {
    let mut a = HashRing::new(50);
    let mut b = HashRing::new(50);
    a.add(["peer-a", "peer-b", "peer-c"]);
    b.add(["peer-a", "peer-b", "peer-c"]);

    for key in ["alpha", "beta", "gamma", "delta"] {
      assert_eq!(a.get(key), b.get(key), "key {key}");
    }
  }

  #[test]
  fn every_peer_owns_some_of_the_keyspace() {
    let mut ring = HashRing::new(50);
    ring.add(["peer-a", "peer-b", "peer-c"]);

    let mut owners = std::collections::HashSet::new();
    for i in 0..200 {
      owners.insert(ring.get(&format!("key-{i}")).unwrap().to_owned());
    }
    assert_eq!(owners.len(), 3, "50 replicas spread 200 keys over all peers");
  }
}
