use crate::lru::Costed;

use std::fmt;
use std::sync::Arc;

/// An immutable view over a cached byte sequence.
///
/// A `ByteView` is what lookups return and what the main cache stores. The
/// bytes behind it are never mutated after construction, so cloning a view
/// is a cheap reference-count bump and many callers can hold the same value
/// concurrently.
#[derive(Clone, PartialEq, Eq)]
pub struct ByteView {
  bytes: Arc<[u8]>,
}

impl ByteView {
  /// Number of bytes in the view.
  pub fn len(&self) -> usize {
    self.bytes.len()
  }

  pub fn is_empty(&self) -> bool {
    self.bytes.is_empty()
  }

  /// Copies the bytes out into a fresh, caller-owned vector.
  ///
  /// The returned vector does not alias the cached bytes; mutating it has
  /// no effect on cache contents.
  pub fn to_vec(&self) -> Vec<u8> {
    self.bytes.to_vec()
  }

  /// Borrows the underlying bytes without copying.
  ///
  /// The borrow is read-only and the backing storage is immutable, so this
  /// cannot be used to alter cache contents.
  pub fn as_bytes(&self) -> &[u8] {
    &self.bytes
  }
}

impl Costed for ByteView {
  fn cost(&self) -> u64 {
    self.bytes.len() as u64
  }
}

impl From<Vec<u8>> for ByteView {
  fn from(bytes: Vec<u8>) -> Self {
    Self {
      bytes: bytes.into(),
    }
  }
}

impl From<&[u8]> for ByteView {
  fn from(bytes: &[u8]) -> Self {
    Self {
      bytes: bytes.into(),
    }
  }
}

impl From<String> for ByteView {
  fn from(s: String) -> Self {
    s.into_bytes().into()
  }
}

impl From<&str> for ByteView {
  fn from(s: &str) -> Self {
    s.as_bytes().into()
  }
}

impl fmt::Debug for ByteView {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match std::str::from_utf8(&self.bytes) {
      Ok(s) => write!(f, "ByteView({:?})", s),
      Err(_) => write!(f, "ByteView({} bytes)", self.bytes.len()),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn to_vec_is_a_defensive_copy() {
    let view = ByteView::from("abc");
    let mut copy = view.to_vec();
    copy[0] = b'z';
    assert_eq!(view.as_bytes(), b"abc", "view must not see the mutation");
  }

  #[test]
  fn clones_share_bytes() {
    let view = ByteView::from(vec![1u8, 2, 3]);
    let clone = view.clone();
    assert_eq!(view, clone);
    assert_eq!(clone.len(), 3);
  }

  #[test]
  fn cost_is_byte_length() {
    assert_eq!(ByteView::from("1234").cost(), 4);
    assert_eq!(ByteView::from("").cost(), 0);
    assert!(ByteView::from("").is_empty());
  }
}
