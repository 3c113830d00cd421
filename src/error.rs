use std::fmt;
use std::sync::Arc;

/// Boxed error type origin loaders report their failures with.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors surfaced by [`Group::get`](crate::Group::get).
///
/// Peer-fetch failures never appear here; they are logged and masked by a
/// local origin load. Only errors the caller can act on surface.
#[derive(Debug, Clone)]
pub enum GetError {
  /// The caller passed an empty key.
  EmptyKey,
  /// The origin loader failed for this key. The failure is shared with
  /// every caller coalesced onto the same fill and is not cached; the next
  /// lookup for the key triggers a fresh fill.
  Origin(Arc<dyn std::error::Error + Send + Sync>),
}

impl fmt::Display for GetError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      GetError::EmptyKey => f.write_str("key is required"),
      GetError::Origin(err) => write!(f, "origin load failed: {}", err),
    }
  }
}

impl std::error::Error for GetError {
  fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
    match self {
      GetError::EmptyKey => None,
      GetError::Origin(err) => Some(err.as_ref()),
    }
  }
}

#[cfg(test)]
mod test {
  use super::*;

  #[test]
  fn display_names_the_failure() {
    assert_eq!(GetError::EmptyKey.to_string(), "key is required");

    let origin = GetError::Origin(Arc::from(BoxError::from("row not found")));
    assert_eq!(origin.to_string(), "origin load failed: row not found");
  }

  #[test]
  fn origin_errors_clone_cheaply() {
    let origin = GetError::Origin(Arc::from(BoxError::from("boom")));
    let clone = origin.clone();
    assert_eq!(origin.to_string(), clone.to_string());
  }
}
