use meshcache::{BoxError, Loader};

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

// The static origin every read-through test loads from.
pub fn score_db() -> HashMap<&'static str, &'static str> {
  [("Tom", "630"), ("Jack", "589"), ("Sam", "567")].into()
}

/// A loader over [`score_db`] that counts how many times the origin was
/// consulted. Unknown keys fail the load.
pub fn counting_db_loader(loads: Arc<AtomicUsize>) -> impl Loader {
  let db = score_db();
  move |key: &str| -> Result<Vec<u8>, BoxError> {
    loads.fetch_add(1, Ordering::SeqCst);
    match db.get(key) {
      Some(value) => Ok(value.as_bytes().to_vec()),
      None => Err(format!("{key} not in the score table").into()),
    }
  }
}

/// A loader that returns the key itself as the value.
pub fn echo_loader() -> impl Loader {
  |key: &str| -> Result<Vec<u8>, BoxError> { Ok(key.as_bytes().to_vec()) }
}
