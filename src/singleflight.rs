use std::sync::Arc;
use std::thread::{self, Thread};

use ahash::{HashMap, HashMapExt};
use parking_lot::Mutex;

// One in-flight fill. Waiters park until the owner completes it; the result
// is cloned out to every waiter, errors included.
enum FlightState<T> {
  Pending,
  Done(T),
}

struct FlightInner<T> {
  state: FlightState<T>,
  waiters: Vec<Thread>,
}

struct Flight<T> {
  inner: Mutex<FlightInner<T>>,
}

impl<T: Clone> Flight<T> {
  fn new() -> Self {
    Self {
      inner: Mutex::new(FlightInner {
        state: FlightState::Pending,
        waiters: Vec::new(),
      }),
    }
  }

  // Publish the result and wake every parked waiter.
  fn complete(&self, value: T) {
    let mut inner = self.inner.lock();
    inner.state = FlightState::Done(value);
    for waiter in inner.waiters.drain(..) {
      waiter.unpark();
    }
  }

  // Block until the flight completes. Spurious unparks re-check the state.
  fn wait(&self) -> T {
    loop {
      {
        let mut inner = self.inner.lock();
        if let FlightState::Done(value) = &inner.state {
          return value.clone();
        }
        inner.waiters.push(thread::current());
      }
      thread::park();
    }
  }
}

/// Coalesces concurrent calls so that, per key, at most one invocation of
/// the supplied function is ever in flight.
///
/// The first caller for a key runs the function; callers arriving while it
/// runs block and receive a clone of the same result, errors included. Once
/// the result is delivered the record is dropped, so the next call for the
/// key runs the function again — there is no caching and no retry here.
pub struct FlightGroup<T> {
  calls: Mutex<HashMap<String, Arc<Flight<T>>>>,
}

impl<T: Clone> FlightGroup<T> {
  pub fn new() -> Self {
    Self {
      calls: Mutex::new(HashMap::new()),
    }
  }

  /// Runs `fill` for `key`, unless a call for the same key is already in
  /// flight, in which case the caller blocks and shares that call's result.
  ///
  /// The registration lock is never held while `fill` runs.
  pub fn run<F>(&self, key: &str, fill: F) -> T
  where
    F: FnOnce() -> T,
  {
    let flight = {
      let mut calls = self.calls.lock();
      if let Some(existing) = calls.get(key) {
        let existing = existing.clone();
        drop(calls);
        return existing.wait();
      }
      let flight = Arc::new(Flight::new());
      calls.insert(key.to_owned(), flight.clone());
      flight
    };

    let result = fill();
    flight.complete(result.clone());
    self.calls.lock().remove(key);
    result
  }

  #[cfg(test)]
  fn in_flight(&self) -> usize {
    self.calls.lock().len()
  }
}

impl<T: Clone> Default for FlightGroup<T> {
  fn default() -> Self {
    Self::new()
  }
}
