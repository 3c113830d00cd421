use crate::group::get_group;
use crate::peer::{FetchError, FetchRequest, FetchResponse, PeerFetcher, PeerPicker};
use crate::ring::HashRing;

use std::sync::Arc;

use ahash::{HashMap, HashMapExt};
use axum::extract::State;
use axum::http::{header, StatusCode, Uri};
use axum::response::{IntoResponse, Response};
use axum::Router;
use parking_lot::Mutex;
use prost::Message;

/// Path prefix peer requests are served under. Wire-stable: every node of a
/// cluster (and any interoperating implementation) must agree on it.
pub const DEFAULT_BASE_PATH: &str = "/_geecache/";

/// Virtual nodes per peer on the routing ring.
pub const DEFAULT_REPLICAS: usize = 50;

// Ring and per-peer clients are rebuilt together on every membership
// change; readers always see a matching pair.
struct PoolState {
  ring: HashRing,
  fetchers: HashMap<String, Arc<HttpFetcher>>,
}

/// The default HTTP peer transport.
///
/// One `HttpPool` per node plays both sides of the protocol: it serves
/// `/<base-path>/<group>/<key>` lookups to other peers (via [`router`]) and
/// acts as the [`PeerPicker`] routing this node's misses to the peer owning
/// each key. The pool never routes to its own address; those keys fall
/// through to the group's origin loader.
///
/// [`router`]: HttpPool::router
pub struct HttpPool {
  // This node's base URL, e.g. "http://10.0.0.2:8000".
  self_addr: String,
  base_path: String,
  replicas: usize,
  state: Mutex<PoolState>,
}

impl HttpPool {
  pub fn new(self_addr: impl Into<String>) -> Self {
    Self {
      self_addr: self_addr.into(),
      base_path: DEFAULT_BASE_PATH.to_owned(),
      replicas: DEFAULT_REPLICAS,
      state: Mutex::new(PoolState {
        ring: HashRing::new(DEFAULT_REPLICAS),
        fetchers: HashMap::new(),
      }),
    }
  }

  /// Overrides the serving path prefix. Must start and end with `/`.
  pub fn base_path(mut self, base_path: impl Into<String>) -> Self {
    self.base_path = base_path.into();
    self
  }

  /// Overrides the virtual-node count used for peer routing.
  pub fn replicas(mut self, replicas: usize) -> Self {
    self.replicas = replicas;
    self
  }

  /// Replaces the pool's membership.
  ///
  /// Builds a fresh ring and one HTTP client per peer, then swaps both in
  /// under the pool lock. Peers are base URLs such as
  /// `http://10.0.0.2:8000` and should include this node's own address so
  /// every node routes identically.
  pub fn set_peers<I, S>(&self, peers: I)
  where
    I: IntoIterator<Item = S>,
    S: Into<String>,
  {
    let peers: Vec<String> = peers.into_iter().map(Into::into).collect();

    let mut ring = HashRing::new(self.replicas);
    ring.add(peers.iter().cloned());

    let mut fetchers = HashMap::with_capacity(peers.len());
    for peer in peers {
      let fetcher = Arc::new(HttpFetcher::new(format!("{}{}", peer, self.base_path)));
      fetchers.insert(peer, fetcher);
    }

    *self.state.lock() = PoolState { ring, fetchers };
  }

  /// An axum router serving this pool's wire surface. Mount it on the
  /// listener bound to `self_addr`.
  pub fn router(self: &Arc<Self>) -> Router {
    Router::new().fallback(serve_peer_request).with_state(self.clone())
  }

  async fn handle(&self, path: &str) -> Response {
    let Some(rest) = path.strip_prefix(self.base_path.as_str()) else {
      return (StatusCode::BAD_REQUEST, "bad request").into_response();
    };

    // `<group>/<key>`; the key may itself contain escaped slashes.
    let mut parts = rest.splitn(2, '/');
    let (Some(group_part), Some(key_part)) = (parts.next(), parts.next()) else {
      return (StatusCode::BAD_REQUEST, "bad request").into_response();
    };

    let (Ok(group_name), Ok(key)) = (urlencoding::decode(group_part), urlencoding::decode(key_part))
    else {
      return (StatusCode::BAD_REQUEST, "bad request").into_response();
    };

    tracing::debug!(server = %self.self_addr, group = %group_name, key = %key, "peer request");

    let Some(group) = get_group(&group_name) else {
      return (
        StatusCode::NOT_FOUND,
        format!("no such group: {group_name}"),
      )
        .into_response();
    };

    // Group lookups block (origin loads, peer fetches), so run them off
    // the async workers.
    let key = key.into_owned();
    let looked_up = tokio::task::spawn_blocking(move || group.get(&key)).await;

    match looked_up {
      Ok(Ok(view)) => {
        let body = FetchResponse {
          value: view.to_vec(),
        }
        .encode_to_vec();
        (
          [(header::CONTENT_TYPE, "application/octet-stream")],
          body,
        )
          .into_response()
      }
      Ok(Err(err)) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
      Err(join_err) => (StatusCode::INTERNAL_SERVER_ERROR, join_err.to_string()).into_response(),
    }
  }
}

async fn serve_peer_request(State(pool): State<Arc<HttpPool>>, uri: Uri) -> Response {
  pool.handle(uri.path()).await
}

impl PeerPicker for HttpPool {
  fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>> {
    let state = self.state.lock();
    let peer = state.ring.get(key)?;
    if peer == self.self_addr {
      return None;
    }
    tracing::debug!(server = %self.self_addr, peer, key, "picked remote peer");
    state
      .fetchers
      .get(peer)
      .map(|fetcher| fetcher.clone() as Arc<dyn PeerFetcher>)
  }
}

impl std::fmt::Debug for HttpPool {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HttpPool")
      .field("self_addr", &self.self_addr)
      .field("base_path", &self.base_path)
      .finish_non_exhaustive()
  }
}

/// Blocking HTTP client for one remote peer.
///
/// Runs on plain threads (the group's fill path), never on the async
/// serving runtime.
pub struct HttpFetcher {
  // Peer address with the base path appended, e.g.
  // "http://10.0.0.2:8000/_geecache/".
  base_url: String,
  client: reqwest::blocking::Client,
}

impl HttpFetcher {
  pub fn new(base_url: impl Into<String>) -> Self {
    Self {
      base_url: base_url.into(),
      client: reqwest::blocking::Client::new(),
    }
  }
}

impl PeerFetcher for HttpFetcher {
  fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError> {
    let url = format!(
      "{}{}/{}",
      self.base_url,
      urlencoding::encode(&request.group),
      urlencoding::encode(&request.key),
    );

    let response = self
      .client
      .get(&url)
      .send()
      .map_err(|err| FetchError::Transport(err.to_string()))?;

    let status = response.status();
    if !status.is_success() {
      return Err(FetchError::Status(status.as_u16()));
    }

    let body = response
      .bytes()
      .map_err(|err| FetchError::Transport(err.to_string()))?;

    FetchResponse::decode(body.as_ref()).map_err(|err| FetchError::Decode(err.to_string()))
  }
}

impl std::fmt::Debug for HttpFetcher {
  fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
    f.debug_struct("HttpFetcher")
      .field("base_url", &self.base_url)
      .finish_non_exhaustive()
  }
}
