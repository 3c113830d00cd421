use std::fmt;
use std::sync::Arc;

/// Wire request for a peer lookup: which group to consult and for which key.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FetchRequest {
  #[prost(string, tag = "1")]
  pub group: String,
  #[prost(string, tag = "2")]
  pub key: String,
}

/// Wire response carrying the looked-up bytes.
#[derive(Clone, PartialEq, prost::Message)]
pub struct FetchResponse {
  #[prost(bytes = "vec", tag = "1")]
  pub value: Vec<u8>,
}

/// Errors a peer fetch can fail with. All of them are treated as transient:
/// the group logs the failure and falls back to its local origin load.
#[derive(Debug, Clone)]
pub enum FetchError {
  /// The transport could not complete the request.
  Transport(String),
  /// The peer answered with a non-success status code.
  Status(u16),
  /// The response body was not a decodable response message.
  Decode(String),
}

impl fmt::Display for FetchError {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    match self {
      FetchError::Transport(msg) => write!(f, "peer transport error: {}", msg),
      FetchError::Status(code) => write!(f, "peer returned status {}", code),
      FetchError::Decode(msg) => write!(f, "undecodable peer response: {}", msg),
    }
  }
}

impl std::error::Error for FetchError {}

/// The client half of the peer protocol: fetch a key from one remote peer.
pub trait PeerFetcher: Send + Sync {
  fn fetch(&self, request: &FetchRequest) -> Result<FetchResponse, FetchError>;
}

/// Routes a key to the remote peer owning it.
///
/// Must be deterministic for a given membership. `None` means no remote
/// peer should be consulted — the membership is empty or the local node
/// owns the key itself — and the caller loads from its origin instead.
pub trait PeerPicker: Send + Sync {
  fn pick_peer(&self, key: &str) -> Option<Arc<dyn PeerFetcher>>;
}
