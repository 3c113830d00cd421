//! Distributed read-through in-memory cache.
//!
//! A cluster of peer nodes collectively serves lookups for opaque byte
//! values. Each node registers named [`Group`]s bound to an origin
//! [`Loader`]; a miss triggers exactly one coalesced fill, routed by a
//! consistent-hash ring to the peer owning the key and falling back to the
//! local origin when no (healthy) remote peer does. Values are cached in a
//! bounded, cost-based LRU and handed out as immutable [`ByteView`]s.
//!
//! The building blocks are usable on their own: [`lru::LruStore`],
//! [`ring::HashRing`] and [`singleflight::FlightGroup`]. The default
//! peer-to-peer transport is HTTP ([`HttpPool`] / [`HttpFetcher`]); any
//! other transport can plug in through the [`PeerPicker`] / [`PeerFetcher`]
//! capability pair.

pub mod byteview;
pub mod error;
pub mod http;
pub mod lru;
pub mod peer;
pub mod ring;
pub mod singleflight;

mod cache;
mod group;
mod metrics;

pub use byteview::ByteView;
pub use error::{BoxError, GetError};
pub use group::{get_group, new_group, Group, Loader};
pub use http::{HttpFetcher, HttpPool, DEFAULT_BASE_PATH, DEFAULT_REPLICAS};
pub use metrics::MetricsSnapshot;
pub use peer::{FetchError, FetchRequest, FetchResponse, PeerFetcher, PeerPicker};
