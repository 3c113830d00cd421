//! A three-node cache cluster over a static score table.
//!
//! Start one process per node, then query any of them through the API
//! front:
//!
//! ```sh
//! cargo run --example cluster -- --port 8001 &
//! cargo run --example cluster -- --port 8002 &
//! cargo run --example cluster -- --port 8003 --api &
//! curl "http://localhost:9999/api?key=Tom"
//! ```
//!
//! Every node routes each key to its owning peer, so whichever node the API
//! asks, a given key is only ever filled (and cached) on one of them.

use meshcache::{new_group, BoxError, Group, HttpPool};

use std::borrow::Cow;
use std::collections::HashMap;
use std::sync::Arc;

use axum::extract::{RawQuery, State};
use axum::http::{header, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::get;
use axum::Router;

const API_PORT: u16 = 9999;
const NODE_PORTS: [u16; 3] = [8001, 8002, 8003];

fn create_group() -> Arc<Group> {
  let db: HashMap<&str, &str> = [("Tom", "630"), ("Jack", "589"), ("Sam", "567")].into();
  new_group("scores", 2 << 10, move |key: &str| -> Result<Vec<u8>, BoxError> {
    tracing::info!(key, "score table lookup");
    match db.get(key) {
      Some(value) => Ok(value.as_bytes().to_vec()),
      None => Err(format!("{key} not in the score table").into()),
    }
  })
}

async fn api_lookup(State(group): State<Arc<Group>>, RawQuery(query): RawQuery) -> Response {
  let key = query
    .as_deref()
    .and_then(|q| q.split('&').find_map(|pair| pair.strip_prefix("key=")))
    .map(|raw| {
      urlencoding::decode(raw)
        .map(Cow::into_owned)
        .unwrap_or_default()
    })
    .unwrap_or_default();

  match tokio::task::spawn_blocking(move || group.get(&key)).await {
    Ok(Ok(view)) => (
      [(header::CONTENT_TYPE, "application/octet-stream")],
      view.to_vec(),
    )
      .into_response(),
    Ok(Err(err)) => (StatusCode::INTERNAL_SERVER_ERROR, err.to_string()).into_response(),
    Err(join_err) => (StatusCode::INTERNAL_SERVER_ERROR, join_err.to_string()).into_response(),
  }
}

fn main() {
  tracing_subscriber::fmt()
    .with_env_filter(
      tracing_subscriber::EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info,meshcache=debug")),
    )
    .init();

  let mut port = NODE_PORTS[0];
  let mut api = false;
  let mut args = std::env::args().skip(1);
  while let Some(arg) = args.next() {
    match arg.as_str() {
      "--port" => {
        port = args
          .next()
          .and_then(|value| value.parse().ok())
          .expect("--port takes a port number");
      }
      "--api" => api = true,
      other => panic!("unknown argument {other:?}"),
    }
  }
  assert!(
    NODE_PORTS.contains(&port),
    "--port must be one of {NODE_PORTS:?}"
  );

  let group = create_group();

  // Every node carries the full membership so all of them route alike.
  let self_addr = format!("http://localhost:{port}");
  let pool = Arc::new(HttpPool::new(self_addr.clone()));
  pool.set_peers(NODE_PORTS.map(|p| format!("http://localhost:{p}")));
  group.register_peers(pool.clone());

  let runtime = tokio::runtime::Runtime::new().expect("tokio runtime");
  runtime.block_on(async move {
    if api {
      let api_group = group.clone();
      tokio::spawn(async move {
        let router = Router::new()
          .route("/api", get(api_lookup))
          .with_state(api_group);
        let listener = tokio::net::TcpListener::bind(("127.0.0.1", API_PORT))
          .await
          .expect("bind the API port");
        tracing::info!(port = API_PORT, "api front running");
        axum::serve(listener, router).await.expect("serve the api");
      });
    }

    let listener = tokio::net::TcpListener::bind(("127.0.0.1", port))
      .await
      .expect("bind the cache port");
    tracing::info!(%self_addr, "cache server running");
    axum::serve(listener, pool.router()).await.expect("serve peers");
  });
}
