//! GuessInk WebSocket Relay Hub
//!
//! Fans envelopes out between participants. The hub holds no game state: it
//! reads only the routing header of each payload and forwards the original
//! text untouched.
//!
//! ## Routing
//!
//! ```json
//! { "type": "hello", "id": "p1" }               // registers p1, then broadcast
//! { "type": "state_snapshot", "to": "p2", ... } // directed to p2 only
//! { "type": "line", "coords": [0, 0, 5, 5] }    // broadcast to everyone else
//! ```

pub mod registry;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{
        State,
        ws::{Message, Utf8Bytes, WebSocket, WebSocketUpgrade},
    },
    response::IntoResponse,
    routing::get,
};
use futures_util::{SinkExt, StreamExt};
use guessink_core::{ParticipantId, Route};
use thiserror::Error;
use tokio::{net::TcpListener, sync::mpsc};
use tower_http::{cors::CorsLayer, trace::TraceLayer};
use tracing::{debug, info, warn};

pub use registry::{ConnectionRegistry, PeerHandle};

/// Default listen address.
pub const DEFAULT_ADDR: &str = "0.0.0.0:6789";

/// Hub configuration
#[derive(Debug, Clone)]
pub struct HubConfig {
    pub addr: SocketAddr,
}

impl Default for HubConfig {
    fn default() -> Self {
        Self {
            addr: SocketAddr::from(([0, 0, 0, 0], 6789)),
        }
    }
}

impl HubConfig {
    /// Defaults, with the listen address overridden by `GUESSINK_ADDR`.
    pub fn from_env() -> Result<Self, HubError> {
        match std::env::var("GUESSINK_ADDR") {
            Ok(value) => {
                let addr = value.parse().map_err(|e| HubError::InvalidAddr(value, e))?;
                Ok(Self { addr })
            }
            Err(_) => Ok(Self::default()),
        }
    }
}

#[derive(Debug, Error)]
pub enum HubError {
    #[error("Invalid listen address '{0}': {1}")]
    InvalidAddr(String, std::net::AddrParseError),
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },
    #[error("Server error: {0}")]
    Serve(#[source] std::io::Error),
}

/// Shared hub state
#[derive(Debug, Default)]
pub struct Hub {
    registry: ConnectionRegistry,
}

impl Hub {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn registry(&self) -> &ConnectionRegistry {
        &self.registry
    }

    /// Route one raw payload received on `conn`.
    ///
    /// `sender` is the identity the connection announced, if any. Returns the
    /// identity announced by this payload when it is a `hello`.
    pub fn route(
        &self,
        sender: Option<&ParticipantId>,
        conn: &PeerHandle,
        text: Utf8Bytes,
    ) -> Option<ParticipantId> {
        let route = match Route::parse(text.as_str()) {
            Ok(route) => route,
            Err(e) => {
                warn!("Dropping malformed envelope from {}: {}", conn.conn_id, e);
                return None;
            }
        };

        if let Some(id) = route.hello_id() {
            let id = id.clone();
            if let Some(previous) = sender.filter(|previous| **previous != id) {
                self.registry.unregister(previous, conn.conn_id);
            }
            if self.registry.register(id.clone(), conn.clone()) {
                info!("Participant {} re-registered", id);
            } else {
                info!(
                    "Participant {} joined ({} connected)",
                    id, self.registry.len()
                );
            }
            self.registry.broadcast(Some(&id), text);
            return Some(id);
        }

        let Some(from) = sender else {
            warn!(
                "Dropping {} from {}: no hello yet",
                route.kind, conn.conn_id
            );
            return None;
        };

        match route.to {
            Some(to) => {
                if self.registry.send_to(&to, text) == 0 {
                    debug!(
                        "Dropping {} from {}: {} is not connected",
                        route.kind, from, to
                    );
                }
            }
            None => {
                self.registry.broadcast(Some(from), text);
            }
        }
        None
    }
}

/// Build the hub's HTTP router.
pub fn router(hub: Arc<Hub>) -> Router {
    Router::new()
        .route("/", get(index))
        .route("/ws", get(ws_handler))
        .route("/health", get(health))
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
        .with_state(hub)
}

/// Bind the configured address and serve until the process ends.
pub async fn serve(config: HubConfig) -> Result<(), HubError> {
    let listener = TcpListener::bind(config.addr)
        .await
        .map_err(|source| HubError::Bind {
            addr: config.addr,
            source,
        })?;
    info!("GuessInk relay hub listening on {}", config.addr);
    info!("WebSocket endpoint: ws://{}/ws", config.addr);
    serve_on(listener).await
}

/// Serve on an already bound listener.
pub async fn serve_on(listener: TcpListener) -> Result<(), HubError> {
    let hub = Arc::new(Hub::new());
    axum::serve(listener, router(hub)).await.map_err(HubError::Serve)
}

/// Index page
async fn index() -> &'static str {
    "GuessInk Relay Hub - Connect via WebSocket at /ws"
}

/// Health check
async fn health() -> &'static str {
    "ok"
}

/// WebSocket upgrade handler
async fn ws_handler(ws: WebSocketUpgrade, State(hub): State<Arc<Hub>>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, hub))
}

/// Handle a WebSocket connection
async fn handle_socket(socket: WebSocket, hub: Arc<Hub>) {
    let (tx, mut outbound) = mpsc::unbounded_channel::<Utf8Bytes>();
    let conn = PeerHandle::new(tx);
    info!("New connection: {}", conn.conn_id);

    let (mut sender, mut receiver) = socket.split();
    let mut identity: Option<ParticipantId> = None;

    loop {
        tokio::select! {
            msg = receiver.next() => {
                match msg {
                    Some(Ok(Message::Text(text))) => {
                        if let Some(id) = hub.route(identity.as_ref(), &conn, text) {
                            identity = Some(id);
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => break,
                    Some(Ok(_)) => {} // Ignore binary, ping, pong
                    Some(Err(e)) => {
                        warn!("WebSocket error for {}: {}", conn.conn_id, e);
                        break;
                    }
                }
            }

            // Envelopes routed to this connection by other tasks
            Some(text) = outbound.recv() => {
                if sender.send(Message::Text(text)).await.is_err() {
                    break;
                }
            }
        }
    }

    if let Some(ref id) = identity {
        if hub.registry.unregister(id, conn.conn_id) {
            info!("Participant {} left ({} connected)", id, hub.registry.len());
        }
    }
    info!("Connection closed: {}", conn.conn_id);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn connection() -> (PeerHandle, mpsc::UnboundedReceiver<Utf8Bytes>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (PeerHandle::new(tx), rx)
    }

    fn text(payload: &'static str) -> Utf8Bytes {
        Utf8Bytes::from_static(payload)
    }

    const HELLO_X: &str = r#"{"type":"hello","id":"x"}"#;
    const HELLO_Y: &str = r#"{"type":"hello","id":"y"}"#;
    const SNAPSHOT_TO_W: &str = concat!(
        r#"{"type":"state_snapshot","to":"w","drawer":"y","prompt":"Dog","#,
        r#""history":[],"gameStarted":true,"roundActive":true}"#
    );

    #[test]
    fn test_hello_registers_and_is_forwarded() {
        let hub = Hub::new();
        let (x, mut x_rx) = connection();
        let (y, mut y_rx) = connection();

        let x_id = hub.route(None, &x, text(HELLO_X));
        assert_eq!(x_id, Some(ParticipantId::from("x")));
        hub.route(None, &y, text(HELLO_Y));

        assert_eq!(x_rx.try_recv().unwrap().as_str(), HELLO_Y);
        assert!(y_rx.try_recv().is_err());
        assert_eq!(hub.registry().len(), 2);
    }

    #[test]
    fn test_envelopes_before_hello_are_dropped() {
        let hub = Hub::new();
        let (x, mut x_rx) = connection();
        let (w, _w_rx) = connection();
        hub.route(None, &x, text(HELLO_X));

        let line = r#"{"type":"line","coords":[0,0,1,1]}"#;
        let result = hub.route(None, &w, text(line));
        assert!(result.is_none());
        assert!(x_rx.try_recv().is_err());
    }

    #[test]
    fn test_malformed_payload_is_dropped() {
        let hub = Hub::new();
        let (x, _x_rx) = connection();
        assert!(hub.route(None, &x, text("not json")).is_none());
        assert!(hub.registry().is_empty());
    }

    #[test]
    fn test_directed_to_unknown_is_dropped() {
        let hub = Hub::new();
        let (x, mut x_rx) = connection();
        let (y, _y_rx) = connection();
        hub.route(None, &x, text(HELLO_X));
        let y_id = hub.route(None, &y, text(HELLO_Y));
        x_rx.try_recv().unwrap();

        hub.route(y_id.as_ref(), &y, text(SNAPSHOT_TO_W));
        assert!(x_rx.try_recv().is_err());
        assert_eq!(hub.registry().len(), 2);
    }

    #[test]
    fn test_config_default_port() {
        assert_eq!(HubConfig::default().addr.port(), 6789);
        assert_eq!(
            DEFAULT_ADDR.parse::<SocketAddr>().unwrap(),
            HubConfig::default().addr
        );
    }
}
