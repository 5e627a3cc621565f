//! Relay behaviour over real WebSocket connections.

use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::time::timeout;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async, tungstenite::Message};

type Client = WebSocketStream<MaybeTlsStream<TcpStream>>;

async fn spawn_hub() -> std::net::SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(guessink_server::serve_on(listener));
    addr
}

async fn connect(addr: std::net::SocketAddr) -> Client {
    let (ws, _) = connect_async(format!("ws://{}/ws", addr)).await.unwrap();
    ws
}

async fn send(ws: &mut Client, text: &str) {
    ws.send(Message::text(text.to_string())).await.unwrap();
}

/// Connect and announce `id`, giving the hub time to register it.
async fn join(addr: std::net::SocketAddr, id: &str) -> Client {
    let mut ws = connect(addr).await;
    send(&mut ws, &json!({"type": "hello", "id": id}).to_string()).await;
    tokio::time::sleep(Duration::from_millis(100)).await;
    ws
}

async fn recv_text(ws: &mut Client) -> String {
    loop {
        let msg = timeout(Duration::from_secs(2), ws.next())
            .await
            .expect("timed out waiting for a message")
            .expect("stream ended")
            .expect("websocket error");
        if let Message::Text(text) = msg {
            return text.as_str().to_string();
        }
    }
}

async fn recv_json(ws: &mut Client) -> Value {
    serde_json::from_str(&recv_text(ws).await).unwrap()
}

async fn assert_silent(ws: &mut Client) {
    let next = timeout(Duration::from_millis(200), ws.next()).await;
    assert!(next.is_err(), "unexpected message: {:?}", next);
}

/// X, Y and Z joined in that order, with all join announcements consumed.
async fn three_peers(addr: std::net::SocketAddr) -> (Client, Client, Client) {
    let mut x = join(addr, "X").await;
    let mut y = join(addr, "Y").await;
    assert_eq!(recv_json(&mut x).await["id"], "Y");
    let z = join(addr, "Z").await;
    assert_eq!(recv_json(&mut x).await["id"], "Z");
    assert_eq!(recv_json(&mut y).await["id"], "Z");
    (x, y, z)
}

#[tokio::test]
async fn test_directed_snapshot_reaches_only_destination() {
    let addr = spawn_hub().await;
    let (mut x, mut y, mut z) = three_peers(addr).await;

    let snapshot = json!({
        "type": "state_snapshot",
        "to": "Y",
        "drawer": "Z",
        "prompt": "Dog",
        "history": [],
        "gameStarted": true,
        "roundActive": true
    })
    .to_string();
    send(&mut z, &snapshot).await;

    // forwarded verbatim
    assert_eq!(recv_text(&mut y).await, snapshot);
    assert_silent(&mut x).await;
    assert_silent(&mut z).await;
}

#[tokio::test]
async fn test_broadcast_skips_sender() {
    let addr = spawn_hub().await;
    let (mut x, mut y, mut z) = three_peers(addr).await;

    let line = r#"{"type":"line","coords":[0,0,10,10],"colour":"black","width":3}"#;
    send(&mut x, line).await;

    assert_eq!(recv_text(&mut y).await, line);
    assert_eq!(recv_text(&mut z).await, line);
    assert_silent(&mut x).await;
}

#[tokio::test]
async fn test_directed_to_unknown_is_dropped() {
    let addr = spawn_hub().await;
    let (mut x, mut y, mut z) = three_peers(addr).await;

    let snapshot = json!({
        "type": "state_snapshot",
        "to": "W",
        "drawer": "Z",
        "prompt": "Dog",
        "history": [],
        "gameStarted": true,
        "roundActive": true,
    });
    send(&mut z, &snapshot.to_string()).await;

    assert_silent(&mut x).await;
    assert_silent(&mut y).await;
}

#[tokio::test]
async fn test_envelopes_before_hello_are_dropped() {
    let addr = spawn_hub().await;
    let mut x = join(addr, "X").await;
    let mut anonymous = connect(addr).await;

    send(&mut anonymous, r#"{"type":"line","coords":[0,0,1,1]}"#).await;
    send(&mut anonymous, "not json at all").await;
    assert_silent(&mut x).await;

    // the connection is still usable once it says hello
    send(&mut anonymous, r#"{"type":"hello","id":"late"}"#).await;
    assert_eq!(recv_json(&mut x).await["id"], "late");
}

#[tokio::test]
async fn test_broadcast_survives_departed_peer() {
    let addr = spawn_hub().await;
    let (mut x, mut y, mut z) = three_peers(addr).await;

    z.close(None).await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;

    send(&mut x, r#"{"type":"command","command":"START"}"#).await;
    assert_eq!(recv_json(&mut y).await["command"], "START");
}

#[tokio::test]
async fn test_health_endpoint() {
    let addr = spawn_hub().await;
    let mut stream = TcpStream::connect(addr).await.unwrap();
    let request = b"GET /health HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n";
    stream.write_all(request).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    assert!(response.starts_with("HTTP/1.1 200"));
    assert!(response.ends_with("ok"));
}
