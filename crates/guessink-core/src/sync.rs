//! WebSocket transport to the relay hub.
//!
//! A background thread owns the socket. The control loop talks to it through
//! two queues: [`ClientTransport::send`] enqueues envelopes for delivery and
//! [`ClientTransport::drain`] collects everything received since the last call.

use std::sync::mpsc::{Receiver, Sender, TryRecvError, channel};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use thiserror::Error;
use tungstenite::{Message, connect};
use url::Url;

use crate::protocol::{Envelope, ParticipantId, ProtocolError};

/// Read timeout of the socket thread; bounds the latency of queued sends.
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    Disconnected,
    Connecting,
    Connected,
    Error,
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("Invalid URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Invalid WebSocket URL scheme: {0}")]
    UnsupportedScheme(String),
    #[error("Transport is closed")]
    Closed,
    #[error(transparent)]
    Encode(#[from] ProtocolError),
}

/// Commands sent to the socket thread.
enum WsCommand {
    Send(String),
    Close,
}

/// Events from the socket thread.
enum Inbound {
    Connected,
    Envelope(Envelope),
    Disconnected,
    Failed(String),
}

/// Client side of the relay connection.
pub struct ClientTransport {
    state: ConnectionState,
    /// Set once the hub accepted the connection.
    has_connected: bool,
    cmd_tx: Option<Sender<WsCommand>>,
    inbound_rx: Option<Receiver<Inbound>>,
    _thread: Option<JoinHandle<()>>,
}

impl ClientTransport {
    /// Connect to the hub at `url` and announce `id`.
    ///
    /// Returns as soon as the socket thread is running; the `hello` is the
    /// first envelope it sends once the connection opens.
    pub fn connect(url: &str, id: &ParticipantId) -> Result<Self, TransportError> {
        let parsed = Url::parse(url)?;
        if parsed.scheme() != "ws" && parsed.scheme() != "wss" {
            return Err(TransportError::UnsupportedScheme(
                parsed.scheme().to_string(),
            ));
        }

        let (cmd_tx, cmd_rx) = channel::<WsCommand>();
        let (inbound_tx, inbound_rx) = channel::<Inbound>();

        let hello = Envelope::Hello { id: id.clone() }.encode()?;
        // Queued before the thread starts so it always goes out first.
        cmd_tx
            .send(WsCommand::Send(hello))
            .map_err(|_| TransportError::Closed)?;

        let url = url.to_string();
        let handle = thread::spawn(move || run_socket(&url, cmd_rx, inbound_tx));

        Ok(Self {
            state: ConnectionState::Connecting,
            has_connected: false,
            cmd_tx: Some(cmd_tx),
            inbound_rx: Some(inbound_rx),
            _thread: Some(handle),
        })
    }

    /// Queue an envelope for delivery.
    pub fn send(&self, envelope: &Envelope) -> Result<(), TransportError> {
        let text = envelope.encode()?;
        match self.cmd_tx {
            Some(ref tx) => tx
                .send(WsCommand::Send(text))
                .map_err(|_| TransportError::Closed),
            None => Err(TransportError::Closed),
        }
    }

    /// Take every envelope received since the last call (non-blocking).
    pub fn drain(&mut self) -> Vec<Envelope> {
        let mut envelopes = Vec::new();
        if let Some(ref rx) = self.inbound_rx {
            loop {
                match rx.try_recv() {
                    Ok(Inbound::Connected) => {
                        self.state = ConnectionState::Connected;
                        self.has_connected = true;
                    }
                    Ok(Inbound::Envelope(envelope)) => envelopes.push(envelope),
                    Ok(Inbound::Disconnected) => self.state = ConnectionState::Disconnected,
                    Ok(Inbound::Failed(message)) => {
                        log::error!("{}", message);
                        self.state = ConnectionState::Error;
                    }
                    Err(TryRecvError::Empty) => break,
                    // socket thread gone without saying goodbye
                    Err(TryRecvError::Disconnected) => {
                        if self.state != ConnectionState::Error {
                            self.state = ConnectionState::Disconnected;
                        }
                        break;
                    }
                }
            }
        }
        envelopes
    }

    pub fn state(&self) -> ConnectionState {
        self.state
    }

    pub fn is_connected(&self) -> bool {
        self.state == ConnectionState::Connected
    }

    /// True if the connection was established at some point, even if it
    /// has since dropped.
    pub fn has_connected(&self) -> bool {
        self.has_connected
    }

    /// Close the connection. Envelopes queued before this call are written
    /// before the close frame.
    pub fn disconnect(&mut self) {
        if let Some(tx) = self.cmd_tx.take() {
            let _ = tx.send(WsCommand::Close);
        }
        self.inbound_rx = None;
        self._thread = None;
        self.state = ConnectionState::Disconnected;
    }
}

impl Drop for ClientTransport {
    fn drop(&mut self) {
        self.disconnect();
    }
}

/// First 100 characters of an outbound frame, for trace logging.
fn preview(text: &str) -> &str {
    text.char_indices()
        .nth(100)
        .map_or(text, |(i, _)| &text[..i])
}

fn run_socket(url: &str, cmd_rx: Receiver<WsCommand>, inbound_tx: Sender<Inbound>) {
    log::info!("Transport thread: connecting to {}", url);

    let mut socket = match connect(url) {
        Ok((socket, response)) => {
            log::info!("Connected to hub, status: {}", response.status());
            socket
        }
        Err(e) => {
            let _ = inbound_tx.send(Inbound::Failed(format!("Connection failed: {}", e)));
            return;
        }
    };
    let _ = inbound_tx.send(Inbound::Connected);

    match socket.get_mut() {
        tungstenite::stream::MaybeTlsStream::Plain(tcp) => {
            let _ = tcp.set_read_timeout(Some(READ_TIMEOUT));
            let _ = tcp.set_write_timeout(Some(Duration::from_secs(5)));
        }
        #[allow(unreachable_patterns)]
        _ => log::debug!("TLS or other stream - using default timeout handling"),
    }

    'session: loop {
        // Flush everything queued since the last pass.
        loop {
            match cmd_rx.try_recv() {
                Ok(WsCommand::Send(text)) => {
                    log::trace!("Sending: {}", preview(&text));
                    if let Err(e) = socket.send(Message::Text(text)) {
                        log::error!("Send error: {}", e);
                        break 'session;
                    }
                }
                Ok(WsCommand::Close) => {
                    log::info!("Close requested");
                    let _ = socket.close(None);
                    break 'session;
                }
                Err(TryRecvError::Disconnected) => {
                    log::info!("Command channel disconnected");
                    break 'session;
                }
                Err(TryRecvError::Empty) => break,
            }
        }

        match socket.read() {
            Ok(Message::Text(text)) => match Envelope::decode(&text) {
                Ok(envelope) => {
                    let _ = inbound_tx.send(Inbound::Envelope(envelope));
                }
                Err(e) => log::warn!("Dropping malformed envelope: {}", e),
            },
            Ok(Message::Ping(data)) => {
                let _ = socket.send(Message::Pong(data));
            }
            Ok(Message::Close(_)) => {
                log::info!("Hub closed the connection");
                break;
            }
            Ok(_) => {}
            Err(tungstenite::Error::Io(ref e))
                if e.kind() == std::io::ErrorKind::WouldBlock
                    || e.kind() == std::io::ErrorKind::TimedOut => {}
            Err(e) => {
                log::error!("Read error: {}", e);
                break;
            }
        }
    }

    log::info!("Transport thread exiting");
    let _ = inbound_tx.send(Inbound::Disconnected);
}
