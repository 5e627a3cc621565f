//! Application state and control loop.

use std::io::BufRead;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use guessink_core::{
    ClientTransport, CommandError, ConnectionState, GameSession, ParticipantId, Renderer,
    TransportError, UserCommand,
};
use kurbo::Point;
use thiserror::Error;

use crate::console::ConsoleCanvas;

/// Hub URL used when none is configured.
pub const DEFAULT_SERVER_URL: &str = "ws://localhost:6789/ws";

/// Application configuration
#[derive(Debug, Clone, PartialEq)]
pub struct AppConfig {
    pub server_url: String,
    /// Control loop period.
    pub tick: Duration,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server_url: DEFAULT_SERVER_URL.to_string(),
            tick: Duration::from_millis(20),
        }
    }
}

impl AppConfig {
    /// Configuration from the first CLI argument, then `GUESSINK_SERVER`.
    pub fn from_env(mut args: impl Iterator<Item = String>) -> Self {
        Self::resolve(args.next(), std::env::var("GUESSINK_SERVER").ok())
    }

    fn resolve(arg: Option<String>, env: Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(url) = arg.or(env) {
            config.server_url = url;
        }
        config
    }
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("Could not reach the hub at {0}")]
    ConnectionFailed(String),
}

/// Pointer input from the terminal.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerAction {
    /// Pen down at a point.
    Draw(Point),
    /// Pen up at a point.
    Move(Point),
    Lift,
    /// Drag the active shape between two corners.
    Shape(Point, Point),
}

/// One line of terminal input.
#[derive(Debug, Clone, PartialEq)]
pub enum AppInput {
    Command(UserCommand),
    Pointer(PointerAction),
    Quit,
}

#[derive(Debug, Error, PartialEq)]
pub enum InputError {
    #[error(transparent)]
    Command(#[from] CommandError),
    #[error("Expected {expected} numbers after {keyword}")]
    BadPointer {
        keyword: &'static str,
        expected: usize,
    },
}

fn numbers(
    rest: &[&str],
    keyword: &'static str,
    expected: usize,
) -> Result<Vec<f64>, InputError> {
    let values: Option<Vec<f64>> = rest.iter().map(|s| s.parse().ok()).collect();
    match values {
        Some(values) if values.len() == expected => Ok(values),
        _ => Err(InputError::BadPointer { keyword, expected }),
    }
}

/// Parse a line typed by the participant.
pub fn parse_line(raw: &str) -> Result<AppInput, InputError> {
    let words: Vec<&str> = raw.split_whitespace().collect();
    let Some(first) = words.first() else {
        return Err(CommandError::Unknown(String::new()).into());
    };

    let pointer = match first.to_uppercase().as_str() {
        "DRAW" => {
            let v = numbers(&words[1..], "DRAW", 2)?;
            PointerAction::Draw(Point::new(v[0], v[1]))
        }
        "MOVE" => {
            let v = numbers(&words[1..], "MOVE", 2)?;
            PointerAction::Move(Point::new(v[0], v[1]))
        }
        "LIFT" if words.len() == 1 => PointerAction::Lift,
        "SHAPE" => {
            let v = numbers(&words[1..], "SHAPE", 4)?;
            PointerAction::Shape(Point::new(v[0], v[1]), Point::new(v[2], v[3]))
        }
        "QUIT" | "EXIT" if words.len() == 1 => return Ok(AppInput::Quit),
        _ => return Ok(AppInput::Command(raw.parse()?)),
    };
    Ok(AppInput::Pointer(pointer))
}

/// Forward stdin lines to the control loop.
fn spawn_stdin_reader() -> Receiver<String> {
    let (tx, rx) = mpsc::channel();
    thread::spawn(move || {
        let stdin = std::io::stdin();
        for line in stdin.lock().lines() {
            let Ok(line) = line else { break };
            if tx.send(line).is_err() {
                break;
            }
        }
    });
    rx
}

/// Terminal participant.
pub struct App {
    config: AppConfig,
    session: GameSession<ConsoleCanvas>,
    transport: ClientTransport,
    /// The hub connection dropped; local play continues without it.
    offline: bool,
}

impl App {
    /// Connect to the hub with a fresh identity.
    pub fn new(config: AppConfig) -> Result<Self, AppError> {
        let id = ParticipantId::generate();
        log::info!("Participant id: {}", id);
        let transport = ClientTransport::connect(&config.server_url, &id)?;
        let session = GameSession::new(id, ConsoleCanvas::new());
        Ok(Self {
            config,
            session,
            transport,
            offline: false,
        })
    }

    /// Run until stdin closes or `QUIT` is typed.
    ///
    /// Fails only if the hub could not be reached at all. A connection that
    /// drops later leaves the participant playing offline.
    pub fn run(mut self) -> Result<(), AppError> {
        let lines = spawn_stdin_reader();
        let mut quit = false;

        while !quit {
            let now = Instant::now();
            self.poll_hub(now)?;

            loop {
                match lines.try_recv() {
                    Ok(line) => {
                        if self.handle_line(&line, now) {
                            quit = true;
                            break;
                        }
                    }
                    Err(TryRecvError::Empty) => break,
                    Err(TryRecvError::Disconnected) => {
                        quit = true;
                        break;
                    }
                }
            }

            self.session.tick(now);
            self.flush();
            self.session.renderer_mut().present();

            if !quit {
                thread::sleep(self.config.tick);
            }
        }

        log::info!("Leaving the game");
        // give the socket thread a chance to flush the last envelopes
        thread::sleep(self.config.tick * 2);
        self.transport.disconnect();
        Ok(())
    }

    pub fn is_offline(&self) -> bool {
        self.offline
    }

    /// Apply envelopes from the hub and follow the connection state.
    fn poll_hub(&mut self, now: Instant) -> Result<(), AppError> {
        for envelope in self.transport.drain() {
            self.session.handle_envelope(envelope, now);
        }
        match self.transport.state() {
            ConnectionState::Error | ConnectionState::Disconnected
                if !self.transport.has_connected() =>
            {
                Err(AppError::ConnectionFailed(self.config.server_url.clone()))
            }
            ConnectionState::Error | ConnectionState::Disconnected => {
                self.go_offline();
                Ok(())
            }
            ConnectionState::Connecting | ConnectionState::Connected => Ok(()),
        }
    }

    /// Send queued envelopes, or discard them once offline.
    fn flush(&mut self) {
        let outgoing = self.session.take_outgoing();
        if self.offline {
            return;
        }
        for envelope in outgoing {
            match self.transport.send(&envelope) {
                Ok(()) => {}
                Err(TransportError::Closed) => {
                    self.go_offline();
                    return;
                }
                Err(e) => log::warn!("Dropping {}: {}", envelope.kind(), e),
            }
        }
    }

    fn go_offline(&mut self) {
        if self.offline {
            return;
        }
        self.offline = true;
        log::warn!("Lost connection to {}", self.config.server_url);
        self.session
            .renderer_mut()
            .show_banner("Connection to the hub lost. Playing offline.");
    }

    /// Apply one input line. Returns true if the participant asked to quit.
    fn handle_line(&mut self, line: &str, now: Instant) -> bool {
        if line.trim().is_empty() {
            return false;
        }
        match parse_line(line) {
            Ok(AppInput::Quit) => return true,
            Ok(AppInput::Command(command)) => self.session.handle_command(command, now),
            Ok(AppInput::Pointer(action)) => self.handle_pointer(action),
            Err(e) => println!("?? {}", e),
        }
        false
    }

    fn handle_pointer(&mut self, action: PointerAction) {
        match action {
            PointerAction::Draw(at) => self.session.pointer_moved(at, true),
            PointerAction::Move(at) => self.session.pointer_moved(at, false),
            PointerAction::Lift => self.session.pointer_lifted(),
            PointerAction::Shape(a, b) => {
                if !self.session.shape_dragged(a, b) {
                    println!("?? No shape mode active");
                }
            }
        }
    }
}
