//! GuessInk Core Library
//!
//! Synchronization layer for a multiplayer draw-and-guess game: the wire
//! protocol, the client transport, the round state machine and the late-joiner
//! catch-up built on the round's event history.

pub mod canvas;
pub mod history;
pub mod input;
pub mod protocol;
pub mod round;
pub mod session;
pub mod sync;
pub mod tools;

pub use canvas::{CanvasDocument, CanvasItem, Renderer};
pub use history::EventHistory;
pub use input::{CommandError, UserCommand, parse_command};
pub use protocol::{Envelope, ParticipantId, ProtocolError, RoundCommand, Route};
pub use round::{FixedPrompts, Phase, PromptPicker, RandomPrompts, RoundState, TimerEvent};
pub use session::GameSession;
pub use sync::{ClientTransport, ConnectionState, TransportError};
pub use tools::{Brush, BrushKind, ShapeMode, ToolManager};
