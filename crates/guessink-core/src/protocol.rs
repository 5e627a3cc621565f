//! Wire envelopes exchanged between participants and the relay hub.
//!
//! Every message is a JSON object with a `type` discriminator:
//! ```json
//! { "type": "hello", "id": "5f0c7c1e-..." }
//! { "type": "line", "coords": [10, 20, 30, 40], "colour": "black", "width": 3 }
//! { "type": "state_snapshot", "to": "5f0c7c1e-...", "drawer": "...", "prompt": "Dog",
//!   "history": [], "gameStarted": true, "roundActive": true }
//! ```
//!
//! Envelopes without a `to` field are broadcast by the hub; envelopes with one
//! are delivered to that participant only.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;
use uuid::Uuid;

/// Identity of one participant, generated locally at startup.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ParticipantId(String);

impl ParticipantId {
    /// Generate a fresh random identity.
    pub fn generate() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl From<&str> for ParticipantId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

impl From<String> for ParticipantId {
    fn from(value: String) -> Self {
        Self(value)
    }
}

impl fmt::Display for ParticipantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Codec errors.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("Malformed envelope: {0}")]
    Malformed(serde_json::Error),
    #[error("Failed to encode envelope: {0}")]
    Encode(serde_json::Error),
}

/// Round control command mirrored to every participant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum RoundCommand {
    Start,
    Stop,
}

fn default_colour() -> String {
    "black".to_string()
}

fn default_line_width() -> f64 {
    2.0
}

/// One discrete message on the wire.
///
/// Coordinates are always flat lists (`[x1, y1, x2, y2, ...]`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Envelope {
    /// Registration handshake, also seen by every peer as a join notice.
    Hello { id: ParticipantId },
    /// Current round state sent by the drawer to a late joiner.
    StateSnapshot {
        to: ParticipantId,
        drawer: ParticipantId,
        prompt: String,
        history: Vec<Envelope>,
        #[serde(rename = "gameStarted")]
        game_started: bool,
        #[serde(rename = "roundActive")]
        round_active: bool,
    },
    StartRound {
        drawer_id: ParticipantId,
        prompt: String,
    },
    Command { command: RoundCommand },
    Guess { id: ParticipantId, guess: String },
    CorrectGuess {
        winner_id: ParticipantId,
        prompt: String,
    },
    Line {
        coords: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
        #[serde(default = "default_line_width")]
        width: f64,
    },
    Air {
        coords: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
    },
    Texture {
        coords: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
    },
    Calligraphy {
        polygon: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
    },
    Blending {
        coords: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
    },
    Shining {
        center: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
    },
    Eraser { coords: Vec<f64>, width: f64 },
    SquarePreview {
        corners: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
    },
    SquareFinalize {
        corners: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
    },
    CirclePreview {
        bbox: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
    },
    CircleFinalize {
        bbox: Vec<f64>,
        #[serde(default = "default_colour")]
        colour: String,
    },
    /// Transient pointer position; never replayed.
    Cursor {
        id: ParticipantId,
        coords: Vec<f64>,
    },
    /// Any `type` this build does not know about.
    #[serde(other)]
    Unknown,
}

impl Envelope {
    /// Decode an envelope from its JSON text.
    pub fn decode(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    /// Encode the envelope as JSON text.
    pub fn encode(&self) -> Result<String, ProtocolError> {
        serde_json::to_string(self).map_err(ProtocolError::Encode)
    }

    /// Wire name of this envelope's `type`.
    pub fn kind(&self) -> &'static str {
        match self {
            Envelope::Hello { .. } => "hello",
            Envelope::StateSnapshot { .. } => "state_snapshot",
            Envelope::StartRound { .. } => "start_round",
            Envelope::Command { .. } => "command",
            Envelope::Guess { .. } => "guess",
            Envelope::CorrectGuess { .. } => "correct_guess",
            Envelope::Line { .. } => "line",
            Envelope::Air { .. } => "air",
            Envelope::Texture { .. } => "texture",
            Envelope::Calligraphy { .. } => "calligraphy",
            Envelope::Blending { .. } => "blending",
            Envelope::Shining { .. } => "shining",
            Envelope::Eraser { .. } => "eraser",
            Envelope::SquarePreview { .. } => "square_preview",
            Envelope::SquareFinalize { .. } => "square_finalize",
            Envelope::CirclePreview { .. } => "circle_preview",
            Envelope::CircleFinalize { .. } => "circle_finalize",
            Envelope::Cursor { .. } => "cursor",
            Envelope::Unknown => "unknown",
        }
    }

    /// Destination of a directed envelope.
    pub fn destination(&self) -> Option<&ParticipantId> {
        match self {
            Envelope::StateSnapshot { to, .. } => Some(to),
            _ => None,
        }
    }

    /// Whether this envelope changes what is on the canvas.
    pub fn is_drawing(&self) -> bool {
        matches!(
            self,
            Envelope::Line { .. }
                | Envelope::Air { .. }
                | Envelope::Texture { .. }
                | Envelope::Calligraphy { .. }
                | Envelope::Blending { .. }
                | Envelope::Shining { .. }
                | Envelope::Eraser { .. }
                | Envelope::SquarePreview { .. }
                | Envelope::SquareFinalize { .. }
                | Envelope::CirclePreview { .. }
                | Envelope::CircleFinalize { .. }
        )
    }

    /// Whether this envelope belongs in the round's replay history.
    ///
    /// Handshakes, snapshots, round starts and cursor moves are excluded.
    pub fn is_durable(&self) -> bool {
        self.is_drawing()
            || matches!(
                self,
                Envelope::Command { .. } | Envelope::CorrectGuess { .. }
            )
    }
}

/// The routing-relevant part of an envelope.
///
/// The hub only needs `type`, `to` and the hello `id`; the rest of the payload
/// is forwarded untouched.
#[derive(Debug, Clone, Deserialize)]
pub struct Route {
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub to: Option<ParticipantId>,
    #[serde(default)]
    pub id: Option<ParticipantId>,
}

impl Route {
    /// Parse the routing header of a raw payload.
    pub fn parse(text: &str) -> Result<Self, ProtocolError> {
        serde_json::from_str(text).map_err(ProtocolError::Malformed)
    }

    /// The participant announcing itself, if this is a `hello`.
    pub fn hello_id(&self) -> Option<&ParticipantId> {
        if self.kind == "hello" {
            self.id.as_ref()
        } else {
            None
        }
    }
}
