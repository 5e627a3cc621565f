//! Normalized user commands.
//!
//! Speech recognition and gesture input live outside the core; they hand over
//! short command strings such as `START`, `MY GUESS IS dog` or
//! `CHANGE BRUSH TO air`, which are parsed here.

use std::str::FromStr;

use thiserror::Error;

use crate::tools::{BrushKind, ShapeMode};

/// A command issued by the local participant.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum UserCommand {
    Start,
    Stop,
    Guess(String),
    ChangeBrush(BrushKind),
    ChangeColour(String),
    Eraser,
    Shape(ShapeMode),
    Place,
}

#[derive(Debug, Error, PartialEq, Eq)]
pub enum CommandError {
    #[error("Unknown command: {0}")]
    Unknown(String),
    #[error("Invalid brush type: '{0}'")]
    InvalidBrush(String),
    #[error("Invalid colour: '{0}'")]
    InvalidColour(String),
    #[error("Empty guess")]
    EmptyGuess,
}

/// Strip a leading keyword phrase, ignoring ASCII case. The phrase must be
/// followed by whitespace or the end of input.
fn strip_keyword<'a>(s: &'a str, keyword: &str) -> Option<&'a str> {
    let head = s.get(..keyword.len())?;
    if !head.eq_ignore_ascii_case(keyword) {
        return None;
    }
    let rest = &s[keyword.len()..];
    (rest.is_empty() || rest.starts_with(char::is_whitespace))
        .then_some(rest)
}

fn valid_colour(colour: &str) -> bool {
    if let Some(hex) = colour.strip_prefix('#') {
        return matches!(hex.len(), 3 | 6) && hex.chars().all(|c| c.is_ascii_hexdigit());
    }
    !colour.is_empty() && colour.chars().all(|c| c.is_ascii_alphabetic())
}

impl FromStr for UserCommand {
    type Err = CommandError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        let raw = raw.trim();

        if let Some(guess) = strip_keyword(raw, "MY GUESS IS") {
            let guess = guess.trim();
            if guess.is_empty() {
                return Err(CommandError::EmptyGuess);
            }
            return Ok(UserCommand::Guess(guess.to_string()));
        }
        if let Some(kind) = strip_keyword(raw, "CHANGE BRUSH TO") {
            return kind
                .parse()
                .map(UserCommand::ChangeBrush)
                .map_err(CommandError::InvalidBrush);
        }
        if let Some(colour) = strip_keyword(raw, "CHANGE COLOR TO")
            .or_else(|| strip_keyword(raw, "CHANGE COLOUR TO"))
        {
            let colour = colour.trim().to_lowercase();
            if !valid_colour(&colour) {
                return Err(CommandError::InvalidColour(colour));
            }
            return Ok(UserCommand::ChangeColour(colour));
        }

        match raw.to_uppercase().as_str() {
            "START" => Ok(UserCommand::Start),
            "STOP" => Ok(UserCommand::Stop),
            "ERASER" => Ok(UserCommand::Eraser),
            "SQUARE" => Ok(UserCommand::Shape(ShapeMode::Square)),
            "CIRCLE" => Ok(UserCommand::Shape(ShapeMode::Circle)),
            "PLACE" => Ok(UserCommand::Place),
            _ => Err(CommandError::Unknown(raw.to_string())),
        }
    }
}

/// Parse a normalized command string.
pub fn parse_command(raw: &str) -> Result<UserCommand, CommandError> {
    raw.parse()
}
