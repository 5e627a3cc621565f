//! GuessInk Application
//!
//! Terminal participant: reads commands and pointer input from stdin, keeps
//! the game session in step with the hub and prints what happens.

mod app;
mod console;

pub use app::{App, AppConfig, AppError, AppInput, InputError, PointerAction, parse_line};
pub use console::ConsoleCanvas;
