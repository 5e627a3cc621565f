//! Terminal renderer.

use std::io::{self, Write};

use guessink_core::{CanvasDocument, Envelope, Renderer};

/// Renders into a headless [`CanvasDocument`] and reports changes on a
/// terminal writer.
pub struct ConsoleCanvas<W: Write = io::Stdout> {
    document: CanvasDocument,
    out: W,
    /// Item count at the last `present`.
    presented: usize,
}

impl ConsoleCanvas {
    pub fn new() -> Self {
        Self::with_writer(io::stdout())
    }
}

impl Default for ConsoleCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl<W: Write> ConsoleCanvas<W> {
    pub fn with_writer(out: W) -> Self {
        Self {
            document: CanvasDocument::new(),
            out,
            presented: 0,
        }
    }

    pub fn document(&self) -> &CanvasDocument {
        &self.document
    }

    pub fn writer(&self) -> &W {
        &self.out
    }

    /// Report canvas changes since the last call.
    pub fn present(&mut self) {
        let count = self.document.items.len();
        if count != self.presented {
            self.presented = count;
            let _ = writeln!(self.out, "[canvas] {} item(s)", count);
        }
    }
}

impl<W: Write> Renderer for ConsoleCanvas<W> {
    fn render_event(&mut self, envelope: &Envelope) {
        self.document.render_event(envelope);
    }

    fn clear_canvas(&mut self) {
        self.document.clear_canvas();
        self.presented = 0;
        let _ = writeln!(self.out, "[canvas] cleared");
    }

    fn show_banner(&mut self, text: &str) {
        if self.document.banner == text {
            return;
        }
        self.document.show_banner(text);
        for line in text.lines() {
            let _ = writeln!(self.out, ">> {}", line);
        }
    }
}
