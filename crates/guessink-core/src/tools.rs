//! Drawer tools: brush, colour and shape modes.
//!
//! Turns pointer input into drawing envelopes. Brushes whose geometry needs
//! brush math (air spray, calligraphy nib) are produced by an external brush
//! engine and handed to the session directly.

use std::fmt;
use std::str::FromStr;

use kurbo::Point;

use crate::protocol::Envelope;

/// Stroke width of the solid brush.
pub const LINE_WIDTH: f64 = 3.0;
/// Stroke width of the eraser.
pub const ERASER_WIDTH: f64 = 20.0;

/// Available brushes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum BrushKind {
    #[default]
    Solid,
    Air,
    Texture,
    Calligraphy,
    Blending,
    Shining,
    Eraser,
}

impl BrushKind {
    pub fn name(&self) -> &'static str {
        match self {
            BrushKind::Solid => "solid",
            BrushKind::Air => "air",
            BrushKind::Texture => "texture",
            BrushKind::Calligraphy => "calligraphy",
            BrushKind::Blending => "blending",
            BrushKind::Shining => "shining",
            BrushKind::Eraser => "eraser",
        }
    }
}

impl fmt::Display for BrushKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for BrushKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "solid" => Ok(BrushKind::Solid),
            "air" => Ok(BrushKind::Air),
            "texture" => Ok(BrushKind::Texture),
            "calligraphy" => Ok(BrushKind::Calligraphy),
            "blending" => Ok(BrushKind::Blending),
            "shining" => Ok(BrushKind::Shining),
            "eraser" => Ok(BrushKind::Eraser),
            other => Err(other.to_string()),
        }
    }
}

/// Current brush settings.
#[derive(Debug, Clone, PartialEq)]
pub struct Brush {
    pub kind: BrushKind,
    pub colour: String,
}

impl Default for Brush {
    fn default() -> Self {
        Self {
            kind: BrushKind::Solid,
            colour: "black".to_string(),
        }
    }
}

/// Shape being sized before it is placed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeMode {
    Square,
    Circle,
}

impl ShapeMode {
    pub fn name(&self) -> &'static str {
        match self {
            ShapeMode::Square => "square",
            ShapeMode::Circle => "circle",
        }
    }
}

/// Manages the drawer's brush, stroke continuity and shape previews.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    pub brush: Brush,
    shape_mode: Option<ShapeMode>,
    /// Previous pointer position of the current stroke.
    last_point: Option<Point>,
    /// Geometry of the last preview sent for the active shape.
    last_preview: Option<Vec<f64>>,
}

impl ToolManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn shape_mode(&self) -> Option<ShapeMode> {
        self.shape_mode
    }

    /// Extend the current stroke to `point`.
    ///
    /// Returns the envelope for the new segment, or `None` if this point only
    /// starts the stroke or the brush is rendered by the external brush engine.
    pub fn stroke_to(&mut self, point: Point) -> Option<Envelope> {
        let previous = self.last_point.replace(point);
        let colour = self.brush.colour.clone();

        match self.brush.kind {
            BrushKind::Solid => previous.map(|p| Envelope::Line {
                coords: vec![p.x, p.y, point.x, point.y],
                colour,
                width: LINE_WIDTH,
            }),
            BrushKind::Eraser => previous.map(|p| Envelope::Eraser {
                coords: vec![p.x, p.y, point.x, point.y],
                width: ERASER_WIDTH,
            }),
            BrushKind::Texture => Some(Envelope::Texture {
                coords: vec![point.x, point.y],
                colour,
            }),
            BrushKind::Blending => Some(Envelope::Blending {
                coords: vec![point.x, point.y],
                colour,
            }),
            BrushKind::Shining => Some(Envelope::Shining {
                center: vec![point.x, point.y],
                colour,
            }),
            BrushKind::Air | BrushKind::Calligraphy => {
                log::debug!("{} strokes come from the brush engine", self.brush.kind);
                None
            }
        }
    }

    /// End the current stroke.
    pub fn lift(&mut self) {
        self.last_point = None;
    }

    /// Enter a shape mode, discarding any unplaced preview.
    pub fn enter_shape_mode(&mut self, mode: ShapeMode) {
        self.shape_mode = Some(mode);
        self.last_preview = None;
        self.last_point = None;
    }

    /// Leave shape mode without placing anything.
    pub fn cancel_shape_mode(&mut self) {
        self.shape_mode = None;
        self.last_preview = None;
    }

    /// Size the active shape between two corners.
    pub fn preview(&mut self, a: Point, b: Point) -> Option<Envelope> {
        let colour = self.brush.colour.clone();
        let envelope = match self.shape_mode? {
            ShapeMode::Square => {
                let corners = vec![a.x, a.y, b.x, a.y, b.x, b.y, a.x, b.y];
                self.last_preview = Some(corners.clone());
                Envelope::SquarePreview { corners, colour }
            }
            ShapeMode::Circle => {
                let bbox = vec![a.x, a.y, b.x, b.y];
                self.last_preview = Some(bbox.clone());
                Envelope::CirclePreview { bbox, colour }
            }
        };
        Some(envelope)
    }

    /// Place the active shape at its last previewed geometry and leave shape
    /// mode. Returns `None` if nothing was previewed.
    pub fn finalize(&mut self) -> Option<Envelope> {
        let mode = self.shape_mode.take()?;
        let geometry = self.last_preview.take()?;
        let colour = self.brush.colour.clone();
        Some(match mode {
            ShapeMode::Square => Envelope::SquareFinalize {
                corners: geometry,
                colour,
            },
            ShapeMode::Circle => Envelope::CircleFinalize {
                bbox: geometry,
                colour,
            },
        })
    }

    /// Drop per-round tool state, keeping the brush.
    pub fn reset(&mut self) {
        self.shape_mode = None;
        self.last_preview = None;
        self.last_point = None;
    }
}
