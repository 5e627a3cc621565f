//! Canvas document and the rendering collaborator interface.

use std::collections::HashMap;

use kurbo::{BezPath, Circle, Ellipse, Line, Point, Rect};

use crate::protocol::{Envelope, ParticipantId};

/// Radius of a blending brush dab.
const BLEND_RADIUS: f64 = 5.0;

/// Receives canvas updates from the session.
///
/// The session never draws pixels itself; it hands every drawing envelope to
/// a renderer and asks it to clear the surface when a round begins.
pub trait Renderer {
    /// Draw one envelope (drawing kinds and cursors).
    fn render_event(&mut self, envelope: &Envelope);

    /// Remove every drawn item.
    fn clear_canvas(&mut self);

    /// Replace the instruction banner shown to the local participant.
    fn show_banner(&mut self, _text: &str) {}
}

/// One committed item on the canvas.
#[derive(Debug, Clone, PartialEq)]
pub enum CanvasItem {
    /// Solid brush segment.
    Stroke {
        line: Line,
        colour: String,
        width: f64,
    },
    /// Air brush droplet.
    Droplet { ellipse: Ellipse, colour: String },
    /// Texture brush glyph.
    Glyph { at: Point, colour: String },
    /// Calligraphy nib polygon, filled.
    Nib { path: BezPath, colour: String },
    /// Blending brush dab.
    Dab { circle: Circle, colour: String },
    /// Shining brush sparkle.
    Sparkle { center: Point, colour: String },
    /// Eraser segment painted in the background colour.
    Erase { line: Line, width: f64 },
    /// Placed square outline.
    Square { path: BezPath, colour: String },
    /// Placed circle outline.
    Oval { ellipse: Ellipse, colour: String },
}

fn point(coords: &[f64]) -> Option<Point> {
    match coords {
        [x, y] => Some(Point::new(*x, *y)),
        _ => None,
    }
}

fn segment(coords: &[f64]) -> Option<Line> {
    match coords {
        [x1, y1, x2, y2] => Some(Line::new((*x1, *y1), (*x2, *y2))),
        _ => None,
    }
}

fn bbox(coords: &[f64]) -> Option<Rect> {
    match coords {
        [x1, y1, x2, y2] => Some(Rect::new(*x1, *y1, *x2, *y2)),
        _ => None,
    }
}

fn polygon(coords: &[f64]) -> Option<BezPath> {
    if coords.len() < 6 || coords.len() % 2 != 0 {
        return None;
    }
    let mut path = BezPath::new();
    let mut points = coords.chunks_exact(2).map(|c| Point::new(c[0], c[1]));
    path.move_to(points.next()?);
    for p in points {
        path.line_to(p);
    }
    path.close_path();
    Some(path)
}

/// Headless canvas that keeps the geometry of everything rendered.
#[derive(Debug, Clone, Default)]
pub struct CanvasDocument {
    /// Committed items, back to front.
    pub items: Vec<CanvasItem>,
    /// Square being sized by the drawer.
    pub square_preview: Option<BezPath>,
    /// Circle being sized by the drawer.
    pub circle_preview: Option<Ellipse>,
    /// Last known pointer of each remote participant. Survives clears.
    pub cursors: HashMap<ParticipantId, Point>,
    /// Current instruction banner.
    pub banner: String,
    /// Drawing envelopes applied since the last clear, in order.
    applied: Vec<Envelope>,
}

impl CanvasDocument {
    pub fn new() -> Self {
        Self::default()
    }

    /// Drawing envelopes applied since the last clear.
    pub fn applied(&self) -> &[Envelope] {
        &self.applied
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty() && self.square_preview.is_none() && self.circle_preview.is_none()
    }

    /// Number of committed solid strokes.
    pub fn stroke_count(&self) -> usize {
        self.items
            .iter()
            .filter(|i| matches!(i, CanvasItem::Stroke { .. }))
            .count()
    }

    fn item_for(envelope: &Envelope) -> Option<CanvasItem> {
        let item = match envelope {
            Envelope::Line { coords, colour, width } => CanvasItem::Stroke {
                line: segment(coords)?,
                colour: colour.clone(),
                width: *width,
            },
            Envelope::Air { coords, colour } => CanvasItem::Droplet {
                ellipse: Ellipse::from_rect(bbox(coords)?),
                colour: colour.clone(),
            },
            Envelope::Texture { coords, colour } => CanvasItem::Glyph {
                at: point(coords)?,
                colour: colour.clone(),
            },
            Envelope::Calligraphy { polygon: poly, colour } => CanvasItem::Nib {
                path: polygon(poly)?,
                colour: colour.clone(),
            },
            Envelope::Blending { coords, colour } => CanvasItem::Dab {
                circle: Circle::new(point(coords)?, BLEND_RADIUS),
                colour: colour.clone(),
            },
            Envelope::Shining { center, colour } => CanvasItem::Sparkle {
                center: point(center)?,
                colour: colour.clone(),
            },
            Envelope::Eraser { coords, width } => CanvasItem::Erase {
                line: segment(coords)?,
                width: *width,
            },
            Envelope::SquareFinalize { corners, colour } => CanvasItem::Square {
                path: polygon(corners)?,
                colour: colour.clone(),
            },
            Envelope::CircleFinalize { bbox: b, colour } => CanvasItem::Oval {
                ellipse: Ellipse::from_rect(bbox(b)?),
                colour: colour.clone(),
            },
            _ => return None,
        };
        Some(item)
    }
}

impl Renderer for CanvasDocument {
    fn render_event(&mut self, envelope: &Envelope) {
        match envelope {
            Envelope::Cursor { id, coords } => {
                if let Some(p) = point(coords) {
                    self.cursors.insert(id.clone(), p);
                }
                return;
            }
            Envelope::SquarePreview { corners, .. } => match polygon(corners) {
                Some(path) => self.square_preview = Some(path),
                None => {
                    log::warn!("Ignoring square preview with {} coordinates", corners.len());
                    return;
                }
            },
            Envelope::CirclePreview { bbox: b, .. } => match bbox(b) {
                Some(rect) => self.circle_preview = Some(Ellipse::from_rect(rect)),
                None => {
                    log::warn!("Ignoring circle preview with {} coordinates", b.len());
                    return;
                }
            },
            other if other.is_drawing() => match Self::item_for(other) {
                Some(item) => {
                    match other {
                        Envelope::SquareFinalize { .. } => self.square_preview = None,
                        Envelope::CircleFinalize { .. } => self.circle_preview = None,
                        _ => {}
                    }
                    self.items.push(item);
                }
                None => {
                    log::warn!("Ignoring {} with malformed geometry", other.kind());
                    return;
                }
            },
            other => {
                log::debug!("Nothing to render for {}", other.kind());
                return;
            }
        }
        self.applied.push(envelope.clone());
    }

    fn clear_canvas(&mut self) {
        self.items.clear();
        self.square_preview = None;
        self.circle_preview = None;
        self.applied.clear();
    }

    fn show_banner(&mut self, text: &str) {
        self.banner = text.to_string();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn line(coords: [f64; 4]) -> Envelope {
        Envelope::Line {
            coords: coords.to_vec(),
            colour: "black".into(),
            width: 3.0,
        }
    }

    #[test]
    fn test_line_becomes_stroke() {
        let mut canvas = CanvasDocument::new();
        canvas.render_event(&line([0.0, 0.0, 10.0, 10.0]));

        assert_eq!(canvas.stroke_count(), 1);
        match &canvas.items[0] {
            CanvasItem::Stroke { line, width, .. } => {
                assert_eq!(line.p1, Point::new(10.0, 10.0));
                assert_eq!(*width, 3.0);
            }
            other => panic!("Wrong item: {:?}", other),
        }
    }

    #[test]
    fn test_malformed_geometry_is_ignored() {
        let mut canvas = CanvasDocument::new();
        canvas.render_event(&line([0.0, 0.0, 10.0, 10.0]));
        canvas.render_event(&Envelope::Line {
            coords: vec![1.0, 2.0, 3.0],
            colour: "black".into(),
            width: 3.0,
        });
        canvas.render_event(&Envelope::Calligraphy {
            polygon: vec![1.0, 2.0, 3.0, 4.0],
            colour: "black".into(),
        });
        assert_eq!(canvas.items.len(), 1);
        assert_eq!(canvas.applied().len(), 1);
    }

    #[test]
    fn test_square_preview_then_finalize() {
        let mut canvas = CanvasDocument::new();
        let corners = vec![0.0, 0.0, 4.0, 0.0, 4.0, 4.0, 0.0, 4.0];
        canvas.render_event(&Envelope::SquarePreview {
            corners: corners.clone(),
            colour: "red".into(),
        });
        assert!(canvas.square_preview.is_some());
        assert!(canvas.items.is_empty());

        canvas.render_event(&Envelope::SquareFinalize {
            corners,
            colour: "red".into(),
        });
        assert!(canvas.square_preview.is_none());
        assert!(matches!(canvas.items[0], CanvasItem::Square { .. }));
    }

    #[test]
    fn test_circle_finalize_uses_bbox() {
        let mut canvas = CanvasDocument::new();
        canvas.render_event(&Envelope::CircleFinalize {
            bbox: vec![0.0, 0.0, 20.0, 10.0],
            colour: "black".into(),
        });
        match &canvas.items[0] {
            CanvasItem::Oval { ellipse, .. } => {
                assert_eq!(ellipse.center(), Point::new(10.0, 5.0));
            }
            other => panic!("Wrong item: {:?}", other),
        }
    }

    #[test]
    fn test_cursors_survive_clear() {
        let mut canvas = CanvasDocument::new();
        canvas.render_event(&Envelope::Cursor {
            id: "peer".into(),
            coords: vec![5.0, 6.0],
        });
        canvas.render_event(&line([0.0, 0.0, 1.0, 1.0]));
        canvas.clear_canvas();

        assert!(canvas.is_empty());
        assert!(canvas.applied().is_empty());
        assert_eq!(
            canvas.cursors.get(&ParticipantId::from("peer")),
            Some(&Point::new(5.0, 6.0))
        );
    }

    #[test]
    fn test_cursor_not_recorded_as_applied() {
        let mut canvas = CanvasDocument::new();
        canvas.render_event(&Envelope::Cursor {
            id: "peer".into(),
            coords: vec![5.0, 6.0],
        });
        canvas.render_event(&Envelope::Shining {
            center: vec![1.0, 1.0],
            colour: "gold".into(),
        });
        assert_eq!(canvas.applied().len(), 1);
        assert_eq!(canvas.applied()[0].kind(), "shining");
    }
}
