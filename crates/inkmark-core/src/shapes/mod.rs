//! Drawable annotation objects.

mod freehand;
mod text;

pub use freehand::{BrushKind, Freehand};
pub use text::Text;

use crate::color::Rgba;
use kurbo::{Affine, BezPath, Point, Rect};
use peniko::Color;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Unique identifier for shapes.
pub type ShapeId = Uuid;

/// Style properties for shapes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeStyle {
    /// Stroke color. Text is painted with this color.
    pub stroke: Rgba,
    /// Stroke width.
    pub stroke_width: f64,
    /// Overall opacity (0.0 = fully transparent, 1.0 = fully opaque).
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Whether the object is painted at all.
    #[serde(default = "default_visible")]
    pub visible: bool,
}

fn default_opacity() -> f64 {
    1.0
}

fn default_visible() -> bool {
    true
}

impl ShapeStyle {
    pub fn new(stroke: Rgba, stroke_width: f64) -> Self {
        Self {
            stroke,
            stroke_width,
            opacity: 1.0,
            visible: true,
        }
    }

    /// Color a backend paints the stroke with, opacity applied.
    pub fn stroke_color(&self) -> Color {
        self.stroke.with_alpha(self.stroke.a * self.opacity).into()
    }

    /// True when the object would not show up on screen.
    pub fn is_hidden(&self) -> bool {
        !self.visible || self.opacity <= 0.0 || self.stroke.a <= 0.0
    }

    /// Force the object visible and opaque. A translucent stroke keeps its
    /// alpha; only a fully transparent one is made opaque.
    pub fn reveal(&mut self) {
        self.visible = true;
        self.opacity = 1.0;
        if self.stroke.a <= 0.0 {
            self.stroke = self.stroke.with_alpha(1.0);
        }
    }
}

impl Default for ShapeStyle {
    fn default() -> Self {
        Self::new(Rgba::black(), 2.0)
    }
}

/// Distance from a point to a line segment (a→b).
pub fn point_to_segment_dist(point: Point, a: Point, b: Point) -> f64 {
    let seg = kurbo::Vec2::new(b.x - a.x, b.y - a.y);
    let pv = kurbo::Vec2::new(point.x - a.x, point.y - a.y);
    let len_sq = seg.hypot2();
    if len_sq < f64::EPSILON {
        return pv.hypot();
    }
    let t = (pv.dot(seg) / len_sq).clamp(0.0, 1.0);
    let proj = Point::new(a.x + t * seg.x, a.y + t * seg.y);
    ((point.x - proj.x).powi(2) + (point.y - proj.y).powi(2)).sqrt()
}

/// Common trait for all shapes.
pub trait ShapeTrait {
    /// Get the unique identifier.
    fn id(&self) -> ShapeId;

    /// Get the bounding box in page coordinates.
    fn bounds(&self) -> Rect;

    /// Check if a point (in page coordinates) hits this shape.
    fn hit_test(&self, point: Point, tolerance: f64) -> bool;

    /// Get the path representation for rendering.
    fn to_path(&self) -> BezPath;

    /// Get the style.
    fn style(&self) -> &ShapeStyle;

    /// Get mutable style.
    fn style_mut(&mut self) -> &mut ShapeStyle;

    /// Apply a transform to this shape.
    fn transform(&mut self, affine: Affine);
}

/// Enum wrapper for all shape types (for serialization).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Shape {
    Freehand(Freehand),
    Text(Text),
}

impl Shape {
    pub fn id(&self) -> ShapeId {
        match self {
            Shape::Freehand(s) => s.id(),
            Shape::Text(s) => s.id(),
        }
    }

    pub fn bounds(&self) -> Rect {
        match self {
            Shape::Freehand(s) => s.bounds(),
            Shape::Text(s) => s.bounds(),
        }
    }

    pub fn hit_test(&self, point: Point, tolerance: f64) -> bool {
        match self {
            Shape::Freehand(s) => s.hit_test(point, tolerance),
            Shape::Text(s) => s.hit_test(point, tolerance),
        }
    }

    pub fn to_path(&self) -> BezPath {
        match self {
            Shape::Freehand(s) => s.to_path(),
            Shape::Text(s) => s.to_path(),
        }
    }

    pub fn style(&self) -> &ShapeStyle {
        match self {
            Shape::Freehand(s) => s.style(),
            Shape::Text(s) => s.style(),
        }
    }

    pub fn style_mut(&mut self) -> &mut ShapeStyle {
        match self {
            Shape::Freehand(s) => s.style_mut(),
            Shape::Text(s) => s.style_mut(),
        }
    }

    pub fn transform(&mut self, affine: Affine) {
        match self {
            Shape::Freehand(s) => s.transform(affine),
            Shape::Text(s) => s.transform(affine),
        }
    }

    /// Give the shape a fresh unique identifier.
    pub fn regenerate_id(&mut self) {
        let new_id = Uuid::new_v4();
        match self {
            Shape::Freehand(s) => s.id = new_id,
            Shape::Text(s) => s.id = new_id,
        }
    }

    /// Short type name used in summaries and logs.
    pub fn kind_name(&self) -> &'static str {
        match self {
            Shape::Freehand(f) => match f.brush {
                BrushKind::Pen => "stroke",
                BrushKind::Highlighter => "highlight",
            },
            Shape::Text(_) => "text",
        }
    }

    pub fn as_text(&self) -> Option<&Text> {
        match self {
            Shape::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_text_mut(&mut self) -> Option<&mut Text> {
        match self {
            Shape::Text(t) => Some(t),
            _ => None,
        }
    }

    pub fn as_freehand(&self) -> Option<&Freehand> {
        match self {
            Shape::Freehand(f) => Some(f),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_segment_distance() {
        let d = point_to_segment_dist(Point::new(5.0, 3.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 3.0).abs() < 1e-9);

        let d = point_to_segment_dist(Point::new(-4.0, 3.0), Point::ZERO, Point::new(10.0, 0.0));
        assert!((d - 5.0).abs() < 1e-9);
    }

    #[test]
    fn test_hidden_style_reveal() {
        let mut style = ShapeStyle::default();
        assert!(!style.is_hidden());

        style.opacity = 0.0;
        assert!(style.is_hidden());
        style.reveal();
        assert!(!style.is_hidden());

        style.visible = false;
        assert!(style.is_hidden());
        style.reveal();
        assert!(style.visible);
    }

    #[test]
    fn test_stroke_color_applies_opacity() {
        let mut style = ShapeStyle::new(Rgba::opaque(200, 100, 50), 2.0);
        style.opacity = 0.5;
        let rgba = style.stroke_color().to_rgba8();
        assert_eq!((rgba.r, rgba.g, rgba.b, rgba.a), (200, 100, 50, 128));
    }

    #[test]
    fn test_transparent_stroke_reveal() {
        let mut style = ShapeStyle::new(Rgba::new(10, 20, 30, 0.0), 2.0);
        assert!(style.is_hidden());
        style.reveal();
        assert!(!style.is_hidden());
        assert_eq!(style.stroke, Rgba::opaque(10, 20, 30));

        let mut highlight = ShapeStyle::new(Rgba::new(255, 255, 0, 0.3), 15.0);
        highlight.visible = false;
        highlight.reveal();
        assert!((highlight.stroke.a - 0.3).abs() < f64::EPSILON);
    }

    #[test]
    fn test_style_defaults_when_missing() {
        let json = r#"{"stroke":{"r":1,"g":2,"b":3,"a":1.0},"stroke_width":4.0}"#;
        let style: ShapeStyle = serde_json::from_str(json).unwrap();
        assert!(style.visible);
        assert!((style.opacity - 1.0).abs() < f64::EPSILON);
    }
}
