//! Tool system for the marking editor.

use crate::color::{self, Rgba};
use crate::config::EditorConfig;
use crate::shapes::{BrushKind, Freehand, ShapeStyle};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Pointer movements shorter than this do not add a stroke point.
const MIN_POINT_DISTANCE: f64 = 1.0;

/// Available tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum ToolKind {
    #[default]
    Pen,
    Highlighter,
    Eraser,
    Textbox,
    Select,
}

impl ToolKind {
    /// Tools whose input is handled by the freehand brush.
    pub fn is_free_draw(self) -> bool {
        matches!(self, ToolKind::Pen | ToolKind::Highlighter)
    }

    pub fn name(self) -> &'static str {
        match self {
            ToolKind::Pen => "pen",
            ToolKind::Highlighter => "highlighter",
            ToolKind::Eraser => "eraser",
            ToolKind::Textbox => "textbox",
            ToolKind::Select => "select",
        }
    }

    pub fn all() -> &'static [ToolKind] {
        &[
            ToolKind::Pen,
            ToolKind::Highlighter,
            ToolKind::Eraser,
            ToolKind::Textbox,
            ToolKind::Select,
        ]
    }
}

impl std::str::FromStr for ToolKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        ToolKind::all()
            .iter()
            .copied()
            .find(|tool| tool.name().eq_ignore_ascii_case(s.trim()))
            .ok_or_else(|| format!("unknown tool: {s}"))
    }
}

/// Freehand brush parameters applied to a surface in draw mode.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Brush {
    pub kind: BrushKind,
    pub color: Rgba,
    pub width: f64,
}

impl Brush {
    pub fn style(&self) -> ShapeStyle {
        ShapeStyle::new(self.color, self.width)
    }
}

/// Style for text boxes inserted by the textbox tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TextStyle {
    pub color: Rgba,
    pub font_size: f64,
}

/// What a surface does with pointer input for the active tool.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PointerBehavior {
    /// The freehand brush draws strokes.
    FreeDraw(Brush),
    /// Pointer-down inserts a text box, or edits the text under the pointer.
    InsertText(TextStyle),
    /// Pointer-down removes the object under the pointer.
    Erase,
    /// Pointer-down selects; dragging moves the selection.
    Select,
}

impl PointerBehavior {
    pub fn is_free_draw(&self) -> bool {
        matches!(self, PointerBehavior::FreeDraw(_))
    }
}

/// User-chosen tool parameters, shared by every page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolSettings {
    pub tool: ToolKind,
    /// Hex color as entered in the color picker.
    pub color: String,
    pub brush_size: u32,
}

impl Default for ToolSettings {
    fn default() -> Self {
        Self {
            tool: ToolKind::Pen,
            color: "#000000".to_string(),
            brush_size: 5,
        }
    }
}

impl ToolSettings {
    /// Opaque color for pen strokes and text. Malformed input falls back to black.
    pub fn solid_color(&self) -> Rgba {
        color::parse_hex(&self.color).unwrap_or_else(|| {
            log::warn!("Invalid color {:?}, using black", self.color);
            Rgba::black()
        })
    }

    /// Brush for free-draw tools, `None` otherwise.
    pub fn brush(&self, config: &EditorConfig) -> Option<Brush> {
        let size = f64::from(self.brush_size.max(1));
        match self.tool {
            ToolKind::Pen => Some(Brush {
                kind: BrushKind::Pen,
                color: self.solid_color(),
                width: size,
            }),
            ToolKind::Highlighter => Some(Brush {
                kind: BrushKind::Highlighter,
                color: color::highlighter_color(&self.color, config.highlighter.alpha),
                width: size * config.highlighter.width_factor,
            }),
            ToolKind::Eraser | ToolKind::Textbox | ToolKind::Select => None,
        }
    }

    /// Pointer handler table for the active tool.
    pub fn pointer_behavior(&self, config: &EditorConfig) -> PointerBehavior {
        match self.tool {
            ToolKind::Pen | ToolKind::Highlighter => match self.brush(config) {
                Some(brush) => PointerBehavior::FreeDraw(brush),
                None => PointerBehavior::Select,
            },
            ToolKind::Textbox => PointerBehavior::InsertText(TextStyle {
                color: self.solid_color(),
                font_size: config.text.font_size,
            }),
            ToolKind::Eraser => PointerBehavior::Erase,
            ToolKind::Select => PointerBehavior::Select,
        }
    }
}

/// Result of pressing a tool button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolTransition {
    /// The active tool changed.
    Changed { from: ToolKind, to: ToolKind },
    /// The tool was already active; nothing happens.
    Unchanged,
    /// Eraser pressed while armed: delete the current selection.
    DeleteSelection,
}

/// Tool state machine for one editor instance.
#[derive(Debug, Clone, Default)]
pub struct ToolManager {
    settings: ToolSettings,
}

impl ToolManager {
    pub fn new(settings: ToolSettings) -> Self {
        let mut manager = Self { settings };
        manager.settings.brush_size = manager.settings.brush_size.max(1);
        manager
    }

    pub fn from_config(config: &EditorConfig) -> Self {
        Self::new(ToolSettings {
            tool: config.tools.tool,
            color: config.tools.color.clone(),
            brush_size: config.tools.brush_size,
        })
    }

    pub fn current_tool(&self) -> ToolKind {
        self.settings.tool
    }

    pub fn settings(&self) -> &ToolSettings {
        &self.settings
    }

    /// Press a tool button.
    pub fn select(&mut self, tool: ToolKind) -> ToolTransition {
        let from = self.settings.tool;
        if from == tool {
            return match tool {
                ToolKind::Eraser => ToolTransition::DeleteSelection,
                _ => ToolTransition::Unchanged,
            };
        }
        self.settings.tool = tool;
        ToolTransition::Changed { from, to: tool }
    }

    pub fn set_color(&mut self, color: &str) {
        self.settings.color = color.trim().to_string();
    }

    /// Set the brush size; values below 1 are clamped.
    pub fn set_brush_size(&mut self, size: u32) {
        self.settings.brush_size = size.max(1);
    }
}

/// Accumulates pointer positions for a freehand stroke.
#[derive(Debug, Clone)]
pub struct StrokeBuilder {
    brush: Brush,
    points: Vec<Point>,
}

impl StrokeBuilder {
    pub fn begin(brush: Brush, point: Point) -> Self {
        Self {
            brush,
            points: vec![point],
        }
    }

    pub fn extend(&mut self, point: Point) {
        if let Some(last) = self.points.last() {
            if last.distance(point) < MIN_POINT_DISTANCE {
                return;
            }
        }
        self.points.push(point);
    }

    pub fn points(&self) -> &[Point] {
        &self.points
    }

    /// Finish the stroke, simplifying it when `tolerance > 0`.
    pub fn finish(self, tolerance: f64) -> Freehand {
        let mut freehand =
            Freehand::from_points(self.points, self.brush.style()).with_brush(self.brush.kind);
        freehand.simplify(tolerance);
        freehand
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let tm = ToolManager::default();
        assert_eq!(tm.current_tool(), ToolKind::Pen);
        assert_eq!(tm.settings().color, "#000000");
        assert_eq!(tm.settings().brush_size, 5);
    }

    #[test]
    fn test_tool_selection() {
        let mut tm = ToolManager::default();
        assert_eq!(
            tm.select(ToolKind::Textbox),
            ToolTransition::Changed { from: ToolKind::Pen, to: ToolKind::Textbox }
        );
        assert_eq!(tm.current_tool(), ToolKind::Textbox);
        assert_eq!(tm.select(ToolKind::Textbox), ToolTransition::Unchanged);
    }

    #[test]
    fn test_eraser_arms_then_deletes() {
        let mut tm = ToolManager::default();
        assert!(matches!(tm.select(ToolKind::Eraser), ToolTransition::Changed { .. }));
        assert_eq!(tm.select(ToolKind::Eraser), ToolTransition::DeleteSelection);
        assert_eq!(tm.current_tool(), ToolKind::Eraser);
    }

    #[test]
    fn test_brush_size_clamped() {
        let mut tm = ToolManager::default();
        tm.set_brush_size(0);
        assert_eq!(tm.settings().brush_size, 1);
    }

    #[test]
    fn test_highlighter_brush_derivation() {
        let settings = ToolSettings {
            tool: ToolKind::Highlighter,
            color: "#FF0000".to_string(),
            brush_size: 5,
        };
        let brush = settings.brush(&EditorConfig::default()).unwrap();
        assert_eq!(brush.kind, BrushKind::Highlighter);
        assert!((brush.width - 15.0).abs() < f64::EPSILON);
        assert_eq!(brush.color.to_css(), "rgba(255,0,0,0.3)");
    }

    #[test]
    fn test_pen_brush_uses_size() {
        let settings = ToolSettings {
            color: "#00ff00".to_string(),
            brush_size: 7,
            ..Default::default()
        };
        let brush = settings.brush(&EditorConfig::default()).unwrap();
        assert!((brush.width - 7.0).abs() < f64::EPSILON);
        assert_eq!(brush.color, Rgba::opaque(0, 255, 0));
    }

    #[test]
    fn test_handler_table() {
        let config = EditorConfig::default();
        let with = |tool| ToolSettings { tool, ..Default::default() }.pointer_behavior(&config);

        assert!(with(ToolKind::Pen).is_free_draw());
        assert!(with(ToolKind::Highlighter).is_free_draw());
        assert_eq!(with(ToolKind::Eraser), PointerBehavior::Erase);
        assert_eq!(with(ToolKind::Select), PointerBehavior::Select);
        assert!(matches!(with(ToolKind::Textbox), PointerBehavior::InsertText(_)));
    }

    #[test]
    fn test_tool_from_str() {
        assert_eq!("Highlighter".parse::<ToolKind>(), Ok(ToolKind::Highlighter));
        assert!("laser".parse::<ToolKind>().is_err());
    }

    #[test]
    fn test_stroke_builder_skips_jitter() {
        let brush = ToolSettings::default().brush(&EditorConfig::default()).unwrap();
        let mut builder = StrokeBuilder::begin(brush, Point::new(0.0, 0.0));
        builder.extend(Point::new(0.2, 0.2));
        builder.extend(Point::new(10.0, 0.0));
        assert_eq!(builder.points().len(), 2);

        let stroke = builder.finish(0.0);
        assert_eq!(stroke.len(), 2);
        assert_eq!(stroke.brush, BrushKind::Pen);
        assert!((stroke.style.stroke_width - 5.0).abs() < f64::EPSILON);
    }
}
