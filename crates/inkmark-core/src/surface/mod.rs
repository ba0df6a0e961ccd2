//! Overlay surface: the vector drawing layer on top of one page.

mod backend;

#[cfg(test)]
pub(crate) use backend::test_support;
pub use backend::{HeadlessBackend, HeadlessFactory, SurfaceBackend, SurfaceFactory};

use crate::config::EditorConfig;
use crate::coordinator::PageNumber;
use crate::shapes::{Shape, ShapeId, ShapeStyle, Text};
use crate::tools::{PointerBehavior, StrokeBuilder};
use kurbo::{Affine, Point, Size, Vec2};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use std::fmt;

/// Version written into serialized surfaces.
const SNAPSHOT_VERSION: u32 = 1;

#[derive(Serialize)]
struct SnapshotRef<'a> {
    version: u32,
    width: f64,
    height: f64,
    objects: Vec<&'a Shape>,
}

#[derive(Deserialize)]
struct Snapshot {
    #[serde(default)]
    version: u32,
    objects: Vec<Shape>,
}

/// Whether the drawing library handles input itself.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SurfaceMode {
    FreeDraw,
    Selection,
}

/// Custom pointer-down handler attached in selection mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PointerHandler {
    InsertText,
    Erase,
}

/// Per-surface behaviour taken from the editor configuration.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SurfaceOptions {
    pub hit_tolerance: f64,
    pub simplify_tolerance: f64,
    pub read_only: bool,
}

impl SurfaceOptions {
    pub fn from_config(config: &EditorConfig) -> Self {
        Self {
            hit_tolerance: config.hit_tolerance,
            simplify_tolerance: config.simplify_tolerance,
            read_only: false,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }
}

impl Default for SurfaceOptions {
    fn default() -> Self {
        Self::from_config(&EditorConfig::default())
    }
}

/// In-progress pointer gesture.
#[derive(Debug, Clone)]
enum Interaction {
    Idle,
    Drawing(StrokeBuilder),
    Dragging { last: Point, moved: bool },
}

/// One page's annotation layer.
///
/// The surface owns its backend resource; [`dispose`](Self::dispose) releases
/// it and is also run on drop.
pub struct OverlaySurface {
    page: PageNumber,
    size: Size,
    shapes: HashMap<ShapeId, Shape>,
    /// Back to front.
    z_order: Vec<ShapeId>,
    selection: Vec<ShapeId>,
    behavior: PointerBehavior,
    interaction: Interaction,
    editing: Option<ShapeId>,
    options: SurfaceOptions,
    backend: Option<Box<dyn SurfaceBackend>>,
}

impl fmt::Debug for OverlaySurface {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("OverlaySurface")
            .field("page", &self.page)
            .field("size", &self.size)
            .field("objects", &self.z_order.len())
            .field("selection", &self.selection)
            .field("behavior", &self.behavior)
            .field("editing", &self.editing)
            .field("disposed", &self.backend.is_none())
            .finish()
    }
}

impl OverlaySurface {
    pub fn new(
        page: PageNumber,
        size: Size,
        backend: Box<dyn SurfaceBackend>,
        options: SurfaceOptions,
    ) -> Self {
        Self {
            page,
            size,
            shapes: HashMap::new(),
            z_order: Vec::new(),
            selection: Vec::new(),
            behavior: PointerBehavior::Select,
            interaction: Interaction::Idle,
            editing: None,
            options,
            backend: Some(backend),
        }
    }

    pub fn page(&self) -> PageNumber {
        self.page
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn is_read_only(&self) -> bool {
        self.options.read_only
    }

    pub fn is_disposed(&self) -> bool {
        self.backend.is_none()
    }

    pub fn mode(&self) -> SurfaceMode {
        if self.behavior.is_free_draw() {
            SurfaceMode::FreeDraw
        } else {
            SurfaceMode::Selection
        }
    }

    pub fn pointer_handler(&self) -> Option<PointerHandler> {
        match self.behavior {
            PointerBehavior::InsertText(_) => Some(PointerHandler::InsertText),
            PointerBehavior::Erase => Some(PointerHandler::Erase),
            PointerBehavior::FreeDraw(_) | PointerBehavior::Select => None,
        }
    }

    pub fn behavior(&self) -> &PointerBehavior {
        &self.behavior
    }

    /// Switch the active tool. Replaces any previous handler; an unfinished
    /// stroke is dropped and text editing ends.
    pub fn apply_behavior(&mut self, behavior: PointerBehavior) {
        if self.options.read_only {
            return;
        }
        self.interaction = Interaction::Idle;
        if self.finish_editing() {
            self.repaint();
        }
        self.behavior = behavior;
    }

    /// Resize in place. Objects are kept.
    pub fn resize(&mut self, size: Size) -> bool {
        if self.size == size {
            return false;
        }
        log::debug!(
            "Resizing page {} overlay to {}x{}",
            self.page,
            size.width,
            size.height
        );
        self.size = size;
        if let Some(backend) = self.backend.as_mut() {
            backend.resize(size);
        }
        self.repaint();
        true
    }

    /// Repaint every object on the backend.
    pub fn repaint(&mut self) {
        let objects: Vec<&Shape> = self
            .z_order
            .iter()
            .filter_map(|id| self.shapes.get(id))
            .collect();
        if let Some(backend) = self.backend.as_mut() {
            backend.repaint(&objects);
        }
    }

    /// Release the backend resource. Safe to call more than once.
    pub fn dispose(&mut self) {
        if let Some(mut backend) = self.backend.take() {
            backend.release();
            log::debug!("Disposed overlay for page {}", self.page);
        }
        self.interaction = Interaction::Idle;
        self.editing = None;
    }

    // --- objects ---

    /// Add a shape on top of the others.
    pub fn add(&mut self, mut shape: Shape) -> ShapeId {
        if self.shapes.contains_key(&shape.id()) {
            shape.regenerate_id();
        }
        let id = shape.id();
        self.z_order.push(id);
        self.shapes.insert(id, shape);
        id
    }

    pub fn remove(&mut self, id: ShapeId) -> Option<Shape> {
        self.z_order.retain(|&shape_id| shape_id != id);
        self.selection.retain(|&shape_id| shape_id != id);
        if self.editing == Some(id) {
            self.editing = None;
        }
        self.shapes.remove(&id)
    }

    pub fn get(&self, id: ShapeId) -> Option<&Shape> {
        self.shapes.get(&id)
    }

    /// Objects back to front.
    pub fn objects(&self) -> impl Iterator<Item = &Shape> {
        self.z_order.iter().filter_map(|id| self.shapes.get(id))
    }

    pub fn len(&self) -> usize {
        self.shapes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.shapes.is_empty()
    }

    /// Topmost object under a point.
    pub fn object_at(&self, point: Point) -> Option<ShapeId> {
        self.z_order.iter().rev().copied().find(|id| {
            self.shapes
                .get(id)
                .is_some_and(|s| s.hit_test(point, self.options.hit_tolerance))
        })
    }

    fn text_at(&self, point: Point) -> Option<ShapeId> {
        self.z_order.iter().rev().copied().find(|id| {
            self.shapes
                .get(id)
                .is_some_and(|s| s.as_text().is_some() && s.hit_test(point, self.options.hit_tolerance))
        })
    }

    // --- selection ---

    pub fn selection(&self) -> &[ShapeId] {
        &self.selection
    }

    pub fn has_selection(&self) -> bool {
        !self.selection.is_empty()
    }

    pub fn is_selected(&self, id: ShapeId) -> bool {
        self.selection.contains(&id)
    }

    /// Select a shape. Without `additive` the previous selection is replaced.
    pub fn select(&mut self, id: ShapeId, additive: bool) {
        if !self.shapes.contains_key(&id) {
            return;
        }
        if !additive {
            self.selection.clear();
        }
        if !self.selection.contains(&id) {
            self.selection.push(id);
        }
    }

    pub fn clear_selection(&mut self) {
        self.selection.clear();
    }

    /// Remove every selected object. Returns the removed shapes.
    pub fn delete_selection(&mut self) -> Vec<Shape> {
        let ids = std::mem::take(&mut self.selection);
        let removed: Vec<Shape> = ids.into_iter().filter_map(|id| self.remove(id)).collect();
        if !removed.is_empty() {
            self.repaint();
        }
        removed
    }

    // --- pointer input ---

    /// Pointer pressed. Returns true if annotation content changed.
    pub fn pointer_down(&mut self, point: Point, additive: bool) -> bool {
        if self.options.read_only || self.is_disposed() {
            return false;
        }
        match self.behavior {
            PointerBehavior::FreeDraw(brush) => {
                self.interaction = Interaction::Drawing(StrokeBuilder::begin(brush, point));
                false
            }
            PointerBehavior::InsertText(style) => {
                let mut changed = self.finish_editing();
                if let Some(id) = self.text_at(point) {
                    self.begin_editing(id);
                } else {
                    let text = Text::new(point, String::new())
                        .with_font_size(style.font_size)
                        .with_style(ShapeStyle::new(style.color, 1.0));
                    let id = self.add(Shape::Text(text));
                    self.begin_editing(id);
                    changed = true;
                }
                self.repaint();
                changed
            }
            PointerBehavior::Erase => match self.object_at(point) {
                Some(id) => {
                    self.remove(id);
                    log::debug!("Erased object {} on page {}", id, self.page);
                    self.repaint();
                    true
                }
                None => false,
            },
            PointerBehavior::Select => {
                match self.object_at(point) {
                    Some(id) => {
                        if additive || !self.is_selected(id) {
                            self.select(id, additive);
                        }
                        self.interaction = Interaction::Dragging {
                            last: point,
                            moved: false,
                        };
                    }
                    None if !additive => self.clear_selection(),
                    None => {}
                }
                false
            }
        }
    }

    /// Pointer moved. Returns true if annotation content changed.
    pub fn pointer_move(&mut self, point: Point) -> bool {
        let delta = match &mut self.interaction {
            Interaction::Idle => return false,
            Interaction::Drawing(builder) => {
                builder.extend(point);
                return false;
            }
            Interaction::Dragging { last, moved } => {
                let delta = point - *last;
                if delta.hypot2() < f64::EPSILON {
                    return false;
                }
                *last = point;
                *moved = true;
                delta
            }
        };
        self.translate_selection(delta);
        true
    }

    /// Pointer released. Returns true if annotation content changed.
    pub fn pointer_up(&mut self, point: Point) -> bool {
        match std::mem::replace(&mut self.interaction, Interaction::Idle) {
            Interaction::Idle => false,
            Interaction::Drawing(mut builder) => {
                builder.extend(point);
                let stroke = builder.finish(self.options.simplify_tolerance);
                self.add(Shape::Freehand(stroke));
                self.repaint();
                true
            }
            Interaction::Dragging { last, moved } => {
                let delta = point - last;
                if delta.hypot2() < f64::EPSILON {
                    return moved;
                }
                self.translate_selection(delta);
                true
            }
        }
    }

    fn translate_selection(&mut self, delta: Vec2) {
        let translate = Affine::translate(delta);
        for id in &self.selection {
            if let Some(shape) = self.shapes.get_mut(id) {
                shape.transform(translate);
            }
        }
        self.repaint();
    }

    // --- text editing ---

    /// Text object currently in edit mode.
    pub fn editing(&self) -> Option<ShapeId> {
        self.editing
    }

    /// Enter edit mode on a text object. Returns false for anything else.
    pub fn begin_editing(&mut self, id: ShapeId) -> bool {
        if self.shapes.get(&id).and_then(Shape::as_text).is_none() {
            return false;
        }
        self.editing = Some(id);
        self.select(id, false);
        true
    }

    /// Append typed text to the edited text object.
    pub fn type_text(&mut self, input: &str) -> bool {
        if self.options.read_only || input.is_empty() {
            return false;
        }
        let Some(text) = self.editing_text_mut() else {
            return false;
        };
        text.push_str(input);
        self.repaint();
        true
    }

    /// Delete the last character of the edited text object.
    pub fn backspace(&mut self) -> bool {
        let changed = self.editing_text_mut().is_some_and(|text| text.pop_char());
        if changed {
            self.repaint();
        }
        changed
    }

    /// Leave edit mode. An empty text object is removed; returns true then.
    pub fn finish_editing(&mut self) -> bool {
        let Some(id) = self.editing.take() else {
            return false;
        };
        let is_empty = self
            .shapes
            .get(&id)
            .and_then(Shape::as_text)
            .is_some_and(|t| t.content().trim().is_empty());
        if is_empty {
            self.remove(id);
        }
        is_empty
    }

    fn editing_text_mut(&mut self) -> Option<&mut Text> {
        let id = self.editing?;
        self.shapes.get_mut(&id).and_then(Shape::as_text_mut)
    }

    // --- serialization ---

    /// Serialize all objects. Transient state (selection, unfinished strokes,
    /// edit mode) is not included.
    pub fn serialize(&self) -> Result<Value, serde_json::Error> {
        serde_json::to_value(SnapshotRef {
            version: SNAPSHOT_VERSION,
            width: self.size.width,
            height: self.size.height,
            objects: self.objects().collect(),
        })
    }

    /// Replace all objects with a serialized surface. Hidden or fully
    /// transparent objects are made visible before the repaint.
    pub fn load(&mut self, blob: &Value) -> Result<usize, serde_json::Error> {
        let snapshot = Snapshot::deserialize(blob)?;
        if snapshot.version > SNAPSHOT_VERSION {
            log::warn!(
                "Page {} annotations use format version {}, newer than {}",
                self.page,
                snapshot.version,
                SNAPSHOT_VERSION
            );
        }

        self.interaction = Interaction::Idle;
        self.editing = None;
        self.selection.clear();
        self.shapes.clear();
        self.z_order.clear();

        let mut revealed = 0;
        for mut shape in snapshot.objects {
            if shape.style().is_hidden() {
                shape.style_mut().reveal();
                revealed += 1;
            }
            self.add(shape);
        }
        if revealed > 0 {
            log::debug!("Made {} hidden objects visible on page {}", revealed, self.page);
        }

        self.repaint();
        Ok(self.len())
    }
}

impl Drop for OverlaySurface {
    fn drop(&mut self) {
        self.dispose();
    }
}

#[cfg(test)]
mod tests {
    use super::test_support::RecordingFactory;
    use super::*;
    use crate::shapes::{BrushKind, Freehand};
    use crate::tools::{ToolKind, ToolSettings};

    fn surface_with(factory: &mut RecordingFactory) -> OverlaySurface {
        let size = Size::new(800.0, 1100.0);
        OverlaySurface::new(1, size, factory.create(1, size), SurfaceOptions::default())
    }

    fn behavior(tool: ToolKind) -> PointerBehavior {
        ToolSettings { tool, ..Default::default() }.pointer_behavior(&EditorConfig::default())
    }

    fn draw_line(surface: &mut OverlaySurface, from: Point, to: Point) {
        surface.pointer_down(from, false);
        surface.pointer_move(from.lerp(to, 0.5));
        surface.pointer_up(to);
    }

    #[test]
    fn test_pen_stroke() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        surface.apply_behavior(behavior(ToolKind::Pen));
        assert_eq!(surface.mode(), SurfaceMode::FreeDraw);
        assert_eq!(surface.pointer_handler(), None);

        draw_line(&mut surface, Point::new(10.0, 10.0), Point::new(100.0, 10.0));

        assert_eq!(surface.len(), 1);
        let stroke = surface.objects().next().and_then(Shape::as_freehand).unwrap();
        assert_eq!(stroke.brush, BrushKind::Pen);
        assert_eq!(stroke.len(), 3);
    }

    #[test]
    fn test_textbox_inserts_and_edits() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        surface.apply_behavior(behavior(ToolKind::Textbox));
        assert_eq!(surface.mode(), SurfaceMode::Selection);
        assert_eq!(surface.pointer_handler(), Some(PointerHandler::InsertText));

        assert!(surface.pointer_down(Point::new(50.0, 50.0), false));
        let id = surface.editing().unwrap();
        surface.type_text("Hello");
        surface.finish_editing();

        // Clicking an existing text edits it instead of inserting another
        let inside = surface.get(id).unwrap().bounds().center();
        surface.pointer_down(inside, false);
        assert_eq!(surface.editing(), Some(id));
        assert_eq!(surface.len(), 1);
        surface.type_text(" world");
        assert_eq!(surface.get(id).and_then(Shape::as_text).unwrap().content(), "Hello world");
    }

    #[test]
    fn test_empty_text_removed_on_finish() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        surface.apply_behavior(behavior(ToolKind::Textbox));

        surface.pointer_down(Point::new(50.0, 50.0), false);
        assert_eq!(surface.len(), 1);
        surface.pointer_down(Point::new(400.0, 400.0), false);
        // First box was empty and is gone, second one is being edited
        assert_eq!(surface.len(), 1);
        surface.apply_behavior(behavior(ToolKind::Pen));
        assert!(surface.is_empty());
    }

    #[test]
    fn test_eraser_removes_object_under_pointer() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        surface.apply_behavior(behavior(ToolKind::Pen));
        draw_line(&mut surface, Point::new(10.0, 10.0), Point::new(100.0, 10.0));
        draw_line(&mut surface, Point::new(10.0, 300.0), Point::new(100.0, 300.0));

        surface.apply_behavior(behavior(ToolKind::Eraser));
        assert_eq!(surface.pointer_handler(), Some(PointerHandler::Erase));
        assert!(!surface.pointer_down(Point::new(500.0, 500.0), false));
        assert!(surface.pointer_down(Point::new(50.0, 10.0), false));
        assert_eq!(surface.len(), 1);
    }

    #[test]
    fn test_select_and_drag() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        surface.apply_behavior(behavior(ToolKind::Pen));
        draw_line(&mut surface, Point::new(10.0, 10.0), Point::new(100.0, 10.0));

        surface.apply_behavior(behavior(ToolKind::Select));
        surface.pointer_down(Point::new(50.0, 10.0), false);
        assert!(surface.has_selection());
        surface.pointer_move(Point::new(50.0, 30.0));
        assert!(surface.pointer_up(Point::new(50.0, 40.0)));

        let stroke = surface.objects().next().and_then(Shape::as_freehand).unwrap();
        assert_eq!(stroke.points[0], Point::new(10.0, 40.0));

        // Clicking empty space clears the selection
        surface.pointer_down(Point::new(600.0, 600.0), false);
        assert!(!surface.has_selection());
    }

    #[test]
    fn test_delete_multi_selection() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        let a = surface.add(Shape::Text(Text::new(Point::new(0.0, 0.0), "a".into())));
        let b = surface.add(Shape::Text(Text::new(Point::new(0.0, 100.0), "b".into())));
        let c = surface.add(Shape::Text(Text::new(Point::new(0.0, 200.0), "c".into())));

        surface.select(a, false);
        surface.select(c, true);
        let removed = surface.delete_selection();

        assert_eq!(removed.len(), 2);
        assert_eq!(surface.len(), 1);
        assert!(surface.get(b).is_some());
        assert!(!surface.has_selection());
    }

    #[test]
    fn test_resize_preserves_objects() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        surface.add(Shape::Text(Text::new(Point::new(5.0, 5.0), "kept".into())));

        assert!(surface.resize(Size::new(1600.0, 2200.0)));
        assert_eq!(surface.size(), Size::new(1600.0, 2200.0));
        assert_eq!(surface.len(), 1);
        assert!(!surface.resize(Size::new(1600.0, 2200.0)));
        assert_eq!(factory.log.borrow().resized.len(), 1);
    }

    #[test]
    fn test_load_reveals_hidden_objects() {
        let mut factory = RecordingFactory::default();
        let mut source = surface_with(&mut factory);
        let mut style = ShapeStyle::default();
        style.visible = false;
        source.add(Shape::Freehand(Freehand::from_points(
            vec![Point::new(1.0, 1.0), Point::new(2.0, 2.0)],
            style,
        )));
        let mut faded = ShapeStyle::default();
        faded.opacity = 0.0;
        source.add(Shape::Text(Text::new(Point::ZERO, "x".into()).with_style(faded)));
        let blob = source.serialize().unwrap();

        let mut target = surface_with(&mut factory);
        assert_eq!(target.load(&blob).unwrap(), 2);
        assert!(target.objects().all(|s| !s.style().is_hidden()));
        assert_eq!(factory.log.borrow().hidden_at_repaint, 0);
    }

    #[test]
    fn test_load_makes_transparent_strokes_opaque() {
        let mut factory = RecordingFactory::default();
        let blob = serde_json::json!({
            "version": 1,
            "objects": [Shape::Freehand(Freehand::from_points(
                vec![Point::new(1.0, 1.0), Point::new(40.0, 2.0)],
                ShapeStyle::new(crate::color::Rgba::new(200, 0, 0, 0.0), 3.0),
            ))],
        });

        let mut surface = surface_with(&mut factory);
        assert_eq!(surface.load(&blob).unwrap(), 1);
        let style = surface.objects().next().unwrap().style();
        assert!((style.stroke.a - 1.0).abs() < f64::EPSILON);
        assert_eq!(style.stroke.r, 200);
        assert_eq!(factory.log.borrow().hidden_at_repaint, 0);
    }

    #[test]
    fn test_load_rejects_garbage() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        surface.add(Shape::Text(Text::new(Point::ZERO, "x".into())));
        assert!(surface.load(&serde_json::json!({"objects": 42})).is_err());
        assert_eq!(surface.len(), 1);
    }

    #[test]
    fn test_serialize_does_not_include_selection() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        let id = surface.add(Shape::Text(Text::new(Point::ZERO, "x".into())));
        surface.select(id, false);
        let blob = surface.serialize().unwrap();
        assert!(surface.is_selected(id));
        assert_eq!(blob["objects"].as_array().map(Vec::len), Some(1));
        assert!(blob.get("selection").is_none());
    }

    #[test]
    fn test_dispose_releases_once() {
        let mut factory = RecordingFactory::default();
        let mut surface = surface_with(&mut factory);
        surface.dispose();
        surface.dispose();
        drop(surface);
        assert_eq!(factory.log.borrow().released, vec![1]);
    }

    #[test]
    fn test_drop_releases_backend() {
        let mut factory = RecordingFactory::default();
        drop(surface_with(&mut factory));
        assert_eq!(factory.log.borrow().released, vec![1]);
    }

    #[test]
    fn test_read_only_ignores_input() {
        let mut factory = RecordingFactory::default();
        let size = Size::new(100.0, 100.0);
        let mut surface = OverlaySurface::new(
            1,
            size,
            factory.create(1, size),
            SurfaceOptions::default().read_only(),
        );
        surface.apply_behavior(behavior(ToolKind::Pen));
        assert_eq!(surface.mode(), SurfaceMode::Selection);
        assert!(!surface.pointer_down(Point::new(1.0, 1.0), false));
        surface.pointer_up(Point::new(50.0, 50.0));
        assert!(surface.is_empty());
    }
}
