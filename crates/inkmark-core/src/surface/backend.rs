//! Native drawing resource behind an overlay surface.

use crate::coordinator::PageNumber;
use crate::shapes::Shape;
use kurbo::Size;
use peniko::Color;

/// The platform resource a surface paints into (a canvas element, a GPU
/// texture, ...). Owned by exactly one [`OverlaySurface`](super::OverlaySurface).
pub trait SurfaceBackend {
    /// Resize the drawing area.
    fn resize(&mut self, size: Size);

    /// Repaint all objects, back to front.
    fn repaint(&mut self, objects: &[&Shape]);

    /// Release the underlying resource. Called exactly once.
    fn release(&mut self);
}

/// Creates backends for new surfaces.
pub trait SurfaceFactory {
    fn create(&mut self, page: PageNumber, size: Size) -> Box<dyn SurfaceBackend>;
}

/// Backend that keeps no pixels, only the colors of the last repaint.
/// Used by the viewer CLI and headless hosts.
#[derive(Debug, Clone, Default)]
pub struct HeadlessBackend {
    size: Size,
    repaints: usize,
    painted: Vec<Color>,
}

impl HeadlessBackend {
    pub fn new(size: Size) -> Self {
        Self {
            size,
            repaints: 0,
            painted: Vec::new(),
        }
    }

    pub fn size(&self) -> Size {
        self.size
    }

    pub fn repaints(&self) -> usize {
        self.repaints
    }

    /// Stroke colors of the visible objects, back to front.
    pub fn painted(&self) -> &[Color] {
        &self.painted
    }
}

impl SurfaceBackend for HeadlessBackend {
    fn resize(&mut self, size: Size) {
        self.size = size;
    }

    fn repaint(&mut self, objects: &[&Shape]) {
        self.repaints += 1;
        self.painted = objects
            .iter()
            .map(|shape| shape.style())
            .filter(|style| !style.is_hidden())
            .map(|style| style.stroke_color())
            .collect();
    }

    fn release(&mut self) {
        log::trace!("Released headless surface {}x{}", self.size.width, self.size.height);
    }
}

/// Factory for [`HeadlessBackend`] surfaces.
#[derive(Debug, Clone, Copy, Default)]
pub struct HeadlessFactory;

impl SurfaceFactory for HeadlessFactory {
    fn create(&mut self, _page: PageNumber, size: Size) -> Box<dyn SurfaceBackend> {
        Box::new(HeadlessBackend::new(size))
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use crate::color::Rgba;
    use crate::shapes::{Freehand, ShapeStyle};
    use kurbo::Point;

    fn stroke(style: ShapeStyle) -> Shape {
        Shape::Freehand(Freehand::from_points(
            vec![Point::new(0.0, 0.0), Point::new(10.0, 10.0)],
            style,
        ))
    }

    #[test]
    fn test_headless_paints_visible_colors() {
        let red = stroke(ShapeStyle::new(Rgba::new(255, 0, 0, 0.5), 15.0));
        let mut hidden_style = ShapeStyle::default();
        hidden_style.visible = false;
        let hidden = stroke(hidden_style);

        let mut backend = HeadlessBackend::new(Size::new(800.0, 1100.0));
        backend.repaint(&[&red, &hidden]);

        assert_eq!(backend.repaints(), 1);
        let painted: Vec<_> = backend.painted().iter().map(|c| c.to_rgba8()).collect();
        assert_eq!(painted.len(), 1);
        assert_eq!((painted[0].r, painted[0].a), (255, 128));

        backend.repaint(&[]);
        assert!(backend.painted().is_empty());
    }
}
