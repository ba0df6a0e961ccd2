//! Overlay surfaces keyed by page number.

use crate::config::EditorConfig;
use crate::coordinator::PageNumber;
use crate::surface::{OverlaySurface, SurfaceFactory, SurfaceOptions};
use crate::tools::{PointerBehavior, ToolSettings};
use kurbo::Size;
use std::collections::BTreeMap;

/// What [`OverlayRegistry::ensure_surface`] did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EnsureOutcome {
    Created,
    Resized,
    Unchanged,
}

/// Owns one overlay surface per page.
pub struct OverlayRegistry {
    surfaces: BTreeMap<PageNumber, OverlaySurface>,
    factory: Box<dyn SurfaceFactory>,
    options: SurfaceOptions,
    /// Last broadcast tool, applied to surfaces created later.
    behavior: Option<PointerBehavior>,
}

impl std::fmt::Debug for OverlayRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OverlayRegistry")
            .field("surfaces", &self.surfaces)
            .field("options", &self.options)
            .field("behavior", &self.behavior)
            .finish()
    }
}

impl OverlayRegistry {
    pub fn new(factory: Box<dyn SurfaceFactory>, options: SurfaceOptions) -> Self {
        Self {
            surfaces: BTreeMap::new(),
            factory,
            options,
            behavior: None,
        }
    }

    pub fn options(&self) -> &SurfaceOptions {
        &self.options
    }

    /// Create the surface for `page`, or resize the existing one in place.
    pub fn ensure_surface(&mut self, page: PageNumber, size: Size) -> EnsureOutcome {
        if let Some(surface) = self.surfaces.get_mut(&page) {
            return if surface.resize(size) {
                EnsureOutcome::Resized
            } else {
                EnsureOutcome::Unchanged
            };
        }

        let backend = self.factory.create(page, size);
        let mut surface = OverlaySurface::new(page, size, backend, self.options);
        if let Some(behavior) = self.behavior {
            surface.apply_behavior(behavior);
        }
        surface.repaint();
        self.surfaces.insert(page, surface);
        log::debug!("Created overlay for page {} ({}x{})", page, size.width, size.height);
        EnsureOutcome::Created
    }

    /// Create or resize surfaces for every measured page in one batch.
    /// Returns the number of newly created surfaces.
    pub fn create_all(&mut self, dimensions: &BTreeMap<PageNumber, Size>) -> usize {
        let created = dimensions
            .iter()
            .filter(|&(&page, &size)| self.ensure_surface(page, size) == EnsureOutcome::Created)
            .count();
        if created > 0 {
            log::info!("Created {} page overlays", created);
        }
        created
    }

    pub fn get_surface(&self, page: PageNumber) -> Option<&OverlaySurface> {
        self.surfaces.get(&page)
    }

    pub fn get_surface_mut(&mut self, page: PageNumber) -> Option<&mut OverlaySurface> {
        self.surfaces.get_mut(&page)
    }

    pub fn len(&self) -> usize {
        self.surfaces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.surfaces.is_empty()
    }

    pub fn pages(&self) -> impl Iterator<Item = PageNumber> + '_ {
        self.surfaces.keys().copied()
    }

    /// Surfaces in page order.
    pub fn iter(&self) -> impl Iterator<Item = (PageNumber, &OverlaySurface)> {
        self.surfaces.iter().map(|(&page, surface)| (page, surface))
    }

    pub fn iter_mut(&mut self) -> impl Iterator<Item = (PageNumber, &mut OverlaySurface)> {
        self.surfaces.iter_mut().map(|(&page, surface)| (page, surface))
    }

    /// Release every surface and empty the registry.
    pub fn dispose_all(&mut self) {
        if self.surfaces.is_empty() {
            return;
        }
        log::debug!("Disposing {} page overlays", self.surfaces.len());
        for surface in self.surfaces.values_mut() {
            surface.dispose();
        }
        self.surfaces.clear();
    }

    /// Broadcast the active tool to every surface.
    pub fn set_active_tool(&mut self, settings: &ToolSettings, config: &EditorConfig) {
        let behavior = settings.pointer_behavior(config);
        log::debug!("Active tool {} on {} pages", settings.tool.name(), self.surfaces.len());
        for surface in self.surfaces.values_mut() {
            surface.apply_behavior(behavior);
        }
        self.behavior = Some(behavior);
    }

    pub fn active_behavior(&self) -> Option<&PointerBehavior> {
        self.behavior.as_ref()
    }

    /// Remove every selected object on every page. Returns how many were removed.
    pub fn delete_selection(&mut self) -> usize {
        let removed: usize = self
            .surfaces
            .values_mut()
            .filter(|surface| surface.has_selection())
            .map(|surface| surface.delete_selection().len())
            .sum();
        if removed > 0 {
            log::debug!("Deleted {} selected objects", removed);
        }
        removed
    }
}

impl Drop for OverlayRegistry {
    fn drop(&mut self) {
        self.dispose_all();
    }
}
