//! Document and overlay lifecycle shared by the editor and the viewer.

use crate::annotation::{AnnotationDocument, LoadReport};
use crate::coordinator::{
    CoordinatorEvent, DocumentState, LoadId, PageNumber, PageRenderCoordinator, PageRenderer,
};
use crate::error::AnnotationError;
use crate::registry::OverlayRegistry;
use crate::surface::{SurfaceFactory, SurfaceOptions};

/// Couples page measurement to overlay creation and deferred annotation
/// loading.
///
/// Surfaces for every page are created in a single batch once the last
/// page reports its size. A pending annotation document is applied exactly
/// once, right after that batch.
#[derive(Debug)]
pub struct OverlaySession {
    coordinator: PageRenderCoordinator,
    registry: OverlayRegistry,
    pending: Option<AnnotationDocument>,
    last_report: Option<LoadReport>,
    notices: Vec<AnnotationError>,
    closed: bool,
}

impl OverlaySession {
    pub fn new(factory: Box<dyn SurfaceFactory>, options: SurfaceOptions) -> Self {
        Self {
            coordinator: PageRenderCoordinator::new(),
            registry: OverlayRegistry::new(factory, options),
            pending: None,
            last_report: None,
            notices: Vec::new(),
            closed: false,
        }
    }

    pub fn coordinator(&self) -> &PageRenderCoordinator {
        &self.coordinator
    }

    pub fn registry(&self) -> &OverlayRegistry {
        &self.registry
    }

    pub fn registry_mut(&mut self) -> &mut OverlayRegistry {
        &mut self.registry
    }

    pub fn state(&self) -> &DocumentState {
        self.coordinator.state()
    }

    pub fn current_load(&self) -> LoadId {
        self.coordinator.current_load()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Every page has a surface.
    pub fn is_ready(&self) -> bool {
        self.coordinator.all_measured()
            && self.coordinator.page_count() == Some(self.registry.len() as u32)
    }

    pub fn has_pending_load(&self) -> bool {
        self.pending.is_some()
    }

    /// Report of the last applied annotation document.
    pub fn last_report(&self) -> Option<&LoadReport> {
        self.last_report.as_ref()
    }

    /// Non-fatal problems for the host to show.
    pub fn notices(&self) -> &[AnnotationError] {
        &self.notices
    }

    pub fn take_notices(&mut self) -> Vec<AnnotationError> {
        std::mem::take(&mut self.notices)
    }

    pub(crate) fn notify(&mut self, error: AnnotationError) {
        log::warn!("{}", error);
        self.notices.push(error);
    }

    /// Start loading `locator`. Existing surfaces are released. When the
    /// locator is unchanged their content, or the still pending annotation
    /// load, is applied again once the pages are measured.
    pub fn open(&mut self, locator: &str) -> LoadId {
        self.reset_for(locator);
        self.coordinator.begin(locator)
    }

    fn reset_for(&mut self, locator: &str) {
        if self.coordinator.locator() == Some(locator) {
            self.stash_surfaces();
        } else if self.pending.take().is_some() {
            log::debug!("Document changed, abandoning pending annotation load");
        }
        self.registry.dispose_all();
    }

    /// Keep the content of the current surfaces as the pending load before
    /// they are released.
    fn stash_surfaces(&mut self) {
        if self.pending.is_some() || self.registry.is_empty() {
            return;
        }
        match AnnotationDocument::capture(&self.registry) {
            Ok(document) => {
                log::debug!("Keeping annotations of {} pages for reload", document.len());
                self.pending = Some(document);
            }
            Err(e) => self.notify(e),
        }
    }

    /// Load `document` as soon as every page has a surface (immediately if
    /// they already do). Replaces any earlier pending document.
    pub fn load_when_ready(&mut self, document: AnnotationDocument) {
        if self.closed {
            return;
        }
        self.pending = Some(document);
        self.fire_pending_if_ready();
    }

    /// Parse stored annotations and load them when ready. Malformed data is
    /// reported and the pages stay blank.
    pub fn load_json_when_ready(&mut self, json: Option<&str>) {
        let Some(json) = json.map(str::trim).filter(|j| !j.is_empty()) else {
            return;
        };
        match AnnotationDocument::from_json(json) {
            Ok(document) => self.load_when_ready(document),
            Err(e) => self.notify(e),
        }
    }

    fn fire_pending_if_ready(&mut self) {
        if !self.is_ready() {
            return;
        }
        let Some(document) = self.pending.take() else {
            return;
        };
        let report = document.apply(&mut self.registry);
        log::info!(
            "Loaded annotations for {} pages ({} dropped, {} failed)",
            report.loaded.len(),
            report.dropped.len(),
            report.failed.len()
        );
        for failure in &report.failed {
            self.notify(failure.clone());
        }
        self.last_report = Some(report);
    }

    pub fn on_document_loaded(
        &mut self,
        load: LoadId,
        page_count: Option<u32>,
    ) -> Option<CoordinatorEvent> {
        if self.closed {
            return None;
        }
        let event = self.coordinator.on_document_loaded(load, page_count)?;
        self.handle(&event);
        Some(event)
    }

    pub fn on_page_rendered(
        &mut self,
        load: LoadId,
        page: PageNumber,
        width: f64,
        height: f64,
    ) -> Option<CoordinatorEvent> {
        if self.closed {
            return None;
        }
        let event = self.coordinator.on_page_rendered(load, page, width, height)?;
        self.handle(&event);
        Some(event)
    }

    pub fn on_document_failed(&mut self, load: LoadId, reason: &str) -> Option<CoordinatorEvent> {
        if self.closed {
            return None;
        }
        let event = self.coordinator.on_document_failed(load, reason)?;
        self.handle(&event);
        Some(event)
    }

    /// Load `locator` through a synchronous renderer.
    pub fn drive(&mut self, renderer: &mut dyn PageRenderer, locator: &str) -> Vec<CoordinatorEvent> {
        if self.closed {
            return Vec::new();
        }
        self.reset_for(locator);
        let events = self.coordinator.drive(renderer, locator);
        for event in &events {
            self.handle(event);
        }
        events
    }

    fn handle(&mut self, event: &CoordinatorEvent) {
        match event {
            CoordinatorEvent::Loaded { .. } => {
                self.stash_surfaces();
                self.registry.dispose_all();
            }
            CoordinatorEvent::Measured { .. } => {}
            CoordinatorEvent::AllMeasured { .. } => {
                self.registry.create_all(self.coordinator.dimensions());
                self.fire_pending_if_ready();
            }
            CoordinatorEvent::Resized { page, size } => {
                self.registry.ensure_surface(*page, *size);
            }
            CoordinatorEvent::Empty => {
                self.registry.dispose_all();
                if self.pending.take().is_some() {
                    log::debug!("Document has no pages, dropping pending annotations");
                }
            }
            CoordinatorEvent::Failed { reason } => {
                self.registry.dispose_all();
                self.pending = None;
                self.notify(AnnotationError::DocumentLoadFailed(reason.clone()));
            }
        }
    }

    /// Release every surface and abandon any pending load.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.registry.dispose_all();
        self.pending = None;
        self.closed = true;
        log::debug!("Overlay session closed");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::UniformPages;
    use crate::shapes::{Shape, Text};
    use crate::surface::test_support::RecordingFactory;
    use kurbo::{Point, Size};

    fn session() -> (OverlaySession, RecordingFactory) {
        let factory = RecordingFactory::default();
        let session = OverlaySession::new(Box::new(factory.clone()), SurfaceOptions::default());
        (session, factory)
    }

    fn one_text_on(page: PageNumber) -> AnnotationDocument {
        let text = Shape::Text(Text::new(Point::new(5.0, 5.0), "note".into()));
        let mut pages = serde_json::Map::new();
        pages.insert(
            page.to_string(),
            serde_json::json!({ "version": 1, "objects": [text] }),
        );
        AnnotationDocument::from_value(pages.into()).unwrap()
    }

    #[test]
    fn test_surfaces_wait_for_every_page() {
        let (mut session, factory) = session();
        let load = session.open("doc.pdf");
        session.on_document_loaded(load, Some(3));

        session.on_page_rendered(load, 1, 800.0, 1100.0);
        session.on_page_rendered(load, 3, 800.0, 1100.0);
        assert_eq!(session.registry().len(), 0);
        assert!(factory.log.borrow().created.is_empty());

        session.on_page_rendered(load, 2, 800.0, 1100.0);
        assert_eq!(session.registry().len(), 3);
        assert!(session.is_ready());
    }

    #[test]
    fn test_pending_load_fires_once_when_ready() {
        let (mut session, _factory) = session();
        let load = session.open("doc.pdf");
        session.load_when_ready(one_text_on(2));
        session.on_document_loaded(load, Some(2));
        session.on_page_rendered(load, 1, 800.0, 1100.0);
        assert!(session.has_pending_load());

        session.on_page_rendered(load, 2, 800.0, 1100.0);
        assert!(!session.has_pending_load());
        assert_eq!(session.registry().get_surface(2).unwrap().len(), 1);

        // Later resizes keep content and do not reload
        session.on_page_rendered(load, 2, 400.0, 550.0);
        let surface = session.registry().get_surface(2).unwrap();
        assert_eq!(surface.size(), Size::new(400.0, 550.0));
        assert_eq!(surface.len(), 1);
        assert_eq!(session.last_report().unwrap().loaded, vec![2]);
    }

    #[test]
    fn test_load_after_ready_applies_immediately() {
        let (mut session, _factory) = session();
        session.drive(&mut UniformPages::new(2, Size::new(800.0, 1100.0)), "doc.pdf");
        session.load_when_ready(one_text_on(1));
        assert_eq!(session.registry().get_surface(1).unwrap().len(), 1);
    }

    #[test]
    fn test_document_change_resets_everything() {
        let (mut session, factory) = session();
        session.drive(&mut UniformPages::new(2, Size::new(800.0, 1100.0)), "a.pdf");
        let load = session.open("b.pdf");
        session.load_when_ready(one_text_on(1));

        assert_eq!(session.registry().len(), 0);
        assert_eq!(factory.log.borrow().released.len(), 2);

        let load_c = session.open("c.pdf");
        assert!(!session.has_pending_load());
        assert_eq!(session.on_document_loaded(load, Some(1)), None);
        session.on_document_loaded(load_c, Some(1));
        session.on_page_rendered(load_c, 1, 800.0, 1100.0);
        assert!(session.registry().get_surface(1).unwrap().is_empty());
    }

    #[test]
    fn test_same_locator_keeps_pending() {
        let (mut session, _factory) = session();
        session.open("doc.pdf");
        session.load_when_ready(one_text_on(1));
        session.drive(&mut UniformPages::new(1, Size::new(800.0, 1100.0)), "doc.pdf");
        assert_eq!(session.registry().get_surface(1).unwrap().len(), 1);
    }

    #[test]
    fn test_repeated_loaded_report_keeps_annotations() {
        let (mut session, _factory) = session();
        let load = session.open("doc.pdf");
        session.load_when_ready(one_text_on(1));
        session.on_document_loaded(load, Some(1));
        session.on_page_rendered(load, 1, 800.0, 1100.0);
        assert_eq!(session.registry().get_surface(1).unwrap().len(), 1);

        assert_eq!(session.on_document_loaded(load, Some(1)), None);
        assert_eq!(session.registry().get_surface(1).unwrap().len(), 1);

        // A changed page count rebuilds the surfaces with their content
        session.on_document_loaded(load, Some(2));
        assert!(session.registry().is_empty());
        session.on_page_rendered(load, 1, 800.0, 1100.0);
        session.on_page_rendered(load, 2, 800.0, 1100.0);
        assert_eq!(session.registry().get_surface(1).unwrap().len(), 1);
        assert!(session.registry().get_surface(2).unwrap().is_empty());
    }

    #[test]
    fn test_redrive_same_locator_keeps_applied_annotations() {
        let (mut session, _factory) = session();
        let pages = UniformPages::new(2, Size::new(800.0, 1100.0));
        session.open("doc.pdf");
        session.load_when_ready(one_text_on(2));
        session.drive(&mut pages.clone(), "doc.pdf");
        assert_eq!(session.registry().get_surface(2).unwrap().len(), 1);

        session.drive(&mut pages.clone(), "doc.pdf");
        assert_eq!(session.registry().get_surface(2).unwrap().len(), 1);

        session.open("doc.pdf");
        assert!(session.has_pending_load());
        session.drive(&mut pages.clone(), "doc.pdf");
        assert_eq!(session.registry().get_surface(2).unwrap().len(), 1);

        // Another document starts blank
        session.drive(&mut pages.clone(), "other.pdf");
        assert!(session.registry().get_surface(2).unwrap().is_empty());
    }

    #[test]
    fn test_failed_document_is_inert() {
        let (mut session, _factory) = session();
        let load = session.open("broken.pdf");
        session.load_when_ready(one_text_on(1));
        session.on_document_failed(load, "HTTP 404");

        assert!(session.registry().is_empty());
        assert!(!session.has_pending_load());
        assert_eq!(
            session.take_notices(),
            vec![AnnotationError::DocumentLoadFailed("HTTP 404".into())]
        );
        assert!(session.notices().is_empty());
    }

    #[test]
    fn test_zero_pages_never_loads() {
        let (mut session, _factory) = session();
        let load = session.open("empty.pdf");
        session.load_when_ready(one_text_on(1));
        session.on_document_loaded(load, Some(0));
        assert!(session.registry().is_empty());
        assert!(!session.is_ready());
        assert!(!session.has_pending_load());
    }

    #[test]
    fn test_malformed_json_becomes_notice() {
        let (mut session, _factory) = session();
        session.load_json_when_ready(Some("{not valid json"));
        session.load_json_when_ready(Some("   "));
        session.load_json_when_ready(None);
        let notices = session.take_notices();
        assert_eq!(notices.len(), 1);
        assert!(matches!(notices[0], AnnotationError::MalformedAnnotationData(_)));
    }

    #[test]
    fn test_close_abandons_pending_and_ignores_reports() {
        let (mut session, factory) = session();
        let load = session.open("doc.pdf");
        session.load_when_ready(one_text_on(1));
        session.on_document_loaded(load, Some(1));
        session.close();

        assert_eq!(session.on_page_rendered(load, 1, 800.0, 1100.0), None);
        assert!(session.registry().is_empty());
        assert!(factory.log.borrow().created.is_empty());
        assert!(!session.has_pending_load());
    }
}
