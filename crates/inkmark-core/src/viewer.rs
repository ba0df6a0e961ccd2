//! Read-only display of saved annotations.

use crate::annotation::{AnnotationDocument, LoadReport};
use crate::coordinator::{CoordinatorEvent, DocumentState, LoadId, PageNumber, PageRenderer};
use crate::error::{AnnotationError, AnnotationResult};
use crate::registry::OverlayRegistry;
use crate::session::OverlaySession;
use crate::shapes::Shape;
use crate::surface::{SurfaceFactory, SurfaceOptions};
use serde::Serialize;

/// One drawable object, as shown to a reader.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ObjectSummary {
    pub kind: &'static str,
    pub color: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    /// `[x0, y0, x1, y1]` in page pixels.
    pub bounds: [f64; 4],
}

impl From<&Shape> for ObjectSummary {
    fn from(shape: &Shape) -> Self {
        let bounds = shape.bounds();
        Self {
            kind: shape.kind_name(),
            color: shape.style().stroke.to_css(),
            text: shape.as_text().map(|t| t.content().to_string()),
            bounds: [bounds.x0, bounds.y0, bounds.x1, bounds.y1],
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PageSummary {
    pub page: PageNumber,
    pub width: f64,
    pub height: f64,
    pub objects: Vec<ObjectSummary>,
}

/// Annotated pages of a viewed document.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewerSummary {
    pub page_count: Option<u32>,
    pub ready: bool,
    pub pages: Vec<PageSummary>,
}

/// Shows saved annotations over a document. Surfaces ignore pointer input
/// and there is no tool state or save path.
#[derive(Debug)]
pub struct AnnotationViewer {
    locator: String,
    session: OverlaySession,
}

impl AnnotationViewer {
    pub fn new(
        locator: &str,
        annotation_data: Option<&str>,
        factory: Box<dyn SurfaceFactory>,
    ) -> Self {
        let mut session = OverlaySession::new(factory, SurfaceOptions::default().read_only());
        session.open(locator);
        session.load_json_when_ready(annotation_data);
        Self {
            locator: locator.to_string(),
            session,
        }
    }

    /// Viewer for an already-parsed document.
    pub fn with_document(
        locator: &str,
        document: AnnotationDocument,
        factory: Box<dyn SurfaceFactory>,
    ) -> Self {
        let mut viewer = Self::new(locator, None, factory);
        viewer.session.load_when_ready(document);
        viewer
    }

    pub fn locator(&self) -> &str {
        &self.locator
    }

    pub fn registry(&self) -> &OverlayRegistry {
        self.session.registry()
    }

    pub fn state(&self) -> &DocumentState {
        self.session.state()
    }

    pub fn load_id(&self) -> LoadId {
        self.session.current_load()
    }

    pub fn is_ready(&self) -> bool {
        self.session.is_ready()
    }

    pub fn take_notices(&mut self) -> Vec<AnnotationError> {
        self.session.take_notices()
    }

    /// What happened when the saved annotations were applied.
    pub fn last_report(&self) -> Option<&LoadReport> {
        self.session.last_report()
    }

    pub fn on_document_loaded(
        &mut self,
        load: LoadId,
        page_count: Option<u32>,
    ) -> Option<CoordinatorEvent> {
        self.session.on_document_loaded(load, page_count)
    }

    pub fn on_page_rendered(
        &mut self,
        load: LoadId,
        page: PageNumber,
        width: f64,
        height: f64,
    ) -> Option<CoordinatorEvent> {
        self.session.on_page_rendered(load, page, width, height)
    }

    pub fn on_document_failed(&mut self, load: LoadId, reason: &str) -> Option<CoordinatorEvent> {
        self.session.on_document_failed(load, reason)
    }

    pub fn drive(&mut self, renderer: &mut dyn PageRenderer) -> Vec<CoordinatorEvent> {
        let locator = self.locator.clone();
        self.session.drive(renderer, &locator)
    }

    /// Show a different document. Annotations for the old one are dropped.
    pub fn set_document(&mut self, locator: &str, annotation_data: Option<&str>) -> LoadId {
        self.locator = locator.to_string();
        let load = self.session.open(locator);
        self.session.load_json_when_ready(annotation_data);
        load
    }

    /// The displayed annotations, re-serialized.
    pub fn document(&self) -> AnnotationResult<AnnotationDocument> {
        AnnotationDocument::capture(self.session.registry())
    }

    pub fn summary(&self) -> ViewerSummary {
        let pages = self
            .registry()
            .iter()
            .map(|(page, surface)| PageSummary {
                page,
                width: surface.size().width,
                height: surface.size().height,
                objects: surface.objects().map(ObjectSummary::from).collect(),
            })
            .collect();
        ViewerSummary {
            page_count: self.session.coordinator().page_count(),
            ready: self.is_ready(),
            pages,
        }
    }

    pub fn close(&mut self) {
        self.session.close();
    }
}
