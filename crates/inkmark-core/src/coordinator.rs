//! Page render coordination.
//!
//! The document renderer is an external collaborator: it loads the
//! paginated file, renders each page at its natural scale and reports the
//! resulting pixel size. The coordinator collects those reports for the
//! current load and tells the caller when every page has been measured.

use kurbo::Size;
use std::collections::BTreeMap;
use thiserror::Error;

/// 1-based page number.
pub type PageNumber = u32;

/// Identifies one document load. Reports for older loads are ignored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LoadId(u64);

/// Renderer errors.
#[derive(Debug, Clone, Error)]
pub enum RenderError {
    #[error("Failed to open document: {0}")]
    Open(String),
    #[error("Failed to render page {page}: {reason}")]
    Page { page: PageNumber, reason: String },
}

/// Document renderer seam.
pub trait PageRenderer {
    /// Load the document and return its page count.
    fn open(&mut self, locator: &str) -> Result<u32, RenderError>;

    /// Render one page at natural scale and return its size in pixels.
    fn render_page(&mut self, page: PageNumber) -> Result<Size, RenderError>;
}

/// Renderer for documents whose pages all have one size.
#[derive(Debug, Clone, Copy)]
pub struct UniformPages {
    pub page_count: u32,
    pub size: Size,
}

impl UniformPages {
    pub fn new(page_count: u32, size: Size) -> Self {
        Self { page_count, size }
    }
}

impl PageRenderer for UniformPages {
    fn open(&mut self, _locator: &str) -> Result<u32, RenderError> {
        Ok(self.page_count)
    }

    fn render_page(&mut self, page: PageNumber) -> Result<Size, RenderError> {
        if page == 0 || page > self.page_count {
            return Err(RenderError::Page {
                page,
                reason: "page out of range".to_string(),
            });
        }
        Ok(self.size)
    }
}

/// Load state of the current document.
#[derive(Debug, Clone, PartialEq)]
pub enum DocumentState {
    /// No document supplied yet.
    Idle,
    /// Waiting for the renderer to report the page count.
    Loading,
    /// Waiting for page dimensions.
    Measuring { page_count: u32 },
    /// Every page has reported its size.
    Measured { page_count: u32 },
    /// The document has no pages; nothing to annotate.
    Empty,
    /// The document could not be loaded.
    Failed { reason: String },
}

/// Outcome of a coordinator input.
#[derive(Debug, Clone, PartialEq)]
pub enum CoordinatorEvent {
    /// The page count is known.
    Loaded { page_count: u32 },
    /// The document has no pages.
    Empty,
    /// One more page reported its size; others are still missing.
    Measured { page: PageNumber, size: Size },
    /// The last missing page reported. Emitted once per load.
    AllMeasured { page_count: u32 },
    /// A page reported a different size after all pages were measured.
    Resized { page: PageNumber, size: Size },
    /// The document failed to load.
    Failed { reason: String },
}

/// Tracks per-page dimensions for the current document load.
#[derive(Debug, Clone)]
pub struct PageRenderCoordinator {
    load: LoadId,
    locator: Option<String>,
    state: DocumentState,
    dimensions: BTreeMap<PageNumber, Size>,
}

impl Default for PageRenderCoordinator {
    fn default() -> Self {
        Self::new()
    }
}

impl PageRenderCoordinator {
    pub fn new() -> Self {
        Self {
            load: LoadId(0),
            locator: None,
            state: DocumentState::Idle,
            dimensions: BTreeMap::new(),
        }
    }

    /// Start loading a document. Everything recorded for the previous load
    /// is discarded.
    pub fn begin(&mut self, locator: &str) -> LoadId {
        self.load = LoadId(self.load.0 + 1);
        self.locator = Some(locator.to_string());
        self.state = DocumentState::Loading;
        self.dimensions.clear();
        log::info!("Loading document {}", locator);
        self.load
    }

    pub fn current_load(&self) -> LoadId {
        self.load
    }

    pub fn locator(&self) -> Option<&str> {
        self.locator.as_deref()
    }

    pub fn state(&self) -> &DocumentState {
        &self.state
    }

    pub fn page_count(&self) -> Option<u32> {
        match self.state {
            DocumentState::Measuring { page_count } | DocumentState::Measured { page_count } => {
                Some(page_count)
            }
            DocumentState::Empty => Some(0),
            _ => None,
        }
    }

    pub fn dimensions(&self) -> &BTreeMap<PageNumber, Size> {
        &self.dimensions
    }

    pub fn dimension(&self, page: PageNumber) -> Option<Size> {
        self.dimensions.get(&page).copied()
    }

    /// True once every page of a non-empty document has reported.
    pub fn all_measured(&self) -> bool {
        matches!(self.state, DocumentState::Measured { .. })
    }

    fn is_current(&self, load: LoadId) -> bool {
        if load != self.load {
            log::debug!("Ignoring report for stale load {:?}", load);
            return false;
        }
        true
    }

    /// The renderer finished loading; `page_count` may be unknown.
    pub fn on_document_loaded(
        &mut self,
        load: LoadId,
        page_count: Option<u32>,
    ) -> Option<CoordinatorEvent> {
        if !self.is_current(load) {
            return None;
        }
        match self.state {
            DocumentState::Loading => {}
            DocumentState::Failed { .. } => {
                log::warn!("Document reported loaded after failing; ignoring");
                return None;
            }
            DocumentState::Measuring { page_count: known }
            | DocumentState::Measured { page_count: known }
                if page_count == Some(known) =>
            {
                log::debug!("Document loaded again for {:?} with the same page count", load);
                return None;
            }
            DocumentState::Empty if page_count.unwrap_or(0) == 0 => return None,
            _ => log::warn!("Document loaded twice for {:?}; resetting page state", load),
        }
        self.dimensions.clear();
        match page_count {
            Some(count) if count > 0 => {
                self.state = DocumentState::Measuring { page_count: count };
                Some(CoordinatorEvent::Loaded { page_count: count })
            }
            _ => {
                log::info!("Document has no pages");
                self.state = DocumentState::Empty;
                Some(CoordinatorEvent::Empty)
            }
        }
    }

    /// A page finished rendering at `width × height` pixels.
    pub fn on_page_rendered(
        &mut self,
        load: LoadId,
        page: PageNumber,
        width: f64,
        height: f64,
    ) -> Option<CoordinatorEvent> {
        if !self.is_current(load) {
            return None;
        }
        let page_count = match self.state {
            DocumentState::Measuring { page_count } | DocumentState::Measured { page_count } => {
                page_count
            }
            ref other => {
                log::warn!("Page {} reported while document is {:?}", page, other);
                return None;
            }
        };
        if page == 0 || page > page_count {
            log::warn!("Page {} is outside 1..={}", page, page_count);
            return None;
        }
        if !(width.is_finite() && height.is_finite() && width > 0.0 && height > 0.0) {
            log::warn!("Page {} reported invalid size {}x{}", page, width, height);
            return None;
        }

        let size = Size::new(width, height);
        let previous = self.dimensions.insert(page, size);

        if self.all_measured() {
            return match previous {
                Some(old) if old == size => None,
                _ => Some(CoordinatorEvent::Resized { page, size }),
            };
        }

        if self.dimensions.len() as u32 == page_count {
            log::debug!("All {} pages measured", page_count);
            self.state = DocumentState::Measured { page_count };
            Some(CoordinatorEvent::AllMeasured { page_count })
        } else {
            Some(CoordinatorEvent::Measured { page, size })
        }
    }

    /// The renderer could not load the document.
    pub fn on_document_failed(&mut self, load: LoadId, reason: &str) -> Option<CoordinatorEvent> {
        if !self.is_current(load) {
            return None;
        }
        log::error!("Document load failed: {}", reason);
        self.dimensions.clear();
        self.state = DocumentState::Failed {
            reason: reason.to_string(),
        };
        Some(CoordinatorEvent::Failed {
            reason: reason.to_string(),
        })
    }

    /// Run a complete load against a synchronous renderer.
    pub fn drive(
        &mut self,
        renderer: &mut dyn PageRenderer,
        locator: &str,
    ) -> Vec<CoordinatorEvent> {
        let load = self.begin(locator);
        let mut events = Vec::new();

        let page_count = match renderer.open(locator) {
            Ok(count) => count,
            Err(e) => {
                events.extend(self.on_document_failed(load, &e.to_string()));
                return events;
            }
        };
        events.extend(self.on_document_loaded(load, Some(page_count)));

        for page in 1..=page_count {
            match renderer.render_page(page) {
                Ok(size) => {
                    events.extend(self.on_page_rendered(load, page, size.width, size.height))
                }
                Err(e) => {
                    events.extend(self.on_document_failed(load, &e.to_string()));
                    break;
                }
            }
        }
        events
    }
}
