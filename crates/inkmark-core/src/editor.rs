//! Marking editor for one submission.

use crate::annotation::AnnotationDocument;
use crate::config::EditorConfig;
use crate::coordinator::{CoordinatorEvent, DocumentState, LoadId, PageNumber, PageRenderer};
use crate::error::{AnnotationError, AnnotationResult};
use crate::marking::{
    MarkType, MarkingClient, SavePayload, SaveReceipt, SaveRequest, SaveTicket, TokenSource,
};
use crate::registry::OverlayRegistry;
use crate::session::OverlaySession;
use crate::surface::{SurfaceFactory, SurfaceOptions};
use crate::tools::{ToolKind, ToolManager, ToolSettings, ToolTransition};
use kurbo::Point;
use serde::{Deserialize, Serialize};

/// Submission metadata as returned by the marking API.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Submission {
    pub id: String,
    pub file_locator: String,
    /// Stored annotation document, as a JSON string.
    #[serde(default)]
    pub annotation_data: Option<String>,
    #[serde(default)]
    pub score: Option<f64>,
    #[serde(default)]
    pub feedback: Option<String>,
}

/// Outcome of a finished save.
#[derive(Debug, Clone, PartialEq)]
pub enum SaveOutcome {
    Saved(SaveReceipt),
    /// The editor was closed while the request was in flight.
    Discarded,
}

type SavedCallback = Box<dyn FnMut(&SaveReceipt)>;

/// Editable overlays for every page of a submission.
pub struct AnnotationEditor {
    submission: Submission,
    mark_type: MarkType,
    config: EditorConfig,
    tools: ToolManager,
    session: OverlaySession,
    score: Option<f64>,
    feedback: Option<String>,
    /// Bumped on every content change.
    revision: u64,
    saved_revision: u64,
    /// Bumped on close; tickets from older epochs are discarded.
    epoch: u64,
    on_saved: Option<SavedCallback>,
}

impl std::fmt::Debug for AnnotationEditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AnnotationEditor")
            .field("submission", &self.submission.id)
            .field("mark_type", &self.mark_type)
            .field("tools", &self.tools)
            .field("session", &self.session)
            .field("revision", &self.revision)
            .finish()
    }
}

impl AnnotationEditor {
    /// Open the editor on a submission. Its document starts loading and any
    /// stored annotations are applied once every page has a surface.
    pub fn new(
        submission: Submission,
        mark_type: MarkType,
        config: EditorConfig,
        factory: Box<dyn SurfaceFactory>,
    ) -> Self {
        let mut session = OverlaySession::new(factory, SurfaceOptions::from_config(&config));
        let tools = ToolManager::from_config(&config);
        session.registry_mut().set_active_tool(tools.settings(), &config);
        session.open(&submission.file_locator);
        session.load_json_when_ready(submission.annotation_data.as_deref());

        log::info!(
            "Editing {} submission {}",
            mark_type.resource(),
            submission.id
        );
        Self {
            score: submission.score,
            feedback: submission.feedback.clone(),
            submission,
            mark_type,
            config,
            tools,
            session,
            revision: 0,
            saved_revision: 0,
            epoch: 0,
            on_saved: None,
        }
    }

    pub fn submission(&self) -> &Submission {
        &self.submission
    }

    pub fn mark_type(&self) -> MarkType {
        self.mark_type
    }

    pub fn config(&self) -> &EditorConfig {
        &self.config
    }

    pub fn session(&self) -> &OverlaySession {
        &self.session
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

    pub fn is_closed(&self) -> bool {
        self.session.is_closed()
    }

    pub fn take_notices(&mut self) -> Vec<AnnotationError> {
        self.session.take_notices()
    }

    /// Unsaved changes exist.
    pub fn is_dirty(&self) -> bool {
        self.revision != self.saved_revision
    }

    fn touch(&mut self, changed: bool) -> bool {
        if changed {
            self.revision += 1;
        }
        changed
    }

    // --- document ---

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

    /// Load the submission's document through a synchronous renderer.
    pub fn drive(&mut self, renderer: &mut dyn PageRenderer) -> Vec<CoordinatorEvent> {
        let locator = self.submission.file_locator.clone();
        self.session.drive(renderer, &locator)
    }

    // --- tools ---

    pub fn current_tool(&self) -> ToolKind {
        self.tools.current_tool()
    }

    pub fn tool_settings(&self) -> &ToolSettings {
        self.tools.settings()
    }

    /// Press a tool button. Pressing the armed eraser deletes the selection.
    pub fn select_tool(&mut self, tool: ToolKind) -> ToolTransition {
        if self.is_closed() {
            return ToolTransition::Unchanged;
        }
        let transition = self.tools.select(tool);
        match transition {
            ToolTransition::Changed { from, to } => {
                log::debug!("Tool {} -> {}", from.name(), to.name());
                self.broadcast_tool();
            }
            ToolTransition::DeleteSelection => {
                let removed = self.session.registry_mut().delete_selection();
                self.touch(removed > 0);
            }
            ToolTransition::Unchanged => {}
        }
        transition
    }

    pub fn set_color(&mut self, color: &str) {
        self.tools.set_color(color);
        self.broadcast_tool();
    }

    pub fn set_brush_size(&mut self, size: u32) {
        self.tools.set_brush_size(size);
        self.broadcast_tool();
    }

    fn broadcast_tool(&mut self) {
        if self.is_closed() {
            return;
        }
        let settings = self.tools.settings().clone();
        self.session
            .registry_mut()
            .set_active_tool(&settings, &self.config);
    }

    // --- input ---

    /// Pointer pressed on `page`. Other pages lose their selection and end
    /// text editing.
    pub fn pointer_down(&mut self, page: PageNumber, point: Point, additive: bool) -> bool {
        let mut changed = false;
        for (other, surface) in self.session.registry_mut().iter_mut() {
            if other == page {
                continue;
            }
            surface.clear_selection();
            if surface.finish_editing() {
                surface.repaint();
                changed = true;
            }
        }
        changed |= self
            .session
            .registry_mut()
            .get_surface_mut(page)
            .is_some_and(|s| s.pointer_down(point, additive));
        self.touch(changed)
    }

    pub fn pointer_move(&mut self, page: PageNumber, point: Point) -> bool {
        let changed = self
            .session
            .registry_mut()
            .get_surface_mut(page)
            .is_some_and(|s| s.pointer_move(point));
        self.touch(changed)
    }

    pub fn pointer_up(&mut self, page: PageNumber, point: Point) -> bool {
        let changed = self
            .session
            .registry_mut()
            .get_surface_mut(page)
            .is_some_and(|s| s.pointer_up(point));
        self.touch(changed)
    }

    /// Page whose text object is being edited.
    pub fn editing_page(&self) -> Option<PageNumber> {
        self.registry()
            .iter()
            .find(|(_, s)| s.editing().is_some())
            .map(|(page, _)| page)
    }

    /// Type into the text object being edited.
    pub fn type_text(&mut self, input: &str) -> bool {
        let Some(page) = self.editing_page() else {
            return false;
        };
        let changed = self
            .session
            .registry_mut()
            .get_surface_mut(page)
            .is_some_and(|s| s.type_text(input));
        self.touch(changed)
    }

    pub fn backspace(&mut self) -> bool {
        let Some(page) = self.editing_page() else {
            return false;
        };
        let changed = self
            .session
            .registry_mut()
            .get_surface_mut(page)
            .is_some_and(|s| s.backspace());
        self.touch(changed)
    }

    /// Leave text edit mode. Returns true if an empty text was removed.
    pub fn finish_text(&mut self) -> bool {
        let Some(page) = self.editing_page() else {
            return false;
        };
        let changed = self
            .session
            .registry_mut()
            .get_surface_mut(page)
            .is_some_and(|s| {
                let removed = s.finish_editing();
                if removed {
                    s.repaint();
                }
                removed
            });
        self.touch(changed)
    }

    // --- marking ---

    pub fn score(&self) -> Option<f64> {
        self.score
    }

    pub fn set_score(&mut self, score: Option<f64>) {
        let changed = self.score != score;
        self.score = score;
        self.touch(changed);
    }

    pub fn feedback(&self) -> Option<&str> {
        self.feedback.as_deref()
    }

    pub fn set_feedback(&mut self, feedback: Option<String>) {
        let feedback = feedback.filter(|f| !f.trim().is_empty());
        let changed = self.feedback != feedback;
        self.feedback = feedback;
        self.touch(changed);
    }

    /// Snapshot every page.
    pub fn serialize_all(&self) -> AnnotationResult<AnnotationDocument> {
        AnnotationDocument::capture(self.session.registry())
    }

    /// Called after every successful save.
    pub fn on_saved(&mut self, callback: impl FnMut(&SaveReceipt) + 'static) {
        self.on_saved = Some(Box::new(callback));
    }

    /// Check the token and snapshot the annotations for a save.
    ///
    /// No request may be sent when this fails.
    pub fn prepare_save(&self, tokens: &dyn TokenSource) -> AnnotationResult<SaveRequest> {
        if self.is_closed() {
            return Err(AnnotationError::Closed);
        }
        let Some(token) = tokens.token() else {
            log::warn!("Save attempted without a session token");
            return Err(AnnotationError::AuthenticationMissing);
        };
        let annotation_data = self.serialize_all()?.to_json()?;
        Ok(SaveRequest {
            mark_type: self.mark_type,
            token,
            payload: SavePayload {
                submission_id: self.submission.id.clone(),
                score: self.score,
                feedback: self.feedback.clone(),
                annotation_data,
            },
            ticket: SaveTicket {
                epoch: self.epoch,
                revision: self.revision,
            },
        })
    }

    /// Apply the result of a save issued by [`prepare_save`](Self::prepare_save).
    ///
    /// Results arriving after [`close`](Self::close) change nothing.
    pub fn finish_save(
        &mut self,
        ticket: SaveTicket,
        result: AnnotationResult<SaveReceipt>,
    ) -> AnnotationResult<SaveOutcome> {
        if self.is_closed() || ticket.epoch != self.epoch {
            log::debug!("Discarding save result for a closed editor");
            return Ok(SaveOutcome::Discarded);
        }
        match result {
            Ok(receipt) => {
                log::info!("Saved marks for submission {}", self.submission.id);
                self.saved_revision = self.saved_revision.max(ticket.revision);
                if let Some(callback) = self.on_saved.as_mut() {
                    callback(&receipt);
                }
                Ok(SaveOutcome::Saved(receipt))
            }
            Err(e) => {
                log::error!("Save failed: {}", e);
                Err(e)
            }
        }
    }

    /// Save through `client`.
    pub async fn save(
        &mut self,
        client: &dyn MarkingClient,
        tokens: &dyn TokenSource,
    ) -> AnnotationResult<SaveOutcome> {
        let request = self.prepare_save(tokens)?;
        let result = client
            .submit(request.mark_type, &request.token, &request.payload)
            .await;
        self.finish_save(request.ticket, result)
    }

    /// Release every surface, abandon pending loads and invalidate saves in
    /// flight.
    pub fn close(&mut self) {
        if self.is_closed() {
            return;
        }
        self.session.close();
        self.epoch += 1;
        log::info!("Closed editor for submission {}", self.submission.id);
    }
}
