//! Inkmark Core Library
//!
//! Multi-page annotation overlays for marking paginated documents: page
//! measurement, one vector overlay per page, drawing tools, and JSON
//! persistence of every page's annotations.

pub mod annotation;
pub mod color;
pub mod config;
pub mod coordinator;
pub mod editor;
pub mod error;
pub mod marking;
pub mod registry;
pub mod session;
pub mod shapes;
pub mod surface;
pub mod tools;
pub mod viewer;

pub use annotation::{AnnotationDocument, LoadReport};
pub use color::Rgba;
pub use config::{ConfigError, EditorConfig};
pub use coordinator::{
    CoordinatorEvent, DocumentState, LoadId, PageNumber, PageRenderCoordinator, PageRenderer,
    RenderError, UniformPages,
};
pub use editor::{AnnotationEditor, SaveOutcome, Submission};
pub use error::{AnnotationError, AnnotationResult};
pub use marking::{MarkType, MarkingClient, SavePayload, SaveReceipt, SessionTokens, TokenSource};
pub use registry::{EnsureOutcome, OverlayRegistry};
pub use session::OverlaySession;
pub use shapes::{Shape, ShapeId, ShapeStyle};
pub use surface::{HeadlessFactory, OverlaySurface, SurfaceBackend, SurfaceFactory, SurfaceOptions};
pub use tools::{ToolKind, ToolManager, ToolSettings, ToolTransition};
pub use viewer::{AnnotationViewer, ViewerSummary};
