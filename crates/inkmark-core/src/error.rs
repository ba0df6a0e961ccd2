//! Error taxonomy of the annotation engine.

use crate::coordinator::PageNumber;
use thiserror::Error;

/// Annotation engine errors.
///
/// None of these are fatal to an editor: they are reported to the host and
/// the editor keeps running.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum AnnotationError {
    #[error("Document could not be loaded: {0}")]
    DocumentLoadFailed(String),
    #[error("Malformed annotation data: {0}")]
    MalformedAnnotationData(String),
    #[error("Failed to load annotations for page {page}: {reason}")]
    PerPageLoadFailed { page: PageNumber, reason: String },
    #[error("Not signed in: no session token available")]
    AuthenticationMissing,
    /// The server message is surfaced verbatim.
    #[error("{message}")]
    ServerRejected { status: u16, message: String },
    #[error("Network error: {0}")]
    NetworkFailure(String),
    #[error("Serialization error: {0}")]
    Serialization(String),
    #[error("Editor is closed")]
    Closed,
}

/// Result type for annotation operations.
pub type AnnotationResult<T> = Result<T, AnnotationError>;

impl From<serde_json::Error> for AnnotationError {
    fn from(e: serde_json::Error) -> Self {
        AnnotationError::Serialization(e.to_string())
    }
}
