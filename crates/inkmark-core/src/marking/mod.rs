//! Remote marking API seam.

mod memory;

#[cfg(not(target_arch = "wasm32"))]
mod http;

pub use memory::MemoryMarkingClient;

#[cfg(not(target_arch = "wasm32"))]
pub use http::HttpMarkingClient;

use crate::error::{AnnotationError, AnnotationResult};
use serde::{Deserialize, Serialize};
use std::future::Future;
use std::pin::Pin;

/// Boxed future for async operations (compatible with WASM).
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + 'a>>;

/// Which kind of submission is being marked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MarkType {
    #[default]
    Assignment,
    Exam,
}

impl MarkType {
    /// Remote resource that receives the save.
    pub fn resource(self) -> &'static str {
        match self {
            MarkType::Assignment => "assignments",
            MarkType::Exam => "exams",
        }
    }
}

impl std::str::FromStr for MarkType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "assignment" | "assignments" => Ok(MarkType::Assignment),
            "exam" | "exams" => Ok(MarkType::Exam),
            other => Err(format!("Unknown mark type: {other}")),
        }
    }
}

/// Path of the save endpoint relative to the API base.
pub fn endpoint_path(mark_type: MarkType, submission_id: &str) -> String {
    format!("{}/submissions/{}/mark", mark_type.resource(), submission_id)
}

/// Body of a save request.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SavePayload {
    pub submission_id: String,
    pub score: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub feedback: Option<String>,
    /// The annotation document as a JSON string.
    pub annotation_data: String,
}

/// Server acknowledgement of a save.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SaveReceipt {
    #[serde(default)]
    pub message: String,
}

/// Everything a client needs to send one save.
#[derive(Debug, Clone, PartialEq)]
pub struct SaveRequest {
    pub mark_type: MarkType,
    pub token: String,
    pub payload: SavePayload,
    pub ticket: SaveTicket,
}

/// Ties a save result back to the editor session that issued it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SaveTicket {
    pub(crate) epoch: u64,
    pub(crate) revision: u64,
}

/// Client for the marking endpoint.
///
/// On native platforms implementations must be Send + Sync.
#[cfg(not(target_arch = "wasm32"))]
pub trait MarkingClient: Send + Sync {
    fn submit(
        &self,
        mark_type: MarkType,
        token: &str,
        payload: &SavePayload,
    ) -> BoxFuture<'_, AnnotationResult<SaveReceipt>>;
}

/// Client for the marking endpoint (WASM version without Send + Sync).
#[cfg(target_arch = "wasm32")]
pub trait MarkingClient {
    fn submit(
        &self,
        mark_type: MarkType,
        token: &str,
        payload: &SavePayload,
    ) -> BoxFuture<'_, AnnotationResult<SaveReceipt>>;
}

/// Where the bearer token comes from.
pub trait TokenSource {
    fn token(&self) -> Option<String>;
}

/// Token slots as the host page stores them: a persistent slot checked
/// first, then a per-session slot. Blank values count as missing.
#[derive(Debug, Clone, Default)]
pub struct SessionTokens {
    pub local: Option<String>,
    pub session: Option<String>,
}

impl SessionTokens {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn local(token: impl Into<String>) -> Self {
        Self {
            local: Some(token.into()),
            session: None,
        }
    }

    pub fn session(token: impl Into<String>) -> Self {
        Self {
            local: None,
            session: Some(token.into()),
        }
    }
}

impl TokenSource for SessionTokens {
    fn token(&self) -> Option<String> {
        [&self.local, &self.session]
            .into_iter()
            .flatten()
            .map(|t| t.trim())
            .find(|t| !t.is_empty())
            .map(str::to_string)
    }
}

/// Pull a human-readable message out of an error response body.
pub(crate) fn server_message(status: u16, body: &str) -> AnnotationError {
    let message = serde_json::from_str::<SaveReceipt>(body)
        .ok()
        .map(|r| r.message)
        .filter(|m| !m.is_empty())
        .unwrap_or_else(|| {
            let body = body.trim();
            if body.is_empty() {
                format!("Request failed with status {status}")
            } else {
                body.to_string()
            }
        });
    AnnotationError::ServerRejected { status, message }
}
