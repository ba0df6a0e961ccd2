//! In-memory marking client.

use super::{BoxFuture, MarkType, MarkingClient, SavePayload, SaveReceipt};
use crate::error::{AnnotationError, AnnotationResult};
use std::collections::VecDeque;
use std::sync::RwLock;

/// A request as seen by [`MemoryMarkingClient`].
#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub mark_type: MarkType,
    pub token: String,
    pub payload: SavePayload,
}

/// Records every request and answers with scripted responses.
///
/// With nothing scripted, every request succeeds.
#[derive(Default)]
pub struct MemoryMarkingClient {
    requests: RwLock<Vec<RecordedRequest>>,
    responses: RwLock<VecDeque<AnnotationResult<SaveReceipt>>>,
}

impl MemoryMarkingClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Queue the response for the next request.
    pub fn respond_with(&self, response: AnnotationResult<SaveReceipt>) {
        if let Ok(mut responses) = self.responses.write() {
            responses.push_back(response);
        }
    }

    /// Requests received so far.
    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.read().map(|r| r.clone()).unwrap_or_default()
    }

    pub fn request_count(&self) -> usize {
        self.requests.read().map(|r| r.len()).unwrap_or(0)
    }
}

impl MarkingClient for MemoryMarkingClient {
    fn submit(
        &self,
        mark_type: MarkType,
        token: &str,
        payload: &SavePayload,
    ) -> BoxFuture<'_, AnnotationResult<SaveReceipt>> {
        let request = RecordedRequest {
            mark_type,
            token: token.to_string(),
            payload: payload.clone(),
        };
        Box::pin(async move {
            self.requests
                .write()
                .map_err(|e| AnnotationError::NetworkFailure(format!("Lock error: {}", e)))?
                .push(request);
            let scripted = self
                .responses
                .write()
                .map_err(|e| AnnotationError::NetworkFailure(format!("Lock error: {}", e)))?
                .pop_front();
            scripted.unwrap_or_else(|| {
                Ok(SaveReceipt {
                    message: "Marked".to_string(),
                })
            })
        })
    }
}
