//! HTTP marking client for native platforms.

use super::{endpoint_path, server_message, BoxFuture, MarkType, MarkingClient, SavePayload, SaveReceipt};
use crate::config::ApiConfig;
use crate::error::{AnnotationError, AnnotationResult};
use std::time::Duration;
use url::Url;

/// Sends saves to the marking REST API with a bearer token.
pub struct HttpMarkingClient {
    base: Url,
    agent: ureq::Agent,
}

impl HttpMarkingClient {
    pub fn new(config: &ApiConfig) -> AnnotationResult<Self> {
        // A base without a trailing slash would lose its last segment on join
        let mut base = config.base_url.trim().to_string();
        if !base.ends_with('/') {
            base.push('/');
        }
        let base = Url::parse(&base)
            .map_err(|e| AnnotationError::NetworkFailure(format!("Invalid API URL {base}: {e}")))?;
        let agent = ureq::AgentBuilder::new()
            .timeout(Duration::from_secs(config.timeout_secs.max(1)))
            .build();
        Ok(Self { base, agent })
    }

    pub fn base_url(&self) -> &Url {
        &self.base
    }

    /// Full URL of the save endpoint.
    pub fn endpoint(&self, mark_type: MarkType, submission_id: &str) -> AnnotationResult<Url> {
        self.base
            .join(&endpoint_path(mark_type, submission_id))
            .map_err(|e| AnnotationError::NetworkFailure(format!("Invalid endpoint: {e}")))
    }

    fn put(&self, url: &Url, token: &str, body: &str) -> AnnotationResult<SaveReceipt> {
        log::info!("PUT {}", url);
        let response = self
            .agent
            .put(url.as_str())
            .set("Authorization", &format!("Bearer {token}"))
            .set("Content-Type", "application/json")
            .send_string(body);

        match response {
            Ok(resp) => {
                let body = resp
                    .into_string()
                    .map_err(|e| AnnotationError::NetworkFailure(e.to_string()))?;
                Ok(serde_json::from_str(&body).unwrap_or_default())
            }
            Err(ureq::Error::Status(status, resp)) => {
                let body = resp.into_string().unwrap_or_default();
                log::warn!("Save rejected with status {}", status);
                Err(server_message(status, &body))
            }
            Err(ureq::Error::Transport(e)) => {
                log::error!("Save request failed: {}", e);
                Err(AnnotationError::NetworkFailure(e.to_string()))
            }
        }
    }
}

impl MarkingClient for HttpMarkingClient {
    fn submit(
        &self,
        mark_type: MarkType,
        token: &str,
        payload: &SavePayload,
    ) -> BoxFuture<'_, AnnotationResult<SaveReceipt>> {
        let token = token.to_string();
        let prepared = self
            .endpoint(mark_type, &payload.submission_id)
            .and_then(|url| Ok((url, serde_json::to_string(payload)?)));
        Box::pin(async move {
            let (url, body) = prepared?;
            self.put(&url, &token, &body)
        })
    }
}
