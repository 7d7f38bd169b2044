//! Upstream fetch boundary: decouples the scheduler from the concrete
//! HTTP client so tests can drive it with a canned responder.

use async_trait::async_trait;
use vigil_core::SessionId;

use crate::endpoint::EndpointSpec;
use crate::error::PollError;

#[async_trait]
pub trait UpstreamClient: Send + Sync {
    async fn fetch(
        &self,
        base_url: &str,
        session_id: &SessionId,
        endpoint: &EndpointSpec,
    ) -> Result<serde_json::Value, PollError>;
}

/// `reqwest`-backed client used by the production scheduler. The caller
/// still applies a per-poll timeout via `tokio::time::timeout`; this
/// client only owns connection pooling and JSON decoding.
pub struct ReqwestUpstreamClient {
    client: reqwest::Client,
}

impl ReqwestUpstreamClient {
    pub fn new(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl UpstreamClient for ReqwestUpstreamClient {
    async fn fetch(
        &self,
        base_url: &str,
        session_id: &SessionId,
        endpoint: &EndpointSpec,
    ) -> Result<serde_json::Value, PollError> {
        let url = format!("{base_url}/sessions/{session_id}/{}", endpoint.path);
        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| PollError::Upstream(e.to_string()))?;

        if !response.status().is_success() {
            return Err(PollError::Upstream(format!("status {}", response.status())));
        }

        response
            .json::<serde_json::Value>()
            .await
            .map_err(|e| PollError::Decode(e.to_string()))
    }
}
