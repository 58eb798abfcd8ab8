//! HTTP origin built on `reqwest`.
//!
//! Bodies are JSON. The create endpoint accepts either one payload object or
//! an array of them and answers with the created record(s), or with an
//! object carrying `message` when it rejects the content.

use crate::config::SyncConfig;
use crate::error::{SyncError, SyncResult};
use crate::origin::{Origin, OriginResponse};
use async_trait::async_trait;
use reqwest::header::ACCEPT;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

const ACCEPT_ANY_JSON: &str = "application/json, text/plain, */*";

/// Origin reached over HTTP.
#[derive(Debug)]
pub struct HttpOrigin {
    client: reqwest::Client,
    url: reqwest::Url,
}

impl HttpOrigin {
    /// Creates an HTTP origin for the configured create endpoint.
    ///
    /// # Errors
    ///
    /// Returns `InvalidConfig` if the URL is unusable or the HTTP client
    /// cannot be built.
    pub fn new(config: &SyncConfig) -> SyncResult<Self> {
        let url = config.validate()?;
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| SyncError::InvalidConfig(format!("http client: {e}")))?;

        Ok(Self { client, url })
    }

    /// Returns the create endpoint URL.
    pub fn url(&self) -> &reqwest::Url {
        &self.url
    }

    async fn post_json<B: Serialize + ?Sized + Sync>(&self, body: &B) -> OriginResponse {
        let sent = self
            .client
            .post(self.url.clone())
            .header(ACCEPT, ACCEPT_ANY_JSON)
            .json(body)
            .send()
            .await;

        let response = match sent {
            Ok(response) => response,
            Err(e) => return self.transport_failure(e),
        };

        let status = response.status().as_u16();
        match response.bytes().await {
            Ok(bytes) => {
                let classified = OriginResponse::classify(status, &bytes);
                debug!(url = %self.url, status, success = classified.is_success(), "origin responded");
                classified
            }
            Err(e) => self.transport_failure(e),
        }
    }

    fn transport_failure(&self, err: reqwest::Error) -> OriginResponse {
        let message = if err.is_timeout() {
            format!("request timed out: {err}")
        } else {
            err.to_string()
        };
        warn!(url = %self.url, error = %message, "origin unreachable");
        OriginResponse::TransportFailure(message)
    }
}

#[async_trait]
impl Origin for HttpOrigin {
    async fn create(&self, payload: &Value) -> OriginResponse {
        self.post_json(payload).await
    }

    async fn create_batch(&self, payloads: &[Value]) -> OriginResponse {
        self.post_json(payloads).await
    }
}
