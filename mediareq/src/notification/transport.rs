//! Delivery boundary between agents and the outside world.
//!
//! Agents build payloads; a [`Transport`] moves them. The default transport is
//! an HTTP client with a per-request timeout. A timed-out delivery is an
//! ordinary failure; retries, when wanted, live behind the transport, never in
//! the agents.

use std::time::Duration;

use async_trait::async_trait;
#[cfg(test)]
use mockall::automock;
use url::Url;

use crate::error::{Error, Result};

/// Default per-request timeout for the HTTP transport.
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(15);

/// Payload handed to a transport.
#[derive(Debug, Clone)]
pub enum DeliveryBody {
    Json(serde_json::Value),
    Raw(Vec<u8>),
}

/// One delivery to one endpoint.
#[derive(Debug, Clone)]
pub struct DeliveryRequest {
    pub endpoint: Url,
    pub headers: Vec<(String, String)>,
    pub body: DeliveryBody,
}

impl DeliveryRequest {
    #[must_use]
    pub fn json(endpoint: Url, body: serde_json::Value) -> Self {
        Self {
            endpoint,
            headers: Vec::new(),
            body: DeliveryBody::Json(body),
        }
    }

    #[must_use]
    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// Outcome of a delivery attempt that reached the remote end.
#[derive(Debug, Clone)]
pub struct DeliveryResponse {
    pub status: u16,
    /// Response body, captured only for non-success statuses.
    pub body: Option<String>,
}

impl DeliveryResponse {
    #[must_use]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// The remote endpoint no longer exists. Push services answer 404 or 410
    /// for expired subscriptions.
    #[must_use]
    pub fn is_gone(&self) -> bool {
        self.status == 404 || self.status == 410
    }
}

/// Minimal "deliver payload to endpoint" capability injected into every agent.
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Transport: Send + Sync {
    async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryResponse>;
}

/// HTTP transport backed by a shared client.
pub struct HttpTransport {
    client: reqwest::Client,
}

impl HttpTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::transport(format!("Failed to build HTTP client: {e}")))?;
        Ok(Self { client })
    }

    pub fn with_default_timeout() -> Result<Self> {
        Self::new(DEFAULT_TIMEOUT)
    }
}

#[async_trait]
impl Transport for HttpTransport {
    async fn deliver(&self, request: DeliveryRequest) -> Result<DeliveryResponse> {
        let mut builder = self.client.post(request.endpoint.clone());
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }
        builder = match request.body {
            DeliveryBody::Json(value) => builder.json(&value),
            DeliveryBody::Raw(bytes) => builder.body(bytes),
        };

        let response = builder
            .send()
            .await
            .map_err(|e| Error::transport(format!("Delivery to {} failed: {e}", request.endpoint)))?;

        let status = response.status();
        let body = if status.is_success() {
            None
        } else {
            Some(response.text().await.unwrap_or_default())
        };

        Ok(DeliveryResponse {
            status: status.as_u16(),
            body,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn success_and_gone_classification() {
        let ok = DeliveryResponse {
            status: 204,
            body: None,
        };
        assert!(ok.is_success());
        assert!(!ok.is_gone());

        let gone = DeliveryResponse {
            status: 410,
            body: Some("gone".to_string()),
        };
        assert!(!gone.is_success());
        assert!(gone.is_gone());

        let throttled = DeliveryResponse {
            status: 429,
            body: None,
        };
        assert!(!throttled.is_success());
        assert!(!throttled.is_gone());
    }

    #[test]
    fn request_builder_accumulates_headers() {
        let request = DeliveryRequest::json(
            Url::parse("https://example.com/hook").unwrap(),
            serde_json::json!({"ok": true}),
        )
        .with_header("Authorization", "Bearer token");
        assert_eq!(request.headers.len(), 1);
        assert_eq!(request.headers[0].0, "Authorization");
    }
}
