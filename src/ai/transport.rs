//! HTTP Transport
//!
//! The single seam between the reliability layer and the network.
//! `ReqwestTransport` is used in production; tests script their own.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::constants::network as net_constants;
use crate::types::{EwhError, Result};

/// Outbound JSON POST
#[derive(Clone)]
pub struct HttpRequest {
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Value,
}

impl HttpRequest {
    pub fn post(url: impl Into<String>, body: Value) -> Self {
        Self {
            url: url.into(),
            headers: Vec::new(),
            body,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

// Query strings and header values may carry credentials
impl std::fmt::Debug for HttpRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let path = self.url.split('?').next().unwrap_or_default();
        let header_names: Vec<&str> = self.headers.iter().map(|(n, _)| n.as_str()).collect();
        f.debug_struct("HttpRequest")
            .field("url", &path)
            .field("headers", &header_names)
            .finish_non_exhaustive()
    }
}

/// An HTTP response of any status
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpResponse {
    pub status: u16,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

/// Failure before any HTTP response arrived (DNS, connect, TLS, timeout)
#[derive(Debug, Clone, thiserror::Error)]
#[error("{0}")]
pub struct TransportError(pub String);

#[async_trait]
pub trait HttpTransport: Send + Sync {
    /// Send the request. Non-2xx statuses are `Ok`; only a missing response is `Err`.
    async fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError>;
}

/// Production transport backed by a pooled `reqwest::Client`
#[derive(Debug, Clone)]
pub struct ReqwestTransport {
    client: reqwest::Client,
}

impl ReqwestTransport {
    pub fn new(timeout: Duration) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_secs(net_constants::CONNECTION_TIMEOUT_SECS))
            .build()
            .map_err(|e| EwhError::Config(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl HttpTransport for ReqwestTransport {
    async fn send(&self, request: &HttpRequest) -> std::result::Result<HttpResponse, TransportError> {
        let mut builder = self.client.post(&request.url).json(&request.body);
        for (name, value) in &request.headers {
            builder = builder.header(name.as_str(), value.as_str());
        }

        let response = builder
            .send()
            .await
            .map_err(|e| TransportError(e.without_url().to_string()))?;

        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|e| TransportError(format!("failed to read response body: {}", e.without_url())))?;

        debug!(status, bytes = body.len(), "Received HTTP response");

        Ok(HttpResponse { status, body })
    }
}


#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_success_range() {
        assert!(HttpResponse::new(200, "").is_success());
        assert!(HttpResponse::new(204, "").is_success());
        assert!(!HttpResponse::new(302, "").is_success());
        assert!(!HttpResponse::new(429, "").is_success());
    }

    #[test]
    fn test_request_builder_keeps_header_order() {
        let request = HttpRequest::post("https://example.test", json!({}))
            .header("Authorization", "Bearer k")
            .header("X-Title", "t");
        assert_eq!(request.headers[0].0, "Authorization");
        assert_eq!(request.headers[1], ("X-Title".to_string(), "t".to_string()));
    }

    #[test]
    fn test_debug_hides_credentials() {
        let request = HttpRequest::post("https://example.test/m:gen?key=secret", json!({}))
            .header("Authorization", "Bearer secret");
        let debug = format!("{:?}", request);
        assert!(!debug.contains("secret"));
        assert!(debug.contains("Authorization"));
    }

    #[tokio::test]
    async fn test_reqwest_transport_returns_error_statuses() {
        let mut server = mockito::Server::new_async().await;
        let mock = server
            .mock("POST", "/echo")
            .match_header("x-test", "1")
            .with_status(404)
            .with_body("{\"error\":{\"message\":\"missing\"}}")
            .create_async()
            .await;

        let transport = ReqwestTransport::new(Duration::from_secs(5)).unwrap();
        let request = HttpRequest::post(format!("{}/echo", server.url()), json!({"a": 1}))
            .header("x-test", "1");
        let response = transport.send(&request).await.unwrap();

        assert_eq!(response.status, 404);
        assert!(response.body.contains("missing"));
        mock.assert_async().await;
    }

    #[tokio::test]
    async fn test_reqwest_transport_connection_failure_is_transport_error() {
        let transport = ReqwestTransport::new(Duration::from_secs(2)).unwrap();
        // Port 9 (discard) on localhost is closed in test environments
        let request = HttpRequest::post("http://127.0.0.1:9/nothing", json!({}));
        assert!(transport.send(&request).await.is_err());
    }
}
