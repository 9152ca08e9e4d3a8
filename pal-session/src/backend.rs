//! Client for the answering service.
//!
//! The service is reached only through two endpoints:
//! - `POST /chat` with a [`ChatRequest`], answered by a [`ChatResponse`]
//! - `GET /health`, a liveness probe fired once at startup
//!
//! # Example
//!
//! ```rust,ignore
//! use pal_session::backend::{Backend, HttpBackend};
//!
//! let backend = HttpBackend::new("http://localhost:8000")?;
//! let response = backend.chat(&request).await?;
//! ```

use std::fmt;

use async_trait::async_trait;
use thiserror::Error;

use crate::types::{ChatRequest, ChatResponse};

/// Error type for backend exchanges.
#[derive(Error, Debug)]
pub enum BackendError {
    /// The exchange could not be completed
    #[error("Transport error: {0}")]
    Transport(String),

    /// The service answered with a non-success status
    #[error("Server error: {status} - {message}")]
    Server { status: u16, message: String },

    /// The response body did not match the expected structure
    #[error("Failed to parse response: {0}")]
    Parse(String),
}

impl BackendError {
    pub const fn kind(&self) -> FailureKind {
        match self {
            Self::Transport(_) => FailureKind::Transport,
            Self::Server { .. } => FailureKind::Server,
            Self::Parse(_) => FailureKind::Parse,
        }
    }
}

/// Diagnostic category of a failed exchange.
///
/// Only used for logging; users see one generic failure message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FailureKind {
    Transport,
    Server,
    Parse,
}

impl FailureKind {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Transport => "transport",
            Self::Server => "server",
            Self::Parse => "parse",
        }
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result type for backend exchanges.
pub type Result<T> = std::result::Result<T, BackendError>;

/// The answering service as seen by the session.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Ask a question with the conversation so far.
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse>;

    /// Liveness probe.
    async fn health(&self) -> Result<()> {
        Ok(())
    }
}

#[async_trait]
impl<T: Backend + ?Sized> Backend for std::sync::Arc<T> {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        (**self).chat(request).await
    }

    async fn health(&self) -> Result<()> {
        (**self).health().await
    }
}

/// HTTP client for the answering service.
#[derive(Clone)]
pub struct HttpBackend {
    endpoint: String,
    client: reqwest::Client,
}

impl HttpBackend {
    /// Create a client pointing at the service base URL, e.g. `http://localhost:8000`.
    ///
    /// No request timeout is configured: an unanswered request stays pending.
    pub fn new(endpoint: &str) -> Result<Self> {
        let client = reqwest::Client::builder()
            .build()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(Self::with_client(endpoint, client))
    }

    /// Create a client with a custom reqwest client.
    pub fn with_client(endpoint: &str, client: reqwest::Client) -> Self {
        let endpoint = endpoint.trim_end_matches('/').to_string();
        Self { endpoint, client }
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    async fn error_for_status(response: reqwest::Response) -> BackendError {
        let status = response.status().as_u16();
        let message = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        BackendError::Server { status, message }
    }
}

impl fmt::Debug for HttpBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HttpBackend")
            .field("endpoint", &self.endpoint)
            .finish()
    }
}

#[async_trait]
impl Backend for HttpBackend {
    async fn chat(&self, request: &ChatRequest) -> Result<ChatResponse> {
        let url = format!("{}/chat", self.endpoint);

        let response = self
            .client
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }

        let body = response
            .text()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        serde_json::from_str(&body).map_err(|e| BackendError::Parse(e.to_string()))
    }

    async fn health(&self) -> Result<()> {
        let url = format!("{}/health", self.endpoint);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .map_err(|e| BackendError::Transport(e.to_string()))?;

        if !response.status().is_success() {
            return Err(Self::error_for_status(response).await);
        }
        Ok(())
    }
}

/// Run the liveness probe and log the outcome. Never fails.
pub async fn probe_health<B: Backend + ?Sized>(backend: &B) -> bool {
    match backend.health().await {
        Ok(()) => {
            tracing::info!("Answering service is healthy");
            true
        }
        Err(e @ BackendError::Server { .. }) => {
            tracing::warn!(error = %e, "API health check failed");
            false
        }
        Err(e) => {
            tracing::error!(kind = %e.kind(), error = %e, "Cannot connect to API");
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use wiremock::matchers::{body_partial_json, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn request(query: &str) -> ChatRequest {
        ChatRequest {
            query: query.to_string(),
            conversation_history: Vec::new(),
        }
    }

    #[test]
    fn error_kinds() {
        assert_eq!(
            BackendError::Transport("refused".into()).kind(),
            FailureKind::Transport
        );
        assert_eq!(
            BackendError::Server {
                status: 500,
                message: "boom".into()
            }
            .kind(),
            FailureKind::Server
        );
        assert_eq!(BackendError::Parse("eof".into()).kind(), FailureKind::Parse);
        assert_eq!(FailureKind::Parse.to_string(), "parse");
    }

    #[test]
    fn endpoint_trailing_slash_trimmed() {
        let backend = HttpBackend::new("http://localhost:8000/").unwrap();
        assert_eq!(backend.endpoint(), "http://localhost:8000");
    }

    #[tokio::test]
    async fn chat_success() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .and(body_partial_json(json!({"query": "What is the refund policy?"})))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "answer": "Refunds are issued within 30 days.",
                "sources": [
                    {"title": "Refunds", "section_id": "4.2", "chunk_id": "c-17", "relevance": 0.91}
                ],
                "rephrased_query": null
            })))
            .expect(1)
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri()).unwrap();
        let response = backend.chat(&request("What is the refund policy?")).await.unwrap();

        assert_eq!(response.answer, "Refunds are issued within 30 days.");
        assert_eq!(response.sources.len(), 1);
        assert_eq!(response.sources[0].relevance_percent(), 91);
    }

    #[tokio::test]
    async fn chat_server_error() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(500).set_body_string("RAG pipeline not initialized"))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri()).unwrap();
        let err = backend.chat(&request("q")).await.unwrap_err();

        match err {
            BackendError::Server { status, message } => {
                assert_eq!(status, 500);
                assert!(message.contains("not initialized"));
            }
            other => panic!("expected server error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn chat_malformed_body() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/chat"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "ok"})))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri()).unwrap();
        let err = backend.chat(&request("q")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Parse);
    }

    #[tokio::test]
    async fn chat_connection_refused() {
        // Bind then drop a listener to get a port nothing listens on.
        let port = {
            let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
            listener.local_addr().unwrap().port()
        };
        let backend = HttpBackend::new(&format!("http://127.0.0.1:{port}")).unwrap();

        let err = backend.chat(&request("q")).await.unwrap_err();
        assert_eq!(err.kind(), FailureKind::Transport);
    }

    #[tokio::test]
    async fn health_probe() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({"status": "healthy"})))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri()).unwrap();
        assert!(backend.health().await.is_ok());
        assert!(probe_health(&backend).await);
    }

    #[tokio::test]
    async fn health_probe_failure_is_not_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/health"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let backend = HttpBackend::new(&server.uri()).unwrap();
        assert!(!probe_health(&backend).await);
    }
}
