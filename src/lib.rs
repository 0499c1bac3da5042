//! chat-relay - a credential-guarding relay for chat completions
//!
//! The relay exposes a single endpoint that accepts a chat request, attaches
//! the upstream API key, forwards the call to the DeepSeek completions
//! endpoint, and hands the upstream JSON back to the caller. The key stays on
//! the server; the untrusted client (a browser extension) never sees it.

use axum::Router;
use axum::routing::{get, post};
use bon::Builder;
use std::sync::Arc;
use std::time::Duration;
use tower_http::cors::CorsLayer;
use tracing::{info, instrument};
use url::Url;

pub mod auth;
pub mod client;
pub mod errors;
pub mod handlers;
pub mod models;

use auth::ApiKey;
use client::HttpClient;
use handlers::{chat_completion, health};

/// Process-wide read-only relay settings, built once at startup and never
/// mutated afterwards. Safe for unsynchronized concurrent reads.
#[derive(Debug, Clone, Builder)]
pub struct RelayConfig {
    /// The upstream chat-completions endpoint.
    pub upstream_url: Url,
    /// The model name injected into every outbound body.
    pub upstream_model: String,
    /// The bearer credential attached to every outbound request.
    pub api_key: ApiKey,
    /// Upstream timeout, connect and full response receipt combined.
    #[builder(default = Duration::from_secs(30))]
    pub upstream_timeout: Duration,
}

/// The main application state containing the HTTP client and relay settings
#[derive(Clone, Debug)]
pub struct AppState<T: HttpClient> {
    pub http_client: T,
    pub relay: Arc<RelayConfig>,
}

impl<T: HttpClient> AppState<T> {
    /// Create a new AppState with the given HTTP client (the hyper client in
    /// production, a mock in tests)
    pub fn with_client(relay: RelayConfig, http_client: T) -> Self {
        Self {
            http_client,
            relay: Arc::new(relay),
        }
    }
}

/// Build the relay router.
/// Routes:
/// - `POST /api/chat` - the relay endpoint
/// - `GET /health` - liveness probe
///
/// The CORS layer mirrors the request origin and allows credentials: the
/// caller is a browser extension, so any origin must be able to reach the
/// relay. Deployments with a known origin should tighten this.
#[instrument(skip(state))]
pub fn build_router<T: HttpClient + Clone + Send + Sync + 'static>(state: AppState<T>) -> Router {
    info!("Building router");
    Router::new()
        .route("/api/chat", post(chat_completion))
        .route("/health", get(health))
        .layer(CorsLayer::very_permissive())
        .with_state(state)
}

/// Test doubles for the outbound client, public so integration tests can
/// drive the router without a network.
pub mod test_utils {
    use super::client::HttpClient;
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    type ResponseBuilder =
        Arc<dyn Fn(&MockRequest) -> Result<axum::response::Response, String> + Send + Sync>;

    /// Records every outbound request and answers with a canned response.
    pub struct MockHttpClient {
        pub requests: Arc<Mutex<Vec<MockRequest>>>,
        response_builder: ResponseBuilder,
        delay: Option<Duration>,
    }

    #[derive(Debug, Clone)]
    pub struct MockRequest {
        pub method: String,
        pub uri: String,
        pub headers: Vec<(String, String)>,
        pub body: Vec<u8>,
    }

    impl MockHttpClient {
        /// Always answers with the given status and body.
        pub fn new(status: StatusCode, body: &str) -> Self {
            let body = body.to_string();
            Self::with_builder(Arc::new(move |_| {
                Ok(axum::response::Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(body.clone()))
                    .unwrap())
            }))
        }

        /// Answers by echoing the outbound body back, so concurrent callers
        /// can tell their responses apart.
        pub fn new_echo(status: StatusCode) -> Self {
            Self::with_builder(Arc::new(move |req: &MockRequest| {
                Ok(axum::response::Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(axum::body::Body::from(req.body.clone()))
                    .unwrap())
            }))
        }

        /// Answers immediately with response headers, then streams the body
        /// one chunk at a time with the given pause before each chunk. For
        /// tests that need the body read, not the dispatch, to be the slow
        /// part.
        pub fn new_streaming(status: StatusCode, chunks: Vec<String>, chunk_delay: Duration) -> Self {
            Self::with_builder(Arc::new(move |_| {
                use axum::body::Body;
                use futures_util::stream;

                let chunks = chunks.clone();
                let stream = stream::unfold(chunks.into_iter(), move |mut iter| async move {
                    let chunk = iter.next()?;
                    tokio::time::sleep(chunk_delay).await;
                    Some((Ok::<_, std::io::Error>(chunk.into_bytes()), iter))
                });

                Ok(axum::response::Response::builder()
                    .status(status)
                    .header("content-type", "application/json")
                    .body(Body::from_stream(stream))
                    .unwrap())
            }))
        }

        /// Fails every request with a transport-level error.
        pub fn new_transport_error(message: &str) -> Self {
            let message = message.to_string();
            Self::with_builder(Arc::new(move |_| Err(message.clone())))
        }

        /// Sleep this long before answering, for timeout tests.
        pub fn with_delay(mut self, delay: Duration) -> Self {
            self.delay = Some(delay);
            self
        }

        fn with_builder(response_builder: ResponseBuilder) -> Self {
            Self {
                requests: Arc::new(Mutex::new(Vec::new())),
                response_builder,
                delay: None,
            }
        }

        pub fn get_requests(&self) -> Vec<MockRequest> {
            self.requests.lock().unwrap().clone()
        }
    }

    impl std::fmt::Debug for MockHttpClient {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.debug_struct("MockHttpClient")
                .field("requests", &self.requests)
                .field("response_builder", &"<closure>")
                .field("delay", &self.delay)
                .finish()
        }
    }

    impl Clone for MockHttpClient {
        fn clone(&self) -> Self {
            Self {
                requests: Arc::clone(&self.requests),
                response_builder: Arc::clone(&self.response_builder),
                delay: self.delay,
            }
        }
    }

    #[async_trait]
    impl HttpClient for MockHttpClient {
        async fn request(
            &self,
            req: axum::extract::Request,
        ) -> Result<axum::response::Response, Box<dyn std::error::Error + Send + Sync>> {
            let method = req.method().to_string();
            let uri = req.uri().to_string();
            let headers = req
                .headers()
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_str().unwrap_or("").to_string()))
                .collect();

            let body = axum::body::to_bytes(req.into_body(), usize::MAX)
                .await
                .map_err(|e| Box::new(e) as Box<dyn std::error::Error + Send + Sync>)?
                .to_vec();

            let mock_request = MockRequest {
                method,
                uri,
                headers,
                body,
            };
            self.requests.lock().unwrap().push(mock_request.clone());

            if let Some(delay) = self.delay {
                tokio::time::sleep(delay).await;
            }

            (self.response_builder)(&mock_request).map_err(|message| {
                Box::new(std::io::Error::other(message))
                    as Box<dyn std::error::Error + Send + Sync>
            })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;
    use axum_test::TestServer;
    use serde_json::json;
    use test_utils::MockHttpClient;

    fn test_relay_config() -> RelayConfig {
        RelayConfig::builder()
            .upstream_url(
                "https://api.deepseek.com/v1/chat/completions"
                    .parse()
                    .unwrap(),
            )
            .upstream_model("deepseek-chat".to_string())
            .api_key(ApiKey::from("sk-test-key".to_string()))
            .build()
    }

    #[tokio::test]
    async fn test_valid_request_is_forwarded_with_credential() {
        let mock_client = MockHttpClient::new(StatusCode::OK, r#"{"id":"x","choices":[]}"#);
        let app_state = AppState::with_client(test_relay_config(), mock_client.clone());
        let server = TestServer::new(build_router(app_state)).unwrap();

        let response = server
            .post("/api/chat")
            .json(&json!({
                "messages": [{"role": "user", "content": "Hello"}],
                "temperature": 0.7,
                "max_tokens": 128
            }))
            .await;

        assert_eq!(response.status_code(), 200);

        let requests = mock_client.get_requests();
        assert_eq!(requests.len(), 1);
        let request = &requests[0];

        assert_eq!(request.method, "POST");
        assert_eq!(
            request.uri,
            "https://api.deepseek.com/v1/chat/completions"
        );

        let auth_header = request
            .headers
            .iter()
            .find(|(key, _)| key == "authorization")
            .map(|(_, value)| value);
        assert_eq!(auth_header, Some(&"Bearer sk-test-key".to_string()));

        let content_type = request
            .headers
            .iter()
            .find(|(key, _)| key == "content-type")
            .map(|(_, value)| value);
        assert_eq!(content_type, Some(&"application/json".to_string()));

        let forwarded: serde_json::Value = serde_json::from_slice(&request.body).unwrap();
        assert_eq!(forwarded["model"], "deepseek-chat");
        assert_eq!(forwarded["messages"][0]["role"], "user");
        assert_eq!(forwarded["messages"][0]["content"], "Hello");
        assert_eq!(forwarded["temperature"], 0.7);
        assert_eq!(forwarded["max_tokens"], 128);
    }

    #[tokio::test]
    async fn test_defaults_applied_when_sampling_fields_absent() {
        let mock_client = MockHttpClient::new(StatusCode::OK, "{}");
        let app_state = AppState::with_client(test_relay_config(), mock_client.clone());
        let server = TestServer::new(build_router(app_state)).unwrap();

        let response = server
            .post("/api/chat")
            .json(&json!({
                "messages": [{"role": "user", "content": "Hello"}]
            }))
            .await;

        assert_eq!(response.status_code(), 200);

        let requests = mock_client.get_requests();
        assert_eq!(requests.len(), 1);
        let forwarded: serde_json::Value = serde_json::from_slice(&requests[0].body).unwrap();
        assert_eq!(forwarded["temperature"], 0.3);
        assert_eq!(forwarded["max_tokens"], 500);
    }

    #[tokio::test]
    async fn test_upstream_response_passes_through_verbatim() {
        let upstream_body =
            r#"{"id":"cmpl-1","choices":[{"message":{"role":"assistant","content":"Hi!"}}]}"#;
        let mock_client = MockHttpClient::new(StatusCode::OK, upstream_body);
        let app_state = AppState::with_client(test_relay_config(), mock_client);
        let server = TestServer::new(build_router(app_state)).unwrap();

        let response = server
            .post("/api/chat")
            .json(&json!({
                "messages": [{"role": "user", "content": "Hello"}]
            }))
            .await;

        assert_eq!(response.status_code(), 200);
        let body: serde_json::Value = response.json();
        assert_eq!(body, serde_json::from_str::<serde_json::Value>(upstream_body).unwrap());
    }

    #[tokio::test]
    async fn test_empty_role_rejected_before_any_upstream_call() {
        let mock_client = MockHttpClient::new(StatusCode::OK, "{}");
        let app_state = AppState::with_client(test_relay_config(), mock_client.clone());
        let server = TestServer::new(build_router(app_state)).unwrap();

        let response = server
            .post("/api/chat")
            .json(&json!({
                "messages": [{"role": "", "content": "Hello"}]
            }))
            .await;

        assert_eq!(response.status_code(), 422);
        let body: serde_json::Value = response.json();
        assert!(body["detail"][0].as_str().unwrap().contains("role"));
        assert_eq!(mock_client.get_requests().len(), 0);
    }

    #[tokio::test]
    async fn test_empty_messages_list_rejected() {
        let mock_client = MockHttpClient::new(StatusCode::OK, "{}");
        let app_state = AppState::with_client(test_relay_config(), mock_client.clone());
        let server = TestServer::new(build_router(app_state)).unwrap();

        let response = server.post("/api/chat").json(&json!({ "messages": [] })).await;

        assert_eq!(response.status_code(), 422);
        assert_eq!(mock_client.get_requests().len(), 0);
    }

    #[tokio::test]
    async fn test_upstream_error_status_translated_to_500() {
        let mock_client =
            MockHttpClient::new(StatusCode::TOO_MANY_REQUESTS, r#"{"error":"rate limited"}"#);
        let app_state = AppState::with_client(test_relay_config(), mock_client);
        let server = TestServer::new(build_router(app_state)).unwrap();

        let response = server
            .post("/api/chat")
            .json(&json!({
                "messages": [{"role": "user", "content": "Hello"}]
            }))
            .await;

        assert_eq!(response.status_code(), 500);
        let body: serde_json::Value = response.json();
        assert!(body["detail"].as_str().unwrap().contains("429"));
    }

    #[tokio::test]
    async fn test_health_endpoint() {
        let mock_client = MockHttpClient::new(StatusCode::OK, "{}");
        let app_state = AppState::with_client(test_relay_config(), mock_client);
        let server = TestServer::new(build_router(app_state)).unwrap();

        let response = server.get("/health").await;
        assert_eq!(response.status_code(), 200);
        let body: serde_json::Value = response.json();
        assert_eq!(body["status"], "ok");
    }
}
