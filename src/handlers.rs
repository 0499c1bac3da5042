/// Axum handlers for the relay server
use crate::AppState;
use crate::client::HttpClient;
use crate::errors::RelayError;
use crate::models::{ChatRequest, UpstreamChatRequest};
use axum::{
    Json,
    extract::State,
    http::{Method, StatusCode, Uri, header},
    response::{IntoResponse, Response},
};
use tracing::{debug, error, info, instrument};

/// The relay endpoint: validate the inbound body, attach the credential,
/// forward to the upstream completions endpoint, and hand the upstream JSON
/// back verbatim. Exactly one outbound call per inbound call, no retries.
#[instrument(skip(state, chat))]
pub async fn chat_completion<T: HttpClient>(
    State(state): State<AppState<T>>,
    Json(chat): Json<ChatRequest>,
) -> Result<Response, RelayError> {
    chat.validate().map_err(RelayError::MalformedRequest)?;

    // Log counts only: message contents never reach the logs.
    debug!(
        messages = chat.messages.len(),
        temperature = chat.temperature,
        max_tokens = chat.max_tokens,
        "Relaying chat request"
    );

    let payload = UpstreamChatRequest {
        model: &state.relay.upstream_model,
        messages: &chat.messages,
        temperature: chat.temperature,
        max_tokens: chat.max_tokens,
    };
    let body = serde_json::to_vec(&payload)
        .map_err(|e| RelayError::Upstream(format!("failed to serialize upstream body: {e}")))?;

    let upstream_uri = Uri::try_from(state.relay.upstream_url.as_str())
        .map_err(|e| RelayError::Upstream(format!("invalid upstream url: {e}")))?;

    let mut req = axum::http::Request::builder()
        .method(Method::POST)
        .uri(upstream_uri)
        .header(header::CONTENT_TYPE, "application/json")
        .body(axum::body::Body::from(body))
        .map_err(|e| RelayError::Upstream(format!("failed to build upstream request: {e}")))?;

    req.headers_mut().insert(
        header::AUTHORIZATION,
        format!("Bearer {}", state.relay.api_key.expose())
            .parse()
            .map_err(|_| {
                RelayError::Upstream("credential is not a valid header value".to_string())
            })?,
    );

    // One deadline covers the whole exchange: dispatch, response headers,
    // and the full body read. An upstream that answers promptly but trickles
    // its body must still unwind at the timeout.
    let timeout = state.relay.upstream_timeout;
    let exchange = async {
        let response = state
            .http_client
            .request(req)
            .await
            .map_err(|e| RelayError::Upstream(format!("upstream transport failure: {e}")))?;
        let status = response.status();
        let body_bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .map_err(|e| RelayError::Upstream(format!("failed to read upstream body: {e}")))?;
        Ok::<_, RelayError>((status, body_bytes))
    };
    let (status, body_bytes) = match tokio::time::timeout(timeout, exchange).await {
        Ok(Ok(outcome)) => outcome,
        Ok(Err(e)) => {
            error!("{e}");
            return Err(e);
        }
        Err(_) => {
            error!("Upstream request timed out after {timeout:?}");
            return Err(RelayError::Upstream(format!(
                "upstream request timed out after {timeout:?}"
            )));
        }
    };

    if !status.is_success() {
        error!("Upstream returned status {status}");
        return Err(RelayError::Upstream(format!(
            "upstream returned status {status}"
        )));
    }

    // The success contract is a JSON passthrough; a 2xx body that isn't JSON
    // is an upstream failure. The bytes themselves are forwarded untouched so
    // the caller sees exactly what the upstream sent.
    serde_json::from_slice::<serde_json::Value>(&body_bytes)
        .map_err(|e| RelayError::Upstream(format!("upstream returned a non-JSON body: {e}")))?;

    info!(status = %status, bytes = body_bytes.len(), "Upstream call succeeded");
    Ok((
        StatusCode::OK,
        [(header::CONTENT_TYPE, "application/json")],
        body_bytes,
    )
        .into_response())
}

/// Liveness probe.
pub async fn health() -> impl IntoResponse {
    Json(serde_json::json!({ "status": "ok" }))
}
