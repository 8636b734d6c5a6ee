pub mod non_streaming;
pub mod streaming;

use std::sync::Arc;
use std::time::Instant;

use axum::http::HeaderMap;
use axum::response::{IntoResponse, Response};

use crate::auth::extract_bearer_token;
use crate::error::GatewayError;
use crate::observability::log_request_complete;
use crate::protocol::chat::ChatCompletionRequest;
use crate::state::AppState;
use crate::stream::token_stream;
use crate::translate::project_history;
use crate::transport::CallMode;

/// `POST /v1/chat/completions` and its aliases.
pub async fn handler(state: Arc<AppState>, headers: HeaderMap, body: bytes::Bytes) -> Response {
    match handler_inner(state, headers, body).await {
        Ok(response) => response,
        Err(err) => {
            match &err {
                GatewayError::Auth | GatewayError::InvalidRequest(_) => {
                    tracing::debug!(error = %err, "rejected chat completion request");
                }
                _ => tracing::warn!(error = %err, "chat completion failed"),
            }
            err.into_response()
        }
    }
}

async fn handler_inner(
    state: Arc<AppState>,
    headers: HeaderMap,
    body: bytes::Bytes,
) -> Result<Response, GatewayError> {
    let start = Instant::now();
    let session_token = extract_bearer_token(&headers)?;
    let request: ChatCompletionRequest = serde_json::from_slice(&body)
        .map_err(|err| GatewayError::InvalidRequest(err.to_string()))?;

    let history = project_history(&request.messages)?;
    let ctx = state.request_context(&request.model, request.stream);
    let upstream_request = state
        .upstream
        .build_request(&ctx, &history, session_token)?;

    tracing::info!(
        id = %ctx.completion_id,
        model = %request.model,
        upstream_model = %ctx.model.upstream,
        stream = ctx.stream,
        past_turns = history.past_chat_length,
        "chat completion request"
    );

    if ctx.stream {
        let upstream = state
            .transport
            .send(upstream_request, CallMode::Streaming)
            .await?;
        let tokens = token_stream(upstream.bytes_stream());
        return Ok(streaming::sse_response(
            ctx,
            tokens,
            state.config.features.stream_done_marker,
            start,
        ));
    }

    let upstream = state
        .transport
        .send(upstream_request, CallMode::Buffered)
        .await?;
    let answer = non_streaming::collect_answer(token_stream(upstream.bytes_stream())).await?;
    let completion = non_streaming::completion_response(&ctx, answer.content);
    let response = non_streaming::json_response(&completion)?;
    log_request_complete(&ctx.model.client, false, answer.tokens, start);
    Ok(response)
}
