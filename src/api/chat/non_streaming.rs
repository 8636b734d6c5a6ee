use axum::response::Response;
use futures_util::{Stream, StreamExt};

use crate::api::cors::{apply_cors, CHAT_METHODS};
use crate::error::GatewayError;
use crate::protocol::chat::{ChatChoice, ChatCompletionResponse, ChatMessage, Role};
use crate::stream::Token;
use crate::translate::RequestContext;

/// Buffered answer text plus the number of tokens it was built from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BufferedAnswer {
    pub content: String,
    pub tokens: usize,
}

/// Drain `tokens` into one answer, in arrival order.
///
/// # Errors
///
/// Returns the first stream error; any partial text is discarded.
pub async fn collect_answer<S>(tokens: S) -> Result<BufferedAnswer, GatewayError>
where
    S: Stream<Item = Result<Token, GatewayError>>,
{
    let mut tokens = std::pin::pin!(tokens);
    let mut answer = BufferedAnswer {
        content: String::new(),
        tokens: 0,
    };
    while let Some(token) = tokens.next().await {
        answer.content.push_str(&token?.text);
        answer.tokens += 1;
    }
    Ok(answer)
}

#[must_use]
pub fn completion_response(ctx: &RequestContext, content: String) -> ChatCompletionResponse {
    ChatCompletionResponse {
        id: ctx.completion_id.clone(),
        object: "chat.completion".to_string(),
        created: ctx.created,
        model: ctx.model.client.clone(),
        choices: vec![ChatChoice {
            message: ChatMessage {
                role: Role::Assistant,
                content,
            },
            index: 0,
            finish_reason: "stop".to_string(),
        }],
    }
}

/// Encode a completion as a 200 JSON response with CORS headers.
///
/// # Errors
///
/// Returns [`GatewayError::Encode`] when serialisation fails.
pub fn json_response(completion: &ChatCompletionResponse) -> Result<Response, GatewayError> {
    let body = serde_json::to_vec(completion).map_err(|err| GatewayError::Encode(err.to_string()))?;
    let mut response = Response::new(axum::body::Body::from(body));
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    apply_cors(headers, CHAT_METHODS);
    Ok(response)
}
