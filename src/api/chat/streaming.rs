use std::convert::Infallible;
use std::time::Instant;

use axum::body::Body;
use axum::response::Response;
use bytes::Bytes;
use futures_util::{Stream, StreamExt};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

use crate::api::cors::{apply_cors, CHAT_METHODS};
use crate::error::GatewayError;
use crate::observability::log_request_complete;
use crate::protocol::chat::{ChatCompletionChunk, ChunkChoice, Delta};
use crate::stream::Token;
use crate::translate::RequestContext;

const DONE_FRAME: &[u8] = b"data: [DONE]\n\n";

/// Frames in flight between the decode loop and the client body. One slot
/// means the loop only pulls the next token once the previous frame was taken.
const FRAME_CHANNEL_CAPACITY: usize = 1;

/// Why a streaming response stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamEnd {
    UpstreamClosed,
    UpstreamFailed,
    ClientDisconnected,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamOutcome {
    pub chunks: usize,
    pub end: StreamEnd,
}

#[must_use]
pub fn completion_chunk(ctx: &RequestContext, content: &str, finish_reason: &str) -> ChatCompletionChunk {
    ChatCompletionChunk {
        id: ctx.completion_id.clone(),
        object: "chat.completion.chunk".to_string(),
        created: ctx.created,
        model: ctx.model.client.clone(),
        choices: vec![ChunkChoice {
            delta: Delta {
                content: content.to_string(),
            },
            index: 0,
            finish_reason: finish_reason.to_string(),
        }],
    }
}

/// Encode one chunk as a `data: <json>\n\n` frame.
///
/// # Errors
///
/// Returns [`GatewayError::Encode`] when serialisation fails.
pub fn encode_chunk_frame(chunk: &ChatCompletionChunk) -> Result<Bytes, GatewayError> {
    let json = serde_json::to_vec(chunk).map_err(|err| GatewayError::Encode(err.to_string()))?;
    let mut frame = Vec::with_capacity(json.len() + 8);
    frame.extend_from_slice(b"data: ");
    frame.extend_from_slice(&json);
    frame.extend_from_slice(b"\n\n");
    Ok(Bytes::from(frame))
}

/// Forward each token as one chunk frame into `frames`.
///
/// Each frame is handed over before the next token is pulled. A closed
/// receiver, observed either while waiting on the upstream or on send, ends
/// the loop and drops `tokens` (and with it the upstream body).
pub async fn pump_chunks<S>(
    ctx: &RequestContext,
    tokens: S,
    frames: mpsc::Sender<Bytes>,
    done_marker: bool,
) -> StreamOutcome
where
    S: Stream<Item = Result<Token, GatewayError>>,
{
    let mut tokens = std::pin::pin!(tokens);
    let mut chunks = 0;

    loop {
        let next = tokio::select! {
            biased;
            () = frames.closed() => {
                return StreamOutcome { chunks, end: StreamEnd::ClientDisconnected };
            }
            next = tokens.next() => next,
        };

        let token = match next {
            Some(Ok(token)) => token,
            Some(Err(err)) => {
                tracing::warn!(error = %err, chunks, "upstream stream failed mid-response");
                return StreamOutcome {
                    chunks,
                    end: StreamEnd::UpstreamFailed,
                };
            }
            None => break,
        };

        let frame = match encode_chunk_frame(&completion_chunk(ctx, &token.text, "")) {
            Ok(frame) => frame,
            Err(err) => {
                tracing::warn!(error = %err, "dropping unencodable stream chunk");
                continue;
            }
        };
        if frames.send(frame).await.is_err() {
            return StreamOutcome {
                chunks,
                end: StreamEnd::ClientDisconnected,
            };
        }
        chunks += 1;
    }

    if done_marker {
        let closing = encode_chunk_frame(&completion_chunk(ctx, "", "stop"));
        let sent = match closing {
            Ok(frame) => frames.send(frame).await.is_ok(),
            Err(_) => true,
        };
        if !sent || frames.send(Bytes::from_static(DONE_FRAME)).await.is_err() {
            return StreamOutcome {
                chunks,
                end: StreamEnd::ClientDisconnected,
            };
        }
    }

    StreamOutcome {
        chunks,
        end: StreamEnd::UpstreamClosed,
    }
}

/// Start the decode loop on its own task and return the `text/event-stream`
/// response that drains it.
#[must_use]
pub fn sse_response<S>(ctx: RequestContext, tokens: S, done_marker: bool, start: Instant) -> Response
where
    S: Stream<Item = Result<Token, GatewayError>> + Send + 'static,
{
    let (tx, rx) = mpsc::channel::<Bytes>(FRAME_CHANNEL_CAPACITY);

    tokio::spawn(async move {
        let outcome = pump_chunks(&ctx, tokens, tx, done_marker).await;
        if outcome.end == StreamEnd::ClientDisconnected {
            tracing::debug!(
                id = %ctx.completion_id,
                chunks = outcome.chunks,
                "client disconnected, upstream stream abandoned"
            );
        }
        log_request_complete(&ctx.model.client, true, outcome.chunks, start);
    });

    let body = Body::from_stream(ReceiverStream::new(rx).map(Ok::<_, Infallible>));
    let mut response = Response::new(body);
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("text/event-stream"),
    );
    headers.insert(
        http::header::CACHE_CONTROL,
        http::HeaderValue::from_static("no-cache"),
    );
    headers.insert(
        http::header::CONNECTION,
        http::HeaderValue::from_static("keep-alive"),
    );
    apply_cors(headers, CHAT_METHODS);
    response
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::mapping::ResolvedModel;

    fn ctx() -> RequestContext {
        RequestContext::new(
            "chatcmpl-s".into(),
            1_700_000_000,
            ResolvedModel {
                upstream: "claude_3_opus".into(),
                client: "claude-3-opus".into(),
            },
            true,
        )
    }

    fn tokens(texts: &[&str]) -> Vec<Result<Token, GatewayError>> {
        texts
            .iter()
            .map(|t| Ok(Token { text: (*t).into() }))
            .collect()
    }

    fn frame_json(frame: &[u8]) -> serde_json::Value {
        let text = std::str::from_utf8(frame).unwrap();
        let json = text
            .strip_prefix("data: ")
            .and_then(|rest| rest.strip_suffix("\n\n"))
            .unwrap();
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_chunk_frame_shape() {
        let frame = encode_chunk_frame(&completion_chunk(&ctx(), "Hel", "")).unwrap();
        assert_eq!(
            frame_json(&frame),
            serde_json::json!({
                "id": "chatcmpl-s",
                "object": "chat.completion.chunk",
                "created": 1_700_000_000,
                "model": "claude-3-opus",
                "choices": [{"delta": {"content": "Hel"}, "index": 0, "finish_reason": ""}]
            })
        );
    }

    #[tokio::test]
    async fn test_one_frame_per_token() {
        let (tx, mut rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let ctx = ctx();
        let pump = tokio::spawn(async move {
            pump_chunks(
                &ctx,
                futures_util::stream::iter(tokens(&["a", "b", "c"])),
                tx,
                false,
            )
            .await
        });

        let mut contents = Vec::new();
        while let Some(frame) = rx.recv().await {
            contents.push(frame_json(&frame)["choices"][0]["delta"]["content"].clone());
        }
        assert_eq!(contents, vec!["a", "b", "c"]);
        let outcome = pump.await.unwrap();
        assert_eq!(outcome.chunks, 3);
        assert_eq!(outcome.end, StreamEnd::UpstreamClosed);
    }

    #[tokio::test]
    async fn test_done_marker() {
        let (tx, mut rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let ctx = ctx();
        let pump = tokio::spawn(async move {
            pump_chunks(&ctx, futures_util::stream::iter(tokens(&["x"])), tx, true).await
        });

        let mut frames = Vec::new();
        while let Some(frame) = rx.recv().await {
            frames.push(frame);
        }
        assert_eq!(frames.len(), 3);
        assert_eq!(frame_json(&frames[1])["choices"][0]["finish_reason"], "stop");
        assert_eq!(&frames[2][..], DONE_FRAME);
        assert_eq!(pump.await.unwrap().chunks, 1);
    }

    #[tokio::test]
    async fn test_upstream_failure_stops_without_marker() {
        let (tx, mut rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        let ctx = ctx();
        let mut items = tokens(&["a"]);
        items.push(Err(GatewayError::UpstreamRead("reset".into())));
        let pump = tokio::spawn(async move {
            pump_chunks(&ctx, futures_util::stream::iter(items), tx, true).await
        });

        let mut frames = 0;
        while rx.recv().await.is_some() {
            frames += 1;
        }
        assert_eq!(frames, 1);
        assert_eq!(pump.await.unwrap().end, StreamEnd::UpstreamFailed);
    }

    #[tokio::test]
    async fn test_client_disconnect_while_upstream_idle() {
        let (tx, rx) = mpsc::channel(FRAME_CHANNEL_CAPACITY);
        drop(rx);
        let ctx = ctx();
        let outcome = pump_chunks(
            &ctx,
            futures_util::stream::pending::<Result<Token, GatewayError>>(),
            tx,
            false,
        )
        .await;
        assert_eq!(outcome.end, StreamEnd::ClientDisconnected);
        assert_eq!(outcome.chunks, 0);
    }
}
