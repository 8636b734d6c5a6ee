use std::collections::VecDeque;
use std::fmt::Display;

use futures_util::{Stream, StreamExt};

use crate::error::GatewayError;
use crate::protocol::youchat::{TokenPayload, DATA_PREFIX, TOKEN_EVENT_MARKER};

use super::lines::LineSplitter;

/// One incremental fragment of answer text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Token {
    pub text: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum DecodeState {
    #[default]
    ScanningForEvent,
    /// A token marker was seen; the next line is its data line.
    ExpectingData,
}

/// How a decode run ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct DecodeSummary {
    pub tokens: usize,
    pub dropped: usize,
    /// The stream ended right after a token marker.
    pub truncated: bool,
}

/// Two-state decoder that pairs token event lines with their data lines.
#[derive(Debug, Default)]
pub struct TokenDecoder {
    state: DecodeState,
    summary: DecodeSummary,
}

impl TokenDecoder {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn state(&self) -> DecodeState {
        self.state
    }

    /// Advance by one line. Returns a token when `line` completes a
    /// well-formed event/data pair.
    pub fn push_line(&mut self, line: &str) -> Option<Token> {
        match self.state {
            DecodeState::ScanningForEvent => {
                if line.starts_with(TOKEN_EVENT_MARKER) {
                    self.state = DecodeState::ExpectingData;
                }
                None
            }
            DecodeState::ExpectingData => {
                self.state = DecodeState::ScanningForEvent;
                if let Some(token) = parse_data_line(line) {
                    self.summary.tokens += 1;
                    Some(token)
                } else {
                    self.summary.dropped += 1;
                    tracing::debug!(line, "dropping malformed youChatToken data line");
                    None
                }
            }
        }
    }

    /// End of input. A marker still waiting for its data line is recorded as
    /// a truncation, not an error.
    pub fn finish(&mut self) -> DecodeSummary {
        if self.state == DecodeState::ExpectingData {
            self.summary.truncated = true;
            self.state = DecodeState::ScanningForEvent;
            tracing::debug!("upstream stream ended between token event and data line");
        }
        self.summary
    }
}

/// Parse a `data: {"youChatToken": ...}` line.
#[must_use]
pub fn parse_data_line(line: &str) -> Option<Token> {
    let body = line.strip_prefix(DATA_PREFIX)?;
    let payload: TokenPayload = serde_json::from_str(body).ok()?;
    Some(Token {
        text: payload.you_chat_token,
    })
}

struct DecodeLoop<S> {
    body: std::pin::Pin<Box<S>>,
    splitter: LineSplitter,
    decoder: TokenDecoder,
    lines: Vec<String>,
    pending: VecDeque<Token>,
    done: bool,
}

impl<S> DecodeLoop<S> {
    fn decode_lines(&mut self) {
        for line in self.lines.drain(..) {
            if let Some(token) = self.decoder.push_line(&line) {
                self.pending.push_back(token);
            }
        }
    }

    fn finish(&mut self) {
        self.done = true;
        if let Some(line) = self.splitter.finish() {
            self.lines.push(line);
            self.decode_lines();
        }
        let summary = self.decoder.finish();
        tracing::debug!(
            tokens = summary.tokens,
            dropped = summary.dropped,
            truncated = summary.truncated,
            "upstream stream finished"
        );
    }
}

/// Lazily decode an upstream body into tokens.
///
/// The stream ends when the body ends. A body read failure yields one
/// [`GatewayError::UpstreamRead`] and then ends. Malformed data lines are
/// skipped.
pub fn token_stream<S, E>(body: S) -> impl Stream<Item = Result<Token, GatewayError>> + Send
where
    S: Stream<Item = Result<bytes::Bytes, E>> + Send + 'static,
    E: Display + Send + 'static,
{
    let state = DecodeLoop {
        body: Box::pin(body),
        splitter: LineSplitter::new(),
        decoder: TokenDecoder::new(),
        lines: Vec::with_capacity(8),
        pending: VecDeque::with_capacity(8),
        done: false,
    };

    futures_util::stream::unfold(state, |mut state| async move {
        loop {
            if let Some(token) = state.pending.pop_front() {
                return Some((Ok(token), state));
            }
            if state.done {
                return None;
            }

            match state.body.next().await {
                Some(Ok(chunk)) => {
                    if let Err(err) = state.splitter.feed_into(&chunk, &mut state.lines) {
                        state.done = true;
                        return Some((Err(err), state));
                    }
                    state.decode_lines();
                }
                Some(Err(err)) => {
                    state.done = true;
                    return Some((Err(GatewayError::UpstreamRead(err.to_string())), state));
                }
                None => state.finish(),
            }
        }
    })
}
