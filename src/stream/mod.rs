//! Upstream event-stream decoding.

pub mod decoder;
pub mod lines;

pub use decoder::{parse_data_line, token_stream, DecodeState, DecodeSummary, Token, TokenDecoder};
pub use lines::{LineSplitter, MAX_LINE_BYTES};
