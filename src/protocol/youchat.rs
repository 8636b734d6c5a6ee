//! Upstream dialect: the `streamingSearch` query and event-stream shapes.

use serde::{Deserialize, Serialize};

/// Event line that announces a token payload on the next line.
pub const TOKEN_EVENT_MARKER: &str = "event: youChatToken";
/// Prefix stripped from a data line before JSON parsing.
pub const DATA_PREFIX: &str = "data: ";

/// One conversational turn as the upstream expects it. Exactly one side is
/// populated, chosen by the source message's role.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct HistoryRecord {
    pub question: String,
    pub answer: String,
}

/// JSON body of a token event's data line.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenPayload {
    #[serde(rename = "youChatToken")]
    pub you_chat_token: String,
}
