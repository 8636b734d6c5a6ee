use crate::error::GatewayError;
use crate::protocol::chat::{ChatMessage, Role};
use crate::protocol::youchat::HistoryRecord;

/// Chat messages projected into the upstream's question/answer history.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectedHistory {
    /// One record per input message, same order.
    pub records: Vec<HistoryRecord>,
    /// Content of the final message, sent as the primary search query.
    pub query: String,
    /// Number of records before the final one.
    pub past_chat_length: usize,
}

#[must_use]
pub fn project_message(message: &ChatMessage) -> HistoryRecord {
    match message.role {
        Role::Assistant => HistoryRecord {
            question: String::new(),
            answer: message.content.clone(),
        },
        Role::User | Role::System | Role::Other => HistoryRecord {
            question: message.content.clone(),
            answer: String::new(),
        },
    }
}

/// Project `messages` into upstream history records.
///
/// # Errors
///
/// Returns [`GatewayError::InvalidRequest`] when `messages` is empty.
pub fn project_history(messages: &[ChatMessage]) -> Result<ProjectedHistory, GatewayError> {
    let Some(last) = messages.last() else {
        return Err(GatewayError::InvalidRequest(
            "messages must contain at least one entry".to_string(),
        ));
    };

    Ok(ProjectedHistory {
        records: messages.iter().map(project_message).collect(),
        query: last.content.clone(),
        past_chat_length: messages.len() - 1,
    })
}
