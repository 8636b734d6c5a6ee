use axum::http::{header, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::config::ConfigError;

/// Error type shared by every stage of a translated request.
///
/// Every variant is terminal for the request that produced it. Nothing in the
/// gateway retries.
#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("Config error: {0}")]
    Config(String),
    #[error("Missing or invalid authorization header")]
    Auth,
    #[error("Invalid request: {0}")]
    InvalidRequest(String),
    #[error("{0}")]
    Transport(String),
    #[error("Upstream read error: {0}")]
    UpstreamRead(String),
    #[error("Encode error: {0}")]
    Encode(String),
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<ConfigError> for GatewayError {
    fn from(err: ConfigError) -> Self {
        GatewayError::Config(err.to_string())
    }
}

impl GatewayError {
    #[must_use]
    pub fn status(&self) -> StatusCode {
        match self {
            GatewayError::Auth => StatusCode::UNAUTHORIZED,
            GatewayError::InvalidRequest(_) => StatusCode::BAD_REQUEST,
            GatewayError::Config(_)
            | GatewayError::Transport(_)
            | GatewayError::UpstreamRead(_)
            | GatewayError::Encode(_)
            | GatewayError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Text written to the client. Detail for parse, read and encode failures
    /// stays in the logs; transport failures surface the underlying error text.
    #[must_use]
    pub fn client_message(&self) -> String {
        match self {
            GatewayError::Auth => self.to_string(),
            GatewayError::InvalidRequest(_) => "Invalid request body".to_string(),
            GatewayError::UpstreamRead(_) => "Error reading response".to_string(),
            GatewayError::Encode(_) => "Error encoding response".to_string(),
            GatewayError::Transport(message)
            | GatewayError::Config(message)
            | GatewayError::Internal(message) => message.clone(),
        }
    }
}

/// Plain-text error response, no CORS headers.
#[must_use]
pub fn plain_text_error(status: StatusCode, message: &str) -> Response {
    let mut body = String::with_capacity(message.len() + 1);
    body.push_str(message);
    body.push('\n');

    let mut response = (status, body).into_response();
    let headers = response.headers_mut();
    headers.insert(
        header::CONTENT_TYPE,
        HeaderValue::from_static("text/plain; charset=utf-8"),
    );
    headers.insert(
        header::X_CONTENT_TYPE_OPTIONS,
        HeaderValue::from_static("nosniff"),
    );
    response
}

impl IntoResponse for GatewayError {
    fn into_response(self) -> Response {
        plain_text_error(self.status(), &self.client_message())
    }
}
