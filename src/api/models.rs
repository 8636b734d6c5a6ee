use std::sync::Arc;

use axum::body::Body;
use axum::response::Response;

use crate::api::cors::{apply_cors, MODELS_METHODS};
use crate::state::AppState;

/// List every client-facing model id in `OpenAI` format.
#[must_use]
pub fn handler(state: &Arc<AppState>) -> Response {
    let mut response = Response::new(Body::from(state.models_response_body()));
    *response.status_mut() = http::StatusCode::OK;
    let headers = response.headers_mut();
    headers.insert(
        http::header::CONTENT_TYPE,
        http::HeaderValue::from_static("application/json"),
    );
    apply_cors(headers, MODELS_METHODS);
    response
}
