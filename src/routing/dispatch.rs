use std::convert::Infallible;
use std::sync::Arc;

use axum::body::{self, Body};
use axum::http::{Method, Request, StatusCode};
use axum::response::{IntoResponse, Response};

use crate::api::cors::{apply_cors, preflight_response, CHAT_METHODS, MODELS_METHODS};
use crate::api::{chat, health, models};
use crate::error::plain_text_error;
use crate::state::AppState;

const DEFAULT_BODY_LIMIT_BYTES: usize = 8 * 1024 * 1024;

/// Paths that accept chat completion requests.
pub const CHAT_PATHS: &[&str] = &[
    "/v1/chat/completions",
    "/none/v1/chat/completions",
    "/such/chat/completions",
];
/// Paths that list models.
pub const MODELS_PATHS: &[&str] = &["/v1/models", "/api/v1/models"];

#[derive(Debug, PartialEq, Eq)]
enum RouteMatch {
    Chat,
    Models,
    Preflight { methods: &'static str },
    Status,
    MethodNotAllowed,
    NotFound,
}

/// Dispatch a raw HTTP request to the matching handler.
///
/// # Errors
///
/// This function currently never returns `Err` and uses `Infallible`.
pub async fn dispatch_request(
    state: Arc<AppState>,
    base_path: Arc<str>,
    request: Request<Body>,
) -> Result<Response, Infallible> {
    let (parts, body) = request.into_parts();
    let route = match_route(&parts.method, parts.uri.path(), base_path.as_ref());

    let response = match route {
        RouteMatch::Chat => {
            let body_bytes = match read_request_body(body).await {
                Ok(bytes) => bytes,
                Err(response) => return Ok(response),
            };
            chat::handler(state, parts.headers, body_bytes).await
        }
        RouteMatch::Models => models::handler(&state),
        RouteMatch::Preflight { methods } => preflight_response(methods),
        RouteMatch::Status => with_cors(health::status_handler(&state).into_response()),
        RouteMatch::MethodNotAllowed => with_cors(StatusCode::METHOD_NOT_ALLOWED.into_response()),
        RouteMatch::NotFound => with_cors(StatusCode::NOT_FOUND.into_response()),
    };

    Ok(response)
}

fn with_cors(mut response: Response) -> Response {
    apply_cors(response.headers_mut(), CHAT_METHODS);
    response
}

#[must_use]
pub fn normalize_base_path(base_path: &str) -> String {
    let trimmed = base_path.trim();
    if trimmed.is_empty() || trimmed == "/" {
        String::new()
    } else if trimmed.starts_with('/') {
        trimmed.trim_end_matches('/').to_string()
    } else {
        format!("/{}", trimmed.trim_end_matches('/'))
    }
}

async fn read_request_body(body: Body) -> Result<bytes::Bytes, Response> {
    body::to_bytes(body, DEFAULT_BODY_LIMIT_BYTES)
        .await
        .map_err(|_| {
            plain_text_error(
                StatusCode::PAYLOAD_TOO_LARGE,
                "Request body too large (max 8MiB)",
            )
        })
}

fn match_route(method: &Method, path: &str, base_path: &str) -> RouteMatch {
    let Some(path) = strip_base_path(path, base_path) else {
        return RouteMatch::NotFound;
    };

    if CHAT_PATHS.contains(&path) {
        return match *method {
            Method::POST => RouteMatch::Chat,
            Method::OPTIONS => RouteMatch::Preflight {
                methods: CHAT_METHODS,
            },
            _ => RouteMatch::MethodNotAllowed,
        };
    }

    if MODELS_PATHS.contains(&path) {
        return match *method {
            Method::GET => RouteMatch::Models,
            Method::OPTIONS => RouteMatch::Preflight {
                methods: MODELS_METHODS,
            },
            _ => RouteMatch::MethodNotAllowed,
        };
    }

    RouteMatch::Status
}

fn strip_base_path<'a>(path: &'a str, base_path: &str) -> Option<&'a str> {
    if base_path.is_empty() {
        return Some(path);
    }

    let remainder = path.strip_prefix(base_path)?;
    if remainder.is_empty() {
        Some("/")
    } else if remainder.starts_with('/') {
        Some(remainder)
    } else {
        None
    }
}
