use std::sync::Arc;

use axum::response::Json;
use serde_json::{json, Value};

use crate::state::AppState;

/// Status document served on every path the gateway does not handle.
pub fn status_handler(state: &Arc<AppState>) -> Json<Value> {
    Json(json!({
        "status": "You2Api Service Running...",
        "message": concat!("youchat-gateway ", env!("CARGO_PKG_VERSION")),
        "models": state.catalog.len(),
        "upstream": state.upstream.endpoint().as_str(),
    }))
}
