pub mod history;

use crate::protocol::mapping::ResolvedModel;

pub use history::{project_history, ProjectedHistory};

/// Per-request values threaded from parsing through response assembly.
#[derive(Debug, Clone)]
pub struct RequestContext {
    pub completion_id: String,
    /// Unix seconds stamped on every payload of this request.
    pub created: u64,
    pub model: ResolvedModel,
    pub stream: bool,
}

impl RequestContext {
    #[must_use]
    pub fn new(completion_id: String, created: u64, model: ResolvedModel, stream: bool) -> Self {
        Self {
            completion_id,
            created,
            model,
            stream,
        }
    }
}
