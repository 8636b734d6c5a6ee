mod request_id;

use bytes::Bytes;

use crate::config::AppConfig;
use crate::error::GatewayError;
use crate::protocol::chat::{ModelCard, ModelList};
use crate::protocol::mapping::ModelCatalog;
use crate::transport::{HttpTransport, PreparedUpstream};
use crate::translate::RequestContext;
use crate::util::unix_now_secs;

use request_id::RequestIdGenerator;

/// Shared application state accessible to all handlers. Read-only after
/// construction; per-request data lives in [`RequestContext`].
pub struct AppState {
    pub config: AppConfig,
    pub catalog: ModelCatalog,
    pub upstream: PreparedUpstream,
    pub transport: HttpTransport,
    models_response_body: Bytes,
    request_ids: RequestIdGenerator,
}

impl AppState {
    #[must_use]
    pub fn new(
        config: AppConfig,
        catalog: ModelCatalog,
        upstream: PreparedUpstream,
        transport: HttpTransport,
    ) -> Self {
        let models_response_body = build_models_response_body(&catalog, unix_now_secs());
        Self {
            config,
            catalog,
            upstream,
            transport,
            models_response_body,
            request_ids: RequestIdGenerator::new(),
        }
    }

    /// Build every startup component from a validated config.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the model table has colliding
    /// entries, the endpoint is invalid, or the HTTP clients cannot be built.
    pub fn from_config(config: AppConfig) -> Result<Self, GatewayError> {
        let catalog = ModelCatalog::new(&config.models)?;
        let upstream = PreparedUpstream::new(&config.upstream)?;
        let transport = HttpTransport::new(&config.server)?;
        Ok(Self::new(config, catalog, upstream, transport))
    }

    /// Resolve the requested model and stamp a fresh id and timestamp.
    #[must_use]
    pub fn request_context(&self, requested_model: &str, stream: bool) -> RequestContext {
        let seq = self.request_ids.next_seq();
        RequestContext::new(
            self.request_ids.completion_id(seq),
            unix_now_secs(),
            self.catalog.resolve(requested_model),
            stream,
        )
    }

    #[must_use]
    pub fn models_response_body(&self) -> Bytes {
        self.models_response_body.clone()
    }
}

fn build_models_response_body(catalog: &ModelCatalog, created: u64) -> Bytes {
    let list = ModelList {
        object: "list".to_string(),
        data: catalog
            .client_ids()
            .map(|id| ModelCard {
                id: id.to_string(),
                object: "model".to_string(),
                created,
                owned_by: "organization-owner".to_string(),
            })
            .collect(),
    };
    match serde_json::to_vec(&list) {
        Ok(body) => Bytes::from(body),
        Err(err) => {
            tracing::error!(error = %err, "failed to encode model list");
            Bytes::from_static(b"{\"object\":\"list\",\"data\":[]}")
        }
    }
}
