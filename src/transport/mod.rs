mod http_transport;
mod prepared_upstream;

pub use http_transport::{CallMode, HttpTransport};
pub use prepared_upstream::{session_cookie, PreparedUpstream, UpstreamRequest, SESSION_COOKIE};
