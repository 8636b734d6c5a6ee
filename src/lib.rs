pub mod api;
pub mod auth;
pub mod config;
pub mod error;
pub mod observability;
pub mod protocol;
pub mod routing;
pub mod state;
pub mod stream;
pub mod translate;
pub mod transport;

mod util;
