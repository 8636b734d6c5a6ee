use std::time::Duration;

use crate::config::ServerConfig;
use crate::error::GatewayError;

use super::prepared_upstream::UpstreamRequest;

/// Which deadline policy an upstream call runs under.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CallMode {
    /// Whole call, body included, bounded by `server.timeout`.
    Buffered,
    /// Connect timeout only; the body is read for as long as the upstream keeps it open.
    Streaming,
}

fn build_reqwest_client(
    timeout: Option<Duration>,
    connect_timeout: Duration,
    use_env_proxy: bool,
    proxy_url: Option<&str>,
) -> Result<reqwest::Client, GatewayError> {
    let mut builder = reqwest::Client::builder()
        .tcp_nodelay(true)
        .connect_timeout(connect_timeout)
        .redirect(reqwest::redirect::Policy::none());

    if let Some(timeout) = timeout {
        builder = builder.timeout(timeout);
    }

    if let Some(proxy_url) = proxy_url {
        let proxy = reqwest::Proxy::all(proxy_url)
            .map_err(|err| GatewayError::Config(format!("Invalid proxy URL: {err}")))?;
        builder = builder.no_proxy().proxy(proxy);
    } else if !use_env_proxy {
        builder = builder.no_proxy();
    }

    builder
        .build()
        .map_err(|err| GatewayError::Config(format!("Failed to build HTTP client: {err}")))
}

/// HTTP client pair for calling the upstream search API.
pub struct HttpTransport {
    buffered: reqwest::Client,
    streaming: reqwest::Client,
}

impl HttpTransport {
    /// Build both clients from the server config.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Config`] when the proxy URL is invalid or the
    /// TLS backend cannot be initialised.
    pub fn new(config: &ServerConfig) -> Result<Self, GatewayError> {
        let connect_timeout = Duration::from_secs(config.connect_timeout);
        let proxy = config.proxy.as_deref();
        Ok(Self {
            buffered: build_reqwest_client(
                Some(Duration::from_secs(config.timeout)),
                connect_timeout,
                config.http_use_env_proxy,
                proxy,
            )?,
            streaming: build_reqwest_client(
                None,
                connect_timeout,
                config.http_use_env_proxy,
                proxy,
            )?,
        })
    }

    fn client(&self, mode: CallMode) -> &reqwest::Client {
        match mode {
            CallMode::Buffered => &self.buffered,
            CallMode::Streaming => &self.streaming,
        }
    }

    /// Send the upstream GET and return the response once headers arrive.
    ///
    /// # Errors
    ///
    /// Returns [`GatewayError::Transport`] on connection failure, timeout, or a
    /// non-success upstream status.
    pub async fn send(
        &self,
        request: UpstreamRequest,
        mode: CallMode,
    ) -> Result<reqwest::Response, GatewayError> {
        let UpstreamRequest { url, headers } = request;
        let response = self
            .client(mode)
            .get(url)
            .headers(headers)
            .send()
            .await
            .map_err(|err| GatewayError::Transport(err.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(GatewayError::Transport(format!(
                "upstream returned status {}",
                status.as_u16()
            )));
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_new_with_defaults() {
        assert!(HttpTransport::new(&ServerConfig::default()).is_ok());
    }

    #[test]
    fn test_invalid_proxy_is_config_error() {
        let config = ServerConfig {
            proxy: Some("http://[::1".to_string()),
            ..ServerConfig::default()
        };
        assert!(matches!(
            HttpTransport::new(&config),
            Err(GatewayError::Config(_))
        ));
    }
}
