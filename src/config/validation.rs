use super::{AppConfig, ConfigError};

/// Validate the full application config, returning an error if any rule is violated.
///
/// # Errors
///
/// Returns [`ConfigError::Validation`] when any configuration invariant is violated.
pub fn validate_config(config: &AppConfig) -> Result<(), ConfigError> {
    validate_server_config(config)?;
    validate_upstream_config(config)?;
    validate_models(config)?;
    validate_log_level(config)?;
    Ok(())
}

fn validation_err(msg: impl Into<String>) -> ConfigError {
    ConfigError::Validation(msg.into())
}

fn validate_server_config(config: &AppConfig) -> Result<(), ConfigError> {
    let server = &config.server;
    if server.port == 0 {
        return Err(validation_err("server.port must be greater than 0"));
    }
    if server.timeout == 0 {
        return Err(validation_err("server.timeout must be greater than 0"));
    }
    if server.connect_timeout == 0 {
        return Err(validation_err(
            "server.connect_timeout must be greater than 0",
        ));
    }
    if let Some(worker_threads) = server.runtime_worker_threads {
        if worker_threads == 0 {
            return Err(validation_err(
                "server.runtime_worker_threads must be greater than 0 when set",
            ));
        }
    }
    if let Some(proxy) = server.proxy.as_deref() {
        if url::Url::parse(proxy).is_err() {
            return Err(validation_err(format!(
                "server.proxy '{proxy}' is not a valid URL"
            )));
        }
    }
    Ok(())
}

fn validate_upstream_config(config: &AppConfig) -> Result<(), ConfigError> {
    let upstream = &config.upstream;
    let endpoint = url::Url::parse(&upstream.endpoint).map_err(|err| {
        validation_err(format!(
            "upstream.endpoint '{}' is not a valid URL: {err}",
            upstream.endpoint
        ))
    })?;
    if endpoint.scheme() != "http" && endpoint.scheme() != "https" {
        return Err(validation_err(format!(
            "upstream.endpoint must use http or https, got '{}'",
            endpoint.scheme()
        )));
    }
    if upstream.count == 0 {
        return Err(validation_err("upstream.count must be greater than 0"));
    }
    if upstream.market.trim().is_empty() {
        return Err(validation_err("upstream.market cannot be empty"));
    }
    if upstream.safe_search.trim().is_empty() {
        return Err(validation_err("upstream.safe_search cannot be empty"));
    }
    Ok(())
}

fn validate_models(config: &AppConfig) -> Result<(), ConfigError> {
    for (client, upstream) in &config.models {
        if client.trim().is_empty() || upstream.trim().is_empty() {
            return Err(validation_err(format!(
                "models entry '{client}: {upstream}' has an empty model id"
            )));
        }
    }
    Ok(())
}

fn validate_log_level(config: &AppConfig) -> Result<(), ConfigError> {
    let valid_levels = ["DEBUG", "INFO", "WARNING", "ERROR", "CRITICAL", "DISABLED"];
    if !valid_levels.contains(&config.features.log_level.to_uppercase().as_str()) {
        return Err(validation_err(format!(
            "log_level must be one of {valid_levels:?}"
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_valid_config() {
        assert!(validate_config(&AppConfig::default()).is_ok());
    }

    #[test]
    fn test_zero_timeout() {
        let mut config = AppConfig::default();
        config.server.timeout = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_bad_endpoint() {
        let mut config = AppConfig::default();
        config.upstream.endpoint = "not a url".to_string();
        assert!(validate_config(&config).is_err());

        config.upstream.endpoint = "ftp://you.com/api/streamingSearch".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_zero_count() {
        let mut config = AppConfig::default();
        config.upstream.count = 0;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_empty_model_override() {
        let mut config = AppConfig::default();
        config.models.insert("gpt-4o".to_string(), " ".to_string());
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_log_level() {
        let mut config = AppConfig::default();
        config.features.log_level = "warning".to_string();
        assert!(validate_config(&config).is_ok());
        config.features.log_level = "VERBOSE".to_string();
        assert!(validate_config(&config).is_err());
    }
}
