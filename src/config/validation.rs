use crate::config::types::{
    BrokerConfig, Config, EndpointsConfig, HttpConfig, DEFAULT_CHUNK_SIZE, DEFAULT_CONCURRENCY,
};
use crate::ConfigError;
use url::Url;

/// Largest number of product ids the detail endpoint accepts per call
pub const MAX_DETAIL_BATCH: usize = 500;

/// Corrects out-of-range tuning values to their defaults
///
/// Bad concurrency or chunk bounds are not fatal: each one is replaced with
/// its default and a warning is logged.
pub fn normalize(config: &mut Config) {
    if !(1..=100).contains(&config.crawler.concurrency) {
        tracing::warn!(
            "concurrency must be between 1 and 100, got {}; using {}",
            config.crawler.concurrency,
            DEFAULT_CONCURRENCY
        );
        config.crawler.concurrency = DEFAULT_CONCURRENCY;
    }

    if config.crawler.chunk_size == 0 || config.crawler.chunk_size > MAX_DETAIL_BATCH {
        tracing::warn!(
            "chunk_size must be between 1 and {}, got {}; using {}",
            MAX_DETAIL_BATCH,
            config.crawler.chunk_size,
            DEFAULT_CHUNK_SIZE
        );
        config.crawler.chunk_size = DEFAULT_CHUNK_SIZE;
    }

    if config.crawler.detail_concurrency == 0 {
        tracing::warn!("detail_concurrency must be >= 1; using 1");
        config.crawler.detail_concurrency = 1;
    }

    if config.http.max_retries == 0 {
        tracing::warn!("max_retries must be >= 1; using 3");
        config.http.max_retries = 3;
    }
}

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_http_config(&config.http)?;
    validate_endpoints(&config.endpoints)?;
    if config.sink.mock {
        if config.sink.file.output_dir.as_os_str().is_empty() {
            return Err(ConfigError::Validation(
                "sink.file.output_dir cannot be empty".to_string(),
            ));
        }
    } else {
        validate_broker_config(&config.sink.broker)?;
    }
    if config.storage.database_path.as_os_str().is_empty() {
        return Err(ConfigError::Validation(
            "storage.database_path cannot be empty".to_string(),
        ));
    }
    Ok(())
}

fn validate_http_config(config: &HttpConfig) -> Result<(), ConfigError> {
    if config.user_agent.trim().is_empty() {
        return Err(ConfigError::Validation(
            "user_agent cannot be empty".to_string(),
        ));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_endpoints(config: &EndpointsConfig) -> Result<(), ConfigError> {
    for (name, value) in [
        ("api_base_url", &config.api_base_url),
        ("catalog_api_url", &config.catalog_api_url),
        ("card_api_url", &config.card_api_url),
        ("static_api_url", &config.static_api_url),
    ] {
        validate_http_url(name, value)?;
    }
    Ok(())
}

fn validate_broker_config(config: &BrokerConfig) -> Result<(), ConfigError> {
    validate_http_url("rest_url", &config.rest_url)?;

    for (name, topic) in [
        ("brands_topic", &config.brands_topic),
        ("products_topic", &config.products_topic),
        ("quantities_topic", &config.quantities_topic),
    ] {
        if topic.trim().is_empty() {
            return Err(ConfigError::Validation(format!("{} cannot be empty", name)));
        }
    }

    Ok(())
}

fn validate_http_url(name: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", name, value, e)))?;

    match url.scheme() {
        "http" | "https" => Ok(()),
        scheme => Err(ConfigError::InvalidUrl(format!(
            "{} must use http or https, got '{}'",
            name, scheme
        ))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = Config::default();
        assert!(validate(&config).is_ok());
    }

    #[test]
    fn test_concurrency_out_of_range_is_corrected() {
        for bad in [0, 101, 5000] {
            let mut config = Config::default();
            config.crawler.concurrency = bad;
            normalize(&mut config);
            assert_eq!(config.crawler.concurrency, DEFAULT_CONCURRENCY);
        }
    }

    #[test]
    fn test_concurrency_in_range_is_kept() {
        let mut config = Config::default();
        config.crawler.concurrency = 100;
        normalize(&mut config);
        assert_eq!(config.crawler.concurrency, 100);

        config.crawler.concurrency = 1;
        normalize(&mut config);
        assert_eq!(config.crawler.concurrency, 1);
    }

    #[test]
    fn test_chunk_size_is_corrected() {
        let mut config = Config::default();
        config.crawler.chunk_size = 0;
        normalize(&mut config);
        assert_eq!(config.crawler.chunk_size, DEFAULT_CHUNK_SIZE);

        config.crawler.chunk_size = 501;
        normalize(&mut config);
        assert_eq!(config.crawler.chunk_size, DEFAULT_CHUNK_SIZE);

        config.crawler.chunk_size = 500;
        normalize(&mut config);
        assert_eq!(config.crawler.chunk_size, 500);
    }

    #[test]
    fn test_zero_retries_and_detail_concurrency_corrected() {
        let mut config = Config::default();
        config.http.max_retries = 0;
        config.crawler.detail_concurrency = 0;
        normalize(&mut config);
        assert_eq!(config.http.max_retries, 3);
        assert_eq!(config.crawler.detail_concurrency, 1);
    }

    #[test]
    fn test_empty_user_agent_rejected() {
        let mut config = Config::default();
        config.http.user_agent = "  ".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::Validation(_))));
    }

    #[test]
    fn test_invalid_endpoint_rejected() {
        let mut config = Config::default();
        config.endpoints.catalog_api_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_non_http_endpoint_rejected() {
        let mut config = Config::default();
        config.endpoints.static_api_url = "ftp://static.example.com".to_string();
        assert!(matches!(validate(&config), Err(ConfigError::InvalidUrl(_))));
    }

    #[test]
    fn test_empty_topic_rejected_only_for_broker() {
        let mut config = Config::default();
        config.sink.broker.quantities_topic = String::new();
        assert!(validate(&config).is_err());

        config.sink.mock = true;
        assert!(validate(&config).is_ok());
    }
}
