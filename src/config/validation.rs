use crate::config::types::{
    ApiConfig, Config, ExtractConfig, IndexConfig, RetryConfig, TranslateConfig,
};
use crate::ConfigError;
use scraper::Selector;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_api_config(&config.api)?;
    validate_retry_config(&config.retry)?;
    validate_extract_config(&config.extract)?;
    validate_translate_config(&config.translate)?;
    validate_index_config(&config.index)?;
    Ok(())
}

/// Validates the remote API settings
fn validate_api_config(config: &ApiConfig) -> Result<(), ConfigError> {
    validate_http_url("base-url", &config.base_url)?;

    if config.book_id == 0 {
        return Err(ConfigError::Validation("book-id must be >= 1".to_string()));
    }

    if config.timeout_secs == 0 {
        return Err(ConfigError::Validation(
            "timeout-secs must be >= 1".to_string(),
        ));
    }

    if let Some(referrer) = &config.referrer {
        validate_http_url("referrer", referrer)?;
    }

    if matches!(&config.auth_token_env, Some(var) if var.is_empty()) {
        return Err(ConfigError::Validation(
            "auth-token-env cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates the retry policy
fn validate_retry_config(config: &RetryConfig) -> Result<(), ConfigError> {
    if config.max_attempts < 1 || config.max_attempts > 10 {
        return Err(ConfigError::Validation(format!(
            "max-attempts must be between 1 and 10, got {}",
            config.max_attempts
        )));
    }

    if config.rate_limit_delay_ms < config.base_delay_ms {
        return Err(ConfigError::Validation(format!(
            "rate-limit-delay-ms ({}) must be >= base-delay-ms ({})",
            config.rate_limit_delay_ms, config.base_delay_ms
        )));
    }

    Ok(())
}

/// Validates extraction selectors by compiling them
fn validate_extract_config(config: &ExtractConfig) -> Result<(), ConfigError> {
    validate_selector(&config.record_selector)?;
    validate_selector(&config.heading_selector)?;

    if config.id_attribute.is_empty() {
        return Err(ConfigError::Validation(
            "id-attribute cannot be empty".to_string(),
        ));
    }

    Ok(())
}

fn validate_translate_config(config: &TranslateConfig) -> Result<(), ConfigError> {
    if let Some(endpoint) = &config.endpoint {
        validate_http_url("translate endpoint", endpoint)?;
    }

    if config.flush_every == 0 {
        return Err(ConfigError::Validation(
            "flush-every must be >= 1".to_string(),
        ));
    }

    Ok(())
}

fn validate_index_config(config: &IndexConfig) -> Result<(), ConfigError> {
    if config.index_name.is_empty() {
        return Err(ConfigError::Validation(
            "index-name cannot be empty".to_string(),
        ));
    }

    // Document ids are built as `{prefix}_{hash}`
    if config.id_prefix.is_empty()
        || !config
            .id_prefix
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-')
    {
        return Err(ConfigError::Validation(format!(
            "id-prefix must be non-empty and contain only ASCII letters, digits, '_' or '-', got '{}'",
            config.id_prefix
        )));
    }

    if config.batch_size == 0 {
        return Err(ConfigError::Validation(
            "batch-size must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Checks that a URL parses and uses an HTTP(S) scheme
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

fn validate_selector(selector: &str) -> Result<(), ConfigError> {
    Selector::parse(selector)
        .map(|_| ())
        .map_err(|e| ConfigError::InvalidSelector {
            selector: selector.to_string(),
            message: format!("{:?}", e),
        })
}
