use url::Url;

use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Server port is not 0
/// - Site base URL is absolute with a host, at least one search endpoint has `{query}`
/// - Timeouts are non-zero
/// - Matcher threshold lies in [0, 1] and candidate limit is at least 1
/// - Re-rank, when enabled, has an endpoint
/// - Batch defaults fit inside their maximums
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(invalid("server.port cannot be 0"));
    }

    let base = Url::parse(&config.site.base_url)
        .map_err(|e| invalid(format!("site.base_url is not a valid URL: {}", e)))?;
    if base.host_str().is_none() {
        return Err(invalid("site.base_url must include a host"));
    }
    if !config
        .site
        .search_endpoints
        .iter()
        .any(|e| e.contains("{query}"))
    {
        return Err(invalid(
            "site.search_endpoints needs at least one entry containing {query}",
        ));
    }
    if config.site.timeout_secs == 0 {
        return Err(invalid("site.timeout_secs cannot be 0"));
    }

    let threshold = config.matcher.autolink_threshold;
    if !(0.0..=1.0).contains(&threshold) {
        return Err(invalid(format!(
            "matcher.autolink_threshold must be within [0, 1], got {}",
            threshold
        )));
    }
    if config.matcher.candidate_limit == 0 {
        return Err(invalid("matcher.candidate_limit must be at least 1"));
    }

    if config.rerank.enabled {
        let endpoint = config.rerank.endpoint.as_deref().unwrap_or("").trim();
        if endpoint.is_empty() {
            return Err(invalid("rerank.endpoint is required when rerank is enabled"));
        }
        Url::parse(endpoint)
            .map_err(|e| invalid(format!("rerank.endpoint is not a valid URL: {}", e)))?;
        if config.rerank.timeout_secs == 0 {
            return Err(invalid("rerank.timeout_secs cannot be 0"));
        }
    }

    let batch = &config.batch;
    if batch.max_limit == 0 || batch.default_limit == 0 || batch.default_limit > batch.max_limit {
        return Err(invalid("batch.default_limit must be within 1..=batch.max_limit"));
    }
    if batch.max_concurrency == 0
        || batch.default_concurrency == 0
        || batch.default_concurrency > batch.max_concurrency
    {
        return Err(invalid(
            "batch.default_concurrency must be within 1..=batch.max_concurrency",
        ));
    }

    Ok(())
}

fn invalid(message: impl Into<String>) -> ConfigError {
    ConfigError::ValidationError(message.into())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_default_config() {
        assert!(validate_config(&Config::default()).is_ok());
    }

    #[test]
    fn test_validate_port_zero_fails() {
        let mut config = Config::default();
        config.server.port = 0;
        let err = validate_config(&config).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn test_validate_relative_base_url_fails() {
        let mut config = Config::default();
        config.site.base_url = "/just/a/path".to_string();
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_endpoint_without_placeholder_fails() {
        let mut config = Config::default();
        config.site.search_endpoints = vec!["/search".to_string()];
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_threshold_out_of_range() {
        let mut config = Config::default();
        config.matcher.autolink_threshold = 1.5;
        assert!(validate_config(&config).is_err());

        config.matcher.autolink_threshold = -0.1;
        assert!(validate_config(&config).is_err());
    }

    #[test]
    fn test_validate_rerank_enabled_requires_endpoint() {
        let mut config = Config::default();
        config.rerank.enabled = true;
        assert!(validate_config(&config).is_err());

        config.rerank.endpoint = Some("http://127.0.0.1:9999/rerank".to_string());
        assert!(validate_config(&config).is_ok());
    }

    #[test]
    fn test_validate_batch_defaults_above_max() {
        let mut config = Config::default();
        config.batch.default_concurrency = 80;
        assert!(validate_config(&config).is_err());
    }
}
