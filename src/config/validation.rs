use crate::config::types::{
    ClientConfig, Config, PollConfig, SearchConfig, StorageConfig, TabsConfig,
};
use crate::ConfigError;
use url::Url;

/// Validates the entire configuration
pub fn validate(config: &Config) -> Result<(), ConfigError> {
    validate_search_config(&config.search)?;
    validate_client_config(&config.client)?;
    validate_poll_config(&config.poll)?;
    validate_tabs_config(&config.tabs)?;
    validate_storage_config(&config.storage)?;
    Ok(())
}

/// Validates search preferences
fn validate_search_config(config: &SearchConfig) -> Result<(), ConfigError> {
    if config.locale.trim().is_empty() {
        return Err(ConfigError::Validation("locale cannot be empty".to_string()));
    }

    if config.country.trim().is_empty() {
        return Err(ConfigError::Validation(
            "country cannot be empty".to_string(),
        ));
    }

    if config.shifts.iter().any(|s| s.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "shifts cannot contain empty entries".to_string(),
        ));
    }

    if config.cities.iter().any(|c| c.trim().is_empty()) {
        return Err(ConfigError::Validation(
            "cities cannot contain empty entries".to_string(),
        ));
    }

    if let Some(location) = &config.location {
        if !(-90.0..=90.0).contains(&location.lat) {
            return Err(ConfigError::Validation(format!(
                "lat must be between -90 and 90, got {}",
                location.lat
            )));
        }

        if !(-180.0..=180.0).contains(&location.lng) {
            return Err(ConfigError::Validation(format!(
                "lng must be between -180 and 180, got {}",
                location.lng
            )));
        }

        if location.commute_radius.is_nan() || location.commute_radius <= 0.0 {
            return Err(ConfigError::Validation(format!(
                "commute_radius must be > 0, got {}",
                location.commute_radius
            )));
        }
    }

    Ok(())
}

/// Validates remote client configuration
fn validate_client_config(config: &ClientConfig) -> Result<(), ConfigError> {
    validate_http_url("endpoint", &config.endpoint)?;
    if let Some(endpoint) = &config.schedule_endpoint {
        validate_http_url("schedule_endpoint", endpoint)?;
    }
    validate_http_url("apply_url", &config.apply_url)?;

    if config.timeout_ms < 100 || config.timeout_ms > 60_000 {
        return Err(ConfigError::Validation(format!(
            "timeout_ms must be between 100 and 60000, got {}",
            config.timeout_ms
        )));
    }

    if let Some(token) = &config.bearer_token {
        if token.trim().is_empty() {
            return Err(ConfigError::Validation(
                "bearer_token cannot be empty when set".to_string(),
            ));
        }
    }

    Ok(())
}

/// Validates poll loop timing
fn validate_poll_config(config: &PollConfig) -> Result<(), ConfigError> {
    if config.backoff_floor_ms < 1 {
        return Err(ConfigError::Validation(
            "backoff_floor_ms must be >= 1".to_string(),
        ));
    }

    if config.backoff_floor_ms > config.backoff_cap_ms {
        return Err(ConfigError::Validation(format!(
            "backoff_floor_ms ({}) cannot exceed backoff_cap_ms ({})",
            config.backoff_floor_ms, config.backoff_cap_ms
        )));
    }

    if config.exhaustion_ttl_secs < 1 {
        return Err(ConfigError::Validation(
            "exhaustion_ttl_secs must be >= 1".to_string(),
        ));
    }

    Ok(())
}

/// Validates tab registration rules
fn validate_tabs_config(config: &TabsConfig) -> Result<(), ConfigError> {
    validate_domain_pattern(&config.target_domain)?;

    if config.active_window_ms < 1000 {
        return Err(ConfigError::Validation(format!(
            "active_window_ms must be >= 1000, got {}",
            config.active_window_ms
        )));
    }

    Ok(())
}

/// Validates storage configuration
fn validate_storage_config(config: &StorageConfig) -> Result<(), ConfigError> {
    if config.database_path.is_empty() {
        return Err(ConfigError::Validation(
            "database_path cannot be empty".to_string(),
        ));
    }

    Ok(())
}

/// Validates that a URL parses and uses http or https
fn validate_http_url(field: &str, value: &str) -> Result<(), ConfigError> {
    let url = Url::parse(value)
        .map_err(|e| ConfigError::InvalidUrl(format!("Invalid {} '{}': {}", field, value, e)))?;

    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::InvalidUrl(format!(
            "{} '{}' must use http or https",
            field, value
        )));
    }

    Ok(())
}

/// Validates a domain pattern (supports wildcards)
fn validate_domain_pattern(pattern: &str) -> Result<(), ConfigError> {
    if pattern.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain pattern cannot be empty".to_string(),
        ));
    }

    let domain = pattern.strip_prefix("*.").unwrap_or(pattern);
    validate_domain_string(domain)
}

/// Validates a domain string (without wildcard prefix)
fn validate_domain_string(domain: &str) -> Result<(), ConfigError> {
    if domain.is_empty() {
        return Err(ConfigError::InvalidPattern(
            "Domain cannot be empty".to_string(),
        ));
    }

    if !domain
        .chars()
        .all(|c| c.is_alphanumeric() || c == '.' || c == '-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' contains invalid characters",
            domain
        )));
    }

    if domain.starts_with('.')
        || domain.ends_with('.')
        || domain.starts_with('-')
        || domain.ends_with('-')
    {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot start or end with '.' or '-'",
            domain
        )));
    }

    if domain.contains("..") {
        return Err(ConfigError::InvalidPattern(format!(
            "Domain '{}' cannot contain consecutive dots",
            domain
        )));
    }

    Ok(())
}
