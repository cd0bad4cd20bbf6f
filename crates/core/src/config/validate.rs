use super::{types::Config, ConfigError};

/// Validate configuration
/// Currently validates:
/// - Cache TTL is positive
/// - Cover width and JPEG quality are usable
/// - Provider rates are positive and API keys are set for enabled providers
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.cache.ttl_hours == 0 {
        return Err(invalid("cache.ttl_hours must be greater than 0"));
    }

    if config.covers.max_width == 0 {
        return Err(invalid("covers.max_width must be greater than 0"));
    }

    if !(1..=100).contains(&config.covers.jpeg_quality) {
        return Err(invalid("covers.jpeg_quality must be between 1 and 100"));
    }

    if config.enrichment.item_timeout_secs == Some(0) {
        return Err(invalid("enrichment.item_timeout_secs must be greater than 0"));
    }

    if let Some(tmdb) = &config.tmdb {
        if tmdb.api_key.trim().is_empty() {
            return Err(invalid("tmdb.api_key cannot be empty"));
        }
        if tmdb.requests_per_second == 0 {
            return Err(invalid("tmdb.requests_per_second must be greater than 0"));
        }
        if tmdb.search_limit == 0 {
            return Err(invalid("tmdb.search_limit must be greater than 0"));
        }
    }

    if let Some(omdb) = &config.omdb {
        if omdb.api_key.trim().is_empty() {
            return Err(invalid("omdb.api_key cannot be empty"));
        }
        if omdb.requests_per_second == 0 {
            return Err(invalid("omdb.requests_per_second must be greater than 0"));
        }
    }

    if let Some(steam) = &config.steam {
        if steam.requests_per_second == 0 {
            return Err(invalid("steam.requests_per_second must be greater than 0"));
        }
    }

    Ok(())
}

fn invalid(message: &str) -> ConfigError {
    ConfigError::ValidationError(message.to_string())
}
