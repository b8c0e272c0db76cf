//! Configuration validation.
//!
//! # Responsibilities
//! - Semantic validation (serde handles syntactic)
//! - Validate value ranges (attempts > 0, delays ordered, sizes > 0)
//! - Check addresses and levels parse
//!
//! # Design Decisions
//! - Returns all validation errors, not just first
//! - Validation is pure function: EngineConfig → Result<(), Vec<ValidationError>>
//! - Runs before config is accepted into the system

use std::fmt;
use std::net::SocketAddr;

use tracing_subscriber::EnvFilter;

use crate::config::schema::EngineConfig;

/// One failed check, naming the offending field.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationError {
    pub field: &'static str,
    pub message: String,
}

impl ValidationError {
    fn new(field: &'static str, message: impl Into<String>) -> Self {
        Self {
            field,
            message: message.into(),
        }
    }
}

impl fmt::Display for ValidationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.field, self.message)
    }
}

pub fn validate_config(config: &EngineConfig) -> Result<(), Vec<ValidationError>> {
    let mut errors = Vec::new();

    if config.store.path.as_os_str().is_empty() {
        errors.push(ValidationError::new("store.path", "must not be empty"));
    }

    let reload = &config.reload;
    if reload.max_attempts == 0 {
        errors.push(ValidationError::new("reload.max_attempts", "must be at least 1"));
    }
    if reload.base_delay_ms == 0 {
        errors.push(ValidationError::new("reload.base_delay_ms", "must be greater than 0"));
    }
    if reload.max_delay_ms < reload.base_delay_ms {
        errors.push(ValidationError::new(
            "reload.max_delay_ms",
            format!("{} is below base_delay_ms {}", reload.max_delay_ms, reload.base_delay_ms),
        ));
    }

    if config.cache.enabled {
        if config.cache.ttl_secs == 0 {
            errors.push(ValidationError::new("cache.ttl_secs", "must be greater than 0 when the cache is enabled"));
        }
        if config.cache.max_entries == 0 {
            errors.push(ValidationError::new("cache.max_entries", "must be greater than 0 when the cache is enabled"));
        }
    }

    if config.routing.default_route.trim().is_empty() {
        errors.push(ValidationError::new("routing.default_route", "must not be empty"));
    }

    for name in config.settings.defaults.keys() {
        if name.trim().is_empty() {
            errors.push(ValidationError::new("settings.defaults", "setting names must not be empty"));
        }
    }

    let obs = &config.observability;
    if EnvFilter::try_new(&obs.log_level).is_err() {
        errors.push(ValidationError::new(
            "observability.log_level",
            format!("invalid filter {:?}", obs.log_level),
        ));
    }
    if obs.metrics_enabled && obs.metrics_address.parse::<SocketAddr>().is_err() {
        errors.push(ValidationError::new(
            "observability.metrics_address",
            format!("invalid socket address {:?}", obs.metrics_address),
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid() {
        assert!(validate_config(&EngineConfig::default()).is_ok());
    }

    #[test]
    fn test_collects_every_error() {
        let mut config = EngineConfig::default();
        config.reload.max_attempts = 0;
        config.reload.max_delay_ms = 1;
        config.cache.max_entries = 0;
        config.routing.default_route = " ".into();
        config.observability.metrics_address = "nowhere".into();

        let errors = validate_config(&config).unwrap_err();
        let fields: Vec<_> = errors.iter().map(|e| e.field).collect();
        assert_eq!(
            fields,
            vec![
                "reload.max_attempts",
                "reload.max_delay_ms",
                "cache.max_entries",
                "routing.default_route",
                "observability.metrics_address",
            ]
        );
    }

    #[test]
    fn test_disabled_cache_skips_cache_checks() {
        let mut config = EngineConfig::default();
        config.cache.enabled = false;
        config.cache.ttl_secs = 0;
        assert!(validate_config(&config).is_ok());
    }
}
