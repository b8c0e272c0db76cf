//! Configuration loading from disk.

use std::fs;
use std::path::Path;

use thiserror::Error;

use crate::config::schema::EngineConfig;
use crate::config::validation::{validate_config, ValidationError};

/// Error type for configuration loading.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Parse error: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Validation failed: {}", join(.0))]
    Validation(Vec<ValidationError>),
}

fn join(errors: &[ValidationError]) -> String {
    errors
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

/// Load and validate configuration from a TOML file.
pub fn load_config(path: &Path) -> Result<EngineConfig, ConfigError> {
    let content = fs::read_to_string(path)?;
    parse_config(&content)
}

/// Parse and validate configuration text.
pub fn parse_config(content: &str) -> Result<EngineConfig, ConfigError> {
    let config: EngineConfig = toml::from_str(content)?;
    validate_config(&config).map_err(ConfigError::Validation)?;
    Ok(config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::schema::LogFormat;
    use serde_json::json;
    use std::io::Write;

    #[test]
    fn test_minimal_config_uses_defaults() {
        let config = parse_config("").unwrap();
        assert_eq!(config.routing.default_route, "DEFAULT");
        assert!(config.cache.enabled);
        assert_eq!(config.reload.max_attempts, 5);
    }

    #[test]
    fn test_full_config() {
        let config = parse_config(
            r#"
[store]
path = "/etc/rules/store.json"
watch = false

[reload]
interval_secs = 0
max_attempts = 3

[cache]
ttl_secs = 5

[routing]
default_route = "STANDARD"

[settings.defaults]
fraud-check-enabled = true
max-amount = 25000

[observability]
log_format = "json"
metrics_enabled = false
"#,
        )
        .unwrap();
        assert!(!config.store.watch);
        assert_eq!(config.reload.interval_secs, 0);
        assert_eq!(config.cache.ttl_secs, 5);
        assert_eq!(config.routing.default_route, "STANDARD");
        assert_eq!(config.settings.defaults["fraud-check-enabled"], json!(true));
        assert_eq!(config.settings.defaults["max-amount"], json!(25000));
        assert_eq!(config.observability.log_format, LogFormat::Json);
    }

    #[test]
    fn test_errors() {
        assert!(matches!(parse_config("reload = 3"), Err(ConfigError::Parse(_))));

        let err = parse_config("[reload]\nmax_attempts = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Validation(ref errors) if errors.len() == 1));
        assert_eq!(
            err.to_string(),
            "Validation failed: reload.max_attempts: must be at least 1"
        );

        assert!(matches!(
            load_config(Path::new("/no/such/engine.toml")),
            Err(ConfigError::Io(_))
        ));
    }

    #[test]
    fn test_load_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "[routing]\ndefault_route = \"SEPA\"").unwrap();
        let config = load_config(file.path()).unwrap();
        assert_eq!(config.routing.default_route, "SEPA");
    }
}
