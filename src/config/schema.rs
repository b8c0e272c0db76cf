//! Configuration schema definitions.
//!
//! This module defines the complete configuration structure for the engine.
//! All types derive Serde traits for deserialization from config files.

use std::collections::BTreeMap;
use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Root configuration for the rules engine.
#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct EngineConfig {
    /// Where rules and scoped configuration entries are loaded from.
    pub store: StoreConfig,

    /// Snapshot reload schedule and retry policy.
    pub reload: ReloadConfig,

    /// Decision cache settings.
    pub cache: CacheConfig,

    /// Routing defaults.
    pub routing: RoutingConfig,

    /// Registered setting defaults.
    pub settings: SettingsConfig,

    /// Observability settings.
    pub observability: ObservabilityConfig,
}

/// Store location.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the TOML or JSON store document.
    pub path: PathBuf,

    /// Reload when the store file changes on disk.
    pub watch: bool,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("rules.toml"),
            watch: true,
        }
    }
}

/// Reload configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ReloadConfig {
    /// Periodic reload interval in seconds. 0 disables the timer.
    pub interval_secs: u64,

    /// Attempts per reload before giving up until the next trigger.
    pub max_attempts: u32,

    /// Base delay for exponential backoff in milliseconds.
    pub base_delay_ms: u64,

    /// Maximum delay for exponential backoff in milliseconds.
    pub max_delay_ms: u64,
}

impl Default for ReloadConfig {
    fn default() -> Self {
        Self {
            interval_secs: 300,
            max_attempts: 5,
            base_delay_ms: 200,
            max_delay_ms: 10_000,
        }
    }
}

/// Decision cache configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Enable the decision cache.
    pub enabled: bool,

    /// Entry time-to-live in seconds.
    pub ttl_secs: u64,

    /// Upper bound on cached entries.
    pub max_entries: usize,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            ttl_secs: 30,
            max_entries: 100_000,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RoutingConfig {
    /// Route returned when no rule matches.
    pub default_route: String,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            default_route: "DEFAULT".to_string(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, Default)]
#[serde(default)]
pub struct SettingsConfig {
    /// Value used for a setting when no entry matches the context.
    pub defaults: BTreeMap<String, Value>,
}

/// Log output format.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Pretty,
    Json,
}

/// Observability configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ObservabilityConfig {
    /// Log level (trace, debug, info, warn, error) or a full filter directive.
    pub log_level: String,

    /// Pretty output for development, JSON for production.
    pub log_format: LogFormat,

    /// Enable metrics endpoint.
    pub metrics_enabled: bool,

    /// Metrics endpoint bind address.
    pub metrics_address: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            log_level: "info".to_string(),
            log_format: LogFormat::Pretty,
            metrics_enabled: true,
            metrics_address: "0.0.0.0:9090".to_string(),
        }
    }
}
