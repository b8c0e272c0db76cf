//! Configuration management subsystem.
//!
//! # Data Flow
//! ```text
//! config file (TOML)
//!     → loader.rs (parse & deserialize)
//!     → validation.rs (semantic checks)
//!     → EngineConfig (validated, immutable)
//!     → lifecycle::startup builds the store, cache, reloader and service from it
//! ```
//!
//! # Design Decisions
//! - Engine config is read once at startup; rules and settings reload, the engine config does not
//! - All fields have defaults to allow minimal configs
//! - Validation separates syntactic (serde) from semantic checks

pub mod loader;
pub mod schema;
pub mod validation;

pub use loader::{load_config, ConfigError};
pub use schema::{
    CacheConfig, EngineConfig, LogFormat, ObservabilityConfig, ReloadConfig, RoutingConfig,
    SettingsConfig, StoreConfig,
};
pub use validation::ValidationError;
