//! Payment Rules Engine daemon
//!
//! Keeps a hot-reloadable snapshot of routing rules and scoped configuration
//! in memory and serves decisions to an embedding payment pipeline.
//!
//! # Architecture Overview
//!
//! ```text
//!                    ┌──────────────────────────────────────────────────────────┐
//!                    │                     RULES ENGINE                          │
//!                    │                                                           │
//!   Store file ──────┼─▶ snapshot::store ──▶ snapshot::manager ──▶ ArcSwap<Snapshot>
//!   (TOML/JSON)      │        ▲                     ▲                  │        │
//!                    │        │ notify              │ reload           │ pin    │
//!                    │   file watch ──────▶ snapshot::reload ◀── SIGHUP / timer │
//!                    │                                                  ▼        │
//!   RequestContext ──┼─▶ service ──▶ cache ──miss──▶ routing / resolution        │
//!                    │      │                                                    │
//!   Decision ◀───────┼──────┘──▶ observability (tracing, metrics, stats sink)    │
//!                    └──────────────────────────────────────────────────────────┘
//! ```

use std::path::PathBuf;

use clap::Parser;

use payment_rules_engine::config::{load_config, EngineConfig};
use payment_rules_engine::lifecycle::bootstrap;
use payment_rules_engine::observability::{init_logging, metrics};

#[derive(Parser)]
#[command(name = "rules-engine")]
#[command(about = "Payment routing and configuration resolution engine", long_about = None)]
struct Args {
    /// Engine configuration file (TOML). Defaults apply when omitted.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let config = match &args.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };

    init_logging(&config.observability)?;
    tracing::info!("rules-engine v{} starting", env!("CARGO_PKG_VERSION"));
    tracing::info!(
        store = %config.store.path.display(),
        watch = config.store.watch,
        reload_interval_secs = config.reload.interval_secs,
        cache_enabled = config.cache.enabled,
        "Configuration loaded"
    );

    if config.observability.metrics_enabled {
        match config.observability.metrics_address.parse() {
            Ok(addr) => metrics::init_metrics(addr),
            Err(_) => tracing::error!(
                metrics_address = %config.observability.metrics_address,
                "Failed to parse metrics address"
            ),
        }
    }

    let engine = bootstrap(&config).await?;
    tracing::info!(generation = engine.service.generation(), "Engine ready");
    engine.wait().await;

    tracing::info!("Shutdown complete");
    Ok(())
}
