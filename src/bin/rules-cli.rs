use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use serde_json::{json, Value};

use payment_rules_engine::config::{load_config, EngineConfig, LogFormat, ObservabilityConfig};
use payment_rules_engine::model::{RequestContext, RuleCategory};
use payment_rules_engine::observability::init_logging;
use payment_rules_engine::snapshot::{FileStore, ReloadReason, StoreAdapter};
use payment_rules_engine::DecisionService;

#[derive(Parser)]
#[command(name = "rules-cli")]
#[command(about = "Inspect a rules store offline", long_about = None)]
struct Cli {
    /// Store document (TOML or JSON) with `rules` and `configurations`.
    #[arg(short, long, default_value = "rules.toml")]
    store: PathBuf,

    /// Engine configuration supplying the default route and setting defaults.
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Validate the store and list skipped rules
    Check,
    /// Route a request context (JSON)
    Route {
        /// Request context, e.g. '{"tenant":"tenant-A","attributes":{"amount":5000}}'
        context: String,
        /// Restrict to one rule category (payment_routing, risk_gate, enrichment)
        #[arg(long)]
        category: Option<String>,
    },
    /// Resolve a setting for a request context (JSON)
    Resolve {
        setting: String,
        context: String,
        /// Fallback when nothing matches (JSON value)
        #[arg(long)]
        default: Option<String>,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();
    let config = match &cli.config {
        Some(path) => load_config(path)?,
        None => EngineConfig::default(),
    };
    init_logging(&ObservabilityConfig {
        log_level: "warn".to_string(),
        log_format: LogFormat::Pretty,
        ..config.observability.clone()
    })?;

    let store: Arc<dyn StoreAdapter> = Arc::new(FileStore::new(&cli.store));
    let service = DecisionService::new(store, &config);

    let output = match cli.command {
        Commands::Check => match service.snapshots().reload(ReloadReason::Requested) {
            Ok(report) => {
                let snapshot = service.snapshots().current();
                let skipped: Vec<Value> = snapshot
                    .warnings()
                    .iter()
                    .map(|w| json!({ "rule_id": w.rule_id, "reason": w.reason }))
                    .collect();
                json!({ "ok": true, "report": report, "skipped": skipped })
            }
            Err(e) => {
                println!("{}", serde_json::to_string_pretty(&json!({ "ok": false, "error": e.to_string() }))?);
                std::process::exit(1);
            }
        },
        Commands::Route { context, category } => {
            service.reload()?;
            let ctx: RequestContext = serde_json::from_str(&context)?;
            let decision = match category {
                Some(category) => {
                    let category: RuleCategory = serde_json::from_value(Value::String(category))?;
                    service.route_category(&ctx, category)
                }
                None => service.route(&ctx),
            };
            serde_json::to_value(decision)?
        }
        Commands::Resolve {
            setting,
            context,
            default,
        } => {
            service.reload()?;
            let ctx: RequestContext = serde_json::from_str(&context)?;
            let resolution = service.resolution(&setting, &ctx)?;
            let value = match (&resolution, default) {
                (Some(r), _) => r.value.clone(),
                (None, Some(default)) => serde_json::from_str(&default)?,
                (None, None) => service.resolve(&setting, &ctx)?,
            };
            json!({ "setting": setting, "value": value, "source": resolution })
        }
    };

    println!("{}", serde_json::to_string_pretty(&output)?);
    Ok(())
}
