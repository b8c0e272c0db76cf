//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! DecisionService / SnapshotManager produce:
//!     → logging.rs (structured log events via tracing)
//!     → metrics.rs (counters, gauges, histograms via the metrics facade)
//!     → stats.rs (in-process counters + DecisionEvent to an external StatsSink)
//!
//! Consumers:
//!     → Log aggregation (stdout, pretty or JSON)
//!     → Metrics endpoint (Prometheus scrape)
//!     → StatsSink implementations (audit trail, analytics)
//! ```
//!
//! # Design Decisions
//! - Recording is fire-and-forget; it never fails an evaluation
//! - Metrics are cheap (atomic increments); with no exporter installed they are no-ops
//! - Every decision event carries a UUID and the snapshot generation

pub mod logging;
pub mod metrics;
pub mod stats;

pub use logging::init_logging;
pub use stats::{DecisionEvent, EventKind, LogSink, StatisticsCollector, StatsReport, StatsSink};
