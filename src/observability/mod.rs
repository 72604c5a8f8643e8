//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (tracing events → stdout + every attached instance log file)
//!     → metrics.rs (counters, histograms)
//!
//! Consumers:
//!     → Log files named by each instance's `logFile`
//!     → Metrics endpoint (Prometheus scrape, when `--metrics-address` is set)
//! ```
//!
//! # Design Decisions
//! - One global subscriber; instance log files attach to it at startup
//! - Request ID flows through every request span
//! - Metric updates are no-ops until an exporter is installed

pub mod logging;
pub mod metrics;
