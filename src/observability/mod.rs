//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms)
//!
//! Consumers:
//!     → stdout (fmt layer)
//!     → Metrics endpoint (Prometheus scrape, optional)
//! ```
//!
//! # Design Decisions
//! - Metrics are recorded unconditionally; without an installed recorder
//!   the `metrics` macros are no-ops
//! - Misdirections log under the `minitrue::misdirection` target so they can
//!   be filtered independently

pub mod logging;
pub mod metrics;
