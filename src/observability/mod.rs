//! Observability subsystem.
//!
//! # Data Flow
//! ```text
//! All subsystems produce:
//!     → logging.rs (structured log events via `tracing`)
//!     → metrics.rs (counters, gauges, histograms via `metrics`)
//! ```
//!
//! Per-request spans come from `TraceLayer` on each entry point; the request ID
//! set by the entry point is recorded on the span.

pub mod logging;
pub mod metrics;
