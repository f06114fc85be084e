//! Health reporting subsystem.
//!
//! # Data Flow
//! ```text
//! LifecycleManager (sole writer)
//!     → StateCell (atomic state)
//!     → probe.rs (HealthProbe::status, read-only)
//!     → GET /ping on the configured entry point (200 / 503)
//! ```
//!
//! # Design Decisions
//! - Ready only while Running; not ready from the instant draining begins
//! - Reads are a single atomic load, safe during a concurrent transition

pub mod probe;

pub use probe::{ping, HealthProbe};
